//! Session context: flip answer records and the cursor.

use serde::{Deserialize, Serialize};

/// Which side of a flip pair the participant picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerOption {
    /// Left sequence.
    Left,
    /// Right sequence.
    Right,
}

/// Keyword relevance mark given during qualification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relevance {
    /// Both keywords match the story.
    Relevant,
    /// The keywords do not match the story.
    Irrelevant,
}

/// Validation phase a flip list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    /// First phase, flip pairs only.
    Short,
    /// Second phase, flip pairs then keyword grading.
    Long,
}

/// One flip as seen by the participant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionFlip {
    /// Network hash.
    pub hash: String,
    /// Decoded images as data URLs.
    #[serde(default)]
    pub images: Vec<String>,
    /// Chosen side, if answered.
    #[serde(default)]
    pub option: Option<AnswerOption>,
    /// Relevance mark, if graded.
    #[serde(default)]
    pub relevance: Option<Relevance>,
    /// Spare flip that does not count toward the session.
    #[serde(default)]
    pub extra: bool,
    /// Payload fetched from the network.
    #[serde(default)]
    pub loaded: bool,
    /// Payload decrypted and decoded.
    #[serde(default)]
    pub decoded: bool,
}

impl SessionFlip {
    /// A fetched and decoded flip.
    pub fn ready(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            loaded: true,
            decoded: true,
            ..Self::default()
        }
    }

    /// A flip whose payload is still in flight.
    pub fn pending(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            ..Self::default()
        }
    }

    /// Marks the flip as a spare.
    pub fn into_extra(mut self) -> Self {
        self.extra = true;
        self
    }
}

/// Answer record handed to the submission collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Flip hash.
    pub hash: String,
    /// Chosen side; `None` when skipped.
    pub option: Option<AnswerOption>,
    /// Relevance mark; only set for long-session keyword grading.
    pub relevance: Option<Relevance>,
}

/// Mutable data carried through the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Validation epoch.
    pub epoch: u64,
    /// Validation start, unix milliseconds.
    pub validation_start: u64,
    /// Short-session flips.
    pub short_flips: Vec<SessionFlip>,
    /// Long-session flips.
    pub long_flips: Vec<SessionFlip>,
    /// Cursor into the active flip sequence.
    pub current_index: usize,
    /// Message of the last failed submission.
    pub last_error: Option<String>,
    /// Phases whose deadline has passed.
    pub expired: Vec<SessionKind>,
}

impl SessionContext {
    /// Fresh context for `epoch`.
    pub fn new(epoch: u64, validation_start: u64) -> Self {
        Self {
            epoch,
            validation_start,
            short_flips: Vec::new(),
            long_flips: Vec::new(),
            current_index: 0,
            last_error: None,
            expired: Vec::new(),
        }
    }

    /// Flip list of `kind`, spares and unready flips included.
    pub fn flips(&self, kind: SessionKind) -> &[SessionFlip] {
        match kind {
            SessionKind::Short => &self.short_flips,
            SessionKind::Long => &self.long_flips,
        }
    }

    pub(crate) fn flips_mut(&mut self, kind: SessionKind) -> &mut Vec<SessionFlip> {
        match kind {
            SessionKind::Short => &mut self.short_flips,
            SessionKind::Long => &mut self.long_flips,
        }
    }

    /// Positions in the raw list of the flips that count toward `kind`.
    ///
    /// Spares never count; long-session flips also need to be loaded and
    /// decoded.
    pub fn active_indices(&self, kind: SessionKind) -> Vec<usize> {
        self.flips(kind)
            .iter()
            .enumerate()
            .filter(|(_, flip)| !flip.extra)
            .filter(|(_, flip)| kind == SessionKind::Short || (flip.loaded && flip.decoded))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// The flips that count toward `kind`, in order.
    pub fn active_flips(&self, kind: SessionKind) -> Vec<&SessionFlip> {
        let flips = self.flips(kind);
        self.active_indices(kind)
            .into_iter()
            .map(|idx| &flips[idx])
            .collect()
    }

    /// The flip under the cursor.
    pub fn current_flip(&self, kind: SessionKind) -> Option<&SessionFlip> {
        let idx = *self.active_indices(kind).get(self.current_index)?;
        self.flips(kind).get(idx)
    }

    pub(crate) fn current_flip_mut(&mut self, kind: SessionKind) -> Option<&mut SessionFlip> {
        let idx = *self.active_indices(kind).get(self.current_index)?;
        self.flips_mut(kind).get_mut(idx)
    }

    /// Answers for every non-spare flip of `kind`.
    pub fn answers(&self, kind: SessionKind) -> Vec<Answer> {
        self.flips(kind)
            .iter()
            .filter(|flip| !flip.extra)
            .map(|flip| Answer {
                hash: flip.hash.clone(),
                option: flip.option,
                relevance: flip.relevance,
            })
            .collect()
    }

    /// Returns true once the deadline for `kind` has passed.
    pub fn is_expired(&self, kind: SessionKind) -> bool {
        self.expired.contains(&kind)
    }

    /// Replaces the flips of `kind`, keeping marks already given by hash.
    ///
    /// Earlier records missing from `incoming` are dropped unless they carry
    /// an answer or a relevance mark; those stay at the end of the list.
    pub(crate) fn merge_flips(&mut self, kind: SessionKind, incoming: Vec<SessionFlip>) {
        let previous = std::mem::take(self.flips_mut(kind));
        let mut merged: Vec<SessionFlip> = incoming
            .into_iter()
            .map(|mut flip| {
                if let Some(old) = previous.iter().find(|old| old.hash == flip.hash) {
                    flip.option = flip.option.or(old.option);
                    flip.relevance = flip.relevance.or(old.relevance);
                    if flip.images.is_empty() {
                        flip.images = old.images.clone();
                    }
                }
                flip
            })
            .collect();
        let kept: Vec<SessionFlip> = previous
            .into_iter()
            .filter(|old| old.option.is_some() || old.relevance.is_some())
            .filter(|old| !merged.iter().any(|flip| flip.hash == old.hash))
            .collect();
        merged.extend(kept);
        *self.flips_mut(kind) = merged;
    }

    pub(crate) fn clamp_cursor(&mut self, kind: SessionKind) {
        let len = self.active_indices(kind).len();
        if len == 0 {
            self.current_index = 0;
        } else if self.current_index >= len {
            self.current_index = len - 1;
        }
    }
}

/// True when the list is non-empty and every flip is answered.
pub fn has_all_answers(flips: &[&SessionFlip]) -> bool {
    !flips.is_empty() && flips.iter().all(|flip| flip.option.is_some())
}

/// True when the list is non-empty and every flip is graded.
pub fn has_all_relevance_marks(flips: &[&SessionFlip]) -> bool {
    !flips.is_empty() && flips.iter().all(|flip| flip.relevance.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_sequence_skips_spares_and_unready_long_flips() {
        let mut ctx = SessionContext::new(1, 0);
        ctx.short_flips = vec![
            SessionFlip::pending("a"),
            SessionFlip::ready("b").into_extra(),
            SessionFlip::ready("c"),
        ];
        ctx.long_flips = vec![
            SessionFlip::pending("x"),
            SessionFlip::ready("y"),
            SessionFlip::ready("z").into_extra(),
        ];
        assert_eq!(ctx.active_indices(SessionKind::Short), vec![0, 2]);
        assert_eq!(ctx.active_indices(SessionKind::Long), vec![1]);
        assert_eq!(ctx.current_flip(SessionKind::Long).map(|f| f.hash.as_str()), Some("y"));
        assert_eq!(ctx.answers(SessionKind::Long).len(), 2);
    }

    #[test]
    fn merge_keeps_existing_marks() {
        let mut ctx = SessionContext::new(1, 0);
        ctx.long_flips = vec![SessionFlip::pending("x")];
        ctx.long_flips[0].option = Some(AnswerOption::Left);
        ctx.merge_flips(
            SessionKind::Long,
            vec![SessionFlip::ready("x"), SessionFlip::ready("y")],
        );
        assert_eq!(ctx.long_flips[0].option, Some(AnswerOption::Left));
        assert!(ctx.long_flips[0].decoded);
        assert_eq!(ctx.long_flips.len(), 2);
    }

    #[test]
    fn merge_keeps_answered_flips_missing_from_refetch() {
        let mut ctx = SessionContext::new(1, 0);
        ctx.short_flips = vec![SessionFlip::ready("a"), SessionFlip::ready("b")];
        ctx.short_flips[0].option = Some(AnswerOption::Right);
        ctx.merge_flips(SessionKind::Short, vec![SessionFlip::ready("c")]);
        let hashes: Vec<_> = ctx.short_flips.iter().map(|f| f.hash.as_str()).collect();
        assert_eq!(hashes, vec!["c", "a"]);
        let answers = ctx.answers(SessionKind::Short);
        assert_eq!(answers[1].option, Some(AnswerOption::Right));
    }

    #[test]
    fn completeness_needs_at_least_one_flip() {
        assert!(!has_all_answers(&[]));
        assert!(!has_all_relevance_marks(&[]));
        let mut flip = SessionFlip::ready("a");
        flip.option = Some(AnswerOption::Right);
        assert!(has_all_answers(&[&flip]));
        assert!(!has_all_relevance_marks(&[&flip]));
    }
}
