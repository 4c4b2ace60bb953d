//! Flip records, their lifecycle and list helpers.

use crate::error::FlipError;
use crate::permutation::{Permutation, DEFAULT_FLIP_ORDER, FLIP_LENGTH};
use crate::random::{OsRandom, RandomSource};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds in a day.
const DAY_SECS: u64 = 24 * 60 * 60;

/// Drafts untouched for this many days are pruned.
pub const DEFAULT_MAX_FLIP_AGE_DAYS: u64 = 30;

/// Lowest word id handed out for locally generated keyword pairs.
pub const KEYWORD_WORD_MIN: u32 = 3300;
/// Exclusive upper bound for locally generated keyword pair word ids.
pub const KEYWORD_WORD_MAX: u32 = 3939;

/// Lifecycle type of a flip record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlipType {
    /// Being authored locally.
    Draft,
    /// Submitted, awaiting inclusion.
    Publishing,
    /// Accepted by the network.
    Published,
    /// Deletion submitted, awaiting inclusion.
    Deleting,
    /// Removed from the network.
    Deleted,
    /// Moved out of the active list at epoch rollover or by hand.
    Archived,
    /// Rejected by validation.
    Invalid,
}

impl FlipType {
    /// Returns the string representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Publishing => "Publishing",
            Self::Published => "Published",
            Self::Deleting => "Deleting",
            Self::Deleted => "Deleted",
            Self::Archived => "Archived",
            Self::Invalid => "Invalid",
        }
    }

    /// Returns the types reachable from this one.
    ///
    /// Every type may be archived at epoch rollover.  Apart from that the
    /// lifecycle only moves forward, except that an archived draft can be
    /// restored and a failed deletion falls back to `Published`.  Only
    /// flips archived as drafts may take the `Archived -> Draft` edge; that
    /// is checked against [`Flip::archived_from`] on update.
    pub fn valid_transitions(&self) -> &'static [FlipType] {
        use FlipType::*;
        match self {
            Draft => &[Publishing, Deleted, Archived],
            Publishing => &[Published, Invalid, Archived],
            Published => &[Deleting, Invalid, Archived],
            Deleting => &[Deleted, Published, Archived],
            Deleted => &[Archived],
            Archived => &[Draft],
            Invalid => &[Archived],
        }
    }

    /// Returns `true` if moving to `target` is allowed.  Staying put is
    /// not a transition.
    pub fn can_transition_to(&self, target: FlipType) -> bool {
        self.valid_transitions().contains(&target)
    }
}

impl fmt::Display for FlipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Globally numbered keyword pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordPair {
    /// Pair index.
    pub id: u32,
    /// The two word ids.
    pub words: [u32; 2],
}

/// Draws a placeholder keyword pair with id 0 from the OS CSPRNG.
pub fn random_keyword_pair() -> KeywordPair {
    random_keyword_pair_with(&mut OsRandom)
}

/// Draws a placeholder keyword pair using `rng`.
pub fn random_keyword_pair_with<R: RandomSource + ?Sized>(rng: &mut R) -> KeywordPair {
    let span = KEYWORD_WORD_MAX - KEYWORD_WORD_MIN;
    let mut word = || KEYWORD_WORD_MIN + rng.next_u32() % span;
    KeywordPair {
        id: 0,
        words: [word(), word()],
    }
}

/// A validation flip as kept by the local flip store.
///
/// Images are base64 data URLs.  A published flip always has all four
/// protected images and a network hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flip {
    /// Local identifier.
    pub id: String,
    /// Network content hash, assigned on publish.
    #[serde(default)]
    pub hash: Option<String>,
    /// Keyword pair index.
    pub keyword_pair_id: u32,
    /// Original images in authoring order.
    pub images: [Option<String>; FLIP_LENGTH],
    /// Images after the external protection step.
    #[serde(default)]
    pub protected_images: Option<[Option<String>; FLIP_LENGTH]>,
    /// Story order of the images.
    pub original_order: Permutation,
    /// Order the author arranged the images in.
    pub order: Permutation,
    /// Display order used on submit when the flip carries no hint.
    pub order_permutations: Permutation,
    /// Whether the flip was authored with a hint.
    #[serde(default)]
    pub hint: bool,
    /// Lifecycle type.
    #[serde(rename = "type")]
    pub flip_type: FlipType,
    /// Type the flip had when it was archived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_from: Option<FlipType>,
    /// Creation time, unix seconds.
    pub created_at: u64,
    /// Last modification time, unix seconds.
    #[serde(default)]
    pub modified_at: Option<u64>,
}

impl Flip {
    /// Creates an empty draft for `keyword_pair_id`.
    pub fn draft(id: impl Into<String>, keyword_pair_id: u32, created_at: u64) -> Self {
        Self {
            id: id.into(),
            hash: None,
            keyword_pair_id,
            images: Default::default(),
            protected_images: None,
            original_order: DEFAULT_FLIP_ORDER,
            order: DEFAULT_FLIP_ORDER,
            order_permutations: DEFAULT_FLIP_ORDER,
            hint: false,
            flip_type: FlipType::Draft,
            archived_from: None,
            created_at,
            modified_at: None,
        }
    }

    /// Protected images if present, otherwise the originals.
    pub fn submission_images(&self) -> &[Option<String>; FLIP_LENGTH] {
        self.protected_images.as_ref().unwrap_or(&self.images)
    }

    /// Checks the published-flip invariant.
    pub fn is_well_formed(&self) -> bool {
        if self.flip_type != FlipType::Published {
            return true;
        }
        self.hash.is_some()
            && self
                .protected_images
                .as_ref()
                .map(|imgs| imgs.iter().all(Option::is_some))
                .unwrap_or(false)
    }

    /// Moves the flip to `Archived`, remembering where it came from.
    pub fn archive(&mut self) {
        if self.flip_type != FlipType::Archived {
            self.archived_from = Some(self.flip_type);
            self.flip_type = FlipType::Archived;
        }
    }

    /// Last touch time: modification if known, otherwise creation.
    pub fn last_modified(&self) -> u64 {
        self.modified_at.unwrap_or(self.created_at)
    }
}

/// Returns the publishing flip already holding keyword pair `id`, if any.
pub fn is_pending_keyword_pair(flips: &[Flip], id: u32) -> Option<&Flip> {
    flips
        .iter()
        .find(|flip| flip.flip_type == FlipType::Publishing && flip.keyword_pair_id == id)
}

fn set_type(flip: &mut Flip, target: FlipType) -> Result<(), FlipError> {
    let restorable = flip.flip_type != FlipType::Archived
        || target != FlipType::Draft
        || flip.archived_from == Some(FlipType::Draft);
    if !flip.flip_type.can_transition_to(target) || !restorable {
        return Err(FlipError::InvalidTransition {
            from: flip.flip_type,
            to: target,
        });
    }
    if target == FlipType::Archived {
        flip.archive();
    } else {
        flip.archived_from = None;
        flip.flip_type = target;
    }
    Ok(())
}

/// Changes the type of the flip with local id `id`.
pub fn update_flip_type(flips: &mut [Flip], id: &str, target: FlipType) -> Result<(), FlipError> {
    let flip = flips
        .iter_mut()
        .find(|flip| flip.id == id)
        .ok_or_else(|| FlipError::UnknownFlip(id.to_string()))?;
    set_type(flip, target)
}

/// Changes the type of the flip with network hash `hash`.
pub fn update_flip_type_by_hash(
    flips: &mut [Flip],
    hash: &str,
    target: FlipType,
) -> Result<(), FlipError> {
    let flip = flips
        .iter_mut()
        .find(|flip| flip.hash.as_deref() == Some(hash))
        .ok_or_else(|| FlipError::UnknownFlip(hash.to_string()))?;
    set_type(flip, target)
}

/// True while the flip was touched less than `max_age_days` ago.
pub fn is_fresh_flip(flip: &Flip, now: u64, max_age_days: u64) -> bool {
    now.saturating_sub(flip.last_modified()) / DAY_SECS < max_age_days
}

/// True once the flip has not been touched for `max_age_days`.
pub fn is_outdated_flip(flip: &Flip, now: u64, max_age_days: u64) -> bool {
    !is_fresh_flip(flip, now, max_age_days)
}

/// Tabs of the flip list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlipFilter {
    /// Flips submitted to the network.
    #[default]
    Active,
    /// Local drafts.
    Drafts,
    /// Archived and deleted flips.
    Archived,
}

impl FlipFilter {
    /// Returns true if `flip` belongs to this tab.
    pub fn matches(&self, flip: &Flip) -> bool {
        use FlipType::*;
        match self {
            Self::Active => matches!(flip.flip_type, Publishing | Published | Deleting | Invalid),
            Self::Drafts => flip.flip_type == Draft,
            Self::Archived => matches!(flip.flip_type, Archived | Deleted),
        }
    }

    /// Selects the flips of this tab; drafts come newest-modified first.
    pub fn apply<'a>(&self, flips: &'a [Flip]) -> Vec<&'a Flip> {
        let mut out: Vec<&Flip> = flips.iter().filter(|flip| self.matches(flip)).collect();
        if *self == Self::Drafts {
            out.sort_by(|a, b| b.last_modified().cmp(&a.last_modified()));
        }
        out
    }
}

impl std::str::FromStr for FlipFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "draft" | "drafts" => Ok(Self::Drafts),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown flip filter: {other}")),
        }
    }
}

/// How many more flips an identity must and may author this epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlipQuota {
    /// Required flips still missing.
    pub remaining_required: u32,
    /// Optional flips still allowed beyond the required ones.
    pub remaining_optional: u32,
}

impl FlipQuota {
    /// Derives the quota from the epoch allowance and flips already made.
    pub fn new(required: u32, available: u32, made: u32) -> Self {
        Self {
            remaining_required: required.saturating_sub(made),
            remaining_optional: available.saturating_sub(required.max(made)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::random::ScriptedRandom;

    pub(crate) fn flip_with(id: &str, flip_type: FlipType, modified_at: u64) -> Flip {
        let mut flip = Flip::draft(id, 1, modified_at);
        flip.flip_type = flip_type;
        flip
    }

    #[test]
    fn lifecycle_only_reverts_where_allowed() {
        assert!(FlipType::Draft.can_transition_to(FlipType::Archived));
        assert!(FlipType::Archived.can_transition_to(FlipType::Draft));
        assert!(FlipType::Deleting.can_transition_to(FlipType::Published));
        assert!(!FlipType::Publishing.can_transition_to(FlipType::Publishing));
        assert!(!FlipType::Published.can_transition_to(FlipType::Draft));
        assert!(!FlipType::Deleted.can_transition_to(FlipType::Published));
        assert!(!FlipType::Archived.can_transition_to(FlipType::Published));
    }

    #[test]
    fn only_archived_drafts_return_to_draft() {
        let mut flips = vec![
            flip_with("draft", FlipType::Draft, 0),
            flip_with("live", FlipType::Published, 0),
        ];
        flips[1].hash = Some("0xlive".into());
        update_flip_type(&mut flips, "draft", FlipType::Archived).unwrap();
        flips[1].archive();
        assert_eq!(flips[0].archived_from, Some(FlipType::Draft));
        assert_eq!(flips[1].archived_from, Some(FlipType::Published));

        assert!(matches!(
            update_flip_type(&mut flips, "live", FlipType::Draft),
            Err(FlipError::InvalidTransition {
                from: FlipType::Archived,
                to: FlipType::Draft
            })
        ));
        update_flip_type(&mut flips, "draft", FlipType::Draft).unwrap();
        assert_eq!(flips[0].flip_type, FlipType::Draft);
        assert_eq!(flips[0].archived_from, None);
    }

    #[test]
    fn updates_by_id_and_hash() {
        let mut flips = vec![flip_with("a", FlipType::Draft, 0), flip_with("b", FlipType::Published, 0)];
        flips[1].hash = Some("0xabc".into());
        update_flip_type(&mut flips, "a", FlipType::Publishing).unwrap();
        update_flip_type_by_hash(&mut flips, "0xabc", FlipType::Deleting).unwrap();
        assert_eq!(flips[0].flip_type, FlipType::Publishing);
        assert_eq!(flips[1].flip_type, FlipType::Deleting);
        assert!(matches!(
            update_flip_type(&mut flips, "a", FlipType::Draft),
            Err(FlipError::InvalidTransition { .. })
        ));
        assert!(matches!(
            update_flip_type(&mut flips, "zz", FlipType::Draft),
            Err(FlipError::UnknownFlip(_))
        ));
    }

    #[test]
    fn pending_keyword_pair_requires_publishing_type() {
        let mut flips = vec![flip_with("a", FlipType::Published, 0)];
        assert!(is_pending_keyword_pair(&flips, 1).is_none());
        flips[0].flip_type = FlipType::Publishing;
        assert_eq!(is_pending_keyword_pair(&flips, 1).map(|f| f.id.as_str()), Some("a"));
        assert!(is_pending_keyword_pair(&flips, 2).is_none());
    }

    #[test]
    fn freshness_uses_modification_time() {
        let now = 40 * DAY_SECS;
        let mut flip = flip_with("a", FlipType::Draft, 0);
        assert!(is_outdated_flip(&flip, now, 30));
        flip.modified_at = Some(now - 29 * DAY_SECS);
        assert!(is_fresh_flip(&flip, now, 30));
        flip.modified_at = Some(now - 30 * DAY_SECS);
        assert!(is_outdated_flip(&flip, now, 30));
    }

    #[test]
    fn filters_group_types_and_sort_drafts() {
        let flips = vec![
            flip_with("old", FlipType::Draft, 10),
            flip_with("pub", FlipType::Published, 0),
            flip_with("new", FlipType::Draft, 20),
            flip_with("gone", FlipType::Deleted, 0),
            flip_with("bad", FlipType::Invalid, 0),
        ];
        let ids = |filter: FlipFilter| {
            filter
                .apply(&flips)
                .into_iter()
                .map(|f| f.id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(FlipFilter::Drafts), vec!["new", "old"]);
        assert_eq!(ids(FlipFilter::Active), vec!["pub", "bad"]);
        assert_eq!(ids(FlipFilter::Archived), vec!["gone"]);
    }

    #[test]
    fn quota_counts_optional_beyond_required() {
        assert_eq!(
            FlipQuota::new(3, 5, 1),
            FlipQuota {
                remaining_required: 2,
                remaining_optional: 2
            }
        );
        assert_eq!(
            FlipQuota::new(3, 5, 4),
            FlipQuota {
                remaining_required: 0,
                remaining_optional: 1
            }
        );
    }

    #[test]
    fn keyword_pair_words_stay_in_range() {
        let mut rng = ScriptedRandom::new([0, u32::MAX]);
        let pair = random_keyword_pair_with(&mut rng);
        assert_eq!(pair.id, 0);
        assert_eq!(pair.words[0], KEYWORD_WORD_MIN);
        assert!(pair.words[1] < KEYWORD_WORD_MAX);
    }

    #[test]
    fn published_invariant_needs_hash_and_images() {
        let mut flip = flip_with("a", FlipType::Published, 0);
        assert!(!flip.is_well_formed());
        flip.hash = Some("0x1".into());
        flip.protected_images = Some([
            Some("a".into()),
            Some("b".into()),
            Some("c".into()),
            Some("d".into()),
        ]);
        assert!(flip.is_well_formed());
    }
}
