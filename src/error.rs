//! Error taxonomy shared by the encoder, the publisher and the flip store.

use crate::flip::FlipType;
use thiserror::Error;

/// Coarse classification of a submission rejected by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// The identity status does not allow flip submission.
    IdentityIneligible,
    /// A validation ceremony is running and flips cannot be submitted.
    CeremonyInProgress,
    /// Any other node error, passed through verbatim.
    Other,
}

impl RejectionKind {
    /// Classifies a raw node error message by substring.
    pub fn classify(message: &str) -> Self {
        if message.contains("candidate") {
            Self::IdentityIneligible
        } else if message.contains("ceremony") {
            Self::CeremonyInProgress
        } else {
            Self::Other
        }
    }
}

/// Errors raised while preparing, encoding, publishing or updating flips.
#[derive(Debug, Error)]
pub enum FlipError {
    #[error("a flip needs 4 images")]
    /// One or more of the four image slots is empty.
    MissingImages,
    #[error("this flip was already submitted")]
    /// The protected images match an already published flip.
    DuplicateFlip,
    #[error("shuffle the flip before submitting")]
    /// The display order equals the reference order.
    NotShuffled,
    #[error("flip content is too big: {size} bytes exceeds {limit}")]
    /// Combined hex payload length is over the ceiling.
    PayloadTooLarge {
        /// Combined hex length of both payloads.
        size: usize,
        /// Configured ceiling.
        limit: usize,
    },
    #[error("keyword pair {0} is already used by a publishing flip")]
    /// Another flip is currently publishing with the same keyword pair.
    KeywordPairPending(u32),
    #[error("{}", rejection_message(.kind, .message))]
    /// The node refused the submission.
    SubmissionRejected {
        /// Classification derived from the message.
        kind: RejectionKind,
        /// Raw node message.
        message: String,
    },
    #[error("invalid permutation: {0}")]
    /// An order array is not a bijection over `0..4`.
    InvalidPermutation(String),
    #[error("invalid image data url: {0}")]
    /// An image source is not a base64 data URL.
    InvalidDataUrl(String),
    #[error("payload decode error: {0}")]
    /// Hex or RLP payload could not be decoded.
    Decode(String),
    #[error("cannot move flip from {from} to {to}")]
    /// Flip lifecycle forbids the requested type change.
    InvalidTransition {
        /// Current flip type.
        from: FlipType,
        /// Requested flip type.
        to: FlipType,
    },
    #[error("unknown flip: {0}")]
    /// No flip matches the given id or hash.
    UnknownFlip(String),
    #[error(transparent)]
    /// Flip store failure.
    Store(#[from] StoreError),
}

fn rejection_message(kind: &RejectionKind, message: &str) -> String {
    match kind {
        RejectionKind::IdentityIneligible => {
            "it's not allowed to submit flips with your identity status".to_string()
        }
        RejectionKind::CeremonyInProgress => {
            "can not submit flip during the validation session".to_string()
        }
        RejectionKind::Other => message.to_string(),
    }
}

/// Errors surfaced by file-backed stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    /// File-system failure.
    Io(String),
    #[error("store parse error: {0}")]
    /// Stored JSON could not be decoded or encoded.
    Parse(String),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    /// Config file could not be read.
    Io(String),
    #[error("config parse error: {0}")]
    /// Config file or variable is malformed.
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_node_messages() {
        assert_eq!(
            RejectionKind::classify("identity is not a candidate"),
            RejectionKind::IdentityIneligible
        );
        assert_eq!(
            RejectionKind::classify("ceremony is in progress"),
            RejectionKind::CeremonyInProgress
        );
        assert_eq!(RejectionKind::classify("flip is too big"), RejectionKind::Other);
    }

    #[test]
    fn other_rejections_pass_message_through() {
        let err = FlipError::SubmissionRejected {
            kind: RejectionKind::Other,
            message: "insufficient funds".into(),
        };
        assert_eq!(err.to_string(), "insufficient funds");
        let err = FlipError::SubmissionRejected {
            kind: RejectionKind::CeremonyInProgress,
            message: "ceremony".into(),
        };
        assert!(err.to_string().contains("validation session"));
    }
}
