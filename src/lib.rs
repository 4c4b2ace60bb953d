#![deny(missing_docs)]

//! # flip_ceremony
//!
//! **flip_ceremony** implements the client side of a flip-based validation
//! ceremony: participants author 4-image flips, publish them as RLP payloads,
//! and later solve other people's flips inside a timed validation session.
//!
//! ## Features
//!
//! * **Permutations** over the four image slots via the
//!   [`Permutation`](permutation/struct.Permutation.html) type, with
//!   exhaustive enumeration and uniform selection from an injectable
//!   [`RandomSource`](random/trait.RandomSource.html).
//! * **Flip encoding**: the [`encoding`](encoding/index.html) module shuffles
//!   images, records the order pair and produces the `0x`-prefixed public and
//!   private payloads.  [`decode_flip`](encoding/fn.decode_flip.html) reverses
//!   it.
//! * **Publishing**: [`publish_flip`](publish/fn.publish_flip.html) runs the
//!   pre-submission checks, hands the payloads to a
//!   [`FlipSubmitter`](publish/trait.FlipSubmitter.html) and classifies node
//!   rejections.
//! * **Flip store maintenance**: archiving at epoch rollover, pruning of
//!   outdated drafts and list filters in [`store`](store/index.html) and
//!   [`flip`](flip/index.html).
//! * **Validation session**: the [`session`](session/index.html) module is a
//!   pure state machine; the `driver` feature adds a tokio executor that runs
//!   submissions and forces them when a phase deadline passes.
//!
//! ## Usage
//!
//! ```rust
//! use flip_ceremony::{decode_flip, encode_flip, Permutation};
//!
//! let images = [vec![1u8], vec![2u8], vec![3u8], vec![4u8]];
//! let order: Permutation = "1,0,3,2".parse().unwrap();
//! let payload = encode_flip(&images, &order);
//! let decoded = decode_flip(&payload.public_hex, &payload.private_hex).unwrap();
//! let mut sorted = decoded.images.to_vec();
//! sorted.sort();
//! assert_eq!(sorted, images.to_vec());
//! ```

pub mod commands;
pub mod config;
#[cfg(feature = "driver")]
pub mod driver;
pub mod encoding;
pub mod error;
pub mod flip;
pub mod image;
pub mod permutation;
pub mod publish;
pub mod random;
pub mod session;
pub mod store;

pub use config::CeremonyConfig;
pub use encoding::{
    decode_flip, encode_flip, encode_flip_with, shuffle_images, DecodedFlip, FlipPayload,
    ShuffledFlip,
};
pub use error::{ConfigError, FlipError, RejectionKind, StoreError};
pub use flip::{
    is_fresh_flip, is_outdated_flip, is_pending_keyword_pair, random_keyword_pair,
    update_flip_type, update_flip_type_by_hash, Flip, FlipFilter, FlipQuota, FlipType,
    KeywordPair,
};
pub use image::{decode_data_url, encode_data_url};
pub use permutation::{
    all_permutations, random_permutation, random_permutation_with, Permutation,
    DEFAULT_FLIP_ORDER, FLIP_LENGTH,
};
pub use publish::{
    prepare_flip, publish_flip, publish_flip_with, FlipSubmitter, SubmitResponse,
    MAX_FLIP_PAYLOAD_LEN,
};
pub use random::{OsRandom, RandomSource, ScriptedRandom};
pub use session::{
    SessionCommand, SessionEvent, SessionKind, SessionState, SessionTimer, Transition,
    ValidationSession,
};
pub use store::{
    archive_flips, handle_outdated_flips, rollover_epoch, ArchiveLedger, FlipStore,
    JsonFlipStore, MemoryFlipStore,
};
