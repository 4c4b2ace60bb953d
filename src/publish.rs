//! Pre-submission checks and the flip submission call.
//!
//! Every check runs before the node is contacted, in this order: all four
//! images present, not a duplicate of a published flip, keyword pair not held
//! by another publishing flip, images actually reordered, and the encoded
//! payload within the size ceiling.

use crate::encoding::{encode_flip_with, FlipPayload};
use crate::error::{FlipError, RejectionKind};
use crate::flip::{is_pending_keyword_pair, Flip, FlipType};
use crate::image::decode_data_url;
use crate::permutation::{DEFAULT_FLIP_ORDER, FLIP_LENGTH};
use crate::random::{OsRandom, RandomSource};
use crate::store::FlipStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

/// Ceiling for the combined hex length of both payloads.
pub const MAX_FLIP_PAYLOAD_LEN: usize = 2 * 1024 * 1024;

/// Error object returned by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Human-readable node message.
    pub message: String,
}

/// Node reply to a flip submission: either `result` or `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Success payload.
    #[serde(default)]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(default)]
    pub error: Option<RemoteError>,
}

impl SubmitResponse {
    /// Successful reply carrying `result`.
    pub fn ok(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    /// Failed reply carrying `message`.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(RemoteError {
                message: message.into(),
            }),
        }
    }
}

/// External collaborator that hands flip payloads to the node.
pub trait FlipSubmitter {
    /// Submits both payloads for `keyword_pair_id`.
    fn submit_flip(&mut self, public_hex: &str, private_hex: &str, keyword_pair_id: u32)
        -> SubmitResponse;
}

/// Fails when `size` exceeds `limit`; equality is accepted.
pub fn check_payload_size(size: usize, limit: usize) -> Result<(), FlipError> {
    if size > limit {
        return Err(FlipError::PayloadTooLarge { size, limit });
    }
    Ok(())
}

/// Runs every pre-submission check and encodes the flip.
///
/// `known` is the current content of the flip store.
pub fn prepare_flip<R: RandomSource + ?Sized>(
    flip: &Flip,
    known: &[Flip],
    limit: usize,
    rng: &mut R,
) -> Result<FlipPayload, FlipError> {
    let sources = flip.submission_images();
    if sources.iter().any(Option::is_none) {
        return Err(FlipError::MissingImages);
    }

    let duplicate = known.iter().any(|other| {
        other.flip_type == FlipType::Published
            && other.protected_images.as_ref() == Some(sources)
    });
    if duplicate {
        return Err(FlipError::DuplicateFlip);
    }

    if let Some(holder) = is_pending_keyword_pair(known, flip.keyword_pair_id) {
        if holder.id != flip.id {
            return Err(FlipError::KeywordPairPending(flip.keyword_pair_id));
        }
    }

    let reference = if flip.hint {
        DEFAULT_FLIP_ORDER
    } else {
        flip.original_order
    };
    if flip.order == reference {
        return Err(FlipError::NotShuffled);
    }

    let mut images: [Vec<u8>; FLIP_LENGTH] = Default::default();
    for (slot, src) in images.iter_mut().zip(sources.iter().flatten()) {
        *slot = decode_data_url(src)?;
    }
    let (images, display_order) = if flip.hint {
        (images, flip.order)
    } else {
        (flip.original_order.apply(&images), flip.order_permutations)
    };

    let payload = encode_flip_with(&images, &display_order, rng);
    check_payload_size(payload.hex_len(), limit)?;
    Ok(payload)
}

/// Validates, encodes and submits the stored flip `flip_id`.
///
/// On success the flip moves to `Publishing` with the hash reported by the
/// node and the raw node result is returned.  On any failure the store is
/// left untouched.
pub fn publish_flip<S, N>(store: &mut S, submitter: &mut N, flip_id: &str) -> Result<Value, FlipError>
where
    S: FlipStore + ?Sized,
    N: FlipSubmitter + ?Sized,
{
    publish_flip_with(store, submitter, flip_id, MAX_FLIP_PAYLOAD_LEN, &mut OsRandom)
}

/// [`publish_flip`] with an explicit size ceiling and randomness source.
pub fn publish_flip_with<S, N, R>(
    store: &mut S,
    submitter: &mut N,
    flip_id: &str,
    limit: usize,
    rng: &mut R,
) -> Result<Value, FlipError>
where
    S: FlipStore + ?Sized,
    N: FlipSubmitter + ?Sized,
    R: RandomSource + ?Sized,
{
    let mut flips = store.get_flips()?;
    let idx = flips
        .iter()
        .position(|flip| flip.id == flip_id)
        .ok_or_else(|| FlipError::UnknownFlip(flip_id.to_string()))?;
    let flip = &flips[idx];
    if !flip.flip_type.can_transition_to(FlipType::Publishing) {
        return Err(FlipError::InvalidTransition {
            from: flip.flip_type,
            to: FlipType::Publishing,
        });
    }

    let payload = prepare_flip(flip, &flips, limit, rng)?;
    let response = submitter.submit_flip(
        &payload.public_hex,
        &payload.private_hex,
        flip.keyword_pair_id,
    );

    if let Some(RemoteError { message }) = response.error {
        let kind = RejectionKind::classify(&message);
        warn!(flip = flip_id, ?kind, %message, "flip submission rejected");
        return Err(FlipError::SubmissionRejected { kind, message });
    }

    let result = response.result.unwrap_or(Value::Null);
    let hash = result
        .get("hash")
        .and_then(Value::as_str)
        .or_else(|| result.as_str())
        .map(str::to_string);

    let flip = &mut flips[idx];
    flip.flip_type = FlipType::Publishing;
    flip.hash = hash;
    info!(
        flip = flip_id,
        keyword_pair = flip.keyword_pair_id,
        hash = flip.hash.as_deref().unwrap_or(""),
        bytes = payload.hex_len(),
        "flip submitted"
    );
    store.save_flips(flips)?;
    Ok(result)
}
