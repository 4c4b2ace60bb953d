use crate::encoding::{decode_flip, encode_flip, FlipPayload};
use crate::image::sniff_mime;
use crate::permutation::{Permutation, FLIP_LENGTH};
use crate::publish::check_payload_size;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Options for encoding four image files into flip payloads.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Image files in authoring order.
    pub images: Vec<PathBuf>,
    /// Display order the author arranged.
    pub order: Permutation,
    /// Ceiling for the combined hex length.
    pub max_payload_len: usize,
}

/// Encoded payloads as printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct EncodeOutput {
    /// `0x`-prefixed public payload.
    pub public_hex: String,
    /// `0x`-prefixed private payload.
    pub private_hex: String,
    /// Combined hex length.
    pub hex_len: usize,
}

impl From<FlipPayload> for EncodeOutput {
    fn from(payload: FlipPayload) -> Self {
        let hex_len = payload.hex_len();
        Self {
            public_hex: payload.public_hex,
            private_hex: payload.private_hex,
            hex_len,
        }
    }
}

/// One decoded image.
#[derive(Debug, Clone, Serialize)]
pub struct DecodedImage {
    /// Position in the shuffled payload.
    pub position: usize,
    /// Size in bytes.
    pub bytes: usize,
    /// Sniffed media type.
    pub mime: &'static str,
    /// Where the image was written, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Decoded payloads as printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct DecodeOutput {
    /// Order arrays in emission order, `a,b,c,d` form.
    pub orders: Vec<String>,
    /// Images in shuffled position order.
    pub images: Vec<DecodedImage>,
}

/// Reads four image files and encodes them with `order` as display order.
pub fn run_encode(opts: &EncodeOptions) -> Result<EncodeOutput, String> {
    if opts.images.len() != FLIP_LENGTH {
        return Err(format!(
            "expected {FLIP_LENGTH} images, got {}",
            opts.images.len()
        ));
    }
    let mut images: [Vec<u8>; FLIP_LENGTH] = Default::default();
    for (slot, path) in images.iter_mut().zip(&opts.images) {
        *slot = fs::read(path).map_err(|err| format!("{}: {err}", path.display()))?;
        if slot.is_empty() {
            return Err(format!("{}: empty image", path.display()));
        }
    }
    let payload = encode_flip(&images, &opts.order);
    check_payload_size(payload.hex_len(), opts.max_payload_len).map_err(|err| err.to_string())?;
    Ok(payload.into())
}

/// Decodes hex payload files; writes the images to `out_dir` when given.
pub fn run_decode(
    public_path: &Path,
    private_path: &Path,
    out_dir: Option<&Path>,
) -> Result<DecodeOutput, String> {
    let public = fs::read_to_string(public_path)
        .map_err(|err| format!("{}: {err}", public_path.display()))?;
    let private = fs::read_to_string(private_path)
        .map_err(|err| format!("{}: {err}", private_path.display()))?;
    let decoded = decode_flip(&public, &private).map_err(|err| err.to_string())?;

    if let Some(dir) = out_dir {
        fs::create_dir_all(dir).map_err(|err| format!("{}: {err}", dir.display()))?;
    }
    let mut images = Vec::with_capacity(FLIP_LENGTH);
    for (position, bytes) in decoded.images.iter().enumerate() {
        let mime = sniff_mime(bytes);
        let path = match out_dir {
            Some(dir) => {
                let ext = mime.rsplit('/').next().unwrap_or("bin");
                let path = dir.join(format!("{position}.{ext}"));
                fs::write(&path, bytes).map_err(|err| format!("{}: {err}", path.display()))?;
                Some(path.display().to_string())
            }
            None => None,
        };
        images.push(DecodedImage {
            position,
            bytes: bytes.len(),
            mime,
            path,
        });
    }
    Ok(DecodeOutput {
        orders: decoded.orders.iter().map(ToString::to_string).collect(),
        images,
    })
}
