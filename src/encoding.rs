//! Flip shuffling and the RLP wire format.
//!
//! A flip travels as two payloads.  The public one carries the first two
//! shuffled images, `rlp([[img0, img1]])`.  The private one carries the
//! remaining two images plus both order arrays,
//! `rlp([[img2, img3], [order_a, order_b]])`.  Both are rendered as
//! `0x`-prefixed hex strings.
//!
//! The images are shuffled with a fresh random seed before encoding.  One of
//! the order arrays maps every original slot to its shuffled position, the
//! other expresses the author's display order in shuffled coordinates, and a
//! coin flip decides which of the two comes first.

use crate::error::FlipError;
use crate::permutation::{random_permutation_with, Permutation, FLIP_LENGTH};
use crate::random::{OsRandom, RandomSource};
use rlp::{Rlp, RlpStream};
use tracing::debug;

/// Images reordered by a random seed together with the recorded orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffledFlip<T> {
    /// Images in shuffled position order.
    pub images: [T; FLIP_LENGTH],
    /// Seed used for the shuffle: `images[i] = original[seed[i]]`.
    pub seed: Permutation,
    /// `first_order[k]` is the shuffled position of original slot `k`.
    pub first_order: Permutation,
    /// Display order remapped into shuffled positions.
    pub second_order: Permutation,
    /// The two order arrays in emission order.
    pub orders: [Permutation; 2],
}

/// Shuffles `images` with a fresh seed drawn from `rng`.
pub fn shuffle_images<T: Clone, R: RandomSource + ?Sized>(
    images: &[T; FLIP_LENGTH],
    display_order: &Permutation,
    rng: &mut R,
) -> ShuffledFlip<T> {
    let seed = random_permutation_with(rng);
    let shuffled = seed.apply(images);
    let first_order = seed.inverse();
    let second_order = first_order.select(display_order);
    let orders = if rng.next_u32() % 2 == 0 {
        [first_order, second_order]
    } else {
        [second_order, first_order]
    };
    ShuffledFlip {
        images: shuffled,
        seed,
        first_order,
        second_order,
        orders,
    }
}

/// Hex-encoded public and private flip payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlipPayload {
    /// `0x`-prefixed hex of the public RLP payload.
    pub public_hex: String,
    /// `0x`-prefixed hex of the private RLP payload.
    pub private_hex: String,
}

impl FlipPayload {
    /// Combined length of both hex strings, prefixes included.
    pub fn hex_len(&self) -> usize {
        self.public_hex.len() + self.private_hex.len()
    }
}

/// Encodes a flip using the OS CSPRNG for the shuffle.
pub fn encode_flip(images: &[Vec<u8>; FLIP_LENGTH], display_order: &Permutation) -> FlipPayload {
    encode_flip_with(images, display_order, &mut OsRandom)
}

/// Encodes a flip, drawing the shuffle seed and coin flip from `rng`.
pub fn encode_flip_with<R: RandomSource + ?Sized>(
    images: &[Vec<u8>; FLIP_LENGTH],
    display_order: &Permutation,
    rng: &mut R,
) -> FlipPayload {
    let shuffled = shuffle_images(images, display_order, rng);
    let public = encode_public(&shuffled.images[..2]);
    let private = encode_private(&shuffled.images[2..], &shuffled.orders);
    debug!(
        public_bytes = public.len(),
        private_bytes = private.len(),
        "flip encoded"
    );
    FlipPayload {
        public_hex: to_hex(&public),
        private_hex: to_hex(&private),
    }
}

fn append_images(stream: &mut RlpStream, images: &[Vec<u8>]) {
    stream.begin_list(images.len());
    for image in images {
        stream.append(&image.as_slice());
    }
}

fn encode_public(images: &[Vec<u8>]) -> Vec<u8> {
    let mut stream = RlpStream::new_list(1);
    append_images(&mut stream, images);
    stream.out().to_vec()
}

fn encode_private(images: &[Vec<u8>], orders: &[Permutation; 2]) -> Vec<u8> {
    let mut stream = RlpStream::new_list(2);
    append_images(&mut stream, images);
    stream.begin_list(orders.len());
    for order in orders {
        stream.begin_list(FLIP_LENGTH);
        for value in order.as_array() {
            stream.append(&value);
        }
    }
    stream.out().to_vec()
}

/// Renders bytes as a `0x`-prefixed lowercase hex string.
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parses a hex string with or without the `0x` prefix.
pub fn from_hex(input: &str) -> Result<Vec<u8>, FlipError> {
    let trimmed = input.trim();
    let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(body).map_err(|err| FlipError::Decode(format!("invalid hex: {err}")))
}

/// A flip recovered from its wire payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFlip {
    /// Images in shuffled position order.
    pub images: [Vec<u8>; FLIP_LENGTH],
    /// Order arrays in emission order.
    pub orders: [Permutation; 2],
}

impl DecodedFlip {
    /// Arranges the shuffled images by one of the recorded orders.
    ///
    /// Returns `None` when `which` is not 0 or 1.
    pub fn arrange(&self, which: usize) -> Option<[Vec<u8>; FLIP_LENGTH]> {
        let order = self.orders.get(which)?;
        Some(order.apply(&self.images))
    }
}

fn decode_err(context: &str, err: rlp::DecoderError) -> FlipError {
    FlipError::Decode(format!("{context}: {err}"))
}

fn expect_list(rlp: &Rlp<'_>, len: usize, context: &str) -> Result<(), FlipError> {
    if !rlp.is_list() {
        return Err(FlipError::Decode(format!("{context} is not an rlp list")));
    }
    let items = rlp.item_count().map_err(|err| decode_err(context, err))?;
    if items != len {
        return Err(FlipError::Decode(format!(
            "{context}: expected {len} items, found {items}"
        )));
    }
    Ok(())
}

fn decode_image_pair(rlp: &Rlp<'_>, context: &str) -> Result<[Vec<u8>; 2], FlipError> {
    expect_list(rlp, 2, context)?;
    let mut out: [Vec<u8>; 2] = Default::default();
    for (idx, slot) in out.iter_mut().enumerate() {
        *slot = rlp
            .at(idx)
            .and_then(|item| item.data().map(|data| data.to_vec()))
            .map_err(|err| decode_err(context, err))?;
    }
    Ok(out)
}

fn decode_order(rlp: &Rlp<'_>) -> Result<Permutation, FlipError> {
    expect_list(rlp, FLIP_LENGTH, "order")?;
    let mut values = [0u8; FLIP_LENGTH];
    for (idx, slot) in values.iter_mut().enumerate() {
        *slot = rlp
            .at(idx)
            .and_then(|item| item.as_val::<u8>())
            .map_err(|err| decode_err("order", err))?;
    }
    Permutation::new(values)
}

/// Decodes the public and private hex payloads of a flip.
pub fn decode_flip(public_hex: &str, private_hex: &str) -> Result<DecodedFlip, FlipError> {
    let public_bytes = from_hex(public_hex)?;
    let private_bytes = from_hex(private_hex)?;

    let public = Rlp::new(&public_bytes);
    expect_list(&public, 1, "public payload")?;
    let head = public
        .at(0)
        .map_err(|err| decode_err("public payload", err))?;
    let [img0, img1] = decode_image_pair(&head, "public images")?;

    let private = Rlp::new(&private_bytes);
    expect_list(&private, 2, "private payload")?;
    let tail = private
        .at(0)
        .map_err(|err| decode_err("private payload", err))?;
    let [img2, img3] = decode_image_pair(&tail, "private images")?;
    let orders_rlp = private
        .at(1)
        .map_err(|err| decode_err("private payload", err))?;
    expect_list(&orders_rlp, 2, "orders")?;
    let order_a = decode_order(
        &orders_rlp
            .at(0)
            .map_err(|err| decode_err("orders", err))?,
    )?;
    let order_b = decode_order(
        &orders_rlp
            .at(1)
            .map_err(|err| decode_err("orders", err))?,
    )?;

    Ok(DecodedFlip {
        images: [img0, img1, img2, img3],
        orders: [order_a, order_b],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permutation::all_permutations;
    use crate::random::ScriptedRandom;
    use proptest::prelude::*;

    fn sample_images() -> [Vec<u8>; FLIP_LENGTH] {
        [
            vec![0xA0; 70],
            vec![0xB1, 0xB2],
            vec![0x05],
            vec![0xC3; 3],
        ]
    }

    #[test]
    fn records_seed_and_both_orders() {
        // draw 7 selects [1, 0, 3, 2]; draw 2 keeps first_order first
        let mut rng = ScriptedRandom::new([7, 2]);
        let display = Permutation::new([3, 2, 1, 0]).unwrap();
        let shuffled = shuffle_images(&['a', 'b', 'c', 'd'], &display, &mut rng);
        assert_eq!(shuffled.seed, all_permutations()[7]);
        assert_eq!(shuffled.seed.as_array(), [1, 0, 3, 2]);
        assert_eq!(shuffled.images, ['b', 'a', 'd', 'c']);
        assert_eq!(shuffled.first_order.as_array(), [1, 0, 3, 2]);
        assert_eq!(shuffled.second_order.as_array(), [2, 3, 0, 1]);
        assert_eq!(shuffled.orders, [shuffled.first_order, shuffled.second_order]);
    }

    #[test]
    fn odd_coin_swaps_orders() {
        let mut rng = ScriptedRandom::new([0, 1]);
        let display = Permutation::new([1, 0, 2, 3]).unwrap();
        let shuffled = shuffle_images(&[1, 2, 3, 4], &display, &mut rng);
        assert_eq!(shuffled.orders, [shuffled.second_order, shuffled.first_order]);
    }

    #[test]
    fn public_payload_is_nested_pair_list() {
        let mut rng = ScriptedRandom::new([0, 0]);
        let images = [vec![1u8], vec![2u8], vec![3u8], vec![4u8]];
        let payload = encode_flip_with(&images, &Permutation::new([1, 0, 2, 3]).unwrap(), &mut rng);
        // [[0x01, 0x02]]
        assert_eq!(payload.public_hex, "0xc3c20102");
        // [[0x03, 0x04], [[0,1,2,3], [1,0,2,3]]] with 0 encoded as the empty string
        assert_eq!(payload.private_hex, "0xcec20304cac480010203c401800203");
    }

    #[test]
    fn decode_rejects_wrong_shapes() {
        assert!(decode_flip("0xzz", "0x").is_err());
        // public payload with a single image
        assert!(decode_flip("0xc2c101", "0xc0").is_err());
        let mut rng = ScriptedRandom::new([0, 0]);
        let payload = encode_flip_with(&sample_images(), &Permutation::new([1, 0, 2, 3]).unwrap(), &mut rng);
        assert!(decode_flip(&payload.public_hex, &payload.public_hex).is_err());
    }

    proptest! {
        #[test]
        fn orders_recover_original_and_display(seed in any::<u32>(), coin in any::<u32>(), display_idx in 0usize..24) {
            let images = sample_images();
            let display = all_permutations()[display_idx];
            let mut rng = ScriptedRandom::new([seed, coin]);
            let payload = encode_flip_with(&images, &display, &mut rng);
            let decoded = decode_flip(&payload.public_hex, &payload.private_hex).unwrap();

            let a = decoded.arrange(0).unwrap();
            let b = decoded.arrange(1).unwrap();
            let displayed = display.apply(&images);
            let recovers_original = a == images || b == images;
            let recovers_display = a == displayed || b == displayed;
            prop_assert!(recovers_original);
            prop_assert!(recovers_display);

            // first_order maps original slot k to its shuffled position
            let shuffled = shuffle_images(&images, &display, &mut ScriptedRandom::new([seed, coin]));
            for k in 0..FLIP_LENGTH {
                prop_assert_eq!(&decoded.images[shuffled.first_order.at(k).unwrap()], &images[k]);
            }
        }
    }
}
