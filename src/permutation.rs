//! Fixed-arity permutations of the four flip slots.
//!
//! Random selection enumerates all `4! = 24` orderings and picks one with a
//! single 32-bit draw.  That only works because a flip always has exactly
//! four images; enumeration is factorial in the slot count, so any larger
//! arity must switch to a linear Fisher-Yates shuffle instead of widening
//! [`FLIP_LENGTH`].

use crate::error::FlipError;
use crate::random::{OsRandom, RandomSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of images in a flip.
pub const FLIP_LENGTH: usize = 4;

/// Number of distinct orderings of the flip slots.
pub const PERMUTATION_COUNT: usize = 24;

/// A bijection over `0..FLIP_LENGTH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct Permutation([u8; FLIP_LENGTH]);

/// The untouched slot order `[0, 1, 2, 3]`.
pub const DEFAULT_FLIP_ORDER: Permutation = Permutation([0, 1, 2, 3]);

impl Permutation {
    /// Builds a permutation, rejecting repeated or out-of-range indices.
    pub fn new(values: [u8; FLIP_LENGTH]) -> Result<Self, FlipError> {
        let mut seen = [false; FLIP_LENGTH];
        for &value in &values {
            let idx = value as usize;
            if idx >= FLIP_LENGTH {
                return Err(FlipError::InvalidPermutation(format!(
                    "index {idx} out of range"
                )));
            }
            if seen[idx] {
                return Err(FlipError::InvalidPermutation(format!(
                    "index {idx} repeated"
                )));
            }
            seen[idx] = true;
        }
        Ok(Self(values))
    }

    /// Builds a permutation from an arbitrary slice of indices.
    pub fn from_slice(values: &[usize]) -> Result<Self, FlipError> {
        if values.len() != FLIP_LENGTH {
            return Err(FlipError::InvalidPermutation(format!(
                "expected {FLIP_LENGTH} indices, found {}",
                values.len()
            )));
        }
        let mut out = [0u8; FLIP_LENGTH];
        for (slot, &value) in out.iter_mut().zip(values) {
            *slot = u8::try_from(value).map_err(|_| {
                FlipError::InvalidPermutation(format!("index {value} out of range"))
            })?;
        }
        Self::new(out)
    }

    /// Returns the raw index array.
    pub fn as_array(&self) -> [u8; FLIP_LENGTH] {
        self.0
    }

    /// Returns the index stored at `position`, or `None` past the last slot.
    pub fn at(&self, position: usize) -> Option<usize> {
        self.0.get(position).map(|&value| value as usize)
    }

    /// Returns true for `[0, 1, 2, 3]`.
    pub fn is_identity(&self) -> bool {
        *self == DEFAULT_FLIP_ORDER
    }

    /// Returns the permutation `q` with `q[self[i]] = i`.
    pub fn inverse(&self) -> Self {
        let mut out = [0u8; FLIP_LENGTH];
        for (idx, &value) in self.0.iter().enumerate() {
            out[value as usize] = idx as u8;
        }
        Self(out)
    }

    /// Returns the permutation `r` with `r[i] = self[order[i]]`.
    pub fn select(&self, order: &Permutation) -> Self {
        Self(order.apply(&self.0))
    }

    /// Picks `items[self[i]]` for every position `i`.
    pub fn apply<T: Clone>(&self, items: &[T; FLIP_LENGTH]) -> [T; FLIP_LENGTH] {
        std::array::from_fn(|i| items[self.0[i] as usize].clone())
    }
}

impl TryFrom<Vec<usize>> for Permutation {
    type Error = FlipError;

    fn try_from(values: Vec<usize>) -> Result<Self, Self::Error> {
        Self::from_slice(&values)
    }
}

impl From<Permutation> for Vec<usize> {
    fn from(perm: Permutation) -> Self {
        perm.0.iter().map(|&v| v as usize).collect()
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a},{b},{c},{d}")
    }
}

impl FromStr for Permutation {
    type Err = FlipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|tok| {
                tok.trim()
                    .parse::<usize>()
                    .map_err(|_| FlipError::InvalidPermutation(format!("not an index: {tok}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_slice(&values)
    }
}

fn enumerate(items: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        let tails = enumerate(&rest);
        if tails.is_empty() {
            out.push(vec![head]);
        } else {
            for tail in tails {
                let mut row = Vec::with_capacity(items.len());
                row.push(head);
                row.extend(tail);
                out.push(row);
            }
        }
    }
    out
}

/// Lists every ordering of the four flip slots in lexicographic order.
pub fn all_permutations() -> Vec<Permutation> {
    enumerate(&DEFAULT_FLIP_ORDER.0)
        .into_iter()
        .map(|row| {
            let mut out = [0u8; FLIP_LENGTH];
            out.copy_from_slice(&row);
            Permutation(out)
        })
        .collect()
}

/// Draws a uniformly random ordering from the OS CSPRNG.
pub fn random_permutation() -> Permutation {
    random_permutation_with(&mut OsRandom)
}

/// Draws an ordering using `rng`: one 32-bit word reduced modulo 24.
pub fn random_permutation_with<R: RandomSource + ?Sized>(rng: &mut R) -> Permutation {
    let all = all_permutations();
    all[rng.next_u32() as usize % all.len()]
}
