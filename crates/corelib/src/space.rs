//! The m-bit circular identifier space.
//!
//! All ring arithmetic lives here: reduction modulo `2^m`, clockwise
//! distances, finger starts and interval membership with wraparound. The
//! space is plain configuration, so tests can run whole rings at `m = 8`.

use crate::error::{Error, Result};
use crate::identifier::{Identifier, Key};
use serde::{Deserialize, Serialize};

/// Largest supported identifier width.
pub const MAX_BITS: u8 = 64;

/// An identifier circle of size `2^bits`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct IdentifierSpace {
    bits: u8,
}

impl IdentifierSpace {
    /// Create a space of `bits` bits. Only `1..=64` is accepted.
    pub fn new(bits: u8) -> Result<Self> {
        if bits == 0 || bits > MAX_BITS {
            return Err(Error::Misconfigured(format!(
                "identifier width must be between 1 and {} bits, got {}",
                MAX_BITS, bits
            )));
        }
        Ok(Self { bits })
    }

    #[inline]
    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Number of identifiers on the ring (`2^m`).
    #[inline]
    pub fn size(&self) -> u128 {
        1u128 << self.bits
    }

    #[inline]
    fn mask(&self) -> u64 {
        if self.bits == MAX_BITS {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }

    /// Reduce an arbitrary value modulo `2^m`.
    #[inline]
    pub fn reduce(&self, raw: u64) -> Identifier {
        Identifier(raw & self.mask())
    }

    /// True if `raw` is already a valid identifier of this space.
    #[inline]
    pub fn contains(&self, raw: u64) -> bool {
        raw & !self.mask() == 0
    }

    /// Hash arbitrary bytes onto the ring.
    ///
    /// The BLAKE3 digest is read as a big-endian integer and reduced modulo
    /// `2^m`, which only depends on its trailing eight bytes for `m <= 64`.
    pub fn hash_to_id(&self, bytes: &[u8]) -> Identifier {
        let digest = blake3::hash(bytes);
        let digest = digest.as_bytes();
        let mut tail = [0u8; 8];
        tail.copy_from_slice(&digest[digest.len() - 8..]);
        self.reduce(u64::from_be_bytes(tail))
    }

    /// `raw` as an identifier of this space, refusing values that do not
    /// fit in `bits`.
    pub fn checked_id(&self, raw: u64) -> Result<Identifier> {
        if self.contains(raw) {
            Ok(Identifier(raw))
        } else {
            Err(Error::Misconfigured(format!(
                "identifier {} does not fit in {} bits",
                raw, self.bits
            )))
        }
    }

    /// Resolve a client key to its identifier. Explicit identifiers must
    /// already lie in the space.
    pub fn key_id(&self, key: &Key) -> Result<Identifier> {
        match key {
            Key::Id(id) => self.checked_id(id.0),
            Key::Raw(bytes) => Ok(self.hash_to_id(bytes)),
        }
    }

    #[inline]
    pub fn add(&self, id: Identifier, offset: u64) -> Identifier {
        self.reduce(id.0.wrapping_add(offset))
    }

    #[inline]
    pub fn sub(&self, id: Identifier, offset: u64) -> Identifier {
        self.reduce(id.0.wrapping_sub(offset))
    }

    /// Clockwise distance from `from` to `to`: `(to - from + 2^m) mod 2^m`.
    #[inline]
    pub fn distance(&self, from: Identifier, to: Identifier) -> u64 {
        to.0.wrapping_sub(from.0) & self.mask()
    }

    /// Length of the clockwise arc from `from` to `to`, where coinciding
    /// endpoints mean one full turn rather than zero.
    #[inline]
    pub fn arc(&self, from: Identifier, to: Identifier) -> u128 {
        match self.distance(from, to) {
            0 => self.size(),
            d => d as u128,
        }
    }

    /// Start of the `i`-th finger of `node`: `(node + 2^(i-1)) mod 2^m`.
    ///
    /// `i` is 1-indexed and must lie in `[1, m]`.
    #[inline]
    pub fn finger_start(&self, node: Identifier, i: usize) -> Identifier {
        debug_assert!(i >= 1 && i <= self.bits as usize);
        self.add(node, 1u64 << (i - 1))
    }

    /// Ring membership of `x` in the interval from `lo` clockwise to `hi`.
    ///
    /// `lo == hi` is the whole ring; the shared endpoint itself is only a
    /// member when either bound is inclusive.
    pub fn in_interval(
        &self,
        x: Identifier,
        lo: Identifier,
        hi: Identifier,
        inclusive_lo: bool,
        inclusive_hi: bool,
    ) -> bool {
        if lo == hi {
            return x != lo || inclusive_lo || inclusive_hi;
        }
        let offset = self.distance(lo, x);
        let span = self.distance(lo, hi);
        if offset == 0 {
            inclusive_lo
        } else if offset == span {
            inclusive_hi
        } else {
            offset < span
        }
    }
}
