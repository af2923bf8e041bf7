//! Word-aligned GF(2) vectors and matrices.
//!
//! Only the handful of operations the LowMC evaluation needs are provided:
//! XOR, AND, bit shifts, parity, byte packing and matrix-vector products.
//! Bit `i` lives in word `i / 64` at position `i % 64`; the unused high bits
//! of the final word are kept at zero by every operation so that equality,
//! hashing and serialisation never observe garbage.

use crate::error::{FishError, Result};
use std::fmt;
use std::ops::{BitAnd, BitXor, BitXorAssign};
use zeroize::Zeroize;

/// Number of bits per storage word.
pub const WORD_BITS: usize = 64;

fn word_count(bits: usize) -> usize {
    bits.div_ceil(WORD_BITS)
}

/// Fixed-width vector over GF(2).
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct BitVector {
    len: usize,
    words: Vec<u64>,
}

impl BitVector {
    /// Creates the all-zero vector of `len` bits.
    pub fn zero(len: usize) -> Self {
        Self {
            len,
            words: vec![0u64; word_count(len)],
        }
    }

    /// Fallible variant of [`BitVector::zero`] that surfaces allocation failure.
    pub fn try_zero(len: usize) -> Result<Self> {
        let count = word_count(len);
        let mut words = Vec::new();
        words
            .try_reserve_exact(count)
            .map_err(|_| FishError::Allocation { bits: len })?;
        words.resize(count, 0);
        Ok(Self { len, words })
    }

    /// Builds a vector from little-endian bytes, ignoring bits beyond `len`.
    ///
    /// Missing bytes are treated as zero.
    pub fn from_le_bytes(len: usize, bytes: &[u8]) -> Self {
        let mut out = Self::zero(len);
        out.fill_le_bytes(bytes);
        out
    }

    /// Strict decoding helper: `bytes` must be exactly `ceil(len / 8)` long and
    /// every bit at or above `len` must be zero.
    pub fn from_le_bytes_exact(len: usize, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::byte_len_for(len) {
            return None;
        }
        let out = Self::from_le_bytes(len, bytes);
        if out.to_le_bytes() != bytes {
            return None;
        }
        Some(out)
    }

    /// Overwrites the vector with little-endian `bytes`, masking the tail.
    pub fn fill_le_bytes(&mut self, bytes: &[u8]) {
        for word in self.words.iter_mut() {
            *word = 0;
        }
        for (idx, byte) in bytes.iter().take(self.byte_len()).enumerate() {
            self.words[idx / 8] |= (*byte as u64) << (8 * (idx % 8));
        }
        self.normalize();
    }

    /// Serialises the vector into `ceil(len / 8)` little-endian bytes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        for idx in 0..self.byte_len() {
            out.push((self.words[idx / 8] >> (8 * (idx % 8))) as u8);
        }
        out
    }

    /// Number of bytes needed to store a vector of `len` bits.
    pub fn byte_len_for(len: usize) -> usize {
        len.div_ceil(8)
    }

    /// Number of bytes used by [`BitVector::to_le_bytes`].
    pub fn byte_len(&self) -> usize {
        Self::byte_len_for(self.len)
    }

    /// Width of the vector in bits.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for the zero-width vector.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw storage words.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Returns bit `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of range.
    pub fn get(&self, idx: usize) -> bool {
        assert!(idx < self.len, "bit index out of range");
        (self.words[idx / WORD_BITS] >> (idx % WORD_BITS)) & 1 == 1
    }

    /// Sets bit `idx` to `value`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of range.
    pub fn set(&mut self, idx: usize, value: bool) {
        assert!(idx < self.len, "bit index out of range");
        let mask = 1u64 << (idx % WORD_BITS);
        if value {
            self.words[idx / WORD_BITS] |= mask;
        } else {
            self.words[idx / WORD_BITS] &= !mask;
        }
    }

    /// Flips bit `idx`.
    pub fn flip(&mut self, idx: usize) {
        let current = self.get(idx);
        self.set(idx, !current);
    }

    /// Returns `true` if every bit is zero.
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// XOR of all bits.
    pub fn parity(&self) -> bool {
        self.words.iter().fold(0u32, |acc, w| acc ^ w.count_ones()) & 1 == 1
    }

    /// Parity of the bitwise AND of `self` and `other`, i.e. their inner product.
    pub fn dot(&self, other: &BitVector) -> bool {
        debug_assert_eq!(self.len, other.len, "width mismatch");
        self.words
            .iter()
            .zip(&other.words)
            .fold(0u32, |acc, (a, b)| acc ^ (a & b).count_ones())
            & 1
            == 1
    }

    /// In-place XOR.
    pub fn xor_assign(&mut self, other: &BitVector) {
        debug_assert_eq!(self.len, other.len, "width mismatch");
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a ^= b;
        }
    }

    /// In-place AND.
    pub fn and_assign(&mut self, other: &BitVector) {
        debug_assert_eq!(self.len, other.len, "width mismatch");
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= b;
        }
    }

    /// Returns the vector moved towards bit 0: bit `i` of the result is bit
    /// `i + count` of `self`.
    pub fn shift_down(&self, count: usize) -> BitVector {
        let n = self.words.len();
        let word_shift = count / WORD_BITS;
        let bit_shift = count % WORD_BITS;
        let mut out = Self::zero(self.len);
        for i in 0..n {
            let src = i + word_shift;
            if src >= n {
                break;
            }
            let mut word = self.words[src] >> bit_shift;
            if bit_shift != 0 && src + 1 < n {
                word |= self.words[src + 1] << (WORD_BITS - bit_shift);
            }
            out.words[i] = word;
        }
        out
    }

    /// Returns the vector moved away from bit 0: bit `i` of the result is bit
    /// `i - count` of `self`; bits pushed past the width are dropped.
    pub fn shift_up(&self, count: usize) -> BitVector {
        let n = self.words.len();
        let word_shift = count / WORD_BITS;
        let bit_shift = count % WORD_BITS;
        let mut out = Self::zero(self.len);
        for i in word_shift..n {
            let src = i - word_shift;
            let mut word = self.words[src] << bit_shift;
            if bit_shift != 0 && src > 0 {
                word |= self.words[src - 1] >> (WORD_BITS - bit_shift);
            }
            out.words[i] = word;
        }
        out.normalize();
        out
    }

    fn high_mask(&self) -> u64 {
        match self.len % WORD_BITS {
            0 => u64::MAX,
            rem => (1u64 << rem) - 1,
        }
    }

    fn normalize(&mut self) {
        let mask = self.high_mask();
        if let Some(last) = self.words.last_mut() {
            *last &= mask;
        }
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector({}; {})", self.len, hex::encode(self.to_le_bytes()))
    }
}

impl Zeroize for BitVector {
    fn zeroize(&mut self) {
        self.words.zeroize();
        self.words.resize(word_count(self.len), 0);
    }
}

impl BitXor for &BitVector {
    type Output = BitVector;

    fn bitxor(self, rhs: &BitVector) -> BitVector {
        let mut out = self.clone();
        out.xor_assign(rhs);
        out
    }
}

impl BitAnd for &BitVector {
    type Output = BitVector;

    fn bitand(self, rhs: &BitVector) -> BitVector {
        let mut out = self.clone();
        out.and_assign(rhs);
        out
    }
}

impl BitXorAssign<&BitVector> for BitVector {
    fn bitxor_assign(&mut self, rhs: &BitVector) {
        self.xor_assign(rhs);
    }
}

/// Dense GF(2) matrix stored as a list of row vectors.
#[derive(Clone, PartialEq, Eq)]
pub struct BitMatrix {
    cols: usize,
    rows: Vec<BitVector>,
}

impl BitMatrix {
    /// Builds a matrix from its rows; every row must be `cols` bits wide.
    ///
    /// # Panics
    ///
    /// Panics if any row has the wrong width.
    pub fn from_rows(cols: usize, rows: Vec<BitVector>) -> Self {
        assert!(rows.iter().all(|r| r.len() == cols), "row width mismatch");
        Self { cols, rows }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row `idx`.
    pub fn row(&self, idx: usize) -> &BitVector {
        &self.rows[idx]
    }

    /// Computes `self · v`.
    pub fn mul_vec(&self, v: &BitVector) -> BitVector {
        debug_assert_eq!(self.cols, v.len(), "matrix/vector width mismatch");
        let mut out = BitVector::zero(self.rows.len());
        for (idx, row) in self.rows.iter().enumerate() {
            if row.dot(v) {
                out.set(idx, true);
            }
        }
        out
    }

    /// Rank by Gaussian elimination.
    pub fn rank(&self) -> usize {
        let mut rows = self.rows.clone();
        let mut rank = 0;
        for col in 0..self.cols {
            if rank == rows.len() {
                break;
            }
            let Some(pivot) = (rank..rows.len()).find(|&r| rows[r].get(col)) else {
                continue;
            };
            rows.swap(rank, pivot);
            let pivot_row = rows[rank].clone();
            for (idx, row) in rows.iter_mut().enumerate() {
                if idx != rank && row.get(col) {
                    row.xor_assign(&pivot_row);
                }
            }
            rank += 1;
        }
        rank
    }
}

impl fmt::Debug for BitMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitMatrix")
            .field("rows", &self.rows.len())
            .field("cols", &self.cols)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(len: usize, bits: &[usize]) -> BitVector {
        let mut v = BitVector::zero(len);
        for &b in bits {
            v.set(b, true);
        }
        v
    }

    #[test]
    fn shifts_cross_word_boundaries() {
        let v = vector(130, &[0, 63, 64, 129]);
        assert_eq!(v.shift_down(1), vector(130, &[62, 63, 128]));
        assert_eq!(v.shift_up(1), vector(130, &[1, 64, 65]));
        assert_eq!(v.shift_up(65), vector(130, &[65, 128, 129]));
        assert_eq!(v.shift_down(64), vector(130, &[0, 65]));
    }

    #[test]
    fn byte_roundtrip_masks_tail() {
        let v = BitVector::from_le_bytes(12, &[0xff, 0xff]);
        assert_eq!(v.to_le_bytes(), vec![0xff, 0x0f]);
        assert!(BitVector::from_le_bytes_exact(12, &[0xff, 0x0f]).is_some());
        assert!(BitVector::from_le_bytes_exact(12, &[0xff, 0x1f]).is_none());
        assert!(BitVector::from_le_bytes_exact(12, &[0xff]).is_none());
    }

    #[test]
    fn identity_matrix_has_full_rank() {
        let rows = (0..70).map(|i| vector(70, &[i])).collect();
        let m = BitMatrix::from_rows(70, rows);
        assert_eq!(m.rank(), 70);
        let v = vector(70, &[3, 66]);
        assert_eq!(m.mul_vec(&v), v);
    }

    #[test]
    fn dependent_rows_reduce_rank() {
        let a = vector(8, &[0, 1]);
        let b = vector(8, &[1, 2]);
        let c = &a ^ &b;
        let m = BitMatrix::from_rows(8, vec![a, b, c]);
        assert_eq!(m.rank(), 2);
    }

    #[test]
    fn parity_and_dot() {
        let a = vector(100, &[1, 70, 99]);
        let b = vector(100, &[70, 99]);
        assert!(a.parity());
        assert!(!a.dot(&b));
        assert!(a.dot(&vector(100, &[99])));
    }

    #[test]
    fn zeroize_keeps_width() {
        let mut v = vector(65, &[64]);
        v.zeroize();
        assert_eq!(v.len(), 65);
        assert!(v.is_zero());
        assert_eq!(v.words().len(), 2);
    }
}
