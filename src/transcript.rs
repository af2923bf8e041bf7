//! Fiat–Shamir transcript for the non-interactive signature.
//!
//! The [`Transcript`] absorbs the public statement, every repetition's output
//! shares and commitments, and finally the message, all under a fixed domain
//! tag.  The SHA-256 digest of that sequence keys a [`SeededStream`] from which
//! the per-repetition hidden parties are read two bits at a time, discarding the
//! unused code point `3` so that every party is chosen with probability 1/3.

use crate::gf2::BitVector;
use crate::prng::SeededStream;
use crate::sharing::Party;
use crate::view::{Challenge, Digest, DIGEST_LEN};
use sha2::{Digest as _, Sha256};

/// Domain tag of the signature challenge.
pub const SIGNATURE_DOMAIN: &[u8] = b"LOWMC_FISH_SIGNATURE";

/// Stateful helper that derives the challenge from the recorded transcript.
#[derive(Debug, Clone)]
pub struct Transcript {
    hasher: Sha256,
    absorbed: usize,
}

impl Transcript {
    /// Creates an empty transcript associated with the given domain tag.
    pub fn new(domain_tag: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain_tag);
        Self {
            hasher,
            absorbed: 0,
        }
    }

    /// Appends raw bytes.
    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
        self.absorbed += bytes.len();
    }

    /// Appends a vector in its little-endian byte encoding.
    pub fn append_vector(&mut self, value: &BitVector) {
        self.append_bytes(&value.to_le_bytes());
    }

    /// Appends a commitment digest.
    pub fn append_digest(&mut self, digest: &Digest) {
        self.append_bytes(digest);
    }

    /// Number of bytes absorbed after the domain tag.
    pub fn absorbed(&self) -> usize {
        self.absorbed
    }

    /// Finalises the transcript into its SHA-256 digest.
    pub fn digest(self) -> Digest {
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&self.hasher.finalize());
        out
    }

    /// Finalises the transcript and expands it into `repetitions` hidden
    /// parties.
    pub fn challenge(self, repetitions: usize) -> Challenge {
        let mut stream = SeededStream::new(&self.digest());
        let mut hidden = Vec::with_capacity(repetitions);
        let mut byte = 0u8;
        let mut remaining = 0u8;
        while hidden.len() < repetitions {
            if remaining == 0 {
                byte = stream.next_byte();
                remaining = 4;
            }
            let code = (byte & 0b11) as usize;
            byte >>= 2;
            remaining -= 1;
            if let Some(party) = Party::from_index(code) {
                hidden.push(party);
            }
        }
        Challenge::new(hidden)
    }
}
