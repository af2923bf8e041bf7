//! Per-party views, commitments and challenge packing.
//!
//! A party's view is everything it sees during one MPC run: its input share
//! followed by the AND-gate outputs of every cipher round, in schedule order.
//! Commitments bind the view together with the seed that expands the party's
//! randomness tape, a short commitment randomness and the party's output
//! share.

use crate::error::{FishError, Result};
use crate::gf2::BitVector;
use crate::prng::Seed;
use crate::sharing::{Party, PARTY_COUNT};
use sha2::{Digest as _, Sha256};

const COMMIT_DOMAIN: &[u8] = b"LOWMC_FISH_COMMIT";

/// Width in bytes of a commitment digest.
pub const DIGEST_LEN: usize = 32;

/// Width in bytes of a party's commitment randomness.
pub const COMMIT_RANDOMNESS_LEN: usize = 4;

/// SHA-256 commitment digest.
pub type Digest = [u8; DIGEST_LEN];

/// Randomness mixed into a commitment.
pub type CommitRandomness = [u8; COMMIT_RANDOMNESS_LEN];

/// Ordered, append-only record of one party's MPC execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct View {
    entries: Vec<BitVector>,
}

impl View {
    /// Starts a view with the party's input share.
    pub fn with_input(input_share: BitVector) -> Self {
        Self {
            entries: vec![input_share],
        }
    }

    /// Rebuilds a view from recorded entries.
    pub fn from_entries(entries: Vec<BitVector>) -> Self {
        Self { entries }
    }

    /// Appends the next gate output in schedule order.
    pub fn record(&mut self, gate_output: BitVector) {
        self.entries.push(gate_output);
    }

    /// Every recorded entry, input share first.
    pub fn entries(&self) -> &[BitVector] {
        &self.entries
    }

    /// Mutable access for tamper tests and decoders.
    pub fn entries_mut(&mut self) -> &mut [BitVector] {
        &mut self.entries
    }

    /// The party's input (key) share.
    pub fn input_share(&self) -> Option<&BitVector> {
        self.entries.first()
    }

    /// AND outputs recorded for cipher round `round`.
    pub fn gate_output(&self, round: usize) -> Option<&BitVector> {
        self.entries.get(round + 1)
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything needed to replay one revealed party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opening {
    /// Seed that expands into the party's randomness tape.
    pub seed: Seed,
    /// Commitment randomness.
    pub randomness: CommitRandomness,
    /// Recorded view.
    pub view: View,
}

/// Commits to a party's seed, commitment randomness, view and output share,
/// hashed in that order.
pub fn commit(
    seed: &Seed,
    randomness: &CommitRandomness,
    view: &View,
    output_share: &BitVector,
) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(COMMIT_DOMAIN);
    hasher.update(seed);
    hasher.update(randomness);
    for entry in view.entries() {
        hasher.update(entry.to_le_bytes());
    }
    hasher.update(output_share.to_le_bytes());
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Arena of per-(repetition, party) views.
#[derive(Debug, Clone, Default)]
pub struct ViewStore {
    views: Vec<[View; PARTY_COUNT]>,
}

impl ViewStore {
    /// Store holding `repetitions` empty slots.
    pub fn with_repetitions(repetitions: usize) -> Self {
        Self {
            views: vec![Default::default(); repetitions],
        }
    }

    /// Installs the three views of one repetition.
    pub fn insert(&mut self, repetition: usize, views: [View; PARTY_COUNT]) {
        self.views[repetition] = views;
    }

    /// View of `party` in `repetition`.
    pub fn get(&self, repetition: usize, party: Party) -> Option<&View> {
        self.views.get(repetition).map(|v| &v[party.index()])
    }

    /// All three views of `repetition`.
    ///
    /// # Panics
    ///
    /// Panics if `repetition` is out of range.
    pub fn repetition(&self, repetition: usize) -> &[View; PARTY_COUNT] {
        &self.views[repetition]
    }

    /// Number of repetitions in the store.
    pub fn repetitions(&self) -> usize {
        self.views.len()
    }

    /// Removes and returns the views of `repetition`.
    pub fn take(&mut self, repetition: usize) -> [View; PARTY_COUNT] {
        std::mem::take(&mut self.views[repetition])
    }
}

/// Per-repetition choice of the hidden party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    hidden: Vec<Party>,
}

impl Challenge {
    /// Wraps an explicit list of hidden parties.
    pub fn new(hidden: Vec<Party>) -> Self {
        Self { hidden }
    }

    /// Hidden party of `repetition`.
    pub fn hidden(&self, repetition: usize) -> Option<Party> {
        self.hidden.get(repetition).copied()
    }

    /// All hidden parties in repetition order.
    pub fn as_slice(&self) -> &[Party] {
        &self.hidden
    }

    /// Number of repetitions covered.
    pub fn len(&self) -> usize {
        self.hidden.len()
    }

    /// Returns `true` if no repetition is covered.
    pub fn is_empty(&self) -> bool {
        self.hidden.is_empty()
    }

    /// Bytes needed to pack a challenge for `repetitions` repetitions.
    pub fn packed_len(repetitions: usize) -> usize {
        repetitions.div_ceil(4)
    }

    /// Packs two bits per repetition, least significant bits first.
    pub fn pack(&self) -> Vec<u8> {
        let mut out = vec![0u8; Self::packed_len(self.hidden.len())];
        for (idx, party) in self.hidden.iter().enumerate() {
            out[idx / 4] |= (party.index() as u8) << (2 * (idx % 4));
        }
        out
    }

    /// Unpacks `repetitions` values, rejecting code point 3, a wrong length and
    /// nonzero padding bits.
    pub fn unpack(packed: &[u8], repetitions: usize) -> Result<Self> {
        if packed.len() != Self::packed_len(repetitions) {
            return Err(FishError::MalformedProof(format!(
                "challenge needs {} bytes, got {}",
                Self::packed_len(repetitions),
                packed.len()
            )));
        }
        let hidden = (0..repetitions)
            .map(|idx| challenge_at(packed, idx))
            .collect::<Result<Vec<_>>>()?;
        let used_bits = 2 * repetitions;
        if used_bits % 8 != 0 {
            if let Some(last) = packed.last() {
                if last >> (used_bits % 8) != 0 {
                    return Err(FishError::MalformedProof(
                        "nonzero challenge padding".into(),
                    ));
                }
            }
        }
        Ok(Self { hidden })
    }
}

/// Extracts the hidden party of repetition `idx` from a packed challenge.
pub fn challenge_at(packed: &[u8], idx: usize) -> Result<Party> {
    let byte = packed.get(idx / 4).ok_or_else(|| {
        FishError::MalformedProof(format!("challenge index {idx} out of range"))
    })?;
    let code = (byte >> (2 * (idx % 4))) & 0b11;
    Party::from_index(code as usize)
        .ok_or_else(|| FishError::MalformedProof(format!("invalid challenge code at {idx}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_view() -> View {
        let mut view = View::with_input(BitVector::from_le_bytes(16, &[1, 2]));
        view.record(BitVector::from_le_bytes(16, &[3, 4]));
        view.record(BitVector::from_le_bytes(16, &[5, 6]));
        view
    }

    #[test]
    fn view_preserves_schedule_order() {
        let view = sample_view();
        assert_eq!(view.len(), 3);
        assert_eq!(view.input_share().unwrap().to_le_bytes(), vec![1, 2]);
        assert_eq!(view.gate_output(1).unwrap().to_le_bytes(), vec![5, 6]);
        assert!(view.gate_output(2).is_none());
    }

    #[test]
    fn commitment_binds_every_input() {
        let view = sample_view();
        let output = BitVector::from_le_bytes(16, &[9, 9]);
        let base = commit(&[0u8; 16], &[0u8; 4], &view, &output);
        assert_eq!(base, commit(&[0u8; 16], &[0u8; 4], &view, &output));
        assert_ne!(base, commit(&[1u8; 16], &[0u8; 4], &view, &output));
        assert_ne!(base, commit(&[0u8; 16], &[0u8, 0, 0, 1], &view, &output));
        let mut tampered = view.clone();
        tampered.entries_mut()[2].flip(3);
        assert_ne!(base, commit(&[0u8; 16], &[0u8; 4], &tampered, &output));
        let mut other_output = output.clone();
        other_output.flip(15);
        assert_ne!(base, commit(&[0u8; 16], &[0u8; 4], &view, &other_output));
    }

    #[test]
    fn challenge_pack_roundtrip() {
        let challenge = Challenge::new(vec![Party::P2, Party::P0, Party::P1, Party::P1, Party::P2]);
        let packed = challenge.pack();
        assert_eq!(packed.len(), 2);
        assert_eq!(packed[0], 0b01_01_00_10);
        assert_eq!(Challenge::unpack(&packed, 5).unwrap(), challenge);
        assert_eq!(challenge_at(&packed, 4).unwrap(), Party::P2);
    }

    #[test]
    fn challenge_rejects_unused_code_point() {
        assert!(matches!(
            challenge_at(&[0b0000_1100], 1),
            Err(FishError::MalformedProof(_))
        ));
        assert!(Challenge::unpack(&[0b0000_1100], 3).is_err());
        assert!(challenge_at(&[0], 4).is_err());
    }

    #[test]
    fn challenge_rejects_padding_and_length() {
        assert!(Challenge::unpack(&[0b0100_0000], 3).is_err());
        assert!(Challenge::unpack(&[0, 0], 3).is_err());
    }

    #[test]
    fn store_is_indexed_by_repetition_and_party() {
        let mut store = ViewStore::with_repetitions(2);
        store.insert(1, [sample_view(), View::default(), View::default()]);
        assert_eq!(store.get(1, Party::P0).unwrap().len(), 3);
        assert!(store.repetition(1)[1].is_empty());
        assert!(store.get(0, Party::P2).unwrap().is_empty());
        let taken = store.take(1);
        assert_eq!(taken[0], sample_view());
        assert!(store.get(1, Party::P0).unwrap().is_empty());
        assert_eq!(store.repetitions(), 2);
    }
}
