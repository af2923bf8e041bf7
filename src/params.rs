//! LowMC instance provider.
//!
//! A [`Parameters`] value holds everything the cipher schedule needs: the
//! per-round linear layers, round constants and key-derivation matrices, all
//! derived deterministically from the [`LowmcSpec`] so that every party that
//! agrees on the shape agrees on the instance.  Linear layers are sampled until
//! invertible and key matrices until they reach full rank, mirroring the
//! LowMC design requirements.  Once built the instance is immutable.

use crate::config::{LowmcSpec, Preset, SchemeConfig};
use crate::error::Result;
use crate::gf2::{BitMatrix, BitVector};
use crate::prng::{RandomnessSource, SeededStream};

const PARAMS_DOMAIN: &[u8] = b"LOWMC_FISH_PARAMS";

/// One cipher round: `state = L·sbox(state) ⊕ C ⊕ K·key`.
#[derive(Debug, Clone)]
pub struct Round {
    /// Linear layer `L`.
    pub linear: BitMatrix,
    /// Round constant `C`.
    pub constant: BitVector,
    /// Round-key matrix `K`.
    pub key: BitMatrix,
}

/// Bit masks used by the bit-sliced S-box layer.
///
/// S-box `j` acts on bits `(3j, 3j+1, 3j+2)`, named `(a, b, c)`.
#[derive(Debug, Clone)]
pub struct SboxMasks {
    /// Bits `3j` for every S-box; `b` and `c` inputs are shifted onto these.
    pub a: BitVector,
    /// Bits at or above `3m`, which the S-box layer leaves untouched.
    pub identity: BitVector,
}

impl SboxMasks {
    fn new(spec: &LowmcSpec) -> Self {
        let mut a = BitVector::zero(spec.block_size);
        for j in 0..spec.sbox_count {
            a.set(3 * j, true);
        }
        let mut identity = BitVector::zero(spec.block_size);
        for bit in spec.sbox_bits()..spec.block_size {
            identity.set(bit, true);
        }
        Self { a, identity }
    }
}

/// Immutable LowMC instance together with the proof configuration.
#[derive(Debug, Clone)]
pub struct Parameters {
    config: SchemeConfig,
    initial_key: BitMatrix,
    rounds: Vec<Round>,
    masks: SboxMasks,
}

impl Parameters {
    /// Validates `config` and derives the LowMC instance it describes.
    pub fn new(config: &SchemeConfig) -> Result<Self> {
        config.validate()?;
        let spec = config.lowmc;
        let mut stream = SeededStream::new(&instance_seed(&spec));
        let n = spec.block_size;
        let k = spec.key_size;
        let initial_key = full_rank_matrix(&mut stream, n, k);
        let mut rounds = Vec::with_capacity(spec.rounds);
        for _ in 0..spec.rounds {
            let linear = full_rank_matrix(&mut stream, n, n);
            let constant = stream.next_vector(n);
            let key = full_rank_matrix(&mut stream, n, k);
            rounds.push(Round {
                linear,
                constant,
                key,
            });
        }
        tracing::debug!(
            block_size = n,
            key_size = k,
            sbox_count = spec.sbox_count,
            rounds = spec.rounds,
            repetitions = config.repetitions,
            "derived LowMC instance"
        );
        Ok(Self {
            config: config.clone(),
            initial_key,
            rounds,
            masks: SboxMasks::new(&spec),
        })
    }

    /// Builds the instance for a named preset with operating-system randomness.
    pub fn from_preset(preset: Preset) -> Result<Self> {
        Self::new(&SchemeConfig::preset(preset))
    }

    /// Configuration this instance was built from.
    pub fn config(&self) -> &SchemeConfig {
        &self.config
    }

    /// LowMC shape.
    pub fn spec(&self) -> &LowmcSpec {
        &self.config.lowmc
    }

    /// Block size `n`.
    pub fn block_size(&self) -> usize {
        self.config.lowmc.block_size
    }

    /// Key size `k`.
    pub fn key_size(&self) -> usize {
        self.config.lowmc.key_size
    }

    /// Number of cipher rounds.
    pub fn round_count(&self) -> usize {
        self.config.lowmc.rounds
    }

    /// Number of proof repetitions `R`.
    pub fn repetitions(&self) -> usize {
        self.config.repetitions
    }

    /// Configured top-level randomness source.
    pub fn randomness(&self) -> RandomnessSource {
        self.config.randomness
    }

    /// Whitening key matrix `K0`.
    pub fn initial_key(&self) -> &BitMatrix {
        &self.initial_key
    }

    /// Round schedule.
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// S-box layer masks.
    pub fn masks(&self) -> &SboxMasks {
        &self.masks
    }

    /// Bits in one party's recorded view: its key share plus `3m` AND outputs
    /// per round.
    pub fn view_bits(&self) -> usize {
        self.key_size() + self.round_count() * self.spec().sbox_bits()
    }

    /// Fixed plaintext used for key pairs: the all-zero block.
    pub fn zero_plaintext(&self) -> BitVector {
        BitVector::zero(self.block_size())
    }

    /// Evaluates LowMC in the clear.
    pub fn encrypt(&self, key: &BitVector, plaintext: &BitVector) -> BitVector {
        let mut state = plaintext ^ &self.initial_key.mul_vec(key);
        for round in &self.rounds {
            state = sbox_layer(&self.masks, &state);
            state = round.linear.mul_vec(&state);
            state ^= &round.constant;
            state ^= &round.key.mul_vec(key);
        }
        state
    }
}

/// Plain S-box layer: `(a, b, c) -> (a ⊕ bc, a ⊕ b ⊕ ca, a ⊕ b ⊕ c ⊕ ab)`.
fn sbox_layer(masks: &SboxMasks, state: &BitVector) -> BitVector {
    let a = state & &masks.a;
    let b = &state.shift_down(1) & &masks.a;
    let c = &state.shift_down(2) & &masks.a;
    let ab = &a & &b;
    let bc = &b & &c;
    let ca = &c & &a;
    let new_a = &a ^ &bc;
    let new_b = &(&a ^ &b) ^ &ca;
    let new_c = &(&(&a ^ &b) ^ &c) ^ &ab;
    let mut out = state & &masks.identity;
    out ^= &new_a;
    out ^= &new_b.shift_up(1);
    out ^= &new_c.shift_up(2);
    out
}

fn instance_seed(spec: &LowmcSpec) -> Vec<u8> {
    let mut seed = PARAMS_DOMAIN.to_vec();
    for value in [spec.block_size, spec.key_size, spec.sbox_count, spec.rounds] {
        seed.extend_from_slice(&(value as u32).to_be_bytes());
    }
    seed
}

fn full_rank_matrix(stream: &mut SeededStream, rows: usize, cols: usize) -> BitMatrix {
    let target = rows.min(cols);
    loop {
        let candidate = BitMatrix::from_rows(
            cols,
            (0..rows).map(|_| stream.next_vector(cols)).collect(),
        );
        if candidate.rank() == target {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> Parameters {
        Parameters::from_preset(Preset::Test).unwrap()
    }

    #[test]
    fn instance_is_deterministic_and_full_rank() {
        let a = test_params();
        let b = test_params();
        assert_eq!(a.rounds().len(), 4);
        for (ra, rb) in a.rounds().iter().zip(b.rounds()) {
            assert_eq!(ra.linear, rb.linear);
            assert_eq!(ra.constant, rb.constant);
            assert_eq!(ra.linear.rank(), 64);
            assert_eq!(ra.key.rank(), 64);
        }
        assert_eq!(a.initial_key(), b.initial_key());
    }

    #[test]
    fn sbox_layer_matches_truth_table() {
        let params = test_params();
        let masks = params.masks();
        let table = [0u8, 7, 6, 5, 4, 1, 3, 2];
        for input in 0u8..8 {
            let mut state = BitVector::zero(64);
            for bit in 0..3 {
                state.set(bit, (input >> bit) & 1 == 1);
            }
            state.set(40, true);
            let out = sbox_layer(masks, &state);
            let mut value = 0u8;
            for bit in 0..3 {
                value |= (out.get(bit) as u8) << bit;
            }
            assert_eq!(value, table[input as usize], "input {input}");
            assert!(out.get(40), "identity part must pass through");
        }
    }

    #[test]
    fn encryption_depends_on_key() {
        let params = test_params();
        let p = params.zero_plaintext();
        let k1 = BitVector::from_le_bytes(64, &[1, 2, 3, 4, 5, 6, 7, 8]);
        let k2 = BitVector::from_le_bytes(64, &[1, 2, 3, 4, 5, 6, 7, 9]);
        let c1 = params.encrypt(&k1, &p);
        assert_eq!(c1, params.encrypt(&k1, &p));
        assert_ne!(c1, params.encrypt(&k2, &p));
    }

    #[test]
    fn view_bits_counts_key_and_gates() {
        let params = test_params();
        assert_eq!(params.view_bits(), 64 + 4 * 30);
    }
}
