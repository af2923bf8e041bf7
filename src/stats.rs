//! Timing information collected by the `*_with_stats` entry points.
//!
//! Every phase is measured with wall-clock [`Duration`]s.  Phases that run
//! across repetitions in parallel report the duration of the whole parallel
//! section, not the sum over repetitions.

use serde::Serialize;
use std::time::Duration;

/// Phase timings of key generation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KeygenStats {
    /// Drawing the private key.
    pub private_key: Duration,
    /// Evaluating LowMC in the clear for the public key.
    pub public_key: Duration,
    /// Total wall-clock time.
    pub total: Duration,
}

/// Phase timings of proof construction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProofStats {
    /// Drawing per-party seeds and commitment randomness.
    pub randomness: Duration,
    /// Splitting the key into shares for every repetition.
    pub secret_sharing: Duration,
    /// Running the MPC simulation for every repetition.
    pub mpc: Duration,
    /// Hashing the commitments.
    pub commitments: Duration,
    /// Deriving the Fiat–Shamir challenge; zero for interactive proofs.
    pub challenge: Duration,
    /// Total wall-clock time.
    pub total: Duration,
}

/// Phase timings of signing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SignStats {
    /// Proof construction.
    pub proof: ProofStats,
    /// Serialising the proof.
    pub encode: Duration,
    /// Total wall-clock time.
    pub total: Duration,
    /// Length of the produced signature in bytes.
    pub signature_size: usize,
}

/// Phase timings of verification.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyStats {
    /// Parsing the signature bytes.
    pub decode: Duration,
    /// Recomputing the revealed parties' commitments.
    pub commitments: Duration,
    /// Recomputing the Fiat–Shamir challenge.
    pub challenge: Duration,
    /// Replaying the revealed parties.
    pub replay: Duration,
    /// Total wall-clock time.
    pub total: Duration,
}
