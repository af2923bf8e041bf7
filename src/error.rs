//! Error taxonomy shared by signing, proving and verification.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FishError>;

/// Errors raised by key generation, proving, decoding and verification.
///
/// Verification failures are distinct variants so callers can report the
/// precise rejection reason; none of them are retriable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FishError {
    #[error("allocation of a {bits}-bit vector failed")]
    /// A share or view buffer could not be allocated.
    Allocation {
        /// Width of the vector that failed to allocate.
        bits: usize,
    },
    #[error("randomness source failure: {0}")]
    /// The entropy source refused to produce bytes.
    Randomness(String),
    #[error("invalid parameters: {0}")]
    /// The LowMC instance or scheme configuration is unusable.
    InvalidParameters(String),
    #[error("malformed proof: {0}")]
    /// Proof bytes failed structural validation before interpretation.
    MalformedProof(String),
    #[error("commitment mismatch in repetition {repetition}")]
    /// A revealed party's recomputed commitment differs from the first move.
    CommitmentMismatch {
        /// Repetition whose commitment failed to match.
        repetition: usize,
    },
    #[error("view mismatch in repetition {repetition}, cipher round {round}")]
    /// Replaying a revealed party produced different gate outputs.
    ViewMismatch {
        /// Repetition that failed.
        repetition: usize,
        /// Cipher round whose S-box layer diverged.
        round: usize,
    },
    #[error("challenge mismatch in repetition {repetition}")]
    /// The proof answers a different challenge than the verifier issued.
    ChallengeMismatch {
        /// First repetition with a differing hidden party.
        repetition: usize,
    },
    #[error("output share mismatch in repetition {repetition}")]
    /// Recomputed output shares disagree with the claimed ones or the statement.
    OutputShareMismatch {
        /// Repetition that failed.
        repetition: usize,
    },
    #[error("challenge recomputed from the message disagrees with the embedded challenge")]
    /// Fiat-Shamir recomputation did not reproduce the embedded challenge.
    InvalidChallengeDerivation,
    #[error("config error: {0}")]
    /// Configuration file could not be parsed or validated.
    Config(String),
    #[error("decode error: {0}")]
    /// Hex or key material decoding failure.
    Decode(String),
    #[error("io error: {0}")]
    /// Underlying filesystem failure.
    Io(String),
}

impl FishError {
    /// Returns `true` when the error is a verification rejection rather than an
    /// operational failure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::MalformedProof(_)
                | Self::CommitmentMismatch { .. }
                | Self::ViewMismatch { .. }
                | Self::ChallengeMismatch { .. }
                | Self::OutputShareMismatch { .. }
                | Self::InvalidChallengeDerivation
        )
    }
}

impl From<std::io::Error> for FishError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
