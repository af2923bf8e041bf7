#![deny(missing_docs)]

//! The design philosophy underlying `lowmc_fish` is to keep every primitive small enough to audit
//! in one sitting while remaining faithful to the protocol it serves.
//!
//! Each module encapsulates one layer of an MPC-in-the-head signature, illustrating how a
//! zero-knowledge proof of a block-cipher key becomes a signature scheme.
//! # lowmc_fish
//!
//! **lowmc_fish** implements the Fish signature: a Fiat–Shamir transformed ZKBoo
//! proof of knowledge of a LowMC key.  The signer simulates a three-party
//! computation of LowMC under XOR secret sharing, commits to each simulated
//! party's view, and reveals two of the three views per repetition as chosen by
//! a hash of the commitments and the message.
//!
//! ## Layers
//!
//! * [`gf2`]: word-aligned GF(2) vectors and matrices.
//! * [`params`]: deterministic LowMC instances built from a [`SchemeConfig`].
//! * [`sharing`]: the three-party XOR sharing of a value.
//! * [`mpc`]: the MPC evaluation of LowMC and the per-repetition verifier.
//! * [`view`]: per-party views, commitments and challenge packing.
//! * [`proof`]: repetitions, Fiat–Shamir and the interactive three-move mode.
//! * [`codec`]: the proof/signature byte layout.
//! * [`signature`]: key generation, signing and verification.
//!
//! ## Usage
//!
//! ```rust
//! use lowmc_fish::{generate_keys, sign, verify, Parameters, Preset};
//!
//! let params = Parameters::from_preset(Preset::Test)?;
//! let (private_key, public_key) = generate_keys(&params)?;
//! let signature = sign(&params, &private_key, b"test")?;
//! verify(&params, &public_key, b"test", &signature)?;
//! assert!(verify(&params, &public_key, b"Test", &signature).is_err());
//! # Ok::<(), lowmc_fish::FishError>(())
//! ```
//!
//! The full-size presets (`L1`, `L3`, `L5`) use 137 repetitions; the `Test`
//! preset is a reduced 64-bit instance meant for tests and demos only.

pub mod codec;
pub mod config;
pub mod error;
pub mod gf2;
pub mod mpc;
pub mod params;
pub mod prng;
pub mod proof;
pub mod sharing;
pub mod signature;
pub mod stats;
pub mod transcript;
pub mod view;

pub use config::{LowmcSpec, Preset, SchemeConfig, DEFAULT_REPETITIONS};
pub use error::{FishError, Result};
pub use gf2::{BitMatrix, BitVector};
pub use mpc::{MpcEngine, MpcOutput, Tape};
pub use params::Parameters;
pub use prng::{Entropy, RandomnessSource, SeededStream};
pub use proof::{derive_challenge, Plaintext, Proof, ProofBuilder, ProverState, Statement, Verifier};
pub use sharing::{Party, SharedValue, PARTY_COUNT};
pub use signature::{
    generate_keys, generate_keys_with, generate_keys_with_stats, is_valid, public_key, sign,
    sign_with, sign_with_stats, signing_entropy, verify, verify_with_stats, PrivateKey, PublicKey,
};
pub use stats::{KeygenStats, ProofStats, SignStats, VerifyStats};
pub use view::{challenge_at, commit, Challenge, Opening, View};
