//! Key generation, signing and verification.
//!
//! A private key is a random LowMC key; the matching public key is the
//! encryption of the all-zero block under it.  A signature is a Fiat–Shamir
//! proof of knowledge of the private key, bound to the message through the
//! challenge, encoded with the challenge trailer.

use crate::codec;
use crate::error::{FishError, Result};
use crate::gf2::BitVector;
use crate::params::Parameters;
use crate::prng::Entropy;
use crate::proof::{ProofBuilder, Statement, Verifier};
use crate::stats::{KeygenStats, SignStats, VerifyStats};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::time::Instant;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret LowMC key, wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    key: BitVector,
}

impl PrivateKey {
    /// Wraps raw key bits.
    pub fn from_bits(key: BitVector) -> Self {
        Self { key }
    }

    /// Key bits.
    pub fn bits(&self) -> &BitVector {
        &self.key
    }

    /// Little-endian hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.key.to_le_bytes())
    }

    /// Parses a key for `params` from hex.
    pub fn from_hex(params: &Parameters, input: &str) -> Result<Self> {
        decode_hex(input.trim(), params.key_size(), "private key").map(Self::from_bits)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bits", &self.key.len())
            .finish_non_exhaustive()
    }
}

/// Public key: `LowMC_k(0^n)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    ciphertext: BitVector,
}

impl PublicKey {
    /// Wraps a ciphertext block.
    pub fn from_bits(ciphertext: BitVector) -> Self {
        Self { ciphertext }
    }

    /// Ciphertext bits.
    pub fn bits(&self) -> &BitVector {
        &self.ciphertext
    }

    /// Little-endian hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.ciphertext.to_le_bytes())
    }

    /// Parses a public key for `params` from hex.
    pub fn from_hex(params: &Parameters, input: &str) -> Result<Self> {
        decode_hex(input.trim(), params.block_size(), "public key").map(Self::from_bits)
    }
}

fn decode_hex(input: &str, bits: usize, what: &str) -> Result<BitVector> {
    let mut bytes = hex::decode(input).map_err(|err| FishError::Decode(format!("{what}: {err}")))?;
    let value = BitVector::from_le_bytes_exact(bits, &bytes);
    bytes.zeroize();
    value.ok_or_else(|| FishError::Decode(format!("{what} must be exactly {bits} bits")))
}

/// Derives the public key of `private_key`.
pub fn public_key(params: &Parameters, private_key: &PrivateKey) -> PublicKey {
    PublicKey::from_bits(params.encrypt(private_key.bits(), &params.zero_plaintext()))
}

/// Generates a key pair from the configured randomness source.
pub fn generate_keys(params: &Parameters) -> Result<(PrivateKey, PublicKey)> {
    let mut entropy = Entropy::for_operation(params.randomness(), "keygen");
    generate_keys_with(params, &mut entropy)
}

/// Generates a key pair drawing from `entropy`.
pub fn generate_keys_with(
    params: &Parameters,
    entropy: &mut Entropy,
) -> Result<(PrivateKey, PublicKey)> {
    generate_keys_with_stats(params, entropy).map(|(sk, pk, _)| (sk, pk))
}

/// Like [`generate_keys_with`], also reporting phase timings.
pub fn generate_keys_with_stats(
    params: &Parameters,
    entropy: &mut Entropy,
) -> Result<(PrivateKey, PublicKey, KeygenStats)> {
    let total_start = Instant::now();
    let start = Instant::now();
    let private_key = PrivateKey::from_bits(entropy.random_vector(params.key_size())?);
    let private_elapsed = start.elapsed();
    let start = Instant::now();
    let public = public_key(params, &private_key);
    let stats = KeygenStats {
        private_key: private_elapsed,
        public_key: start.elapsed(),
        total: total_start.elapsed(),
    };
    tracing::debug!(key_bits = params.key_size(), "generated key pair");
    Ok((private_key, public, stats))
}

fn statement(params: &Parameters, public: &PublicKey) -> Result<Statement> {
    if public.bits().len() != params.block_size() {
        return Err(FishError::InvalidParameters(format!(
            "public key has {} bits, instance expects {}",
            public.bits().len(),
            params.block_size()
        )));
    }
    Ok(Statement::public(
        params.zero_plaintext(),
        public.bits().clone(),
    ))
}

const SIGN_CONTEXT_DOMAIN: &[u8] = b"LOWMC_FISH_SIGN_CONTEXT";

/// Entropy for signing `message` under `private_key`.
///
/// A seeded source is keyed by `SHA-256(domain ‖ key ‖ message)` as well, so
/// seeded signing is reproducible per key and message while distinct messages
/// never share prover randomness.
pub fn signing_entropy(params: &Parameters, private_key: &PrivateKey, message: &[u8]) -> Entropy {
    let mut key_bytes = private_key.bits().to_le_bytes();
    let mut hasher = Sha256::new();
    hasher.update(SIGN_CONTEXT_DOMAIN);
    hasher.update((key_bytes.len() as u64).to_be_bytes());
    hasher.update(&key_bytes);
    hasher.update(message);
    key_bytes.zeroize();
    let mut context = [0u8; 32];
    context.copy_from_slice(&hasher.finalize());
    let entropy = Entropy::for_operation_with_context(params.randomness(), "sign", &context);
    context.zeroize();
    entropy
}

/// Signs `message` with the configured randomness source.
pub fn sign(params: &Parameters, private_key: &PrivateKey, message: &[u8]) -> Result<Vec<u8>> {
    let mut entropy = signing_entropy(params, private_key, message);
    sign_with(params, private_key, message, &mut entropy)
}

/// Signs `message` drawing from `entropy`.
pub fn sign_with(
    params: &Parameters,
    private_key: &PrivateKey,
    message: &[u8],
    entropy: &mut Entropy,
) -> Result<Vec<u8>> {
    sign_with_stats(params, private_key, message, entropy).map(|(sig, _)| sig)
}

/// Like [`sign_with`], also reporting phase timings and the signature size.
pub fn sign_with_stats(
    params: &Parameters,
    private_key: &PrivateKey,
    message: &[u8],
    entropy: &mut Entropy,
) -> Result<(Vec<u8>, SignStats)> {
    let total_start = Instant::now();
    let public = public_key(params, private_key);
    let statement = statement(params, &public)?;
    let (proof, proof_stats) = ProofBuilder::new(params).prove_with_stats(
        private_key.bits(),
        &statement,
        message,
        entropy,
    )?;
    let start = Instant::now();
    let signature = codec::encode(params, &proof, true)?;
    let stats = SignStats {
        proof: proof_stats,
        encode: start.elapsed(),
        total: total_start.elapsed(),
        signature_size: signature.len(),
    };
    tracing::debug!(
        message_len = message.len(),
        signature_size = signature.len(),
        elapsed_ms = stats.total.as_millis() as u64,
        "signed message"
    );
    Ok((signature, stats))
}

/// Verifies `signature` on `message` under `public`.
pub fn verify(
    params: &Parameters,
    public: &PublicKey,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    verify_with_stats(params, public, message, signature).map(|_| ())
}

/// Like [`verify`], also reporting phase timings.
pub fn verify_with_stats(
    params: &Parameters,
    public: &PublicKey,
    message: &[u8],
    signature: &[u8],
) -> Result<VerifyStats> {
    let total_start = Instant::now();
    let statement = statement(params, public)?;
    let start = Instant::now();
    let proof = codec::decode(params, signature, None).map_err(|err| {
        tracing::warn!(reason = %err, "signature rejected");
        err
    })?;
    let decode = start.elapsed();
    let mut stats =
        Verifier::new(params).verify_fiat_shamir_with_stats(&statement, &proof, message)?;
    stats.decode = decode;
    stats.total = total_start.elapsed();
    tracing::debug!(
        message_len = message.len(),
        elapsed_ms = stats.total.as_millis() as u64,
        "verified signature"
    );
    Ok(stats)
}

/// Returns `true` iff [`verify`] accepts.
pub fn is_valid(params: &Parameters, public: &PublicKey, message: &[u8], signature: &[u8]) -> bool {
    verify(params, public, message, signature).is_ok()
}
