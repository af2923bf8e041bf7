//! ZKBoo proof construction, challenge derivation and verification.
//!
//! A proof consists of `R` independent repetitions of the MPC simulation.  In
//! each repetition the prover secret-shares the key, runs the three parties,
//! commits to every party's view and reveals two of them.  The challenge that
//! selects the hidden party is either supplied by an interactive verifier
//! ([`ProverState::open`]) or derived by Fiat–Shamir from the statement, the
//! commitments and a message ([`ProofBuilder::prove`]).
//!
//! Top-level entropy is drawn sequentially before any parallel section, so the
//! entropy source never has to be shared between threads.  The MPC runs, the
//! commitments and the verifier's replays fan out over repetitions with rayon.

use crate::error::{FishError, Result};
use crate::gf2::BitVector;
use crate::mpc::{MpcEngine, MpcOutput, Tape};
use crate::params::Parameters;
use crate::prng::{Entropy, Seed};
use crate::sharing::{Party, SharedValue, PARTY_COUNT};
use crate::stats::{ProofStats, VerifyStats};
use crate::transcript::{Transcript, SIGNATURE_DOMAIN};
use crate::view::{commit, Challenge, CommitRandomness, Digest, Opening, View, ViewStore};
#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;
use std::time::Instant;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Plaintext side of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plaintext {
    /// Public block, absorbed by party 0 only.
    Public(BitVector),
    /// Plaintext whose three shares are known to both prover and verifier.
    Shared(SharedValue),
}

/// Public statement: "I know a key mapping `plaintext` to `ciphertext`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Cipher input.
    pub plaintext: Plaintext,
    /// Expected cipher output.
    pub ciphertext: BitVector,
}

impl Statement {
    /// Statement over a public plaintext.
    pub fn public(plaintext: BitVector, ciphertext: BitVector) -> Self {
        Self {
            plaintext: Plaintext::Public(plaintext),
            ciphertext,
        }
    }

    /// Statement over a shared plaintext.
    pub fn shared(plaintext: SharedValue, ciphertext: BitVector) -> Self {
        Self {
            plaintext: Plaintext::Shared(plaintext),
            ciphertext,
        }
    }

    fn absorb(&self, transcript: &mut Transcript) {
        transcript.append_vector(&self.ciphertext);
        match &self.plaintext {
            Plaintext::Public(value) => transcript.append_vector(value),
            Plaintext::Shared(value) => match value.shares() {
                Some(shares) => shares.iter().for_each(|s| transcript.append_vector(s)),
                None => transcript.append_vector(&value.combine()),
            },
        }
    }
}

/// Fiat–Shamir challenge over a statement, every repetition's output shares
/// and commitments, and a message.
pub fn derive_challenge<'b>(
    params: &Parameters,
    statement: &Statement,
    outputs: impl Iterator<Item = &'b [BitVector; PARTY_COUNT]>,
    commitments: &[[Digest; PARTY_COUNT]],
    message: &[u8],
) -> Challenge {
    let mut transcript = Transcript::new(SIGNATURE_DOMAIN);
    statement.absorb(&mut transcript);
    for shares in outputs {
        shares.iter().for_each(|s| transcript.append_vector(s));
    }
    for digests in commitments {
        digests.iter().for_each(|d| transcript.append_digest(d));
    }
    transcript.append_bytes(message);
    transcript.challenge(params.repetitions())
}

/// Seeds and commitment randomness of the three parties of one repetition.
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
struct PartySecrets {
    seeds: [Seed; PARTY_COUNT],
    randomness: [CommitRandomness; PARTY_COUNT],
}

impl PartySecrets {
    fn draw(entropy: &mut Entropy) -> Result<Self> {
        Ok(Self {
            seeds: [entropy.array()?, entropy.array()?, entropy.array()?],
            randomness: [entropy.array()?, entropy.array()?, entropy.array()?],
        })
    }

    fn opening(&self, party: Party, view: View) -> Opening {
        Opening {
            seed: self.seeds[party.index()],
            randomness: self.randomness[party.index()],
            view,
        }
    }
}

/// Input of one repetition's MPC run.
struct RepetitionRun {
    seeds: [Seed; PARTY_COUNT],
    key: SharedValue,
}

/// Opened data of one repetition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepetitionProof {
    /// Openings of the revealed parties, in `hidden.revealed()` order.
    pub revealed: [Opening; 2],
    /// Output shares of all three parties.
    pub output_shares: [BitVector; PARTY_COUNT],
    /// Commitment of the hidden party.
    pub hidden_commitment: Digest,
}

/// A complete proof: one opening per repetition plus the challenge it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    /// Per-repetition openings.
    pub repetitions: Vec<RepetitionProof>,
    /// Hidden party of every repetition.
    pub challenge: Challenge,
}

/// Prover state after the first move: everything needed to answer any
/// challenge.
#[derive(Debug)]
pub struct ProverState {
    secrets: Vec<PartySecrets>,
    views: ViewStore,
    outputs: Vec<[BitVector; PARTY_COUNT]>,
    commitments: Vec<[Digest; PARTY_COUNT]>,
}

impl ProverState {
    /// Number of repetitions.
    pub fn repetitions(&self) -> usize {
        self.commitments.len()
    }

    /// First-move commitments, per repetition and party.
    pub fn commitments(&self) -> &[[Digest; PARTY_COUNT]] {
        &self.commitments
    }

    /// Output shares, per repetition and party.
    pub fn output_shares(&self) -> &[[BitVector; PARTY_COUNT]] {
        &self.outputs
    }

    /// Answers `challenge`, discarding everything the hidden parties held
    /// except their commitments.
    pub fn open(mut self, challenge: &Challenge) -> Result<Proof> {
        if challenge.len() != self.repetitions() {
            return Err(FishError::InvalidParameters(format!(
                "challenge covers {} repetitions, proof has {}",
                challenge.len(),
                self.repetitions()
            )));
        }
        let mut repetitions = Vec::with_capacity(self.repetitions());
        for (idx, &hidden) in challenge.as_slice().iter().enumerate() {
            let (first, second) = hidden.revealed();
            let mut views = self.views.take(idx);
            let secrets = &self.secrets[idx];
            let revealed = [
                secrets.opening(first, std::mem::take(&mut views[first.index()])),
                secrets.opening(second, std::mem::take(&mut views[second.index()])),
            ];
            views[hidden.index()]
                .entries_mut()
                .iter_mut()
                .for_each(Zeroize::zeroize);
            repetitions.push(RepetitionProof {
                revealed,
                output_shares: self.outputs[idx].clone(),
                hidden_commitment: self.commitments[idx][hidden.index()],
            });
        }
        Ok(Proof {
            repetitions,
            challenge: challenge.clone(),
        })
    }
}

fn par_map<T, U, F>(items: Vec<T>, f: F) -> Vec<U>
where
    T: Send,
    U: Send,
    F: Fn(T) -> U + Send + Sync,
{
    #[cfg(not(target_arch = "wasm32"))]
    {
        items.into_par_iter().map(f).collect()
    }
    #[cfg(target_arch = "wasm32")]
    {
        items.into_iter().map(f).collect()
    }
}

/// Builds proofs for one LowMC instance.
#[derive(Debug, Clone, Copy)]
pub struct ProofBuilder<'a> {
    params: &'a Parameters,
}

impl<'a> ProofBuilder<'a> {
    /// Creates a builder for `params`.
    pub fn new(params: &'a Parameters) -> Self {
        Self { params }
    }

    /// Runs every repetition and commits to the views (the first move).
    pub fn commit(
        &self,
        key: &BitVector,
        statement: &Statement,
        entropy: &mut Entropy,
    ) -> Result<ProverState> {
        self.commit_with_stats(key, statement, entropy)
            .map(|(state, _)| state)
    }

    /// Like [`ProofBuilder::commit`], also reporting phase timings.
    pub fn commit_with_stats(
        &self,
        key: &BitVector,
        statement: &Statement,
        entropy: &mut Entropy,
    ) -> Result<(ProverState, ProofStats)> {
        let params = self.params;
        let repetitions = params.repetitions();
        if key.len() != params.key_size() {
            return Err(FishError::InvalidParameters(format!(
                "key has {} bits, instance expects {}",
                key.len(),
                params.key_size()
            )));
        }
        let total_start = Instant::now();
        let mut stats = ProofStats::default();

        let start = Instant::now();
        let secrets = (0..repetitions)
            .map(|_| PartySecrets::draw(entropy))
            .collect::<Result<Vec<_>>>()?;
        stats.randomness = start.elapsed();

        let start = Instant::now();
        let mut runs = Vec::with_capacity(repetitions);
        for secret in &secrets {
            let shared = SharedValue::from_plain(key.clone()).promote_to_shared(entropy)?;
            runs.push(RepetitionRun {
                seeds: secret.seeds,
                key: shared,
            });
        }
        stats.secret_sharing = start.elapsed();

        let start = Instant::now();
        let engine = MpcEngine::new(params);
        let outputs = par_map(runs, |mut run| -> Result<MpcOutput> {
            let tapes = run.seeds.map(|seed| Tape::expand(&seed, params));
            let output = match &statement.plaintext {
                Plaintext::Public(plaintext) => engine.run(&run.key, plaintext, &tapes),
                Plaintext::Shared(plaintext) => {
                    engine.run_with_shared_plaintext(&run.key, plaintext, &tapes)
                }
            };
            run.key.clear();
            run.seeds.zeroize();
            output
        })
        .into_iter()
        .collect::<Result<Vec<_>>>()?;
        let mut views = ViewStore::with_repetitions(repetitions);
        let mut output_shares = Vec::with_capacity(repetitions);
        for (idx, output) in outputs.into_iter().enumerate() {
            views.insert(idx, output.views);
            output_shares.push(output.output_shares);
        }
        stats.mpc = start.elapsed();

        let start = Instant::now();
        let commitments = par_map((0..repetitions).collect(), |idx| {
            let slot = views.repetition(idx);
            Party::ALL.map(|party| {
                let i = party.index();
                commit(
                    &secrets[idx].seeds[i],
                    &secrets[idx].randomness[i],
                    &slot[i],
                    &output_shares[idx][i],
                )
            })
        });
        stats.commitments = start.elapsed();
        stats.total = total_start.elapsed();

        tracing::debug!(
            repetitions,
            elapsed_ms = stats.total.as_millis() as u64,
            "committed to MPC views"
        );
        Ok((
            ProverState {
                secrets,
                views,
                outputs: output_shares,
                commitments,
            },
            stats,
        ))
    }

    /// Produces a non-interactive proof bound to `message`.
    pub fn prove(
        &self,
        key: &BitVector,
        statement: &Statement,
        message: &[u8],
        entropy: &mut Entropy,
    ) -> Result<Proof> {
        self.prove_with_stats(key, statement, message, entropy)
            .map(|(proof, _)| proof)
    }

    /// Like [`ProofBuilder::prove`], also reporting phase timings.
    pub fn prove_with_stats(
        &self,
        key: &BitVector,
        statement: &Statement,
        message: &[u8],
        entropy: &mut Entropy,
    ) -> Result<(Proof, ProofStats)> {
        let total_start = Instant::now();
        let (state, mut stats) = self.commit_with_stats(key, statement, entropy)?;
        let start = Instant::now();
        let challenge = derive_challenge(
            self.params,
            statement,
            state.output_shares().iter(),
            state.commitments(),
            message,
        );
        stats.challenge = start.elapsed();
        let proof = state.open(&challenge)?;
        stats.total = total_start.elapsed();
        Ok((proof, stats))
    }
}

/// Checks proofs for one LowMC instance.
#[derive(Debug, Clone, Copy)]
pub struct Verifier<'a> {
    params: &'a Parameters,
}

impl<'a> Verifier<'a> {
    /// Creates a verifier for `params`.
    pub fn new(params: &'a Parameters) -> Self {
        Self { params }
    }

    /// Checks an interactive proof against the verifier's own first-move
    /// record and challenge.
    pub fn verify_with_challenge(
        &self,
        statement: &Statement,
        first_move: &[[Digest; PARTY_COUNT]],
        challenge: &Challenge,
        proof: &Proof,
    ) -> Result<()> {
        self.check_shape(proof)?;
        if first_move.len() != proof.repetitions.len() || challenge.len() != proof.repetitions.len()
        {
            return Err(FishError::InvalidParameters(
                "first move and challenge must cover every repetition".into(),
            ));
        }
        if let Some(repetition) = (0..challenge.len())
            .find(|&idx| challenge.hidden(idx) != proof.challenge.hidden(idx))
        {
            return Err(reject(FishError::ChallengeMismatch { repetition }));
        }
        let commitments = self.reconstruct_commitments(proof);
        if let Some(repetition) = commitments
            .iter()
            .zip(first_move)
            .position(|(recomputed, committed)| recomputed != committed)
        {
            return Err(reject(FishError::CommitmentMismatch { repetition }));
        }
        self.replay(statement, proof)
    }

    /// Checks a non-interactive proof bound to `message`.
    pub fn verify_fiat_shamir(
        &self,
        statement: &Statement,
        proof: &Proof,
        message: &[u8],
    ) -> Result<()> {
        self.verify_fiat_shamir_with_stats(statement, proof, message)
            .map(|_| ())
    }

    /// Like [`Verifier::verify_fiat_shamir`], also reporting phase timings.
    /// `decode` and `total` are left for the caller to fill.
    pub fn verify_fiat_shamir_with_stats(
        &self,
        statement: &Statement,
        proof: &Proof,
        message: &[u8],
    ) -> Result<VerifyStats> {
        let mut stats = VerifyStats::default();
        self.check_shape(proof)?;

        let start = Instant::now();
        let commitments = self.reconstruct_commitments(proof);
        stats.commitments = start.elapsed();

        let start = Instant::now();
        let challenge = derive_challenge(
            self.params,
            statement,
            proof.repetitions.iter().map(|r| &r.output_shares),
            &commitments,
            message,
        );
        stats.challenge = start.elapsed();
        if challenge != proof.challenge {
            return Err(reject(FishError::InvalidChallengeDerivation));
        }

        let start = Instant::now();
        self.replay(statement, proof)?;
        stats.replay = start.elapsed();
        Ok(stats)
    }

    fn check_shape(&self, proof: &Proof) -> Result<()> {
        let expected = self.params.repetitions();
        if proof.repetitions.len() != expected || proof.challenge.len() != expected {
            return Err(reject(FishError::MalformedProof(format!(
                "expected {expected} repetitions, got {} openings and {} challenges",
                proof.repetitions.len(),
                proof.challenge.len()
            ))));
        }
        Ok(())
    }

    /// Recomputes the revealed commitments and slots in the hidden ones.
    fn reconstruct_commitments(&self, proof: &Proof) -> Vec<[Digest; PARTY_COUNT]> {
        let jobs: Vec<_> = proof
            .repetitions
            .iter()
            .zip(proof.challenge.as_slice())
            .collect();
        par_map(jobs, |(repetition, &hidden)| {
            let (first, second) = hidden.revealed();
            let mut digests = [repetition.hidden_commitment; PARTY_COUNT];
            for (opening, party) in repetition.revealed.iter().zip([first, second]) {
                digests[party.index()] = commit(
                    &opening.seed,
                    &opening.randomness,
                    &opening.view,
                    &repetition.output_shares[party.index()],
                );
            }
            digests
        })
    }

    fn replay(&self, statement: &Statement, proof: &Proof) -> Result<()> {
        let engine = MpcEngine::new(self.params);
        let jobs: Vec<_> = proof
            .repetitions
            .iter()
            .zip(proof.challenge.as_slice())
            .enumerate()
            .collect();
        let outcomes = par_map(jobs, |(idx, (repetition, &hidden))| {
            let openings = [&repetition.revealed[0], &repetition.revealed[1]];
            let outcome = match &statement.plaintext {
                Plaintext::Public(plaintext) => engine.verify(
                    plaintext,
                    hidden,
                    openings,
                    &repetition.output_shares,
                    &statement.ciphertext,
                ),
                Plaintext::Shared(plaintext) => engine.verify_with_shared_plaintext(
                    plaintext,
                    hidden,
                    openings,
                    &repetition.output_shares,
                    &statement.ciphertext,
                ),
            };
            tracing::trace!(repetition = idx, ok = outcome.is_ok(), "replayed repetition");
            outcome.map_err(|failure| failure.into_error(idx))
        });
        for outcome in outcomes {
            outcome.map_err(reject)?;
        }
        Ok(())
    }
}

fn reject(err: FishError) -> FishError {
    tracing::warn!(reason = %err, "proof rejected");
    err
}
