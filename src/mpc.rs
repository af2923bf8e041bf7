//! Three-party MPC evaluation of LowMC ("MPC-in-the-head").
//!
//! Every value flowing through the cipher is XOR-shared between three
//! parties.  Linear steps (matrix products, key additions) are applied to each
//! share independently; public constants are added to party 0's share only.
//! The S-box layer is bit-sliced: the `a`, `b` and `c` inputs of all S-boxes
//! of a round are aligned onto the same bit positions and the three AND gates
//! `ab`, `bc`, `ca` are evaluated with the one-message multiplication rule
//!
//! ```text
//! z_i = x_i·y_i ⊕ x_{i+1}·y_i ⊕ x_i·y_{i+1} ⊕ r_i ⊕ r_{i+1}
//! ```
//!
//! where `r_i` comes from party `i`'s randomness tape.  The AND outputs of a
//! round are packed into one vector and appended to the party's view; these are
//! the only values a party ever receives.
//!
//! Verification replays the first revealed party in full, feeding it the
//! second revealed party's recorded messages, and checks that the replay
//! reproduces the recorded view and the claimed output shares.

use crate::error::{FishError, Result};
use crate::gf2::BitVector;
use crate::params::{Parameters, SboxMasks};
use crate::prng::{Seed, SeededStream};
use crate::sharing::{Party, SharedValue, PARTY_COUNT};
use crate::view::{Opening, View};

/// A party's randomness tape: one `n`-bit mask vector per cipher round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    rounds: Vec<BitVector>,
}

impl Tape {
    /// Expands `seed` into the tape for the given instance.
    pub fn expand(seed: &Seed, params: &Parameters) -> Self {
        let mut stream = SeededStream::new(seed);
        let rounds = (0..params.round_count())
            .map(|_| stream.next_vector(params.block_size()))
            .collect();
        Self { rounds }
    }

    /// Mask vector for cipher round `round`.
    pub fn round(&self, round: usize) -> &BitVector {
        &self.rounds[round]
    }
}

/// Output of one MPC execution.
#[derive(Debug, Clone)]
pub struct MpcOutput {
    /// Ciphertext shares, one per party.
    pub output_shares: [BitVector; PARTY_COUNT],
    /// Recorded views, one per party.
    pub views: [View; PARTY_COUNT],
}

/// The S-box inputs of one share, aligned onto the `a` positions.
struct SboxInputs {
    a: BitVector,
    b: BitVector,
    c: BitVector,
}

impl SboxInputs {
    fn split(masks: &SboxMasks, v: &BitVector) -> Self {
        Self {
            a: v & &masks.a,
            b: &v.shift_down(1) & &masks.a,
            c: &v.shift_down(2) & &masks.a,
        }
    }
}

/// A party's share of the three AND products of a round.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GateOutputs {
    ab: BitVector,
    bc: BitVector,
    ca: BitVector,
}

impl GateOutputs {
    fn compute(
        own: &SboxInputs,
        next: &SboxInputs,
        own_mask: &SboxInputs,
        next_mask: &SboxInputs,
    ) -> Self {
        Self {
            ab: and_share(&own.a, &own.b, &next.a, &next.b, &own_mask.a, &next_mask.a),
            bc: and_share(&own.b, &own.c, &next.b, &next.c, &own_mask.b, &next_mask.b),
            ca: and_share(&own.c, &own.a, &next.c, &next.a, &own_mask.c, &next_mask.c),
        }
    }

    /// Packs `bc`, `ca`, `ab` onto the `a`, `b`, `c` positions respectively.
    fn pack(&self) -> BitVector {
        let mut out = self.bc.clone();
        out ^= &self.ca.shift_up(1);
        out ^= &self.ab.shift_up(2);
        out
    }

    fn unpack(masks: &SboxMasks, packed: &BitVector) -> Self {
        let parts = SboxInputs::split(masks, packed);
        Self {
            bc: parts.a,
            ca: parts.b,
            ab: parts.c,
        }
    }
}

/// One party's share of `x·y`.
fn and_share(
    x_own: &BitVector,
    y_own: &BitVector,
    x_next: &BitVector,
    y_next: &BitVector,
    r_own: &BitVector,
    r_next: &BitVector,
) -> BitVector {
    let mut z = x_own & y_own;
    z ^= &(x_next & y_own);
    z ^= &(x_own & y_next);
    z ^= r_own;
    z ^= r_next;
    z
}

/// Applies the share-local part of the S-box layer given the party's AND shares.
fn finish_sbox(
    masks: &SboxMasks,
    state: &BitVector,
    inputs: &SboxInputs,
    gates: &GateOutputs,
) -> BitVector {
    let ab = &inputs.a ^ &inputs.b;
    let new_a = &inputs.a ^ &gates.bc;
    let new_b = &ab ^ &gates.ca;
    let mut new_c = &ab ^ &inputs.c;
    new_c ^= &gates.ab;
    let mut out = state & &masks.identity;
    out ^= &new_a;
    out ^= &new_b.shift_up(1);
    out ^= &new_c.shift_up(2);
    out
}

/// Share-local linear layer of round `round` for `party`.
fn linear_layer(
    params: &Parameters,
    round: usize,
    party: Party,
    state: &BitVector,
    key_share: &BitVector,
) -> BitVector {
    let schedule = &params.rounds()[round];
    let mut out = schedule.linear.mul_vec(state);
    if party == Party::P0 {
        out ^= &schedule.constant;
    }
    out ^= &schedule.key.mul_vec(key_share);
    out
}

/// MPC evaluator bound to one LowMC instance.
#[derive(Debug, Clone, Copy)]
pub struct MpcEngine<'a> {
    params: &'a Parameters,
}

impl<'a> MpcEngine<'a> {
    /// Creates an engine for `params`.
    pub fn new(params: &'a Parameters) -> Self {
        Self { params }
    }

    /// Runs LowMC on a shared key and a public plaintext.
    pub fn run(
        &self,
        key: &SharedValue,
        plaintext: &BitVector,
        tapes: &[Tape; PARTY_COUNT],
    ) -> Result<MpcOutput> {
        self.check_width(plaintext.len(), self.params.block_size(), "plaintext")?;
        let plaintext_shares = [
            plaintext.clone(),
            BitVector::zero(plaintext.len()),
            BitVector::zero(plaintext.len()),
        ];
        self.run_shares(key, plaintext_shares, tapes)
    }

    /// Runs LowMC on a shared key and a plaintext that is itself shared.
    pub fn run_with_shared_plaintext(
        &self,
        key: &SharedValue,
        plaintext: &SharedValue,
        tapes: &[Tape; PARTY_COUNT],
    ) -> Result<MpcOutput> {
        let shares = plaintext.shares().ok_or_else(|| {
            FishError::InvalidParameters("plaintext must be secret-shared".into())
        })?;
        self.check_width(plaintext.len(), self.params.block_size(), "plaintext")?;
        self.run_shares(key, shares.clone(), tapes)
    }

    fn run_shares(
        &self,
        key: &SharedValue,
        plaintext_shares: [BitVector; PARTY_COUNT],
        tapes: &[Tape; PARTY_COUNT],
    ) -> Result<MpcOutput> {
        let key_shares = key
            .shares()
            .ok_or_else(|| FishError::InvalidParameters("key must be secret-shared".into()))?;
        self.check_width(key.len(), self.params.key_size(), "key")?;
        let params = self.params;
        let masks = params.masks();

        let mut views: [View; PARTY_COUNT] =
            std::array::from_fn(|i| View::with_input(key_shares[i].clone()));
        let mut states: [BitVector; PARTY_COUNT] = std::array::from_fn(|i| {
            let mut s = plaintext_shares[i].clone();
            s ^= &params.initial_key().mul_vec(&key_shares[i]);
            s
        });

        for round in 0..params.round_count() {
            let inputs: [SboxInputs; PARTY_COUNT] =
                std::array::from_fn(|i| SboxInputs::split(masks, &states[i]));
            let tape_masks: [SboxInputs; PARTY_COUNT] =
                std::array::from_fn(|i| SboxInputs::split(masks, tapes[i].round(round)));
            for party in Party::ALL {
                let i = party.index();
                let j = party.next().index();
                let gates =
                    GateOutputs::compute(&inputs[i], &inputs[j], &tape_masks[i], &tape_masks[j]);
                views[i].record(gates.pack());
                let mixed = finish_sbox(masks, &states[i], &inputs[i], &gates);
                states[i] = linear_layer(params, round, party, &mixed, &key_shares[i]);
            }
        }

        Ok(MpcOutput {
            output_shares: states,
            views,
        })
    }

    /// Checks one repetition with a public plaintext.
    ///
    /// `openings` are the views of `hidden.revealed()` in that order.  The
    /// first revealed party is replayed from its seed, consuming the second
    /// party's recorded messages; its recomputed gate outputs must equal its
    /// recorded view, both recomputed output shares must equal
    /// `claimed_outputs`, and the three claimed shares must XOR to
    /// `expected_output`.  The hidden party is never touched.
    pub fn verify(
        &self,
        plaintext: &BitVector,
        hidden: Party,
        openings: [&Opening; 2],
        claimed_outputs: &[BitVector; PARTY_COUNT],
        expected_output: &BitVector,
    ) -> std::result::Result<(), RepetitionFailure> {
        let (first, second) = hidden.revealed();
        let share_for = |party: Party| {
            if party == Party::P0 {
                plaintext.clone()
            } else {
                BitVector::zero(plaintext.len())
            }
        };
        self.verify_shares(
            [share_for(first), share_for(second)],
            hidden,
            openings,
            claimed_outputs,
            expected_output,
        )
    }

    /// Checks one repetition whose plaintext is shared; the revealed parties'
    /// plaintext shares are taken from `plaintext`.
    pub fn verify_with_shared_plaintext(
        &self,
        plaintext: &SharedValue,
        hidden: Party,
        openings: [&Opening; 2],
        claimed_outputs: &[BitVector; PARTY_COUNT],
        expected_output: &BitVector,
    ) -> std::result::Result<(), RepetitionFailure> {
        let shares = plaintext
            .shares()
            .ok_or(RepetitionFailure::Malformed("plaintext must be secret-shared"))?;
        let (first, second) = hidden.revealed();
        self.verify_shares(
            [
                shares[first.index()].clone(),
                shares[second.index()].clone(),
            ],
            hidden,
            openings,
            claimed_outputs,
            expected_output,
        )
    }

    fn verify_shares(
        &self,
        plaintext_shares: [BitVector; 2],
        hidden: Party,
        openings: [&Opening; 2],
        claimed_outputs: &[BitVector; PARTY_COUNT],
        expected_output: &BitVector,
    ) -> std::result::Result<(), RepetitionFailure> {
        let params = self.params;
        let masks = params.masks();
        let (first, second) = hidden.revealed();
        let parties = [first, second];
        for opening in openings {
            self.check_opening_shape(opening)?;
        }
        if plaintext_shares.iter().any(|s| s.len() != params.block_size())
            || claimed_outputs.iter().any(|s| s.len() != params.block_size())
            || expected_output.len() != params.block_size()
        {
            return Err(RepetitionFailure::Malformed("block width mismatch"));
        }

        let tapes = openings.map(|o| Tape::expand(&o.seed, params));
        let key_shares: [&BitVector; 2] = [
            &openings[0].view.entries()[0],
            &openings[1].view.entries()[0],
        ];
        let mut states: [BitVector; 2] = std::array::from_fn(|idx| {
            let mut s = plaintext_shares[idx].clone();
            s ^= &params.initial_key().mul_vec(key_shares[idx]);
            s
        });

        for round in 0..params.round_count() {
            let inputs: [SboxInputs; 2] =
                std::array::from_fn(|idx| SboxInputs::split(masks, &states[idx]));
            let tape_masks: [SboxInputs; 2] =
                std::array::from_fn(|idx| SboxInputs::split(masks, tapes[idx].round(round)));
            let recomputed =
                GateOutputs::compute(&inputs[0], &inputs[1], &tape_masks[0], &tape_masks[1]);
            let recorded_first = &openings[0].view.entries()[round + 1];
            if &recomputed.pack() != recorded_first {
                return Err(RepetitionFailure::View { round });
            }
            let received = GateOutputs::unpack(masks, &openings[1].view.entries()[round + 1]);
            let gates = [recomputed, received];
            for idx in 0..2 {
                let mixed = finish_sbox(masks, &states[idx], &inputs[idx], &gates[idx]);
                states[idx] = linear_layer(params, round, parties[idx], &mixed, key_shares[idx]);
            }
        }

        for (idx, party) in parties.iter().enumerate() {
            if states[idx] != claimed_outputs[party.index()] {
                return Err(RepetitionFailure::Output);
            }
        }
        let mut combined = claimed_outputs[0].clone();
        combined ^= &claimed_outputs[1];
        combined ^= &claimed_outputs[2];
        if &combined != expected_output {
            return Err(RepetitionFailure::Output);
        }
        Ok(())
    }

    fn check_opening_shape(&self, opening: &Opening) -> std::result::Result<(), RepetitionFailure> {
        let params = self.params;
        let entries = opening.view.entries();
        if entries.len() != params.round_count() + 1 {
            return Err(RepetitionFailure::Malformed("view length mismatch"));
        }
        if entries[0].len() != params.key_size()
            || entries[1..].iter().any(|e| e.len() != params.block_size())
        {
            return Err(RepetitionFailure::Malformed("view entry width mismatch"));
        }
        Ok(())
    }

    fn check_width(&self, got: usize, expected: usize, what: &str) -> Result<()> {
        if got != expected {
            return Err(FishError::InvalidParameters(format!(
                "{what} has {got} bits, instance expects {expected}"
            )));
        }
        Ok(())
    }
}

/// Why a single repetition failed; mapped onto [`FishError`] by the caller,
/// which knows the repetition index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepetitionFailure {
    /// Opened data has the wrong shape.
    Malformed(&'static str),
    /// The replayed party diverged from its recorded view.
    View {
        /// Cipher round of the first divergence.
        round: usize,
    },
    /// Output shares are inconsistent.
    Output,
}

impl RepetitionFailure {
    /// Attaches the repetition index.
    pub fn into_error(self, repetition: usize) -> FishError {
        match self {
            Self::Malformed(reason) => {
                FishError::MalformedProof(format!("repetition {repetition}: {reason}"))
            }
            Self::View { round } => FishError::ViewMismatch { repetition, round },
            Self::Output => FishError::OutputShareMismatch { repetition },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preset;
    use crate::prng::Entropy;

    struct Fixture {
        params: Parameters,
        key: BitVector,
        plaintext: BitVector,
        seeds: [Seed; PARTY_COUNT],
    }

    fn fixture() -> Fixture {
        let params = Parameters::from_preset(Preset::Test).unwrap();
        let mut entropy = Entropy::seeded(11);
        let key = entropy.random_vector(params.key_size()).unwrap();
        let plaintext = entropy.random_vector(params.block_size()).unwrap();
        let seeds = [
            entropy.array().unwrap(),
            entropy.array().unwrap(),
            entropy.array().unwrap(),
        ];
        Fixture {
            params,
            key,
            plaintext,
            seeds,
        }
    }

    fn run(fx: &Fixture) -> MpcOutput {
        let mut entropy = Entropy::seeded(12);
        let shared_key = SharedValue::from_plain(fx.key.clone())
            .promote_to_shared(&mut entropy)
            .unwrap();
        let tapes = fx.seeds.map(|s| Tape::expand(&s, &fx.params));
        MpcEngine::new(&fx.params)
            .run(&shared_key, &fx.plaintext, &tapes)
            .unwrap()
    }

    fn opening(fx: &Fixture, out: &MpcOutput, party: Party) -> Opening {
        Opening {
            seed: fx.seeds[party.index()],
            randomness: [0u8; 4],
            view: out.views[party.index()].clone(),
        }
    }

    #[test]
    fn shared_execution_matches_plain_encryption() {
        let fx = fixture();
        let out = run(&fx);
        let combined = SharedValue::from_shares(out.output_shares.clone()).combine();
        assert_eq!(combined, fx.params.encrypt(&fx.key, &fx.plaintext));
        for view in &out.views {
            assert_eq!(view.len(), fx.params.round_count() + 1);
        }
    }

    #[test]
    fn execution_is_deterministic_given_tapes() {
        let fx = fixture();
        let a = run(&fx);
        let b = run(&fx);
        assert_eq!(a.views, b.views);
        assert_eq!(a.output_shares, b.output_shares);
    }

    #[test]
    fn shared_plaintext_variant_matches_plain_encryption() {
        let fx = fixture();
        let mut entropy = Entropy::seeded(13);
        let key = SharedValue::from_plain(fx.key.clone())
            .promote_to_shared(&mut entropy)
            .unwrap();
        let plaintext = SharedValue::from_plain(fx.plaintext.clone())
            .promote_to_shared(&mut entropy)
            .unwrap();
        let tapes = fx.seeds.map(|s| Tape::expand(&s, &fx.params));
        let engine = MpcEngine::new(&fx.params);
        let out = engine
            .run_with_shared_plaintext(&key, &plaintext, &tapes)
            .unwrap();
        let expected = fx.params.encrypt(&fx.key, &fx.plaintext);
        assert_eq!(
            SharedValue::from_shares(out.output_shares.clone()).combine(),
            expected
        );
        for hidden in Party::ALL {
            let (first, second) = hidden.revealed();
            let a = opening(&fx, &out, first);
            let b = opening(&fx, &out, second);
            assert_eq!(
                engine.verify_with_shared_plaintext(
                    &plaintext,
                    hidden,
                    [&a, &b],
                    &out.output_shares,
                    &expected
                ),
                Ok(())
            );
        }
    }

    #[test]
    fn every_hidden_party_verifies() {
        let fx = fixture();
        let out = run(&fx);
        let engine = MpcEngine::new(&fx.params);
        let expected = fx.params.encrypt(&fx.key, &fx.plaintext);
        for hidden in Party::ALL {
            let (first, second) = hidden.revealed();
            let a = opening(&fx, &out, first);
            let b = opening(&fx, &out, second);
            assert_eq!(
                engine.verify(&fx.plaintext, hidden, [&a, &b], &out.output_shares, &expected),
                Ok(())
            );
        }
    }

    #[test]
    fn tampered_view_is_detected() {
        let fx = fixture();
        let out = run(&fx);
        let engine = MpcEngine::new(&fx.params);
        let expected = fx.params.encrypt(&fx.key, &fx.plaintext);
        let hidden = Party::P1;
        let (first, second) = hidden.revealed();
        let mut a = opening(&fx, &out, first);
        let b = opening(&fx, &out, second);
        a.view.entries_mut()[2].flip(0);
        assert_eq!(
            engine.verify(&fx.plaintext, hidden, [&a, &b], &out.output_shares, &expected),
            Err(RepetitionFailure::View { round: 1 })
        );
    }

    #[test]
    fn tampered_seed_is_detected() {
        let fx = fixture();
        let out = run(&fx);
        let engine = MpcEngine::new(&fx.params);
        let expected = fx.params.encrypt(&fx.key, &fx.plaintext);
        let hidden = Party::P0;
        let (first, second) = hidden.revealed();
        let mut a = opening(&fx, &out, first);
        let b = opening(&fx, &out, second);
        a.seed[0] ^= 1;
        assert!(matches!(
            engine.verify(&fx.plaintext, hidden, [&a, &b], &out.output_shares, &expected),
            Err(RepetitionFailure::View { .. })
        ));
    }

    #[test]
    fn wrong_output_share_is_detected() {
        let fx = fixture();
        let out = run(&fx);
        let engine = MpcEngine::new(&fx.params);
        let expected = fx.params.encrypt(&fx.key, &fx.plaintext);
        let hidden = Party::P2;
        let (first, second) = hidden.revealed();
        let a = opening(&fx, &out, first);
        let b = opening(&fx, &out, second);
        let mut outputs = out.output_shares.clone();
        outputs[hidden.index()].flip(5);
        assert_eq!(
            engine.verify(&fx.plaintext, hidden, [&a, &b], &outputs, &expected),
            Err(RepetitionFailure::Output)
        );
        let mut outputs = out.output_shares.clone();
        outputs[first.index()].flip(5);
        assert_eq!(
            engine.verify(&fx.plaintext, hidden, [&a, &b], &outputs, &expected),
            Err(RepetitionFailure::Output)
        );
    }

    #[test]
    fn unshared_key_is_rejected() {
        let fx = fixture();
        let tapes = fx.seeds.map(|s| Tape::expand(&s, &fx.params));
        let result = MpcEngine::new(&fx.params).run(
            &SharedValue::from_plain(fx.key.clone()),
            &fx.plaintext,
            &tapes,
        );
        assert!(matches!(result, Err(FishError::InvalidParameters(_))));
    }

    #[test]
    fn truncated_view_is_malformed() {
        let fx = fixture();
        let out = run(&fx);
        let engine = MpcEngine::new(&fx.params);
        let expected = fx.params.encrypt(&fx.key, &fx.plaintext);
        let (first, second) = Party::P0.revealed();
        let mut a = opening(&fx, &out, first);
        let b = opening(&fx, &out, second);
        let mut entries = a.view.entries().to_vec();
        entries.pop();
        a.view = View::from_entries(entries);
        assert!(matches!(
            engine.verify(&fx.plaintext, Party::P0, [&a, &b], &out.output_shares, &expected),
            Err(RepetitionFailure::Malformed(_))
        ));
    }
}
