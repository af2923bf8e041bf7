//! Byte layout of proofs and signatures.
//!
//! For every repetition, in order:
//!
//! | field                          | size                         |
//! |--------------------------------|------------------------------|
//! | revealed seeds                 | 2 × 16 bytes                 |
//! | revealed commitment randomness | 2 × 4 bytes                  |
//! | revealed views                 | 2 × `ceil((k + r·3m) / 8)`   |
//! | output shares                  | 3 × `ceil(n / 8)`            |
//! | hidden commitment              | 32 bytes                     |
//!
//! followed by the packed challenge (`ceil(2R / 8)` bytes) when it is embedded.
//! A view is packed as its key share followed by the low `3m` bits of every
//! round's gate outputs, least significant bit first, padded with zero bits.
//! Decoding checks the exact total length before reading anything, then
//! rejects nonzero padding bits and the unused challenge code point.

use crate::error::{FishError, Result};
use crate::gf2::BitVector;
use crate::params::Parameters;
use crate::prng::SEED_LEN;
use crate::proof::{Proof, RepetitionProof};
use crate::sharing::PARTY_COUNT;
use crate::view::{Challenge, Opening, View, COMMIT_RANDOMNESS_LEN, DIGEST_LEN};

/// Byte sizes of every field for one instance.
///
/// All sizes are computed once with overflow checks, so an oversized
/// configuration is refused instead of producing a wrapped length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofLayout {
    repetitions: usize,
    key_bits: usize,
    gate_bits: usize,
    rounds: usize,
    block_bits: usize,
    view_bytes: usize,
    repetition_bytes: usize,
    body_bytes: usize,
    challenge_bytes: usize,
}

impl ProofLayout {
    /// Layout for `params`; fails if any size overflows `usize`.
    pub fn new(params: &Parameters) -> Result<Self> {
        let repetitions = params.repetitions();
        let key_bits = params.key_size();
        let gate_bits = params.spec().sbox_bits();
        let rounds = params.round_count();
        let block_bits = params.block_size();
        let overflow = || {
            FishError::InvalidParameters(format!(
                "proof size for {repetitions} repetitions of {rounds} rounds overflows"
            ))
        };

        let view_bits = rounds
            .checked_mul(gate_bits)
            .and_then(|bits| bits.checked_add(key_bits))
            .ok_or_else(overflow)?;
        let view_bytes = BitVector::byte_len_for(view_bits);
        let share_bytes = BitVector::byte_len_for(block_bits);
        let repetition_bytes = view_bytes
            .checked_mul(2)
            .and_then(|views| {
                share_bytes
                    .checked_mul(PARTY_COUNT)
                    .and_then(|shares| views.checked_add(shares))
            })
            .and_then(|bytes| {
                bytes.checked_add(2 * SEED_LEN + 2 * COMMIT_RANDOMNESS_LEN + DIGEST_LEN)
            })
            .ok_or_else(overflow)?;
        let body_bytes = repetitions
            .checked_mul(repetition_bytes)
            .ok_or_else(overflow)?;
        let challenge_bytes = Challenge::packed_len(repetitions);
        body_bytes
            .checked_add(challenge_bytes)
            .ok_or_else(overflow)?;
        Ok(Self {
            repetitions,
            key_bits,
            gate_bits,
            rounds,
            block_bits,
            view_bytes,
            repetition_bytes,
            body_bytes,
            challenge_bytes,
        })
    }

    /// Bytes of one packed view.
    pub fn view_bytes(&self) -> usize {
        self.view_bytes
    }

    /// Bytes of one output share.
    pub fn share_bytes(&self) -> usize {
        BitVector::byte_len_for(self.block_bits)
    }

    /// Bytes of one repetition.
    pub fn repetition_bytes(&self) -> usize {
        self.repetition_bytes
    }

    /// Bytes of the challenge trailer.
    pub fn challenge_bytes(&self) -> usize {
        self.challenge_bytes
    }

    /// Total encoded length.
    pub fn total_bytes(&self, embed_challenge: bool) -> usize {
        if embed_challenge {
            self.body_bytes + self.challenge_bytes
        } else {
            self.body_bytes
        }
    }
}

/// Encodes `proof`, appending the challenge when `embed_challenge` is set.
pub fn encode(params: &Parameters, proof: &Proof, embed_challenge: bool) -> Result<Vec<u8>> {
    let layout = ProofLayout::new(params)?;
    if proof.repetitions.len() != layout.repetitions || proof.challenge.len() != layout.repetitions
    {
        return Err(FishError::InvalidParameters(format!(
            "proof has {} repetitions, instance expects {}",
            proof.repetitions.len(),
            layout.repetitions
        )));
    }
    let mut out = Vec::with_capacity(layout.total_bytes(embed_challenge));
    for repetition in &proof.repetitions {
        for opening in &repetition.revealed {
            out.extend_from_slice(&opening.seed);
        }
        for opening in &repetition.revealed {
            out.extend_from_slice(&opening.randomness);
        }
        for opening in &repetition.revealed {
            out.extend(pack_view(&layout, &opening.view)?);
        }
        for share in &repetition.output_shares {
            if share.len() != layout.block_bits {
                return Err(FishError::InvalidParameters("output share width".into()));
            }
            out.extend(share.to_le_bytes());
        }
        out.extend_from_slice(&repetition.hidden_commitment);
    }
    if embed_challenge {
        out.extend(proof.challenge.pack());
    }
    Ok(out)
}

/// Decodes a proof.
///
/// With `external == None` the challenge is read from the trailer; otherwise
/// the bytes must not carry a trailer and `external` is attached instead.
pub fn decode(params: &Parameters, bytes: &[u8], external: Option<&Challenge>) -> Result<Proof> {
    let layout = ProofLayout::new(params)?;
    let expected = layout.total_bytes(external.is_none());
    if bytes.len() != expected {
        return Err(FishError::MalformedProof(format!(
            "expected {expected} bytes, got {}",
            bytes.len()
        )));
    }
    let challenge = match external {
        Some(challenge) if challenge.len() != layout.repetitions => {
            return Err(FishError::InvalidParameters(format!(
                "challenge covers {} repetitions, instance expects {}",
                challenge.len(),
                layout.repetitions
            )));
        }
        Some(challenge) => challenge.clone(),
        None => Challenge::unpack(&bytes[layout.body_bytes..], layout.repetitions)?,
    };

    let mut reader = Reader::new(bytes);
    let mut repetitions = Vec::with_capacity(layout.repetitions);
    for idx in 0..layout.repetitions {
        let seeds = [reader.array()?, reader.array()?];
        let randomness = [reader.array()?, reader.array()?];
        let views = [
            unpack_view(&layout, reader.take(layout.view_bytes())?, idx)?,
            unpack_view(&layout, reader.take(layout.view_bytes())?, idx)?,
        ];
        let mut output_shares: [BitVector; PARTY_COUNT] = Default::default();
        for share in &mut output_shares {
            *share = BitVector::from_le_bytes_exact(
                layout.block_bits,
                reader.take(layout.share_bytes())?,
            )
            .ok_or_else(|| {
                FishError::MalformedProof(format!("repetition {idx}: output share padding"))
            })?;
        }
        let hidden_commitment = reader.array()?;
        let [view_a, view_b] = views;
        repetitions.push(RepetitionProof {
            revealed: [
                Opening {
                    seed: seeds[0],
                    randomness: randomness[0],
                    view: view_a,
                },
                Opening {
                    seed: seeds[1],
                    randomness: randomness[1],
                    view: view_b,
                },
            ],
            output_shares,
            hidden_commitment,
        });
    }
    Ok(Proof {
        repetitions,
        challenge,
    })
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| FishError::MalformedProof("unexpected end of proof".into()))?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

/// LSB-first bit sink over a fixed-size buffer.
struct BitWriter {
    bytes: Vec<u8>,
    position: usize,
}

impl BitWriter {
    fn new(byte_len: usize) -> Self {
        Self {
            bytes: vec![0u8; byte_len],
            position: 0,
        }
    }

    fn write(&mut self, value: &BitVector, bits: usize) {
        for bit in 0..bits {
            if value.get(bit) {
                self.bytes[self.position / 8] |= 1 << (self.position % 8);
            }
            self.position += 1;
        }
    }
}

/// LSB-first bit source over a byte slice.
struct BitReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn read(&mut self, bits: usize, width: usize) -> BitVector {
        let mut out = BitVector::zero(width);
        for bit in 0..bits {
            if (self.bytes[self.position / 8] >> (self.position % 8)) & 1 == 1 {
                out.set(bit, true);
            }
            self.position += 1;
        }
        out
    }

    fn padding_is_zero(&self) -> bool {
        if self.position % 8 == 0 {
            return true;
        }
        match self.bytes.last() {
            Some(last) => last >> (self.position % 8) == 0,
            None => true,
        }
    }
}

fn pack_view(layout: &ProofLayout, view: &View) -> Result<Vec<u8>> {
    let entries = view.entries();
    if entries.len() != layout.rounds + 1 {
        return Err(FishError::InvalidParameters(format!(
            "view has {} entries, instance expects {}",
            entries.len(),
            layout.rounds + 1
        )));
    }
    let mut writer = BitWriter::new(layout.view_bytes());
    writer.write(&entries[0], layout.key_bits);
    for entry in &entries[1..] {
        writer.write(entry, layout.gate_bits);
    }
    Ok(writer.bytes)
}

fn unpack_view(layout: &ProofLayout, bytes: &[u8], repetition: usize) -> Result<View> {
    let mut reader = BitReader::new(bytes);
    let mut entries = Vec::with_capacity(layout.rounds + 1);
    entries.push(reader.read(layout.key_bits, layout.key_bits));
    for _ in 0..layout.rounds {
        entries.push(reader.read(layout.gate_bits, layout.block_bits));
    }
    if !reader.padding_is_zero() {
        return Err(FishError::MalformedProof(format!(
            "repetition {repetition}: nonzero view padding"
        )));
    }
    Ok(View::from_entries(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Preset, SchemeConfig};
    use crate::prng::{Entropy, RandomnessSource};
    use crate::proof::{ProofBuilder, Statement};

    fn sample() -> (Parameters, Proof) {
        let config = SchemeConfig::preset(Preset::Test)
            .with_randomness(RandomnessSource::Seeded { seed: 21 });
        let params = Parameters::new(&config).unwrap();
        let mut entropy = Entropy::from_source(params.randomness());
        let key = entropy.random_vector(params.key_size()).unwrap();
        let statement = Statement::public(
            params.zero_plaintext(),
            params.encrypt(&key, &params.zero_plaintext()),
        );
        let proof = ProofBuilder::new(&params)
            .prove(&key, &statement, b"codec", &mut entropy)
            .unwrap();
        (params, proof)
    }

    #[test]
    fn layout_sizes_for_test_preset() {
        let params = Parameters::from_preset(Preset::Test).unwrap();
        let layout = ProofLayout::new(&params).unwrap();
        // 64 key bits + 4 rounds of 30 gate bits = 184 bits.
        assert_eq!(layout.view_bytes(), 23);
        assert_eq!(layout.share_bytes(), 8);
        assert_eq!(layout.repetition_bytes(), 32 + 8 + 46 + 24 + 32);
        assert_eq!(layout.challenge_bytes(), 4);
        assert_eq!(layout.total_bytes(true), 16 * 142 + 4);
    }

    #[test]
    fn oversized_configuration_is_refused() {
        let config = SchemeConfig::preset(Preset::Test).with_repetitions(usize::MAX);
        let huge = Parameters::new(&config).unwrap();
        assert!(matches!(
            ProofLayout::new(&huge),
            Err(FishError::InvalidParameters(_))
        ));
        assert!(matches!(
            decode(&huge, &[0u8; 16], None),
            Err(FishError::InvalidParameters(_))
        ));
        let mut many_rounds = SchemeConfig::preset(Preset::Test);
        many_rounds.lowmc.rounds = usize::MAX / 8;
        assert!(matches!(
            many_rounds.validate(),
            Err(FishError::InvalidParameters(_))
        ));
    }

    #[test]
    fn roundtrip_with_and_without_trailer() {
        let (params, proof) = sample();
        let embedded = encode(&params, &proof, true).unwrap();
        assert_eq!(decode(&params, &embedded, None).unwrap(), proof);
        let bare = encode(&params, &proof, false).unwrap();
        assert_eq!(bare.len() + 4, embedded.len());
        assert_eq!(decode(&params, &bare, Some(&proof.challenge)).unwrap(), proof);
    }

    #[test]
    fn wrong_length_is_rejected_before_parsing() {
        let (params, proof) = sample();
        let bytes = encode(&params, &proof, true).unwrap();
        for len in [0, 1, bytes.len() - 1] {
            assert!(matches!(
                decode(&params, &bytes[..len], None),
                Err(FishError::MalformedProof(_))
            ));
        }
        let mut longer = bytes.clone();
        longer.push(0);
        assert!(matches!(
            decode(&params, &longer, None),
            Err(FishError::MalformedProof(_))
        ));
    }

    #[test]
    fn nonzero_view_padding_is_rejected() {
        // The packed view is 184 bits, exactly 23 bytes, so widen the key to
        // force padding bits.
        let config = SchemeConfig {
            lowmc: crate::config::LowmcSpec {
                block_size: 64,
                key_size: 61,
                sbox_count: 10,
                rounds: 4,
            },
            repetitions: 4,
            randomness: RandomnessSource::Seeded { seed: 1 },
        };
        let params = Parameters::new(&config).unwrap();
        let layout = ProofLayout::new(&params).unwrap();
        let mut entropy = Entropy::from_source(params.randomness());
        let key = entropy.random_vector(61).unwrap();
        let statement = Statement::public(
            params.zero_plaintext(),
            params.encrypt(&key, &params.zero_plaintext()),
        );
        let proof = ProofBuilder::new(&params)
            .prove(&key, &statement, b"", &mut entropy)
            .unwrap();
        let mut bytes = encode(&params, &proof, true).unwrap();
        assert!(decode(&params, &bytes, None).is_ok());
        let last_view_byte = 2 * SEED_LEN + 2 * COMMIT_RANDOMNESS_LEN + layout.view_bytes() - 1;
        bytes[last_view_byte] |= 0x80;
        assert!(matches!(
            decode(&params, &bytes, None),
            Err(FishError::MalformedProof(_))
        ));
    }

    #[test]
    fn output_share_high_bits_are_strict() {
        let config = SchemeConfig {
            lowmc: crate::config::LowmcSpec {
                block_size: 62,
                key_size: 64,
                sbox_count: 10,
                rounds: 4,
            },
            repetitions: 4,
            randomness: RandomnessSource::Seeded { seed: 2 },
        };
        let params = Parameters::new(&config).unwrap();
        let layout = ProofLayout::new(&params).unwrap();
        let mut entropy = Entropy::from_source(params.randomness());
        let key = entropy.random_vector(64).unwrap();
        let statement = Statement::public(
            params.zero_plaintext(),
            params.encrypt(&key, &params.zero_plaintext()),
        );
        let proof = ProofBuilder::new(&params)
            .prove(&key, &statement, b"", &mut entropy)
            .unwrap();
        let mut bytes = encode(&params, &proof, true).unwrap();
        let share_end = 2 * SEED_LEN
            + 2 * COMMIT_RANDOMNESS_LEN
            + 2 * layout.view_bytes()
            + layout.share_bytes();
        bytes[share_end - 1] |= 0x80;
        assert!(matches!(
            decode(&params, &bytes, None),
            Err(FishError::MalformedProof(_))
        ));
    }

    #[test]
    fn invalid_challenge_code_is_rejected() {
        let (params, proof) = sample();
        let mut bytes = encode(&params, &proof, true).unwrap();
        let last = bytes.len() - 1;
        bytes[last] |= 0b1100_0000;
        assert!(matches!(
            decode(&params, &bytes, None),
            Err(FishError::MalformedProof(_))
        ));
    }
}
