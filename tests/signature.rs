//! End-to-end signing and verification on the reduced test instance.

use lowmc_fish::{
    codec, generate_keys, is_valid, sign, verify, BitVector, Entropy, FishError, MpcEngine,
    Opening, Parameters, Party, Preset, RandomnessSource, SchemeConfig, SharedValue, Tape,
};

fn params() -> Parameters {
    Parameters::from_preset(Preset::Test).unwrap()
}

#[test]
fn signs_and_verifies_with_os_randomness() {
    let params = params();
    let (sk, pk) = generate_keys(&params).unwrap();
    let sig = sign(&params, &sk, b"test").unwrap();
    assert_eq!(
        sig.len(),
        codec::ProofLayout::new(&params).unwrap().total_bytes(true)
    );
    verify(&params, &pk, b"test", &sig).unwrap();
    assert!(is_valid(&params, &pk, b"test", &sig));
}

#[test]
fn signature_is_bound_to_the_message() {
    let params = params();
    let (sk, pk) = generate_keys(&params).unwrap();
    let sig = sign(&params, &sk, b"test").unwrap();
    let err = verify(&params, &pk, b"Test", &sig).unwrap_err();
    assert!(err.is_rejection(), "unexpected error {err:?}");
}

#[test]
fn empty_message_is_signable() {
    let params = params();
    let (sk, pk) = generate_keys(&params).unwrap();
    let sig = sign(&params, &sk, b"").unwrap();
    verify(&params, &pk, b"", &sig).unwrap();
}

#[test]
fn fresh_signatures_differ_but_both_verify() {
    let params = params();
    let (sk, pk) = generate_keys(&params).unwrap();
    let a = sign(&params, &sk, b"same").unwrap();
    let b = sign(&params, &sk, b"same").unwrap();
    assert_ne!(a, b);
    verify(&params, &pk, b"same", &a).unwrap();
    verify(&params, &pk, b"same", &b).unwrap();
}

#[test]
fn truncated_signature_is_malformed() {
    let params = params();
    let (sk, pk) = generate_keys(&params).unwrap();
    let sig = sign(&params, &sk, b"test").unwrap();
    assert!(matches!(
        verify(&params, &pk, b"test", &sig[..sig.len() - 1]),
        Err(FishError::MalformedProof(_))
    ));
    assert!(matches!(
        verify(&params, &pk, b"test", &[]),
        Err(FishError::MalformedProof(_))
    ));
}

#[test]
fn wrong_public_key_width_is_rejected() {
    let params = params();
    let (sk, _) = generate_keys(&params).unwrap();
    let sig = sign(&params, &sk, b"test").unwrap();
    let narrow = lowmc_fish::PublicKey::from_bits(BitVector::zero(32));
    assert!(matches!(
        verify(&params, &narrow, b"test", &sig),
        Err(FishError::InvalidParameters(_))
    ));
}

#[test]
fn seeded_configuration_is_reproducible_from_json() {
    let config = SchemeConfig::preset(Preset::Test)
        .with_randomness(RandomnessSource::Seeded { seed: 77 });
    let json = config.to_json_string().unwrap();
    let a = Parameters::new(&SchemeConfig::from_json_str(&json).unwrap()).unwrap();
    let b = Parameters::new(&config).unwrap();
    let (sk_a, pk_a) = generate_keys(&a).unwrap();
    let (sk_b, pk_b) = generate_keys(&b).unwrap();
    assert_eq!(pk_a, pk_b);
    assert_eq!(sign(&a, &sk_a, b"m").unwrap(), sign(&b, &sk_b, b"m").unwrap());
}

#[test]
fn every_hidden_party_choice_verifies_at_engine_level() {
    let params = params();
    let mut entropy = Entropy::seeded(31);
    let key = entropy.random_vector(params.key_size()).unwrap();
    let plaintext = entropy.random_vector(params.block_size()).unwrap();
    let expected = params.encrypt(&key, &plaintext);
    let shared = SharedValue::from_plain(key)
        .promote_to_shared(&mut entropy)
        .unwrap();
    let seeds: [[u8; 16]; 3] = [
        entropy.array().unwrap(),
        entropy.array().unwrap(),
        entropy.array().unwrap(),
    ];
    let tapes = seeds.map(|seed| Tape::expand(&seed, &params));
    let engine = MpcEngine::new(&params);
    let output = engine.run(&shared, &plaintext, &tapes).unwrap();
    assert_eq!(
        SharedValue::from_shares(output.output_shares.clone()).combine(),
        expected
    );
    for hidden in Party::ALL {
        let (first, second) = hidden.revealed();
        let open = |party: Party| Opening {
            seed: seeds[party.index()],
            randomness: [0u8; 4],
            view: output.views[party.index()].clone(),
        };
        let (a, b) = (open(first), open(second));
        assert_eq!(
            engine.verify(&plaintext, hidden, [&a, &b], &output.output_shares, &expected),
            Ok(())
        );
    }
}
