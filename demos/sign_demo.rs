use lowmc_fish::{
    generate_keys, sign, verify, Challenge, Entropy, Parameters, Party, Preset, ProofBuilder,
    Statement, Verifier,
};

fn main() {
    let params = Parameters::from_preset(Preset::Test).expect("test preset is valid");
    let (private_key, public_key) = generate_keys(&params).expect("key generation");
    let signature = sign(&params, &private_key, b"demo").expect("signing");
    println!(
        "signed {} bytes with {} repetitions",
        signature.len(),
        params.repetitions()
    );
    if let Err(err) = verify(&params, &public_key, b"demo", &signature) {
        eprintln!("Signature verification failed: {err}");
        std::process::exit(1);
    }
    println!("Signature verified successfully.");

    // Interactive three-move run of the same proof.
    let statement = Statement::public(params.zero_plaintext(), public_key.bits().clone());
    let state = ProofBuilder::new(&params)
        .commit(private_key.bits(), &statement, &mut Entropy::os())
        .expect("first move");
    let first_move = state.commitments().to_vec();
    let challenge = Challenge::new(
        (0..params.repetitions())
            .map(|i| Party::ALL[i % Party::ALL.len()])
            .collect(),
    );
    let proof = state.open(&challenge).expect("opening");
    match Verifier::new(&params).verify_with_challenge(&statement, &first_move, &challenge, &proof)
    {
        Ok(()) => println!("Interactive proof accepted."),
        Err(err) => {
            eprintln!("Interactive proof rejected: {err}");
            std::process::exit(1);
        }
    }
}
