//! Minimal CLI for the Fish signature scheme.
//!
//! Keys and signatures are stored as hex text files.  The LowMC instance is
//! chosen with `--preset` (default `l1`) or loaded from a JSON configuration
//! with `--config`.

use lowmc_fish::{
    generate_keys_with_stats, sign_with_stats, signing_entropy, verify_with_stats, Entropy,
    FishError, Parameters, Preset, PrivateKey, PublicKey, SchemeConfig,
};
use std::{env, fs, path::PathBuf, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn fatal(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn print_help() {
    println!("Usage: fish [--preset <l1|l3|l5|test> | --config <file.json>] <command> ...");
    println!("  keygen [--out <prefix>]");
    println!("  sign --key <sk.hex> (--message <text> | --message-file <path>) [--out <sig.hex>]");
    println!("  verify --pub <pk.hex> (--message <text> | --message-file <path>) --sig <sig.hex>");
    println!("  bench [--iterations <N>] [--json]");
    println!("  config");
}

/// Flags shared by every command plus the command-specific ones.
#[derive(Default)]
struct Options {
    preset: Option<Preset>,
    config: Option<PathBuf>,
    out: Option<PathBuf>,
    key: Option<PathBuf>,
    public: Option<PathBuf>,
    sig: Option<PathBuf>,
    message: Option<Vec<u8>>,
    iterations: usize,
    json: bool,
}

impl Options {
    fn parse(args: Vec<String>) -> (Option<String>, Self) {
        let mut options = Options {
            iterations: 3,
            ..Options::default()
        };
        let mut command = None;
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .unwrap_or_else(|| fatal(&format!("{flag} expects a value")))
            };
            match arg.as_str() {
                "--preset" => {
                    let name = value("--preset");
                    options.preset = Some(
                        name.parse()
                            .unwrap_or_else(|err: FishError| fatal(&err.to_string())),
                    );
                }
                "--config" => options.config = Some(PathBuf::from(value("--config"))),
                "--out" => options.out = Some(PathBuf::from(value("--out"))),
                "--key" => options.key = Some(PathBuf::from(value("--key"))),
                "--pub" => options.public = Some(PathBuf::from(value("--pub"))),
                "--sig" => options.sig = Some(PathBuf::from(value("--sig"))),
                "--message" => options.message = Some(value("--message").into_bytes()),
                "--message-file" => {
                    let path = value("--message-file");
                    options.message = Some(
                        fs::read(&path)
                            .unwrap_or_else(|err| fatal(&format!("failed to read {path}: {err}"))),
                    );
                }
                "--iterations" => {
                    options.iterations = value("--iterations")
                        .parse()
                        .unwrap_or_else(|_| fatal("invalid --iterations value"));
                }
                "--json" => options.json = true,
                "-h" | "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                other if other.starts_with("--") => fatal(&format!("unknown argument: {other}")),
                other if command.is_none() => command = Some(other.to_string()),
                other => fatal(&format!("unexpected argument: {other}")),
            }
        }
        (command, options)
    }

    fn params(&self) -> Parameters {
        let config = match (&self.config, self.preset) {
            (Some(_), Some(_)) => fatal("--config and --preset are mutually exclusive"),
            (Some(path), None) => SchemeConfig::load(path)
                .unwrap_or_else(|err| fatal(&format!("failed to load {}: {err}", path.display()))),
            (None, preset) => SchemeConfig::preset(preset.unwrap_or(Preset::L1)),
        };
        Parameters::new(&config).unwrap_or_else(|err| fatal(&err.to_string()))
    }

    fn message(&self) -> &[u8] {
        self.message
            .as_deref()
            .unwrap_or_else(|| fatal("--message or --message-file is required"))
    }
}

fn read_text(path: &PathBuf) -> String {
    fs::read_to_string(path)
        .unwrap_or_else(|err| fatal(&format!("failed to read {}: {err}", path.display())))
}

fn write_text(path: &PathBuf, contents: &str) {
    fs::write(path, format!("{contents}\n"))
        .unwrap_or_else(|err| fatal(&format!("failed to write {}: {err}", path.display())));
}

fn ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

fn cmd_keygen(options: &Options) {
    let params = options.params();
    let mut entropy = Entropy::for_operation(params.randomness(), "keygen");
    let (private_key, public_key, stats) = generate_keys_with_stats(&params, &mut entropy)
        .unwrap_or_else(|err| fatal(&err.to_string()));
    match &options.out {
        Some(prefix) => {
            let sk_path = prefix.with_extension("sk");
            let pk_path = prefix.with_extension("pk");
            write_text(&sk_path, &private_key.to_hex());
            write_text(&pk_path, &public_key.to_hex());
            println!("private key: {}", sk_path.display());
            println!("public key:  {}", pk_path.display());
        }
        None => {
            println!("sk {}", private_key.to_hex());
            println!("pk {}", public_key.to_hex());
        }
    }
    tracing::info!(total_ms = ms(stats.total), "key pair generated");
}

fn cmd_sign(options: &Options) {
    let params = options.params();
    let key_path = options
        .key
        .as_ref()
        .unwrap_or_else(|| fatal("--key is required"));
    let private_key = PrivateKey::from_hex(&params, &read_text(key_path))
        .unwrap_or_else(|err| fatal(&err.to_string()));
    let message = options.message();
    let mut entropy = signing_entropy(&params, &private_key, message);
    let (signature, stats) = sign_with_stats(&params, &private_key, message, &mut entropy)
        .unwrap_or_else(|err| fatal(&err.to_string()));
    let encoded = hex::encode(&signature);
    match &options.out {
        Some(path) => write_text(path, &encoded),
        None => println!("{encoded}"),
    }
    tracing::info!(
        signature_size = stats.signature_size,
        total_ms = ms(stats.total),
        "message signed"
    );
}

fn cmd_verify(options: &Options) {
    let params = options.params();
    let pub_path = options
        .public
        .as_ref()
        .unwrap_or_else(|| fatal("--pub is required"));
    let sig_path = options
        .sig
        .as_ref()
        .unwrap_or_else(|| fatal("--sig is required"));
    let public_key = PublicKey::from_hex(&params, &read_text(pub_path))
        .unwrap_or_else(|err| fatal(&err.to_string()));
    let signature = hex::decode(read_text(sig_path).trim())
        .unwrap_or_else(|err| fatal(&format!("signature is not valid hex: {err}")));
    match verify_with_stats(&params, &public_key, options.message(), &signature) {
        Ok(stats) => {
            println!("signature valid");
            tracing::info!(total_ms = ms(stats.total), "signature verified");
        }
        Err(err) if err.is_rejection() => {
            println!("signature invalid: {err}");
            std::process::exit(2);
        }
        Err(err) => fatal(&err.to_string()),
    }
}

fn cmd_bench(options: &Options) {
    let params = options.params();
    if options.iterations == 0 {
        fatal("--iterations must be at least 1");
    }
    let mut entropy = Entropy::for_operation(params.randomness(), "bench");
    let (private_key, public_key, keygen) = generate_keys_with_stats(&params, &mut entropy)
        .unwrap_or_else(|err| fatal(&err.to_string()));
    if options.json {
        println!(
            "{}",
            serde_json::to_string(&keygen).unwrap_or_else(|err| fatal(&err.to_string()))
        );
    } else {
        println!("keygen: {:.3} ms", ms(keygen.total));
        println!(
            "{:>5} | {:>10} | {:>10} | {:>10} | {:>10} | {:>10}",
            "iter", "mpc(ms)", "commit(ms)", "sign(ms)", "verify(ms)", "size(B)"
        );
        println!("{}", "-".repeat(70));
    }
    for iteration in 0..options.iterations {
        let message = format!("bench message {iteration}");
        let (signature, sign_stats) =
            sign_with_stats(&params, &private_key, message.as_bytes(), &mut entropy)
                .unwrap_or_else(|err| fatal(&err.to_string()));
        let verify_stats = verify_with_stats(&params, &public_key, message.as_bytes(), &signature)
            .unwrap_or_else(|err| fatal(&format!("benchmark signature rejected: {err}")));
        if options.json {
            let row = serde_json::json!({
                "iteration": iteration,
                "sign": sign_stats,
                "verify": verify_stats,
            });
            println!("{row}");
        } else {
            println!(
                "{:>5} | {:>10.3} | {:>10.3} | {:>10.3} | {:>10.3} | {:>10}",
                iteration,
                ms(sign_stats.proof.mpc),
                ms(sign_stats.proof.commitments),
                ms(sign_stats.total),
                ms(verify_stats.total),
                sign_stats.signature_size
            );
        }
    }
}

fn cmd_config(options: &Options) {
    let params = options.params();
    let json = params
        .config()
        .to_json_string()
        .unwrap_or_else(|err| fatal(&err.to_string()));
    println!("{json}");
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (command, options) = Options::parse(env::args().skip(1).collect());
    match command.as_deref() {
        Some("keygen") => cmd_keygen(&options),
        Some("sign") => cmd_sign(&options),
        Some("verify") => cmd_verify(&options),
        Some("bench") => cmd_bench(&options),
        Some("config") => cmd_config(&options),
        Some(other) => {
            eprintln!("unknown command: {other}");
            print_help();
            std::process::exit(1);
        }
        None => {
            print_help();
            std::process::exit(1);
        }
    }
}
