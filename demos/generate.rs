//! Generates a signature file for a given source file.
//!
//! Usage: `cargo run --example generate -- <source> <result> [sample-size-bytes]`
//!
//! Logging verbosity follows `RUST_LOG` (e.g. `RUST_LOG=filesig=debug`).

use std::env;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use filesig::{SignatureSettings, generate_signature};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let (Some(source), Some(result)) = (args.next(), args.next()) else {
        eprintln!("usage: generate <source> <result> [sample-size-bytes]");
        return ExitCode::FAILURE;
    };

    let mut settings = SignatureSettings::new(source, result);
    if let Some(sample) = args.next() {
        match sample.parse() {
            Ok(size) => settings = settings.with_sample_size(size),
            Err(_) => {
                eprintln!("sample size must be a byte count, got {sample:?}");
                return ExitCode::FAILURE;
            }
        }
    }

    match generate_signature(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
