//! Demo front-end standing in for the upload collaborator: reads an image
//! file, runs the extraction pipeline, prints the outcome.
//!
//! Exit codes: 0 = detected, 1 = undetected (manual-entry fallback),
//! 2 = cannot process the input.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use qrlift::{platform, Extractor, PlatformProfile};

#[derive(Parser)]
#[command(name = "qrlift", version, about = "Extract a QR payload from a photograph")]
struct Args {
    /// Image file to scan (JPEG, PNG, WebP).
    image: PathBuf,

    /// Force a device class instead of probing the host.
    #[arg(long, value_parser = ["mobile", "mobile-constrained", "desktop"])]
    device_class: Option<String>,

    /// Print the full result as JSON, attempt trace included.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(qrlift::config::default_log_filter())),
        )
        .init();

    let args = Args::parse();

    let profile = match args.device_class.as_deref() {
        Some("mobile") => PlatformProfile::mobile(false),
        Some("mobile-constrained") => PlatformProfile::mobile(true),
        Some("desktop") => PlatformProfile::desktop(),
        _ => platform::resolve(),
    };

    let bytes = match std::fs::read(&args.image) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("qrlift: cannot read {}: {e}", args.image.display());
            return ExitCode::from(2);
        }
    };

    match Extractor::new(profile).extract(&bytes) {
        Ok(result) => {
            if args.json {
                match serde_json::to_string_pretty(&result) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("qrlift: {e}");
                        return ExitCode::from(2);
                    }
                }
            } else if let Some(content) = &result.content {
                println!("{content}");
            } else {
                eprintln!(
                    "qrlift: no QR code detected after {} attempts — enter the payload manually",
                    result.attempts.len()
                );
            }
            if result.is_detected() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("qrlift: cannot process image: {e}");
            ExitCode::from(2)
        }
    }
}
