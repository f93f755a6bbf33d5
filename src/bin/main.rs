//! E-ARK SIP to AIP Conversion CLI
//!
//! Command-line tool converting one SIP directory into an AIP. Prints the
//! new package name on success; logs to a daily-rolling file.

use std::path::PathBuf;
use std::process;

use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use eark_aip::{transform_package, TransformOptions};

#[derive(Parser)]
#[command(name = "eark-aip")]
#[command(about = "Convert an E-ARK SIP directory into an AIP")]
#[command(version)]
struct Cli {
    /// SIP directory to convert
    sip_dir: PathBuf,

    /// Directory the AIP is created in
    output_dir: PathBuf,

    /// Directory for the rolling log file
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version requests succeed; anything else is an
            // invalid invocation
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    let file_appender = tracing_appender::rolling::daily(&cli.log_dir, "eark-aip.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    match transform_package(&cli.sip_dir, &cli.output_dir, &TransformOptions::default()) {
        Ok(aip_name) => println!("{}", aip_name),
        Err(e) => {
            tracing::error!(error = %e, "transformation failed");
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}
