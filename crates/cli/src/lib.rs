pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pricebot_core::signature::SignatureMethod;

#[derive(Debug, Parser)]
#[command(
    name = "pricebot",
    about = "Pricebot operator CLI",
    long_about = "Inspect configuration, check readiness, sign test payloads, and dry-run webhook batches.",
    after_help = "Examples:\n  pricebot doctor --json\n  pricebot config\n  pricebot sign --secret s3cret payload.json\n  pricebot simulate payload.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config and Messenger credential readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Compute the signature header the platform would send for a payload file")]
    Sign {
        #[arg(long, help = "App secret to sign with (defaults to messenger.app_secret)")]
        secret: Option<String>,
        #[arg(long, default_value = "sha1", help = "Digest method: sha1 or sha256")]
        method: SignatureMethod,
        file: PathBuf,
    },
    #[command(about = "Plan replies for a webhook payload file without calling external services")]
    Simulate {
        file: PathBuf,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Sign { secret, method, file } => {
            commands::sign::run(secret.as_deref(), method, &file)
        }
        Command::Simulate { file, json } => commands::simulate::run(&file, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
