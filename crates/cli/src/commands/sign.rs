use std::fs;
use std::path::Path;

use pricebot_core::{
    config::{AppConfig, LoadOptions},
    signature::{sign, SignatureMethod},
};
use secrecy::ExposeSecret;

use super::CommandResult;

/// Prints `<header>: <method>=<digest>` for the file contents, byte for byte.
pub fn run(secret: Option<&str>, method: SignatureMethod, file: &Path) -> CommandResult {
    let body = match fs::read(file) {
        Ok(body) => body,
        Err(error) => {
            return CommandResult::failure(
                "sign",
                "io",
                format!("could not read `{}`: {error}", file.display()),
                3,
            )
        }
    };

    let secret = match secret {
        Some(secret) => secret.to_string(),
        None => match AppConfig::load(LoadOptions::default()) {
            Ok(config) => config.messenger.app_secret.expose_secret().to_string(),
            Err(error) => {
                return CommandResult::failure(
                    "sign",
                    "config_validation",
                    format!("no --secret given and config did not load: {error}"),
                    2,
                )
            }
        },
    };

    let signature = sign(&body, secret.as_bytes(), method);
    CommandResult { exit_code: 0, output: format!("{}: {signature}", method.header_name()) }
}
