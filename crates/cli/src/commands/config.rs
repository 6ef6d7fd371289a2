use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pricebot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let messenger = &config.messenger;
    let nlp = &config.nlp;
    let market = &config.market;
    let server = &config.server;

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut push = |key: &str, value: String, env_keys: &[&str]| {
        lines.push(render_line(key, &value, source(key, env_keys)));
    };

    push(
        "messenger.app_secret",
        redact_token(messenger.app_secret.expose_secret()),
        &["PRICEBOT_MESSENGER_APP_SECRET", "MESSENGER_APP_SECRET"],
    );
    push(
        "messenger.validation_token",
        redact_token(messenger.validation_token.expose_secret()),
        &["PRICEBOT_MESSENGER_VALIDATION_TOKEN", "MESSENGER_VALIDATION_TOKEN"],
    );
    push(
        "messenger.page_access_token",
        redact_token(messenger.page_access_token.expose_secret()),
        &["PRICEBOT_MESSENGER_PAGE_ACCESS_TOKEN", "MESSENGER_PAGE_ACCESS_TOKEN"],
    );
    push(
        "messenger.graph_api_base_url",
        messenger.graph_api_base_url.clone(),
        &["PRICEBOT_MESSENGER_GRAPH_API_BASE_URL"],
    );
    push(
        "messenger.timeout_secs",
        messenger.timeout_secs.to_string(),
        &["PRICEBOT_MESSENGER_TIMEOUT_SECS"],
    );

    let wit_token = if nlp.wit_token.is_some() { "<redacted>" } else { "<unset>" };
    push("nlp.wit_token", wit_token.to_string(), &["PRICEBOT_NLP_WIT_TOKEN"]);
    push("nlp.asset_entity", nlp.asset_entity.clone(), &["PRICEBOT_NLP_ASSET_ENTITY"]);
    push("nlp.price_entity", nlp.price_entity.clone(), &["PRICEBOT_NLP_PRICE_ENTITY"]);
    push(
        "nlp.confidence_threshold",
        nlp.confidence_threshold.to_string(),
        &["PRICEBOT_NLP_CONFIDENCE_THRESHOLD"],
    );

    push("market.provider", market.provider.as_str().to_string(), &["PRICEBOT_MARKET_PROVIDER"]);
    push("market.base_url", market.resolved_base_url().to_string(), &["PRICEBOT_MARKET_BASE_URL"]);
    push("market.timeout_secs", market.timeout_secs.to_string(), &["PRICEBOT_MARKET_TIMEOUT_SECS"]);

    push(
        "dispatch.reply_to_attachments",
        config.dispatch.reply_to_attachments.to_string(),
        &["PRICEBOT_DISPATCH_REPLY_TO_ATTACHMENTS"],
    );

    push("server.bind_address", server.bind_address.clone(), &["PRICEBOT_SERVER_BIND_ADDRESS"]);
    push("server.port", server.port.to_string(), &["PRICEBOT_SERVER_PORT", "PORT"]);
    push(
        "server.public_url",
        server.public_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        &["PRICEBOT_SERVER_PUBLIC_URL", "SERVER_URL"],
    );
    push(
        "server.graceful_shutdown_secs",
        server.graceful_shutdown_secs.to_string(),
        &["PRICEBOT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
    );

    push(
        "logging.level",
        config.logging.level.clone(),
        &["PRICEBOT_LOGGING_LEVEL", "PRICEBOT_LOG_LEVEL"],
    );
    push(
        "logging.format",
        format!("{:?}", config.logging.format),
        &["PRICEBOT_LOGGING_FORMAT", "PRICEBOT_LOG_FORMAT"],
    );

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("pricebot.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/pricebot.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the first four characters of long tokens so operators can tell them apart.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if trimmed.len() > 12 {
        if let Some(prefix) = trimmed.get(..4) {
            return format!("{prefix}***");
        }
    }

    "<redacted>".to_string()
}
