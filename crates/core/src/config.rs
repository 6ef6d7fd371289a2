use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatch::{DispatchPolicy, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::intent::{IntentExtractor, DEFAULT_ASSET_ENTITY, DEFAULT_PRICE_ENTITY};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub messenger: MessengerConfig,
    pub nlp: NlpConfig,
    pub market: MarketConfig,
    pub dispatch: DispatchConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct MessengerConfig {
    pub app_secret: SecretString,
    pub validation_token: SecretString,
    pub page_access_token: SecretString,
    pub graph_api_base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct NlpConfig {
    pub wit_token: Option<SecretString>,
    pub asset_entity: String,
    pub price_entity: String,
    pub confidence_threshold: f64,
}

#[derive(Clone, Debug)]
pub struct MarketConfig {
    pub provider: MarketProvider,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DispatchConfig {
    pub reply_to_attachments: bool,
    pub unsupported_attachment_text: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub public_url: Option<String>,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketProvider {
    #[serde(alias = "coinmarketcap")]
    CoinMarketCap,
    #[serde(alias = "coingecko")]
    CoinGecko,
}

impl MarketProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CoinMarketCap => "coinmarketcap",
            Self::CoinGecko => "coingecko",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::CoinMarketCap => "https://api.coinmarketcap.com",
            Self::CoinGecko => "https://api.coingecko.com",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub app_secret: Option<String>,
    pub validation_token: Option<String>,
    pub page_access_token: Option<String>,
    pub graph_api_base_url: Option<String>,
    pub market_provider: Option<MarketProvider>,
    pub market_base_url: Option<String>,
    pub confidence_threshold: Option<f64>,
    pub reply_to_attachments: Option<bool>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            messenger: MessengerConfig {
                app_secret: String::new().into(),
                validation_token: String::new().into(),
                page_access_token: String::new().into(),
                graph_api_base_url: "https://graph.facebook.com/v2.6".to_string(),
                timeout_secs: 5,
            },
            nlp: NlpConfig {
                wit_token: None,
                asset_entity: DEFAULT_ASSET_ENTITY.to_string(),
                price_entity: DEFAULT_PRICE_ENTITY.to_string(),
                confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            },
            market: MarketConfig {
                provider: MarketProvider::CoinMarketCap,
                base_url: None,
                timeout_secs: 5,
            },
            dispatch: DispatchConfig {
                reply_to_attachments: false,
                unsupported_attachment_text: "Sorry, I can only understand text messages."
                    .to_string(),
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 5000,
                public_url: None,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for MarketProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "coinmarketcap" | "coin_market_cap" => Ok(Self::CoinMarketCap),
            "coingecko" | "coin_gecko" => Ok(Self::CoinGecko),
            other => Err(ConfigError::Validation(format!(
                "unsupported market provider `{other}` (expected coinmarketcap|coingecko)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl MarketConfig {
    pub fn resolved_base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or_else(|| self.provider.default_base_url())
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pricebot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            confidence_threshold: self.nlp.confidence_threshold,
            reply_to_attachments: self.dispatch.reply_to_attachments,
        }
    }

    pub fn intent_extractor(&self) -> IntentExtractor {
        IntentExtractor::new(self.nlp.asset_entity.clone(), self.nlp.price_entity.clone())
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(messenger) = patch.messenger {
            if let Some(app_secret) = messenger.app_secret {
                self.messenger.app_secret = secret_value(app_secret);
            }
            if let Some(validation_token) = messenger.validation_token {
                self.messenger.validation_token = secret_value(validation_token);
            }
            if let Some(page_access_token) = messenger.page_access_token {
                self.messenger.page_access_token = secret_value(page_access_token);
            }
            if let Some(graph_api_base_url) = messenger.graph_api_base_url {
                self.messenger.graph_api_base_url = graph_api_base_url;
            }
            if let Some(timeout_secs) = messenger.timeout_secs {
                self.messenger.timeout_secs = timeout_secs;
            }
        }

        if let Some(nlp) = patch.nlp {
            if let Some(wit_token) = nlp.wit_token {
                self.nlp.wit_token = Some(secret_value(wit_token));
            }
            if let Some(asset_entity) = nlp.asset_entity {
                self.nlp.asset_entity = asset_entity;
            }
            if let Some(price_entity) = nlp.price_entity {
                self.nlp.price_entity = price_entity;
            }
            if let Some(confidence_threshold) = nlp.confidence_threshold {
                self.nlp.confidence_threshold = confidence_threshold;
            }
        }

        if let Some(market) = patch.market {
            if let Some(provider) = market.provider {
                self.market.provider = provider;
            }
            if let Some(base_url) = market.base_url {
                self.market.base_url = Some(base_url);
            }
            if let Some(timeout_secs) = market.timeout_secs {
                self.market.timeout_secs = timeout_secs;
            }
        }

        if let Some(dispatch) = patch.dispatch {
            if let Some(reply_to_attachments) = dispatch.reply_to_attachments {
                self.dispatch.reply_to_attachments = reply_to_attachments;
            }
            if let Some(text) = dispatch.unsupported_attachment_text {
                self.dispatch.unsupported_attachment_text = text;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(public_url) = server.public_url {
                self.server.public_url = Some(public_url);
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let app_secret = read_env("PRICEBOT_MESSENGER_APP_SECRET")
            .or_else(|| read_env("MESSENGER_APP_SECRET"));
        if let Some(value) = app_secret {
            self.messenger.app_secret = secret_value(value);
        }
        let validation_token = read_env("PRICEBOT_MESSENGER_VALIDATION_TOKEN")
            .or_else(|| read_env("MESSENGER_VALIDATION_TOKEN"));
        if let Some(value) = validation_token {
            self.messenger.validation_token = secret_value(value);
        }
        let page_access_token = read_env("PRICEBOT_MESSENGER_PAGE_ACCESS_TOKEN")
            .or_else(|| read_env("MESSENGER_PAGE_ACCESS_TOKEN"));
        if let Some(value) = page_access_token {
            self.messenger.page_access_token = secret_value(value);
        }
        if let Some(value) = read_env("PRICEBOT_MESSENGER_GRAPH_API_BASE_URL") {
            self.messenger.graph_api_base_url = value;
        }
        if let Some(value) = read_env("PRICEBOT_MESSENGER_TIMEOUT_SECS") {
            self.messenger.timeout_secs = parse_u64("PRICEBOT_MESSENGER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PRICEBOT_NLP_WIT_TOKEN") {
            self.nlp.wit_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("PRICEBOT_NLP_ASSET_ENTITY") {
            self.nlp.asset_entity = value;
        }
        if let Some(value) = read_env("PRICEBOT_NLP_PRICE_ENTITY") {
            self.nlp.price_entity = value;
        }
        if let Some(value) = read_env("PRICEBOT_NLP_CONFIDENCE_THRESHOLD") {
            self.nlp.confidence_threshold =
                parse_f64("PRICEBOT_NLP_CONFIDENCE_THRESHOLD", &value)?;
        }

        if let Some(value) = read_env("PRICEBOT_MARKET_PROVIDER") {
            self.market.provider = value.parse()?;
        }
        if let Some(value) = read_env("PRICEBOT_MARKET_BASE_URL") {
            self.market.base_url = Some(value);
        }
        if let Some(value) = read_env("PRICEBOT_MARKET_TIMEOUT_SECS") {
            self.market.timeout_secs = parse_u64("PRICEBOT_MARKET_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PRICEBOT_DISPATCH_REPLY_TO_ATTACHMENTS") {
            self.dispatch.reply_to_attachments =
                parse_bool("PRICEBOT_DISPATCH_REPLY_TO_ATTACHMENTS", &value)?;
        }

        if let Some(value) = read_env("PRICEBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PRICEBOT_SERVER_PORT") {
            self.server.port = parse_u16("PRICEBOT_SERVER_PORT", &value)?;
        } else if let Some(value) = read_env("PORT") {
            self.server.port = parse_u16("PORT", &value)?;
        }
        let public_url =
            read_env("PRICEBOT_SERVER_PUBLIC_URL").or_else(|| read_env("SERVER_URL"));
        if let Some(value) = public_url {
            self.server.public_url = Some(value);
        }
        if let Some(value) = read_env("PRICEBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PRICEBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("PRICEBOT_LOGGING_LEVEL").or_else(|| read_env("PRICEBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PRICEBOT_LOGGING_FORMAT").or_else(|| read_env("PRICEBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(app_secret) = overrides.app_secret {
            self.messenger.app_secret = secret_value(app_secret);
        }
        if let Some(validation_token) = overrides.validation_token {
            self.messenger.validation_token = secret_value(validation_token);
        }
        if let Some(page_access_token) = overrides.page_access_token {
            self.messenger.page_access_token = secret_value(page_access_token);
        }
        if let Some(graph_api_base_url) = overrides.graph_api_base_url {
            self.messenger.graph_api_base_url = graph_api_base_url;
        }
        if let Some(provider) = overrides.market_provider {
            self.market.provider = provider;
        }
        if let Some(base_url) = overrides.market_base_url {
            self.market.base_url = Some(base_url);
        }
        if let Some(confidence_threshold) = overrides.confidence_threshold {
            self.nlp.confidence_threshold = confidence_threshold;
        }
        if let Some(reply_to_attachments) = overrides.reply_to_attachments {
            self.dispatch.reply_to_attachments = reply_to_attachments;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_messenger(&self.messenger)?;
        validate_nlp(&self.nlp)?;
        validate_market(&self.market)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pricebot.toml"), PathBuf::from("config/pricebot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_messenger(messenger: &MessengerConfig) -> Result<(), ConfigError> {
    let required = [
        (
            "messenger.app_secret",
            &messenger.app_secret,
            "App Dashboard > Settings > Basic > App Secret",
        ),
        (
            "messenger.validation_token",
            &messenger.validation_token,
            "the Verify Token entered when subscribing the webhook",
        ),
        (
            "messenger.page_access_token",
            &messenger.page_access_token,
            "Messenger > Settings > Access Tokens",
        ),
    ];
    for (key, value, hint) in required {
        if value.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(format!("{key} is required. Get it from {hint}")));
        }
    }

    validate_http_url("messenger.graph_api_base_url", &messenger.graph_api_base_url)?;
    validate_timeout("messenger.timeout_secs", messenger.timeout_secs)
}

fn validate_nlp(nlp: &NlpConfig) -> Result<(), ConfigError> {
    if nlp.asset_entity.trim().is_empty() || nlp.price_entity.trim().is_empty() {
        return Err(ConfigError::Validation(
            "nlp.asset_entity and nlp.price_entity must not be empty".to_string(),
        ));
    }

    if !(0.0..1.0).contains(&nlp.confidence_threshold) {
        return Err(ConfigError::Validation(
            "nlp.confidence_threshold must be in range [0, 1)".to_string(),
        ));
    }

    Ok(())
}

fn validate_market(market: &MarketConfig) -> Result<(), ConfigError> {
    if let Some(base_url) = &market.base_url {
        validate_http_url("market.base_url", base_url)?;
    }
    validate_timeout("market.timeout_secs", market.timeout_secs)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    if let Some(public_url) = &server.public_url {
        validate_http_url("server.public_url", public_url)?;
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn validate_timeout(key: &str, timeout_secs: u64) -> Result<(), ConfigError> {
    if timeout_secs == 0 || timeout_secs > 60 {
        return Err(ConfigError::Validation(format!("{key} must be in range 1..=60")));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    messenger: Option<MessengerPatch>,
    nlp: Option<NlpPatch>,
    market: Option<MarketPatch>,
    dispatch: Option<DispatchPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct MessengerPatch {
    app_secret: Option<String>,
    validation_token: Option<String>,
    page_access_token: Option<String>,
    graph_api_base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NlpPatch {
    wit_token: Option<String>,
    asset_entity: Option<String>,
    price_entity: Option<String>,
    confidence_threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct MarketPatch {
    provider: Option<MarketProvider>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DispatchPatch {
    reply_to_attachments: Option<bool>,
    unsupported_attachment_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    public_url: Option<String>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
