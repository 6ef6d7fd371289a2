use std::env;
use std::io::Write;
use std::sync::{Mutex, OnceLock};

use pricebot_cli::commands::{config, doctor, sign, simulate};
use pricebot_core::signature::{self, SignatureMethod};
use serde_json::{json, Value};
use tempfile::NamedTempFile;

const VALID_ENV: [(&str, &str); 3] = [
    ("PRICEBOT_MESSENGER_APP_SECRET", "app-secret"),
    ("PRICEBOT_MESSENGER_VALIDATION_TOKEN", "verify-me"),
    ("PRICEBOT_MESSENGER_PAGE_ACCESS_TOKEN", "EAAGm0PX4ZCpsBAexample"),
];

#[test]
fn config_redacts_secrets_and_attributes_sources() {
    with_env(&VALID_ENV, || {
        let output = config::run();

        assert!(output.starts_with("effective config"));
        assert!(output.contains("- messenger.page_access_token = EAAG*** (source: env (PRICEBOT_MESSENGER_PAGE_ACCESS_TOKEN))"));
        assert!(output.contains("- messenger.app_secret = <redacted>"));
        assert!(!output.contains("app-secret"));
        assert!(!output.contains("verify-me"));
        assert!(output.contains("- server.port = 5000 (source: default)"));
    });
}

#[test]
fn config_accepts_legacy_env_names() {
    with_env(
        &[
            ("MESSENGER_APP_SECRET", "app-secret"),
            ("MESSENGER_VALIDATION_TOKEN", "verify-me"),
            ("MESSENGER_PAGE_ACCESS_TOKEN", "page-token"),
            ("PORT", "8080"),
        ],
        || {
            let output = config::run();
            assert!(output.contains("(source: env (MESSENGER_APP_SECRET))"));
            assert!(output.contains("- server.port = 8080 (source: env (PORT))"));
        },
    );
}

#[test]
fn config_reports_validation_failure_without_credentials() {
    with_env(&[], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed"));
        assert!(output.contains("messenger.app_secret"));
    });
}

#[test]
fn doctor_fails_and_skips_dependent_checks_without_credentials() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
    });
}

#[test]
fn doctor_warns_when_public_url_is_unset() {
    with_env(&VALID_ENV, || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "warn");
        let public_url = payload["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .find(|check| check["name"] == "public_url")
            .expect("public_url check");
        assert_eq!(public_url["status"], "warn");
    });
}

#[test]
fn doctor_passes_with_complete_config() {
    let mut vars = VALID_ENV.to_vec();
    vars.push(("SERVER_URL", "https://bot.example.com"));
    with_env(&vars, || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 0);
        assert!(result.output.starts_with("doctor: all readiness checks passed"));
        assert!(result.output.contains("https://bot.example.com/webhook"));
    });
}

#[test]
fn sign_output_verifies_against_the_file_contents() {
    let body = br#"{"object":"page","entry":[]}"#;
    let file = payload_file(body);

    for method in [SignatureMethod::Sha1, SignatureMethod::Sha256] {
        let result = sign::run(Some("app-secret"), method, file.path());
        assert_eq!(result.exit_code, 0);

        let (header, value) = result.output.split_once(": ").expect("header line");
        assert_eq!(header, method.header_name());
        assert!(signature::verify(body, Some(value), b"app-secret"));
        assert!(!signature::verify(body, Some(value), b"other-secret"));
    }
}

#[test]
fn sign_falls_back_to_configured_secret() {
    with_env(&VALID_ENV, || {
        let body = b"{}";
        let file = payload_file(body);

        let result = sign::run(None, SignatureMethod::Sha1, file.path());
        let (_, value) = result.output.split_once(": ").expect("header line");
        assert!(signature::verify(body, Some(value), b"app-secret"));
    });
}

#[test]
fn sign_reports_missing_file() {
    let result = sign::run(Some("s"), SignatureMethod::Sha1, "does/not/exist.json".as_ref());
    assert_eq!(result.exit_code, 3);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "sign");
    assert_eq!(payload["error_class"], "io");
}

#[test]
fn simulate_plans_replies_without_credentials() {
    with_env(&[], || {
        let body = json!({
            "object": "page",
            "entry": [{
                "id": "page-1",
                "time": 1,
                "messaging": [
                    {
                        "sender": { "id": "u1" },
                        "recipient": { "id": "page-1" },
                        "message": {
                            "mid": "mid.1",
                            "text": "eos price",
                            "nlp": { "entities": {
                                "cryptocurrency_type": [{ "value": "EOS", "confidence": 0.9 }],
                                "query_price": [{ "value": "price", "confidence": 0.85 }]
                            } }
                        }
                    },
                    { "sender": {}, "recipient": { "id": "page-1" }, "message": { "text": "hi" } },
                    { "sender": { "id": "u3" }, "recipient": { "id": "page-1" }, "read": { "watermark": 1 } }
                ]
            }]
        });
        let file = payload_file(&serde_json::to_vec(&body).expect("body"));

        let result = simulate::run(file.path(), true);
        assert_eq!(result.exit_code, 0);

        let report = parse_payload(&result.output);
        assert_eq!(report["policy"], "default");
        assert_eq!(report["yielded"], 1);
        assert_eq!(report["non_message"], 1);
        assert_eq!(report["malformed"], 1);
        assert_eq!(report["plan"]["actions"][0]["action"], "send_price_reply");
        assert_eq!(report["plan"]["actions"][0]["asset"], "eos");
        assert_eq!(report["replies"][0]["recipient_id"], "u1");
    });
}

#[test]
fn simulate_rejects_non_json_files() {
    let file = payload_file(b"not json");
    let result = simulate::run(file.path(), false);
    assert_eq!(result.exit_code, 4);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["error_class"], "malformed_payload");
}

fn payload_file(body: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(body).expect("write payload");
    file
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PRICEBOT_MESSENGER_APP_SECRET",
        "PRICEBOT_MESSENGER_VALIDATION_TOKEN",
        "PRICEBOT_MESSENGER_PAGE_ACCESS_TOKEN",
        "PRICEBOT_MESSENGER_GRAPH_API_BASE_URL",
        "PRICEBOT_MESSENGER_TIMEOUT_SECS",
        "MESSENGER_APP_SECRET",
        "MESSENGER_VALIDATION_TOKEN",
        "MESSENGER_PAGE_ACCESS_TOKEN",
        "PRICEBOT_NLP_WIT_TOKEN",
        "PRICEBOT_NLP_ASSET_ENTITY",
        "PRICEBOT_NLP_PRICE_ENTITY",
        "PRICEBOT_NLP_CONFIDENCE_THRESHOLD",
        "PRICEBOT_MARKET_PROVIDER",
        "PRICEBOT_MARKET_BASE_URL",
        "PRICEBOT_MARKET_TIMEOUT_SECS",
        "PRICEBOT_DISPATCH_REPLY_TO_ATTACHMENTS",
        "PRICEBOT_SERVER_BIND_ADDRESS",
        "PRICEBOT_SERVER_PORT",
        "PORT",
        "PRICEBOT_SERVER_PUBLIC_URL",
        "SERVER_URL",
        "PRICEBOT_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "PRICEBOT_LOGGING_LEVEL",
        "PRICEBOT_LOGGING_FORMAT",
        "PRICEBOT_LOG_LEVEL",
        "PRICEBOT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
