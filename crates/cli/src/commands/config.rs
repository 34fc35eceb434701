use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tender_core::config::AppConfig;
use toml::Value;

use crate::commands::{load_config, CommandResult};

/// Effective configuration, one line per key, with the source that won.
pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in effective_values(&config) {
        let source = field_source(
            entry.key,
            entry.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(entry.key, &entry.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn effective_values(config: &AppConfig) -> Vec<ConfigEntry> {
    vec![
        entry("database.url", &["TENDER_DATABASE_URL"], config.database.url.clone()),
        entry(
            "database.max_connections",
            &["TENDER_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        entry(
            "database.timeout_secs",
            &["TENDER_DATABASE_TIMEOUT_SECS"],
            config.database.timeout_secs.to_string(),
        ),
        entry(
            "ranking.price_weight",
            &["TENDER_RANKING_PRICE_WEIGHT"],
            config.ranking.price.to_string(),
        ),
        entry(
            "ranking.delivery_weight",
            &["TENDER_RANKING_DELIVERY_WEIGHT"],
            config.ranking.delivery.to_string(),
        ),
        entry(
            "ranking.quality_weight",
            &["TENDER_RANKING_QUALITY_WEIGHT"],
            config.ranking.quality.to_string(),
        ),
        entry(
            "ranking.baseline_weight",
            &["TENDER_RANKING_BASELINE_WEIGHT"],
            config.ranking.baseline.to_string(),
        ),
        entry(
            "dispatch.max_attempts",
            &["TENDER_DISPATCH_MAX_ATTEMPTS"],
            config.dispatch.max_attempts.to_string(),
        ),
        entry(
            "dispatch.base_delay_ms",
            &["TENDER_DISPATCH_BASE_DELAY_MS"],
            config.dispatch.base_delay_ms.to_string(),
        ),
        entry(
            "dispatch.queue_capacity",
            &["TENDER_DISPATCH_QUEUE_CAPACITY"],
            config.dispatch.queue_capacity.to_string(),
        ),
        entry(
            "email.endpoint",
            &["TENDER_EMAIL_ENDPOINT"],
            config.email.endpoint.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        entry(
            "email.api_key",
            &["TENDER_EMAIL_API_KEY"],
            redact_secret(config.email.api_key.as_ref()),
        ),
        entry(
            "email.timeout_secs",
            &["TENDER_EMAIL_TIMEOUT_SECS"],
            config.email.timeout_secs.to_string(),
        ),
        entry(
            "logging.level",
            &["TENDER_LOGGING_LEVEL"],
            config.logging.level.clone(),
        ),
        entry(
            "logging.format",
            &["TENDER_LOGGING_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

struct ConfigEntry {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

fn entry(key: &'static str, env_keys: &'static [&'static str], value: String) -> ConfigEntry {
    ConfigEntry { key, env_keys, value }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("tender.toml"), PathBuf::from("config/tender.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
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

/// Keeps at most a four character prefix of the key visible.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.len() <= 8 {
        return "<redacted>".to_string();
    }
    let prefix: String = trimmed.chars().take(4).collect();
    format!("{prefix}***")
}
