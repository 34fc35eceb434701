use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ranking::RankingWeights;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub ranking: RankingWeights,
    pub dispatch: DispatchConfig,
    pub email: EmailConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DispatchConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub queue_capacity: usize,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    /// Webhook that accepts rendered emails. Unset means log-only delivery.
    pub endpoint: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// Explicit file; otherwise `tender.toml` then `config/tender.toml`.
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
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
            database: DatabaseConfig {
                url: "sqlite://tender.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            ranking: RankingWeights::default(),
            dispatch: DispatchConfig { max_attempts: 3, base_delay_ms: 200, queue_capacity: 1024 },
            email: EmailConfig { endpoint: None, api_key: None, timeout_secs: 10 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = resolve_config_path(options.config_path.as_deref()) {
            config.apply_patch(read_patch(&path)?);
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            assign(&mut self.database.url, database.url);
            assign(&mut self.database.max_connections, database.max_connections);
            assign(&mut self.database.timeout_secs, database.timeout_secs);
        }
        if let Some(ranking) = patch.ranking {
            assign(&mut self.ranking.price, ranking.price_weight);
            assign(&mut self.ranking.delivery, ranking.delivery_weight);
            assign(&mut self.ranking.quality, ranking.quality_weight);
            assign(&mut self.ranking.baseline, ranking.baseline_weight);
        }
        if let Some(dispatch) = patch.dispatch {
            assign(&mut self.dispatch.max_attempts, dispatch.max_attempts);
            assign(&mut self.dispatch.base_delay_ms, dispatch.base_delay_ms);
            assign(&mut self.dispatch.queue_capacity, dispatch.queue_capacity);
        }
        if let Some(email) = patch.email {
            if email.endpoint.is_some() {
                self.email.endpoint = email.endpoint;
            }
            if let Some(api_key) = email.api_key {
                self.email.api_key = Some(api_key.into());
            }
            assign(&mut self.email.timeout_secs, email.timeout_secs);
        }
        if let Some(logging) = patch.logging {
            assign(&mut self.logging.level, logging.level);
            assign(&mut self.logging.format, logging.format);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        env_into("TENDER_DATABASE_URL", &mut self.database.url)?;
        env_into("TENDER_DATABASE_MAX_CONNECTIONS", &mut self.database.max_connections)?;
        env_into("TENDER_DATABASE_TIMEOUT_SECS", &mut self.database.timeout_secs)?;

        env_into("TENDER_RANKING_PRICE_WEIGHT", &mut self.ranking.price)?;
        env_into("TENDER_RANKING_DELIVERY_WEIGHT", &mut self.ranking.delivery)?;
        env_into("TENDER_RANKING_QUALITY_WEIGHT", &mut self.ranking.quality)?;
        env_into("TENDER_RANKING_BASELINE_WEIGHT", &mut self.ranking.baseline)?;

        env_into("TENDER_DISPATCH_MAX_ATTEMPTS", &mut self.dispatch.max_attempts)?;
        env_into("TENDER_DISPATCH_BASE_DELAY_MS", &mut self.dispatch.base_delay_ms)?;
        env_into("TENDER_DISPATCH_QUEUE_CAPACITY", &mut self.dispatch.queue_capacity)?;

        if let Some(value) = read_env("TENDER_EMAIL_ENDPOINT") {
            self.email.endpoint = Some(value);
        }
        if let Some(value) = read_env("TENDER_EMAIL_API_KEY") {
            self.email.api_key = Some(value.into());
        }
        env_into("TENDER_EMAIL_TIMEOUT_SECS", &mut self.email.timeout_secs)?;

        env_into("TENDER_LOGGING_LEVEL", &mut self.logging.level)?;
        if let Some(value) = read_env("TENDER_LOGGING_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_ranking(&self.ranking)?;
        validate_dispatch(&self.dispatch)?;
        validate_email(&self.email)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tender.toml"), PathBuf::from("config/tender.toml")]
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

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_ranking(ranking: &RankingWeights) -> Result<(), ConfigError> {
    ranking.validate().map_err(|error| ConfigError::Validation(format!("ranking: {error}")))
}

fn validate_dispatch(dispatch: &DispatchConfig) -> Result<(), ConfigError> {
    if dispatch.max_attempts == 0 || dispatch.max_attempts > 10 {
        return Err(ConfigError::Validation(
            "dispatch.max_attempts must be in range 1..=10".to_string(),
        ));
    }

    if dispatch.queue_capacity == 0 {
        return Err(ConfigError::Validation(
            "dispatch.queue_capacity must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_email(email: &EmailConfig) -> Result<(), ConfigError> {
    if let Some(endpoint) = &email.endpoint {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ConfigError::Validation(
                "email.endpoint must start with http:// or https://".to_string(),
            ));
        }
    }

    let blank_key =
        email.api_key.as_ref().is_some_and(|value| value.expose_secret().trim().is_empty());
    if blank_key {
        return Err(ConfigError::Validation(
            "email.api_key must not be blank when provided".to_string(),
        ));
    }

    if email.timeout_secs == 0 || email.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "email.timeout_secs must be in range 1..=120".to_string(),
        ));
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

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn assign<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Parses `key` into `target` when the variable is set and non-blank.
fn env_into<T: FromStr>(key: &str, target: &mut T) -> Result<(), ConfigError> {
    if let Some(value) = read_env(key) {
        *target = value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.clone(),
        })?;
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    ranking: Option<RankingPatch>,
    dispatch: Option<DispatchPatch>,
    email: Option<EmailPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RankingPatch {
    price_weight: Option<Decimal>,
    delivery_weight: Option<Decimal>,
    quality_weight: Option<Decimal>,
    baseline_weight: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct DispatchPatch {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    queue_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct EmailPatch {
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
