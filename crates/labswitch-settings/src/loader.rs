//! Environment variable loading and validation.

use std::time::Duration;

use labswitch_core::ids::ChatId;
use labswitch_core::security::{BotToken, Credentials};
use labswitch_core::Locale;
use labswitch_telemetry::LogFormat;

use crate::errors::{Result, SettingsError};
use crate::types::*;

/// Names of every variable the loader reads.
pub mod env_vars {
    pub const TELEGRAM_API_TOKEN: &str = "TELEGRAM_API_TOKEN";
    pub const TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
    pub const AWX_URL: &str = "AWX_URL";
    pub const AWX_USER: &str = "AWX_USER";
    pub const AWX_PASS: &str = "AWX_PASS";
    pub const AWX_JOB_TEMPLATE_START: &str = "AWX_JOB_TEMPLATE_START";
    pub const AWX_JOB_TEMPLATE_STOP: &str = "AWX_JOB_TEMPLATE_STOP";
    pub const STORE_URL: &str = "STORE_URL";
    pub const STORE_DATABASE: &str = "STORE_DATABASE";
    pub const STORE_COLLECTION: &str = "STORE_COLLECTION";

    pub const HEALTH_PORT: &str = "HEALTH_PORT";
    pub const AWX_INSECURE_TLS: &str = "AWX_INSECURE_TLS";
    pub const AWX_TIMEOUT_SECS: &str = "AWX_TIMEOUT_SECS";
    pub const TELEGRAM_POLL_TIMEOUT_SECS: &str = "TELEGRAM_POLL_TIMEOUT_SECS";
    pub const TELEGRAM_API_URL: &str = "TELEGRAM_API_URL";
    pub const LOCALE: &str = "LABSWITCH_LOCALE";
    pub const LOG_LEVEL: &str = "LABSWITCH_LOG_LEVEL";
    pub const LOG_FORMAT: &str = "LABSWITCH_LOG_FORMAT";
}

const DEFAULT_HEALTH_PORT: u16 = 8080;
const DEFAULT_AWX_TIMEOUT_SECS: u64 = 30;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut reader = EnvReader::new(lookup);

        let api_token = reader.required(env_vars::TELEGRAM_API_TOKEN);
        let chat_id = reader.required(env_vars::TELEGRAM_CHAT_ID);
        let awx_url = reader.required(env_vars::AWX_URL);
        let awx_user = reader.required(env_vars::AWX_USER);
        let awx_pass = reader.required(env_vars::AWX_PASS);
        let start_job = reader.required(env_vars::AWX_JOB_TEMPLATE_START);
        let stop_job = reader.required(env_vars::AWX_JOB_TEMPLATE_STOP);
        let store_url = reader.required(env_vars::STORE_URL);
        let store_database = reader.required(env_vars::STORE_DATABASE);
        let store_collection = reader.required(env_vars::STORE_COLLECTION);
        reader.finish()?;

        let chat_id: ChatId = chat_id.parse().map_err(|e| SettingsError::Invalid {
            key: env_vars::TELEGRAM_CHAT_ID,
            reason: format!("not a chat id: {e}"),
        })?;

        let awx_url = validate_url(env_vars::AWX_URL, &awx_url)?;
        validate_database_name(&store_database)?;
        validate_collection_name(&store_collection)?;

        let health_port = match reader.optional(env_vars::HEALTH_PORT) {
            Some(v) => parse_u16_range(&v, 1, u16::MAX).ok_or_else(|| invalid(
                env_vars::HEALTH_PORT,
                format!("expected a port in 1..=65535, got {v}"),
            ))?,
            None => DEFAULT_HEALTH_PORT,
        };

        let insecure_tls = match reader.optional(env_vars::AWX_INSECURE_TLS) {
            Some(v) => parse_bool(&v)
                .ok_or_else(|| invalid(env_vars::AWX_INSECURE_TLS, format!("expected a boolean, got {v}")))?,
            None => true,
        };

        let awx_timeout = reader.optional_secs(env_vars::AWX_TIMEOUT_SECS, DEFAULT_AWX_TIMEOUT_SECS)?;
        let poll_timeout =
            reader.optional_secs(env_vars::TELEGRAM_POLL_TIMEOUT_SECS, DEFAULT_POLL_TIMEOUT_SECS)?;

        let api_url = match reader.optional(env_vars::TELEGRAM_API_URL) {
            Some(v) => validate_url(env_vars::TELEGRAM_API_URL, &v)?,
            None => DEFAULT_TELEGRAM_API_URL.to_string(),
        };

        let locale = match reader.optional(env_vars::LOCALE) {
            Some(v) => v.parse::<Locale>().map_err(|e| invalid(env_vars::LOCALE, e))?,
            None => Locale::default(),
        };

        let level = match reader.optional(env_vars::LOG_LEVEL) {
            Some(v) => v
                .parse::<tracing::Level>()
                .map_err(|_| invalid(env_vars::LOG_LEVEL, format!("unknown level: {v}")))?,
            None => tracing::Level::INFO,
        };

        let format = match reader.optional(env_vars::LOG_FORMAT) {
            Some(v) => v.parse::<LogFormat>().map_err(|e| invalid(env_vars::LOG_FORMAT, e))?,
            None => LogFormat::default(),
        };

        Ok(Settings {
            telegram: TelegramSettings {
                api_token: BotToken::new(api_token),
                chat_id,
                api_url,
                poll_timeout,
            },
            awx: AwxSettings {
                url: awx_url,
                credentials: Credentials::new(awx_user, awx_pass),
                start_job,
                stop_job,
                insecure_tls,
                timeout: awx_timeout,
            },
            store: StoreSettings {
                url: store_url,
                database: store_database,
                collection: store_collection,
            },
            server: ServerSettings { health_port },
            logging: LoggingSettings { level, format },
            locale,
        })
    }
}

/// Collects every missing required key before failing.
struct EnvReader<F> {
    lookup: F,
    missing: Vec<&'static str>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn new(lookup: F) -> Self {
        Self { lookup, missing: Vec::new() }
    }

    fn optional(&self, key: &'static str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&mut self, key: &'static str) -> String {
        match self.optional(key) {
            Some(v) => v,
            None => {
                self.missing.push(key);
                String::new()
            }
        }
    }

    fn optional_secs(&self, key: &'static str, default: u64) -> Result<Duration> {
        match self.optional(key) {
            Some(v) => parse_u64_range(&v, 1, 600)
                .map(Duration::from_secs)
                .ok_or_else(|| invalid(key, format!("expected seconds in 1..=600, got {v}"))),
            None => Ok(Duration::from_secs(default)),
        }
    }

    fn finish(&mut self) -> Result<()> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(SettingsError::Missing(std::mem::take(&mut self.missing)))
        }
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid { key, reason: reason.into() }
}

fn validate_url(key: &'static str, raw: &str) -> Result<String> {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        Ok(raw.trim_end_matches('/').to_string())
    } else {
        Err(invalid(key, format!("expected an http(s) URL, got {raw}")))
    }
}

fn validate_database_name(name: &str) -> Result<()> {
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(invalid(env_vars::STORE_DATABASE, format!("not a plain name: {name}")));
    }
    Ok(())
}

/// Collection names end up in SQL as table identifiers.
fn validate_collection_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(invalid(
            env_vars::STORE_COLLECTION,
            format!("expected [A-Za-z_][A-Za-z0-9_]*, got {name}"),
        ))
    }
}

/// Parse a string as a boolean (`true/false/1/0/yes/no/on/off`).
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
