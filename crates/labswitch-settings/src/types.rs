use std::path::PathBuf;
use std::time::Duration;

use labswitch_core::ids::ChatId;
use labswitch_core::security::{BotToken, Credentials};
use labswitch_core::Locale;
use labswitch_telemetry::LogFormat;

/// Store location meaning "no file, keep everything in memory".
pub const IN_MEMORY_STORE: &str = ":memory:";

/// Fully validated process configuration.
#[derive(Clone, Debug)]
pub struct Settings {
    pub telegram: TelegramSettings,
    pub awx: AwxSettings,
    pub store: StoreSettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub locale: Locale,
}

#[derive(Clone, Debug)]
pub struct TelegramSettings {
    pub api_token: BotToken,
    /// The only chat allowed to issue commands.
    pub chat_id: ChatId,
    pub api_url: String,
    pub poll_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct AwxSettings {
    /// API base, e.g. `https://awx.example.com/api/v2`.
    pub url: String,
    pub credentials: Credentials,
    pub start_job: String,
    pub stop_job: String,
    pub insecure_tls: bool,
    pub timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreSettings {
    /// Directory holding the database file, or `:memory:`.
    pub url: String,
    /// Database name; the file is `<url>/<database>.db`.
    pub database: String,
    /// Collection (table) holding session records.
    pub collection: String,
}

impl StoreSettings {
    /// Path of the SQLite file, or `None` for an in-memory store.
    pub fn database_path(&self) -> Option<PathBuf> {
        if self.url == IN_MEMORY_STORE {
            return None;
        }
        Some(PathBuf::from(&self.url).join(format!("{}.db", self.database)))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSettings {
    pub health_port: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: tracing::Level,
    pub format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: &str) -> StoreSettings {
        StoreSettings {
            url: url.into(),
            database: "labswitch".into(),
            collection: "registries".into(),
        }
    }

    #[test]
    fn database_path_joins_name() {
        assert_eq!(
            store("/var/lib/labswitch").database_path(),
            Some(PathBuf::from("/var/lib/labswitch/labswitch.db"))
        );
    }

    #[test]
    fn in_memory_has_no_path() {
        assert_eq!(store(":memory:").database_path(), None);
    }
}
