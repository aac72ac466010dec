use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use crate::{Error, Result};

/// Environment variables read by [`Config::from_env`].
pub const ENV_KEYS: &[&str] = &[
    "PGHOST",
    "PGPORT",
    "PGUSER",
    "PGPASSWORD",
    "PGDATABASE",
    "EXOQUIC_REPLICATION_USER",
    "EXOQUIC_REPLICATION_PASSWORD",
    "EXOQUIC_PUBLICATION_NAME",
    "EXOQUIC_SLOT_NAME",
    "EXOQUIC_API_KEY",
    "EXOQUIC_CLOUD_URL",
    "TABLES_TO_CAPTURE",
];

const DEFAULT_PORT: u16 = 5432;
const DEFAULT_REPLICATION_USER: &str = "exoquic_replication";
const DEFAULT_PUBLICATION: &str = "exoquic_publication";
const DEFAULT_SLOT_NAME: &str = "exoquic_replication_slot";
const DEFAULT_CLOUD_URL: &str = "https://api.exoquic.com";
const REGISTRATION_PATH: &str = "/api/postgres";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct Config {
    pub postgres: PostgresConfig,
    pub replication: ReplicationConfig,
    pub cloud: CloudConfig,
}

#[derive(Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

#[derive(Clone)]
pub struct ReplicationConfig {
    pub user: String,
    pub password: String,
    pub publication: String,
    pub slot_name: String,
    /// Tables to publish. Empty means all tables.
    pub tables: Vec<String>,
}

#[derive(Clone)]
pub struct CloudConfig {
    pub api_key: Option<String>,
    pub url: String,
}

/// The environment as the `config` crate hands it over: every key optional,
/// every value a string.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    pghost: Option<String>,
    pgport: Option<String>,
    pguser: Option<String>,
    pgpassword: Option<String>,
    pgdatabase: Option<String>,
    exoquic_replication_user: Option<String>,
    exoquic_replication_password: Option<String>,
    exoquic_publication_name: Option<String>,
    exoquic_slot_name: Option<String>,
    exoquic_api_key: Option<String>,
    exoquic_cloud_url: Option<String>,
    tables_to_capture: Option<String>,
}

impl Config {
    /// Builds the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let source = std::env::vars()
            .filter(|(key, _)| ENV_KEYS.contains(&key.as_str()))
            .collect();
        Self::from_source(source)
    }

    /// Builds the configuration from an explicit key/value source using the
    /// same keys as the environment (`PGHOST`, `TABLES_TO_CAPTURE`, ...).
    ///
    /// Defaults are applied for every optional key. The result is not
    /// validated; call [`Config::validate`] before using it.
    pub fn from_source(source: config::Map<String, String>) -> Result<Self> {
        let source = source
            .into_iter()
            .map(|(key, value)| (key.to_lowercase(), value))
            .collect();

        let settings = config::Config::builder()
            .add_source(config::Environment::default().source(Some(source)))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        let raw: RawSettings = settings
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self> {
        let port = match non_empty(raw.pgport) {
            Some(port) => port.trim().parse::<u16>().map_err(|_| {
                Error::Config(format!("PGPORT must be a valid port number, got '{}'", port))
            })?,
            None => DEFAULT_PORT,
        };

        let postgres = PostgresConfig {
            host: raw.pghost.unwrap_or_default(),
            port,
            user: raw.pguser.unwrap_or_default(),
            password: raw.pgpassword.unwrap_or_default(),
            database: raw.pgdatabase.unwrap_or_default(),
        };

        let replication = ReplicationConfig {
            user: non_empty(raw.exoquic_replication_user)
                .unwrap_or_else(|| DEFAULT_REPLICATION_USER.to_string()),
            password: raw.exoquic_replication_password.unwrap_or_default(),
            publication: non_empty(raw.exoquic_publication_name)
                .unwrap_or_else(|| DEFAULT_PUBLICATION.to_string()),
            slot_name: non_empty(raw.exoquic_slot_name)
                .unwrap_or_else(|| DEFAULT_SLOT_NAME.to_string()),
            tables: raw
                .tables_to_capture
                .as_deref()
                .map(parse_table_list)
                .unwrap_or_default(),
        };

        let cloud = CloudConfig {
            api_key: non_empty(raw.exoquic_api_key),
            url: non_empty(raw.exoquic_cloud_url).unwrap_or_else(|| DEFAULT_CLOUD_URL.to_string()),
        };

        Ok(Self {
            postgres,
            replication,
            cloud,
        })
    }

    /// Checks that every required field is present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("PGHOST", &self.postgres.host),
            ("PGUSER", &self.postgres.user),
            ("PGPASSWORD", &self.postgres.password),
            ("PGDATABASE", &self.postgres.database),
            ("EXOQUIC_REPLICATION_PASSWORD", &self.replication.password),
        ];

        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Config(format!(
                    "{} environment variable is required",
                    key
                )));
            }
        }

        Ok(())
    }

    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.postgres.host)
            .port(self.postgres.port)
            .user(&self.postgres.user)
            .password(&self.postgres.password)
            .dbname(&self.postgres.database)
            .application_name(env!("CARGO_PKG_NAME"))
            .connect_timeout(CONNECT_TIMEOUT);
        pg
    }

    pub fn registration_url(&self) -> String {
        format!("{}{}", self.cloud.url.trim_end_matches('/'), REGISTRATION_PATH)
    }
}

/// Splits a comma-separated table list, trimming each entry and dropping
/// empty entries and duplicates.
pub fn parse_table_list(input: &str) -> Vec<String> {
    let mut tables: Vec<String> = Vec::new();
    for table in input.split(',').map(str::trim) {
        if !table.is_empty() && !tables.iter().any(|t| t == table) {
            tables.push(table.to_string());
        }
    }
    tables
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

const REDACTED: &str = "<redacted>";

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("postgres", &self.postgres)
            .field("replication", &self.replication)
            .field("cloud", &self.cloud)
            .finish()
    }
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &REDACTED)
            .field("database", &self.database)
            .finish()
    }
}

impl fmt::Debug for ReplicationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicationConfig")
            .field("user", &self.user)
            .field("password", &REDACTED)
            .field("publication", &self.publication)
            .field("slot_name", &self.slot_name)
            .field("tables", &self.tables)
            .finish()
    }
}

impl fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("url", &self.url)
            .finish()
    }
}
