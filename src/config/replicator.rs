use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub postgres: PostgresConfig,
    pub mongo: MongoConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct PostgresConfig {
    pub enabled: bool,
    pub backup: BackupMode,
    pub origin: Endpoint,
    pub target: Endpoint,
    pub timeouts: Timeouts,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct MongoConfig {
    pub enabled: bool,
    pub backup: BackupMode,
    pub origin: Endpoint,
    pub target: Endpoint,
    pub timeouts: Timeouts,
}

/// What a replication pass carries over: everything, or only the structure.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackupMode {
    #[default]
    Full,
    Schema,
}

/// One side of a replication pass. The port stays textual, as written in the file.
#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Endpoint {
    pub host: String,
    pub user: String,
    pub password: String,
    pub port: String,
    pub database: String,
}

impl Endpoint {
    /// (field name, value) pairs in a fixed order, used for validation.
    pub fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("host", &self.host),
            ("user", &self.user),
            ("password", &self.password),
            ("port", &self.port),
            ("database", &self.database),
        ]
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

/// Optional bounds on blocking calls. Unset means wait indefinitely.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Timeouts {
    pub connect_secs: Option<u64>,
    pub tool_secs: Option<u64>,
}

impl Timeouts {
    pub fn connect(&self) -> Option<Duration> {
        self.connect_secs.map(Duration::from_secs)
    }

    pub fn tool(&self) -> Option<Duration> {
        self.tool_secs.map(Duration::from_secs)
    }
}
