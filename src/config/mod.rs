pub mod replicator;

use std::fs;
use std::path::Path;

use crate::error::ConfigError;

pub use replicator::{BackupMode, Config, Endpoint, MongoConfig, PostgresConfig, Timeouts};

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Config::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Every paired field of an enabled backend must be non-empty.
    /// Disabled backends are skipped at run time, so they are not checked.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.postgres.enabled {
            check_pair("postgres", &self.postgres.origin, &self.postgres.target)?;
        }
        if self.mongo.enabled {
            check_pair("mongo", &self.mongo.origin, &self.mongo.target)?;
        }
        Ok(())
    }
}

fn check_pair(
    backend: &'static str,
    origin: &Endpoint,
    target: &Endpoint,
) -> Result<(), ConfigError> {
    for (side, endpoint) in [("origin", origin), ("target", target)] {
        let empty = endpoint
            .fields()
            .into_iter()
            .find(|(_, v)| v.trim().is_empty());
        if let Some((field, _)) = empty {
            return Err(ConfigError::MissingField {
                backend,
                field: format!("{}.{}", side, field),
            });
        }
    }
    Ok(())
}
