//! Engine and store configuration.
//!
//! Both configs have working defaults, chainable `with_*` builders, and
//! deserialize from JSON with every key optional. Durations are written in
//! milliseconds (`*_ms` keys).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ident::Ident;
use crate::storage::SyncMode;

/// Configuration for an [`Engine`](crate::Engine).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use vectorbase_core::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_max_limit(100)
///     .with_embed_timeout(Duration::from_secs(2));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Limit used when a query does not give one.
    pub default_limit: usize,
    /// Larger limits are clamped to this.
    pub max_limit: usize,
    /// Longest a single embedding call may take.
    #[serde(rename = "embed_timeout_ms", with = "millis")]
    pub embed_timeout: Duration,
    /// Bound on a whole operation when run through `AsyncEngine`.
    #[serde(rename = "operation_timeout_ms", with = "millis")]
    pub operation_timeout: Duration,
    /// Table the resource catalog reads from.
    pub resource_table: String,
    /// Address column of the resource table.
    pub resource_address_column: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 1000,
            embed_timeout: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(30),
            resource_table: "resources".to_string(),
            resource_address_column: "pc".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_max_limit(mut self, limit: usize) -> Self {
        self.max_limit = limit;
        self
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Sets the resource table and its address column.
    pub fn with_resource_table(
        mut self,
        table: impl Into<String>,
        address_column: impl Into<String>,
    ) -> Self {
        self.resource_table = table.into();
        self.resource_address_column = address_column.into();
        self
    }

    /// Loads a config from a JSON file. Missing keys take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a config from `VECTORBASE_*` environment variables on top of
    /// the defaults.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `VECTORBASE_DEFAULT_LIMIT` | `default_limit` |
    /// | `VECTORBASE_MAX_LIMIT` | `max_limit` |
    /// | `VECTORBASE_EMBED_TIMEOUT_MS` | `embed_timeout` |
    /// | `VECTORBASE_OPERATION_TIMEOUT_MS` | `operation_timeout` |
    /// | `VECTORBASE_RESOURCE_TABLE` | `resource_table` |
    /// | `VECTORBASE_RESOURCE_ADDRESS_COLUMN` | `resource_address_column` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("VECTORBASE_DEFAULT_LIMIT") {
            config.default_limit = parse_var("VECTORBASE_DEFAULT_LIMIT", &v)?;
        }
        if let Some(v) = lookup("VECTORBASE_MAX_LIMIT") {
            config.max_limit = parse_var("VECTORBASE_MAX_LIMIT", &v)?;
        }
        if let Some(v) = lookup("VECTORBASE_EMBED_TIMEOUT_MS") {
            config.embed_timeout =
                Duration::from_millis(parse_var("VECTORBASE_EMBED_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = lookup("VECTORBASE_OPERATION_TIMEOUT_MS") {
            config.operation_timeout =
                Duration::from_millis(parse_var("VECTORBASE_OPERATION_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = lookup("VECTORBASE_RESOURCE_TABLE") {
            config.resource_table = v;
        }
        if let Some(v) = lookup("VECTORBASE_RESOURCE_ADDRESS_COLUMN") {
            config.resource_address_column = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks limits, timeouts, and resource identifiers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_limit == 0 || self.max_limit == 0 {
            return Err(ConfigError::Invalid("limits must be positive".into()));
        }
        if self.default_limit > self.max_limit {
            return Err(ConfigError::Invalid(format!(
                "default_limit {} exceeds max_limit {}",
                self.default_limit, self.max_limit
            )));
        }
        if self.embed_timeout.is_zero() || self.operation_timeout.is_zero() {
            return Err(ConfigError::Invalid("timeouts must be positive".into()));
        }
        Ident::new(self.resource_table.as_str())?;
        Ident::new(self.resource_address_column.as_str())?;
        Ok(())
    }
}

/// Configuration for a [`TableStore`](crate::storage::TableStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// WAL sync mode for durable stores.
    pub sync_mode: SyncMode,
    /// Longest a transaction waits for the store lock.
    #[serde(rename = "lock_timeout_ms", with = "millis")]
    pub lock_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sync_mode: SyncMode::Batched,
            lock_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    pub fn with_sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = mode;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
