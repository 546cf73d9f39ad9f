//! Runtime configuration.
//!
//! Connection and cluster settings come from `CH_*` environment variables and
//! are captured once into a [`Config`] value that is handed to the loader and
//! the engine. Nothing else in the workspace reads the process environment.

use crate::error::{CoreError, CoreResult};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the optional project file holding the default migrations path
pub const PROJECT_FILE: &str = "ch-migration.json";

/// Placeholder in migration scripts replaced by the configured cluster name
pub const CLUSTER_TOKEN: &str = "${CH_CLUSTER}";

/// Environment variable that enables cluster mode
pub const CLUSTER_VAR: &str = "CH_CLUSTER";

/// Database type selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DbType {
    /// ClickHouse over its HTTP interface (default)
    #[default]
    ClickHouse,
    /// Embedded DuckDB
    DuckDb,
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbType::ClickHouse => write!(f, "clickhouse"),
            DbType::DuckDb => write!(f, "duckdb"),
        }
    }
}

impl FromStr for DbType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clickhouse" => Ok(DbType::ClickHouse),
            "duckdb" => Ok(DbType::DuckDb),
            other => Err(CoreError::ConfigInvalid {
                message: format!("CH_BACKEND must be 'clickhouse' or 'duckdb', found '{other}'"),
            }),
        }
    }
}

/// Settings captured from the environment.
///
/// Connection fields stay optional here: `migration:create` and the loader
/// never need them, so a missing host only becomes an error when
/// [`Config::target`] is asked for a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Backend to connect to
    pub backend: DbType,
    /// `CH_HOST`
    pub host: Option<String>,
    /// `CH_PORT`
    pub port: Option<String>,
    /// `CH_USER`
    pub user: Option<String>,
    /// `CH_PASSWORD`, empty when unset
    pub password: String,
    /// `CH_DB`: database name, or the database file for DuckDB
    pub database: Option<String>,
    /// `CH_USE_TLS=true` switches the HTTP scheme to https
    pub use_tls: bool,
    /// `CH_CLUSTER`: enables cluster mode and `${CH_CLUSTER}` substitution
    pub cluster: Option<String>,
}

/// Everything needed to open a ClickHouse HTTP connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickHouseConnection {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub use_tls: bool,
}

impl ClickHouseConnection {
    /// Base URL of the HTTP interface, e.g. `https://ch.internal:8443/`
    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{}://{}:{}/", scheme, self.host, self.port)
    }
}

/// Validated connection target for the selected backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    ClickHouse(ClickHouseConnection),
    DuckDb { path: String },
}

impl Config {
    /// Capture configuration from the process environment.
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Capture configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match get("CH_BACKEND") {
            Some(v) => v.parse()?,
            None => DbType::default(),
        };
        let cluster = get(CLUSTER_VAR).map(|c| c.trim().to_string());
        if cluster.is_some() && backend == DbType::DuckDb {
            return Err(CoreError::ConfigInvalid {
                message: "CH_CLUSTER is only supported with the clickhouse backend".to_string(),
            });
        }

        Ok(Self {
            backend,
            host: get("CH_HOST"),
            port: get("CH_PORT"),
            user: get("CH_USER"),
            password: lookup("CH_PASSWORD").unwrap_or_default(),
            database: get("CH_DB"),
            use_tls: get("CH_USE_TLS").is_some_and(|v| v.trim() == "true"),
            cluster,
        })
    }

    /// Active cluster name, if cluster mode is on
    pub fn cluster(&self) -> Option<&str> {
        self.cluster.as_deref()
    }

    /// Validate the connection settings for the selected backend.
    pub fn target(&self) -> CoreResult<ConnectionTarget> {
        match self.backend {
            DbType::ClickHouse => {
                let host = required(&self.host, "CH_HOST")?;
                let user = required(&self.user, "CH_USER")?;
                let database = required(&self.database, "CH_DB")?;
                let port = required(&self.port, "CH_PORT")?;
                let port = port.trim().parse::<u16>().map_err(|_| CoreError::ConfigInvalid {
                    message: format!("CH_PORT must be a port number, found '{port}'"),
                })?;
                Ok(ConnectionTarget::ClickHouse(ClickHouseConnection {
                    host,
                    port,
                    user,
                    password: self.password.clone(),
                    database,
                    use_tls: self.use_tls,
                }))
            }
            DbType::DuckDb => Ok(ConnectionTarget::DuckDb {
                path: required(&self.database, "CH_DB")?,
            }),
        }
    }
}

fn required(value: &Option<String>, key: &str) -> CoreResult<String> {
    value
        .clone()
        .ok_or_else(|| CoreError::missing_connection(key))
}

/// Optional `ch-migration.json` in the working directory
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectFile {
    /// Default migrations directory
    #[serde(default)]
    pub path: Option<String>,
}

impl ProjectFile {
    /// Load `ch-migration.json` from `dir`, or an empty project file if absent.
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let path = dir.join(PROJECT_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| CoreError::ProjectFileParse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Pick the migrations directory: the CLI flag wins over the project file.
    pub fn resolve_migrations_path(&self, cli_path: Option<&str>) -> CoreResult<PathBuf> {
        cli_path
            .filter(|p| !p.is_empty())
            .or(self.path.as_deref().filter(|p| !p.is_empty()))
            .map(PathBuf::from)
            .ok_or_else(|| CoreError::ConfigInvalid {
                message: format!("--path=<folder> is required or must be defined in {PROJECT_FILE}"),
            })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
