//! Migration script discovery and parsing.

use crate::checksum::content_hash;
use crate::config::{Config, CLUSTER_TOKEN, CLUSTER_VAR};
use crate::error::{CoreError, CoreResult};
use crate::splitter::split_statements;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// File extension of migration scripts
pub const MIGRATION_EXTENSION: &str = "sql";

/// Line separating the up section from the down section.
///
/// Matches `-- ROLLBACK BELOW --` in any case, with the trailing `--`
/// optional and surrounding whitespace ignored.
static ROLLBACK_MARKER: OnceLock<Regex> = OnceLock::new();

fn rollback_marker() -> &'static Regex {
    ROLLBACK_MARKER.get_or_init(|| {
        Regex::new(r"(?im)^[ \t]*--[ \t]*ROLLBACK[ \t]+BELOW[ \t]*(?:--)?[ \t]*\r?$")
            .expect("valid regex")
    })
}

/// A parsed migration script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// File name, e.g. `20250101120000_create_events.sql`
    pub filename: String,

    /// Statements above the rollback marker, never empty
    pub up_statements: Vec<String>,

    /// Statements below the rollback marker, empty when there is none
    pub down_statements: Vec<String>,

    /// SHA-256 of the substituted file text
    pub content_hash: String,
}

impl MigrationFile {
    /// Parse substituted script text.
    ///
    /// The hash covers the whole text, before it is cut into sections.
    pub fn parse(filename: impl Into<String>, text: &str) -> CoreResult<Self> {
        let filename = filename.into();
        let (up, down) = split_sections(text);

        let up_statements = split_statements(up);
        if up_statements.is_empty() {
            return Err(CoreError::InvalidMigration {
                filename,
                reason: "no statements above the rollback marker".to_string(),
            });
        }

        Ok(Self {
            up_statements,
            down_statements: down.map(split_statements).unwrap_or_default(),
            content_hash: content_hash(text),
            filename,
        })
    }

    /// Whether the script can be rolled back
    pub fn has_rollback(&self) -> bool {
        !self.down_statements.is_empty()
    }
}

/// Cut script text at the first rollback marker line.
fn split_sections(text: &str) -> (&str, Option<&str>) {
    match rollback_marker().find(text) {
        Some(m) => (&text[..m.start()], Some(&text[m.end()..])),
        None => (text, None),
    }
}

/// Replace `${CH_CLUSTER}` with the configured cluster name.
///
/// Text without the token passes through unchanged whether or not a
/// cluster is configured.
pub fn substitute_cluster(text: &str, cluster: Option<&str>, filename: &str) -> CoreResult<String> {
    if !text.contains(CLUSTER_TOKEN) {
        return Ok(text.to_string());
    }
    match cluster {
        Some(name) => Ok(text.replace(CLUSTER_TOKEN, name)),
        None => Err(CoreError::ConfigMissing {
            key: CLUSTER_VAR.to_string(),
            purpose: format!(" by {filename}, which uses {CLUSTER_TOKEN}"),
        }),
    }
}

/// Loads every migration script in a directory
#[derive(Debug, Clone)]
pub struct MigrationLoader {
    dir: PathBuf,
    cluster: Option<String>,
}

impl MigrationLoader {
    /// Create a loader for `dir` using the cluster name from `config`
    pub fn new(dir: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            dir: dir.into(),
            cluster: config.cluster.clone(),
        }
    }

    /// Directory this loader reads from
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load all `.sql` files, sorted ascending by filename.
    ///
    /// Filenames start with a timestamp, so this is creation order.
    pub fn load(&self) -> CoreResult<Vec<MigrationFile>> {
        if !self.dir.is_dir() {
            return Err(CoreError::MigrationsDirNotFound {
                path: self.dir.display().to_string(),
            });
        }

        let mut filenames = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(|e| self.io_error(&self.dir, e))? {
            let entry = entry.map_err(|e| self.io_error(&self.dir, e))?;
            let path = entry.path();
            if !path.is_file()
                || !path
                    .extension()
                    .is_some_and(|ext| ext == MIGRATION_EXTENSION)
            {
                continue;
            }
            match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => filenames.push(name.to_string()),
                None => log::warn!("Skipping non UTF-8 file name: {}", path.display()),
            }
        }
        filenames.sort();

        filenames
            .into_iter()
            .map(|filename| self.load_file(filename))
            .collect()
    }

    /// Load a single migration by filename.
    ///
    /// Returns `Ok(None)` when the file is not among the migrations. Other
    /// files in the directory are not read.
    pub fn find(&self, filename: &str) -> CoreResult<Option<MigrationFile>> {
        if !self.dir.is_dir() {
            return Err(CoreError::MigrationsDirNotFound {
                path: self.dir.display().to_string(),
            });
        }
        let path = self.dir.join(filename);
        let plain_name = Path::new(filename)
            .file_name()
            .is_some_and(|name| name == filename);
        if !plain_name
            || !path.is_file()
            || !path
                .extension()
                .is_some_and(|ext| ext == MIGRATION_EXTENSION)
        {
            return Ok(None);
        }
        self.load_file(filename.to_string()).map(Some)
    }

    fn load_file(&self, filename: String) -> CoreResult<MigrationFile> {
        let path = self.dir.join(&filename);
        let raw = std::fs::read_to_string(&path).map_err(|e| self.io_error(&path, e))?;
        let text = substitute_cluster(&raw, self.cluster.as_deref(), &filename)?;
        MigrationFile::parse(filename, &text)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> CoreError {
        CoreError::IoWithPath {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Build `<YYYYMMDDHHMMSS>_<name>.sql` for a new migration.
pub fn new_migration_filename(name: &str, now: DateTime<Utc>) -> CoreResult<String> {
    let invalid = |reason: &str| CoreError::InvalidMigrationName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid("only letters, digits, '_' and '-' are allowed"));
    }
    Ok(format!(
        "{}_{}.{}",
        now.format("%Y%m%d%H%M%S"),
        name,
        MIGRATION_EXTENSION
    ))
}

/// Initial contents of a freshly created migration script
pub fn migration_template(filename: &str) -> String {
    format!("-- {filename}\n-- SQL up\n\n-- ROLLBACK BELOW --\n-- SQL down\n")
}

#[cfg(test)]
#[path = "migration_test.rs"]
mod tests;
