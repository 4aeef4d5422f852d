//! Loading and normalization of the connection descriptor file.
//!
//! The file is a JSON array of [ConnectionDescriptor]s:
//!
//! ```json
//! [
//!     { "title": "primary", "host": "db1", "user": "backup", "password": "secret", "databases": ["shop", "crm"] },
//!     { "host": "db2", "user": "backup", "pwd": "secret", "database": "wiki", "active": false }
//! ]
//! ```
//!
//! Files ending in `.toml` are read as TOML with one `[[connection]]` table
//! per descriptor.

use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};

/// Errors on loading the connection descriptor file.
#[derive(Debug, Display, Error)]
pub enum ConfigError {
    /// The file can't be read.
    #[display("Reading connection file {} failed: {source}", path.display())]
    Unreadable { path: PathBuf, source: io::Error },
    /// The file is no valid JSON list of connections.
    #[display("Connection file {} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The file is no valid TOML document of connections.
    #[display("Connection file {} is not valid TOML: {source}", path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// A field holding one database name or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(untagged)]
pub enum DatabaseField {
    Single(String),
    List(Vec<String>),
}

/// Connection as written in the descriptor file.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct ConnectionDescriptor {
    pub active: Option<bool>,
    pub title: Option<String>,
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Alias of [`password`](Self::password), used when the former is missing.
    pub pwd: Option<String>,
    pub database: Option<DatabaseField>,
    pub databases: Option<DatabaseField>,
}

/// A connection with all defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTarget {
    pub active: bool,
    pub title: String,
    pub host: String,
    pub user: String,
    pub password: String,
    /// Databases to dump, in dump order. May contain duplicates.
    pub databases: Vec<String>,
}

impl From<ConnectionDescriptor> for NormalizedTarget {
    fn from(descriptor: ConnectionDescriptor) -> Self {
        let databases = merge_databases(&descriptor.database, &descriptor.databases);

        let ConnectionDescriptor {
            active,
            title,
            host,
            user,
            password,
            pwd,
            ..
        } = descriptor;

        let host = host.unwrap_or_default();
        Self {
            active: active.unwrap_or(true),
            title: title.unwrap_or_else(|| host.clone()),
            host,
            user: user.unwrap_or_default(),
            password: password.or(pwd).unwrap_or_default(),
            databases,
        }
    }
}

/// Single names come first (singular field, then plural field), followed by
/// the lists in the same field order. Nothing is deduplicated.
fn merge_databases(
    database: &Option<DatabaseField>,
    databases: &Option<DatabaseField>,
) -> Vec<String> {
    let fields = [database, databases];

    let singles = fields.iter().filter_map(|field| match field {
        Some(DatabaseField::Single(name)) => Some(std::slice::from_ref(name)),
        _ => None,
    });
    let lists = fields.iter().filter_map(|field| match field {
        Some(DatabaseField::List(names)) => Some(names.as_slice()),
        _ => None,
    });

    singles.chain(lists).flatten().cloned().collect()
}

#[derive(Debug, serde::Deserialize)]
struct TomlConnections {
    #[serde(default)]
    connection: Vec<ConnectionDescriptor>,
}

/// Reads the descriptor file at `path` and normalizes every entry, keeping file order.
pub fn load_connections(path: &Path) -> Result<Vec<NormalizedTarget>, ConfigError> {
    log::debug!(target: "backup::config", "Reading connections from {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let descriptors = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str::<TomlConnections>(&content)
            .map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })?
            .connection
    } else {
        serde_json::from_str::<Vec<ConnectionDescriptor>>(&content).map_err(|source| {
            ConfigError::Json {
                path: path.to_path_buf(),
                source,
            }
        })?
    };

    let targets: Vec<NormalizedTarget> = descriptors.into_iter().map(Into::into).collect();
    log::debug!(target: "backup::config", "Loaded {} connection(s)", targets.len());

    Ok(targets)
}
