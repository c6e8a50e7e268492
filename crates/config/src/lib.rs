//! Configuration for a tome library.
//!
//! Values are layered, later sources overriding earlier ones:
//!
//! 1. Built-in defaults (database and books in the platform data directory).
//! 2. A TOML file: the path given to [`Config::load`], or `tome.toml` in the
//!    platform config directory if it exists.
//! 3. Environment variables prefixed with `TOME_`. Nested keys are separated
//!    by a double underscore, so `TOME_SEARCH__PAGE_SIZE=50` sets
//!    `search.page_size`.
//!
//! ```toml
//! database = "/srv/books/library.db"
//! books_root = "/srv/books"
//! output_template = "{{ author }}/{{ series }}/{{ title }}"
//! transfer = "copy"
//!
//! [search]
//! page_size = 50
//! more_results_limit = 200
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tome_storage::Transfer;

/// Path template used when none is configured.
pub const DEFAULT_TEMPLATE: &str = "{{ author }}/{{ title }}";
const ENV_PREFIX: &str = "TOME_";
const CONFIG_FILE: &str = "tome.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file.
    pub database: PathBuf,
    /// Directory that imported books are placed under. Must be absolute.
    pub books_root: PathBuf,
    /// Template for the library-relative path of imported files, without the
    /// extension.
    pub output_template: String,
    /// Whether importing moves or copies the source file.
    pub transfer: TransferMode,
    pub search: SearchConfig,
}
impl Default for Config {
    fn default() -> Self {
        let data = ProjectDirs::from("", "", "tome").map(|dirs| dirs.data_dir().to_path_buf()).unwrap_or_default();
        Self {
            database: data.join("library.db"),
            books_root: data.join("books"),
            output_template: DEFAULT_TEMPLATE.to_string(),
            transfer: TransferMode::default(),
            search: SearchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Books per page of results.
    pub page_size: u64,
    /// How far past the current page to look when reporting how many results remain.
    pub more_results_limit: u64,
}
impl Default for SearchConfig {
    fn default() -> Self {
        Self { page_size: 25, more_results_limit: 100 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    Move,
    Copy,
}
impl From<TransferMode> for Transfer {
    fn from(mode: TransferMode) -> Self {
        match mode {
            TransferMode::Move => Transfer::Move,
            TransferMode::Copy => Transfer::Copy,
        }
    }
}

impl Config {
    /// Load and validate the configuration.
    ///
    /// # Errors
    /// [`FileNotFound`](ErrorKind::FileNotFound) if `file` is given but does
    /// not exist. A missing default file is not an error.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file = match file {
            Some(file) if !file.is_file() => exn::bail!(ErrorKind::FileNotFound(file.to_path_buf())),
            Some(file) => Some(file.to_path_buf()),
            None => default_file(),
        };
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = &file {
            tracing::debug!(path = %file.display(), "reading configuration file");
            figment = figment.merge(Toml::file(file));
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate a configuration from any set of sources.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.books_root.is_absolute() {
            exn::bail!(ErrorKind::Invalid("books_root must be an absolute path"));
        }
        if self.database.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("database must not be empty"));
        }
        if self.output_template.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("output_template must not be empty"));
        }
        Ok(())
    }
}

fn default_file() -> Option<PathBuf> {
    let file = ProjectDirs::from("", "", "tome")?.config_dir().join(CONFIG_FILE);
    file.is_file().then_some(file)
}
