//! Options of a stats session and the CLI configuration file.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ResultOkLogExt;
use crate::format::TABLE_FORMAT_KEY;
use crate::runtime::{Filters, ListOptions};

pub const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_DIR_ENV: &str = "DOCKER_CONFIG";
const DEFAULT_CONFIG_DIR: &str = ".docker";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open config file `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// What a stats session shows and how.
#[derive(Debug, Clone, Default)]
pub struct StatsOptions {
    /// Include stopped workloads.
    pub all: bool,
    /// Render once and exit.
    pub no_stream: bool,
    /// Show full ids.
    pub no_trunc: bool,
    /// Output format, see [`crate::format`]. Empty selects the default table.
    pub format: String,
    /// Workloads to show. Empty means every workload, tracked as they come and go.
    pub containers: Vec<String>,
    /// Filters applied to the listing and the event subscription.
    pub filters: Filters,
}

impl StatsOptions {
    /// Picks the format: the explicit one, else the configured one, else `table`.
    pub fn resolve_format(&mut self, config: &ConfigFile) {
        if self.format.is_empty() {
            self.format = if config.stats_format.is_empty() {
                TABLE_FORMAT_KEY.to_owned()
            } else {
                config.stats_format.clone()
            };
        }
    }

    pub fn list_options(&self) -> ListOptions {
        ListOptions {
            all: self.all,
            filters: self.filters.clone(),
        }
    }

    /// Whether workloads are discovered rather than named.
    pub fn is_auto(&self) -> bool {
        self.containers.is_empty()
    }
}

/// The subset of the CLI configuration file this tool reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConfigFile {
    #[serde(rename = "statsFormat", default)]
    pub stats_format: String,
}

impl ConfigFile {
    /// Reads the configuration file at `path`. A missing file yields `None`.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(Error::Open {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_reader(BufReader::new(file))
            .map(Some)
            .map_err(|source| Error::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Loads the configuration from its default location. Unreadable files are logged
    /// and ignored.
    pub fn load() -> Self {
        let Some(dir) = config_dir(
            std::env::var_os(CONFIG_DIR_ENV),
            std::env::var_os("HOME"),
        ) else {
            return Self::default();
        };
        let path = dir.join(CONFIG_FILE_NAME);
        log::debug!("Reading configuration from {}", path.display());
        Self::load_from(path).ok_log().flatten().unwrap_or_default()
    }
}

fn config_dir(config_dir: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    match config_dir.filter(|dir| !dir.is_empty()) {
        Some(dir) => Some(PathBuf::from(dir)),
        None => home
            .filter(|home| !home.is_empty())
            .map(|home| PathBuf::from(home).join(DEFAULT_CONFIG_DIR)),
    }
}
