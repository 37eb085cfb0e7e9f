//! Error types for roster-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading and validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the config or token file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load. Includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// One or more settings are missing or malformed. Every problem found is listed.
    #[error("invalid configuration: {}", problems.join("; "))]
    Invalid { problems: Vec<String> },

    /// `dirs::home_dir()` returned `None`, so `~/.roster/` cannot be located.
    #[error("cannot determine home directory; set $HOME or pass --config")]
    HomeNotFound,
}
