//! Run settings for gqlbatch.
//!
//! Settings come from up to four sources, highest precedence first:
//!
//! | Source | Type | Notes |
//! |--------|------|-------|
//! | Command-line flags | [`SettingsLayer`] built by the binary | |
//! | Environment | [`SettingsLayer::from_env`] | `GQLBATCH_*` variables |
//! | Config file | [`ConfigFile`] | TOML, `~/.gqlbatch/config.toml` by default |
//! | Defaults | [`RunSettings::resolve`] | connections = 10 |
//!
//! Layers are merged with [`SettingsLayer::or`] and validated once by
//! [`RunSettings::resolve`]. Nothing downstream sees an unvalidated value.

mod file;
mod layer;
mod settings;

pub use file::ConfigFile;
pub use layer::{ENV_PREFIX, OAuthLayer, SettingsLayer};
pub use settings::RunSettings;

use std::env;
use std::path::PathBuf;

use gqlbatch_client::HeaderParseError;
use gqlbatch_types::InvalidConcurrencyLimit;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidEnv {
        var: String,
        value: String,
        reason: &'static str,
    },
    #[error("required setting `{0}` is missing")]
    Missing(&'static str),
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Concurrency(#[from] InvalidConcurrencyLimit),
    #[error("`token` and `oauth.url` cannot be used together")]
    ConflictingAuth,
    #[error("`oauth.{0}` is required when any OAuth setting is given")]
    IncompleteOAuth(&'static str),
    #[error("`token` must not be empty")]
    EmptyToken,
    #[error(transparent)]
    Header(#[from] HeaderParseError),
}

impl ConfigError {
    /// The config file involved, for file-level failures.
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Replace every `${VAR}` in `value` with the variable's contents.
///
/// Unset variables expand to the empty string; an unclosed `${` is kept verbatim.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(open) = rest.find("${") {
        let after = &rest[open + 2..];
        let Some(close) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        let var = &after[..close];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

/// Default config file location: `~/.gqlbatch/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".gqlbatch").join("config.toml"))
}
