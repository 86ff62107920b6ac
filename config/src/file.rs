use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{ConfigError, OAuthLayer, SettingsLayer, config_path, expand_env_vars};

/// Contents of a gqlbatch config file.
///
/// ```toml
/// url = "https://api.example.com/graphql"
/// connections = 25
/// headers = ["X-Tenant: acme"]
/// query = "queries/enrich.graphql"
///
/// [oauth]
/// url = "https://auth.example.com/oauth/token"
/// client_id = "batch"
/// client_secret = "${BATCH_CLIENT_SECRET}"
/// scope = "graphql"
/// ```
///
/// String values may reference environment variables as `${VAR}`.
#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub connections: Option<i64>,
    pub verbose: Option<bool>,
    pub headers: Option<Vec<String>>,
    pub token: Option<String>,
    pub oauth: Option<OAuthSection>,
    pub query: Option<String>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub error: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OAuthSection {
    pub url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

// Manual Debug impls to keep secrets out of logs.
impl std::fmt::Debug for ConfigFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigFile")
            .field("url", &self.url)
            .field("connections", &self.connections)
            .field("verbose", &self.verbose)
            .field("headers", &self.headers.as_ref().map(Vec::len))
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("oauth", &self.oauth)
            .field("query", &self.query)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("error", &self.error)
            .finish()
    }
}

impl std::fmt::Debug for OAuthSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSection")
            .field("url", &self.url)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("scope", &self.scope)
            .finish()
    }
}

impl ConfigFile {
    /// Load the config file.
    ///
    /// With `explicit = None` the default location is used and a missing file
    /// yields `Ok(None)`. An explicit path must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(None),
            },
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "Loaded config file");
                Ok(Some((path, config)))
            }
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse { path, source: err })
            }
        }
    }

    /// Convert to a settings layer, expanding `${VAR}` references.
    #[must_use]
    pub fn into_layer(self) -> SettingsLayer {
        let expand = |value: Option<String>| value.map(|v| expand_env_vars(&v));
        let expand_path = |value: Option<String>| expand(value).map(PathBuf::from);
        let oauth = self.oauth.unwrap_or_default();

        SettingsLayer {
            url: expand(self.url),
            connections: self.connections,
            verbose: self.verbose,
            headers: self
                .headers
                .map(|lines| lines.iter().map(|l| expand_env_vars(l)).collect()),
            token: expand(self.token).filter(|t| !t.is_empty()),
            oauth: OAuthLayer {
                url: expand(oauth.url),
                client_id: expand(oauth.client_id),
                client_secret: expand(oauth.client_secret),
                scope: expand(oauth.scope),
            },
            query: expand_path(self.query),
            input: expand_path(self.input),
            output: expand_path(self.output),
            error: expand_path(self.error),
        }
    }
}
