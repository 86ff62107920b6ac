use std::path::PathBuf;

use crate::ConfigError;

pub const ENV_PREFIX: &str = "GQLBATCH_";

/// One source of settings. Every field is optional; `None` defers to the next layer.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SettingsLayer {
    pub url: Option<String>,
    pub connections: Option<i64>,
    pub verbose: Option<bool>,
    /// Replaces lower layers' headers as a whole when present.
    pub headers: Option<Vec<String>>,
    pub token: Option<String>,
    pub oauth: OAuthLayer,
    pub query: Option<PathBuf>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub error: Option<PathBuf>,
}

impl std::fmt::Debug for SettingsLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsLayer")
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

#[derive(Clone, Default, PartialEq, Eq)]
pub struct OAuthLayer {
    pub url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

impl std::fmt::Debug for OAuthLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthLayer")
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

impl OAuthLayer {
    #[must_use]
    pub fn or(self, lower: OAuthLayer) -> OAuthLayer {
        OAuthLayer {
            url: self.url.or(lower.url),
            client_id: self.client_id.or(lower.client_id),
            client_secret: self.client_secret.or(lower.client_secret),
            scope: self.scope.or(lower.scope),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.client_id.is_none()
            && self.client_secret.is_none()
            && self.scope.is_none()
    }
}

impl SettingsLayer {
    /// Merge two layers, preferring values from `self`.
    #[must_use]
    pub fn or(self, lower: SettingsLayer) -> SettingsLayer {
        SettingsLayer {
            url: self.url.or(lower.url),
            connections: self.connections.or(lower.connections),
            verbose: self.verbose.or(lower.verbose),
            headers: self.headers.or(lower.headers),
            token: self.token.or(lower.token),
            oauth: self.oauth.or(lower.oauth),
            query: self.query.or(lower.query),
            input: self.input.or(lower.input),
            output: self.output.or(lower.output),
            error: self.error.or(lower.error),
        }
    }

    /// Read `GQLBATCH_*` variables from the process environment.
    pub fn from_env() -> Result<SettingsLayer, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a layer from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<SettingsLayer, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| {
            let key = format!("{ENV_PREFIX}{suffix}");
            lookup(&key).filter(|v| !v.is_empty()).map(|v| (key, v))
        };
        let text = |suffix: &str| get(suffix).map(|(_, v)| v);
        let path = |suffix: &str| text(suffix).map(PathBuf::from);

        let connections = match get("CONNECTIONS") {
            Some((var, value)) => Some(value.trim().parse::<i64>().map_err(|_| {
                ConfigError::InvalidEnv {
                    var,
                    value: value.clone(),
                    reason: "expected an integer",
                }
            })?),
            None => None,
        };

        let verbose = match get("VERBOSE") {
            Some((var, value)) => Some(parse_bool(&value).ok_or_else(|| {
                ConfigError::InvalidEnv {
                    var,
                    value: value.clone(),
                    reason: "expected true or false",
                }
            })?),
            None => None,
        };

        let headers = text("HEADERS").map(|raw| {
            raw.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        });

        Ok(SettingsLayer {
            url: text("URL"),
            connections,
            verbose,
            headers,
            token: text("TOKEN"),
            oauth: OAuthLayer {
                url: text("OAUTH_URL"),
                client_id: text("OAUTH_CLIENT_ID"),
                client_secret: text("OAUTH_CLIENT_SECRET"),
                scope: text("OAUTH_SCOPE"),
            },
            query: path("QUERY"),
            input: path("INPUT"),
            output: path("OUTPUT"),
            error: path("ERROR"),
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
