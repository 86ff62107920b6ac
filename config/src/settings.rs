use std::path::{Path, PathBuf};

use gqlbatch_client::reqwest::header::HeaderMap;
use gqlbatch_client::{Credentials, OAuthCredentials, parse_headers};
use gqlbatch_types::{BearerToken, ConcurrencyLimit};
use url::Url;

use crate::{ConfigError, ConfigFile, OAuthLayer, SettingsLayer};

/// Validated settings for one batch run.
pub struct RunSettings {
    pub endpoint: Url,
    pub concurrency: ConcurrencyLimit,
    pub verbose: bool,
    pub headers: HeaderMap,
    pub credentials: Credentials,
    pub query: PathBuf,
    /// `None` reads stdin.
    pub input: Option<PathBuf>,
    /// `None` writes stdout.
    pub output: Option<PathBuf>,
    /// `None` writes stderr.
    pub error: Option<PathBuf>,
    /// The config file that contributed to these settings, if any.
    pub config_file: Option<PathBuf>,
}

impl std::fmt::Debug for RunSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let header_names: Vec<&str> = self.headers.keys().map(|k| k.as_str()).collect();
        f.debug_struct("RunSettings")
            .field("endpoint", &self.endpoint.as_str())
            .field("concurrency", &self.concurrency.get())
            .field("verbose", &self.verbose)
            .field("headers", &header_names)
            .field("credentials", &self.credentials)
            .field("query", &self.query)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("error", &self.error)
            .field("config_file", &self.config_file)
            .finish()
    }
}

impl RunSettings {
    /// Merge flags over the environment over the config file, then validate.
    pub fn load(flags: SettingsLayer, config: Option<&Path>) -> Result<Self, ConfigError> {
        let env = SettingsLayer::from_env()?;
        let (config_file, file_layer) = match ConfigFile::load(config)? {
            Some((path, file)) => (Some(path), file.into_layer()),
            None => (None, SettingsLayer::default()),
        };

        let mut settings = Self::resolve(flags.or(env).or(file_layer))?;
        settings.config_file = config_file;
        Ok(settings)
    }

    /// Validate a fully merged layer.
    pub fn resolve(layer: SettingsLayer) -> Result<Self, ConfigError> {
        let endpoint = parse_http_url("url", layer.url.ok_or(ConfigError::Missing("url"))?)?;
        let query = layer.query.ok_or(ConfigError::Missing("query"))?;

        let concurrency = match layer.connections {
            Some(raw) => ConcurrencyLimit::new(raw)?,
            None => ConcurrencyLimit::default(),
        };

        let headers = parse_headers(layer.headers.unwrap_or_default())?;
        let credentials = resolve_credentials(layer.token, layer.oauth)?;

        Ok(Self {
            endpoint,
            concurrency,
            verbose: layer.verbose.unwrap_or(false),
            headers,
            credentials,
            query,
            input: layer.input,
            output: layer.output,
            error: layer.error,
            config_file: None,
        })
    }
}

fn resolve_credentials(token: Option<String>, oauth: OAuthLayer) -> Result<Credentials, ConfigError> {
    if oauth.is_empty() {
        return match token {
            Some(token) => BearerToken::new(token)
                .map(Credentials::Static)
                .ok_or(ConfigError::EmptyToken),
            None => Ok(Credentials::None),
        };
    }

    if token.is_some() && oauth.url.is_some() {
        return Err(ConfigError::ConflictingAuth);
    }

    let url = oauth.url.ok_or(ConfigError::IncompleteOAuth("url"))?;
    let client_id = oauth
        .client_id
        .ok_or(ConfigError::IncompleteOAuth("clientid"))?;
    let client_secret = oauth
        .client_secret
        .ok_or(ConfigError::IncompleteOAuth("clientsecret"))?;
    let scope = oauth.scope.ok_or(ConfigError::IncompleteOAuth("scope"))?;

    Ok(Credentials::OAuth(OAuthCredentials {
        token_url: parse_http_url("oauth.url", url)?,
        client_id,
        client_secret,
        scope,
    }))
}

fn parse_http_url(field: &'static str, raw: String) -> Result<Url, ConfigError> {
    let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
        field,
        value: raw.clone(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            field,
            value: raw,
            reason: format!("unsupported scheme `{other}`"),
        }),
    }
}
