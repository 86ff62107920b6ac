//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use gqlbatch_config::{OAuthLayer, SettingsLayer};

#[derive(Debug, Parser)]
#[command(name = "gqlbatch", version)]
#[command(about = "Run a batch of GraphQL queries or mutations")]
#[command(
    long_about = "gqlbatch runs high volumes of GraphQL queries or mutations against one \
                  endpoint, one call per JSON input record, with bounded concurrency."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (default ~/.gqlbatch/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the version
    Version {
        /// Show only the version string
        #[arg(short, long)]
        short: bool,
    },
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// URL of the GraphQL service
    #[arg(short, long)]
    pub url: Option<String>,

    /// Maximum number of open connections and parallel requests [default: 10]
    #[arg(short, long, allow_negative_numbers = true)]
    pub connections: Option<i64>,

    /// Log progress every 5 seconds
    #[arg(short, long)]
    pub verbose: bool,

    /// Additional header to send, as "Name: value" (repeatable)
    #[arg(long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Bearer token (conflicts with all OAuth options)
    #[arg(short, long, conflicts_with = "oauth_url")]
    pub token: Option<String>,

    /// URL of the OAuth 2.0 token endpoint
    #[arg(long = "oauth.url", id = "oauth_url", value_name = "URL")]
    pub oauth_url: Option<String>,

    /// Client ID for the OAuth 2.0 client-credentials flow
    #[arg(long = "oauth.clientid", value_name = "ID")]
    pub oauth_client_id: Option<String>,

    /// Client secret for the OAuth 2.0 client-credentials flow
    #[arg(long = "oauth.clientsecret", value_name = "SECRET")]
    pub oauth_client_secret: Option<String>,

    /// Requested scope for the OAuth 2.0 client-credentials flow
    #[arg(long = "oauth.scope", value_name = "SCOPE")]
    pub oauth_scope: Option<String>,

    /// File that contains the GraphQL query
    #[arg(short, long, value_name = "PATH")]
    pub query: Option<PathBuf>,

    /// File of JSON variable objects, usually one per line (default stdin)
    #[arg(short, long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// File for successful responses (default stdout)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// File for failed rows (default stderr)
    #[arg(short, long, value_name = "PATH")]
    pub error: Option<PathBuf>,
}

impl RunArgs {
    /// The flag layer: only flags that were actually given are set.
    pub fn into_layer(self) -> SettingsLayer {
        SettingsLayer {
            url: self.url,
            connections: self.connections,
            verbose: self.verbose.then_some(true),
            headers: (!self.headers.is_empty()).then_some(self.headers),
            token: self.token,
            oauth: OAuthLayer {
                url: self.oauth_url,
                client_id: self.oauth_client_id,
                client_secret: self.oauth_client_secret,
                scope: self.oauth_scope,
            },
            query: self.query,
            input: self.input,
            output: self.output,
            error: self.error,
        }
    }
}
