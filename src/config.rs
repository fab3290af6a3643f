//! Command line and environment configuration.

use std::path::PathBuf;

use clap::Parser;

const DEFAULT_ASSET_PREFIX: &str = "https://assets.parley.example";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Document store URI
    #[arg(env = "PARLEY_DB_URI")]
    pub db_uri: String,

    /// Server bind address
    #[arg(short = 'a', long, default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, default_value_t = 12345)]
    pub port: u16,

    /// Directory where media blobs are stored
    #[arg(long, env = "PARLEY_BLOB_DIR", default_value = "./data/blobs")]
    pub blob_dir: PathBuf,

    /// Public URL prefix under which blobs are served; defaults to the
    /// server's own /blobs route
    #[arg(long, env = "PARLEY_BLOB_PUBLIC_URL")]
    pub blob_public_url: Option<String>,

    /// Maximum media payload size in bytes
    #[arg(long, env = "PARLEY_MAX_BLOB_SIZE", default_value_t = 50 * 1024 * 1024)]
    pub max_blob_size: usize,
}

impl Args {
    pub fn blob_public_url(&self) -> String {
        self.blob_public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}/blobs", self.host, self.port))
    }
}

/// Deployment-default asset URLs: the avatar an account falls back to when
/// its profile image is deleted, and the image every new group starts with.
#[derive(Debug, Clone)]
pub struct AssetUrls {
    pub default_avatar: String,
    pub default_group_image: String,
}

impl AssetUrls {
    /// Build from `PARLEY_ASSET_URL_PREFIX`, falling back to the built-in
    /// prefix.
    pub fn from_env() -> Self {
        let prefix = std::env::var("PARLEY_ASSET_URL_PREFIX")
            .unwrap_or_else(|_| DEFAULT_ASSET_PREFIX.to_string());
        Self::with_prefix(&prefix)
    }

    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            default_avatar: format!("{prefix}/contact.png"),
            default_group_image: format!("{prefix}/networking.png"),
        }
    }
}

impl Default for AssetUrls {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_ASSET_PREFIX)
    }
}
