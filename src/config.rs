use std::{io::ErrorKind, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};
use validator::Validate;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Pushbullet access token
    #[validate(length(min = 1))]
    pub api_key: String,
    #[validate(length(min = 1))]
    pub client_id: String,
    #[serde(rename = "oauth", alias = "oauth_token")]
    #[validate(length(min = 1))]
    pub oauth_token: String,
    /// Checked in this order, which is also the order of notifications
    pub streamers: Vec<String>,
    #[serde(default)]
    pub notify_on_first_seen: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No config file at {}, wrote an empty one to fill in", .0.display())]
    Missing(PathBuf),
    #[error("Config file is incomplete: {0}")]
    Incomplete(#[from] validator::ValidationErrors),
    #[error("Could not access config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Reads the config at `path`. When there is none, an empty template is
/// written there and [`ConfigError::Missing`] is returned.
pub async fn load_or_bootstrap(path: &Path) -> Result<Config, ConfigError> {
    let io_error = |source| ConfigError::Io {
        path: path.to_owned(),
        source,
    };

    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            fs::write(path, serde_json::to_string_pretty(&Config::default())?)
                .await
                .map_err(io_error)?;
            warn!("Please update the {}!", path.display());
            return Err(ConfigError::Missing(path.to_owned()));
        }
        Err(err) => return Err(io_error(err)),
    };

    let config: Config = serde_json::from_str(&contents)?;
    config.validate()?;
    debug!("Parsed config file, {} streamers", config.streamers.len());
    Ok(config)
}
