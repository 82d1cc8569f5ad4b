//! File loading for [`KitConfig`](crate::KitConfig)

use crate::config::KitConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use tracing::debug;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.yaml` / `.yml`
    Yaml,
    /// `.json`
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Parse configuration text in this format
    pub fn parse(self, content: &str) -> Result<KitConfig, String> {
        match self {
            #[cfg(feature = "toml")]
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            #[cfg(not(feature = "toml"))]
            Self::Toml => Err("TOML support not enabled".to_string()),

            #[cfg(feature = "yaml")]
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            #[cfg(not(feature = "yaml"))]
            Self::Yaml => Err("YAML support not enabled".to_string()),

            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

pub(crate) async fn load_file(path: &Path) -> ConfigResult<KitConfig> {
    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;

    debug!("Loading {:?} config from {}", format, path.display());

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    format.parse(&content).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}
