//! The kit configuration struct

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a command kit instance
///
/// Every field is optional. Paths point at module roots on disk; the
/// developer lists feed the developer-only command checks and decide which
/// guilds receive developer-only registrations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitConfig {
    /// Root directory of command modules (searched recursively)
    #[serde(default, alias = "commandsPath")]
    pub commands_path: Option<PathBuf>,

    /// Root directory of event modules (one subdirectory per event name)
    #[serde(default, alias = "eventsPath")]
    pub events_path: Option<PathBuf>,

    /// Root directory of custom validation modules
    #[serde(default, alias = "validationsPath")]
    pub validations_path: Option<PathBuf>,

    /// User IDs allowed to run developer-only commands
    #[serde(default, alias = "devUserIds")]
    pub dev_user_ids: Vec<String>,

    /// Guild IDs that receive developer-only commands
    #[serde(default, alias = "devGuildIds")]
    pub dev_guild_ids: Vec<String>,

    /// Role IDs allowed to run developer-only commands
    #[serde(default, alias = "devRoleIds")]
    pub dev_role_ids: Vec<String>,

    /// Skip the built-in validations (permissions, developer-only, guild-only)
    #[serde(default, alias = "skipBuiltInValidations")]
    pub skip_builtin_validations: bool,
}

impl KitConfig {
    /// Load and validate a configuration file
    ///
    /// The format is picked from the file extension (`.toml`, `.yaml`/`.yml`,
    /// `.json`).
    pub async fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let config = crate::loader::load_file(path.as_ref()).await?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.validations_path.is_some() && self.commands_path.is_none() {
            return Err(ConfigError::ValidationsWithoutCommands);
        }
        Ok(())
    }

    /// Set the commands root
    pub fn with_commands_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.commands_path = Some(path.into());
        self
    }

    /// Set the events root
    pub fn with_events_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.events_path = Some(path.into());
        self
    }

    /// Set the validations root
    pub fn with_validations_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.validations_path = Some(path.into());
        self
    }

    /// Set the developer user IDs
    pub fn with_dev_user_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dev_user_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set the developer guild IDs
    pub fn with_dev_guild_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dev_guild_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set the developer role IDs
    pub fn with_dev_role_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dev_role_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable the built-in validations
    pub fn with_skip_builtin_validations(mut self, skip: bool) -> Self {
        self.skip_builtin_validations = skip;
        self
    }
}
