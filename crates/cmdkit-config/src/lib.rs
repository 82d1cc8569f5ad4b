//! # cmdkit configuration
//!
//! Serializable configuration for the cmdkit engine: where command, event and
//! validation modules live, and who counts as a developer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cmdkit_config::KitConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = KitConfig::load("cmdkit.toml").await?;
//!     println!("commands live in {:?}", config.commands_path);
//!     Ok(())
//! }
//! ```
//!
//! Configuration can also be assembled in code:
//!
//! ```rust
//! use cmdkit_config::KitConfig;
//!
//! let config = KitConfig::default()
//!     .with_commands_path("bot/commands")
//!     .with_dev_guild_ids(["1049345075366334617"]);
//! assert!(config.validate().is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod loader;

pub use config::KitConfig;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigFormat;
