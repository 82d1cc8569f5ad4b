//! # cmdkit
//!
//! Command discovery, registry reconciliation and event dispatch for chat
//! platform bots.
//!
//! A bot keeps its commands, event handlers and validations as small module
//! manifests in three directory trees. cmdkit loads them at startup, keeps the
//! platform's registered commands in step with the local definitions, and
//! routes every inbound interaction and event through ordered handler chains.
//!
//! ## Layout on disk
//!
//! ```text
//! bot/
//! ├── commands/            any depth; first directory is the category
//! │   ├── ping.toml
//! │   └── moderation/ban.toml
//! ├── events/              one directory per event name
//! │   └── ready/log.toml
//! └── validations/         custom rules, run before the built-ins
//!     └── cooldown.toml
//! ```
//!
//! Manifests name handlers; the handlers themselves are registered in code.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cmdkit::{command_fn, CommandKit, Handlers, InteractionReply, KitOptions};
//! use cmdkit_config::KitConfig;
//!
//! let handlers = Handlers::builder()
//!     .command("ping", command_fn(|ctx| async move {
//!         ctx.interaction.reply(InteractionReply::ephemeral("Pong!")).await?;
//!         Ok(())
//!     }))
//!     .build();
//!
//! let kit = CommandKit::new(
//!     KitOptions::new()
//!         .client(client)
//!         .config(KitConfig::load("cmdkit.toml").await?)
//!         .handlers(handlers),
//! )?;
//! kit.init().await?;
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod events;
pub mod handlers;
pub mod kit;
pub mod loader;
pub mod permissions;
pub mod platform;
pub mod reconcile;
pub mod registry;
pub mod scanner;
pub mod types;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use error::{DispatchError, KitError, KitResult, LoadError, PlatformError, ScanError};
pub use events::{EventBinding, EventDispatcher};
pub use handlers::{
    command_fn, event_fn, validation_fn, CommandContext, CommandRun, EventContext, EventHandler,
    Flow, Handlers, HandlersBuilder, Validation, ValidationContext,
};
pub use kit::{CommandKit, KitHandle, KitOptions};
pub use loader::{LoadedCommand, ManifestSource, ModuleLoader, ModuleSource, StaticModules};
pub use permissions::{Permission, Permissions};
pub use platform::{
    EventArgs, EventListener, GuildInfo, Interaction, InteractionKind, InteractionListener,
    InteractionReply, ListenerResult, PlatformClient, RemoteCommand, Scope,
};
pub use reconcile::{
    is_different, ReconcileAction, ReconcileOutcome, ReconcileReport, Reconciler, Skipped,
};
pub use registry::{derive_category, CommandRegistry};
pub use scanner::{FsScanner, PathScanner};
pub use types::{
    AccessOptions, ChatInputCommand, CommandData, CommandEntry, CommandInfo, CommandKind,
    CommandOptionSpec, ContextMenuCommand, Localizations, OptionChoice, OptionKind,
};
pub use validation::{
    BuiltinValidation, DeveloperAllowList, Dispatched, ValidationPipeline, ValidationRule,
};

pub use cmdkit_config::{ConfigError, KitConfig};
