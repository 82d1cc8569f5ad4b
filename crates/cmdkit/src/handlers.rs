//! Handler traits, invocation contexts and the handler table
//!
//! Module manifests never carry code. A command module says `run = "ping"`;
//! an event module says `handler = "greet"`. The names resolve against a
//! [`Handlers`] table the application fills in before startup:
//!
//! ```rust,ignore
//! use cmdkit::{command_fn, event_fn, Flow, Handlers, InteractionReply};
//!
//! let handlers = Handlers::builder()
//!     .command("ping", command_fn(|ctx| async move {
//!         ctx.interaction.reply(InteractionReply::ephemeral("Pong!")).await?;
//!         Ok(())
//!     }))
//!     .event("log_ready", event_fn(|_ctx| async move { Ok(Flow::Continue) }))
//!     .build();
//! ```

use crate::kit::KitHandle;
use crate::platform::{EventArgs, Interaction, PlatformClient};
use crate::types::CommandInfo;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Whether a short-circuit chain keeps going
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Continue,
    /// Skip the rest of the chain for this firing
    Stop,
}

impl Flow {
    pub fn is_stop(self) -> bool {
        self == Self::Stop
    }
}

/// `true` stops the chain
impl From<bool> for Flow {
    fn from(stop: bool) -> Self {
        if stop {
            Self::Stop
        } else {
            Self::Continue
        }
    }
}

/// Passed to a command handler
#[derive(Clone)]
pub struct CommandContext {
    pub interaction: Arc<dyn Interaction>,
    pub client: Arc<dyn PlatformClient>,
    pub kit: KitHandle,
}

/// Passed to a custom validation
#[derive(Clone)]
pub struct ValidationContext {
    pub interaction: Arc<dyn Interaction>,
    pub client: Arc<dyn PlatformClient>,
    /// The matched command, handler stripped
    pub command: CommandInfo,
    pub kit: KitHandle,
}

/// Passed to an event handler
#[derive(Clone)]
pub struct EventContext {
    pub event: String,
    pub args: EventArgs,
    pub client: Arc<dyn PlatformClient>,
    pub kit: KitHandle,
}

#[async_trait]
pub trait CommandRun: Send + Sync {
    async fn run(&self, ctx: CommandContext) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Validation: Send + Sync {
    /// Return [`Flow::Stop`] to reject the invocation
    async fn validate(&self, ctx: &ValidationContext) -> anyhow::Result<Flow>;
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Return [`Flow::Stop`] to skip the remaining handlers for this firing
    async fn handle(&self, ctx: &EventContext) -> anyhow::Result<Flow>;
}

pub struct FnCommand<F>(F);

#[async_trait]
impl<F, Fut> CommandRun for FnCommand<F>
where
    F: Fn(CommandContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self, ctx: CommandContext) -> anyhow::Result<()> {
        (self.0)(ctx).await
    }
}

pub struct FnValidation<F>(F);

#[async_trait]
impl<F, Fut> Validation for FnValidation<F>
where
    F: Fn(ValidationContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Flow>> + Send + 'static,
{
    async fn validate(&self, ctx: &ValidationContext) -> anyhow::Result<Flow> {
        (self.0)(ctx.clone()).await
    }
}

pub struct FnEvent<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnEvent<F>
where
    F: Fn(EventContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Flow>> + Send + 'static,
{
    async fn handle(&self, ctx: &EventContext) -> anyhow::Result<Flow> {
        (self.0)(ctx.clone()).await
    }
}

/// Wrap an async closure as a command handler
pub fn command_fn<F, Fut>(f: F) -> FnCommand<F>
where
    F: Fn(CommandContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnCommand(f)
}

/// Wrap an async closure as a validation
pub fn validation_fn<F, Fut>(f: F) -> FnValidation<F>
where
    F: Fn(ValidationContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Flow>> + Send + 'static,
{
    FnValidation(f)
}

/// Wrap an async closure as an event handler
pub fn event_fn<F, Fut>(f: F) -> FnEvent<F>
where
    F: Fn(EventContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Flow>> + Send + 'static,
{
    FnEvent(f)
}

#[derive(Default)]
struct HandlerTables {
    commands: HashMap<String, Arc<dyn CommandRun>>,
    validations: HashMap<String, Arc<dyn Validation>>,
    events: HashMap<String, Arc<dyn EventHandler>>,
}

/// Immutable table of named handlers
///
/// Built once with [`HandlersBuilder`]; cloning shares the table.
#[derive(Clone, Default)]
pub struct Handlers {
    tables: Arc<HandlerTables>,
}

impl Handlers {
    pub fn builder() -> HandlersBuilder {
        HandlersBuilder::default()
    }

    pub fn command(&self, name: &str) -> Option<Arc<dyn CommandRun>> {
        self.tables.commands.get(name).cloned()
    }

    pub fn validation(&self, name: &str) -> Option<Arc<dyn Validation>> {
        self.tables.validations.get(name).cloned()
    }

    pub fn event(&self, name: &str) -> Option<Arc<dyn EventHandler>> {
        self.tables.events.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tables.commands.len() + self.tables.validations.len() + self.tables.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut commands: Vec<_> = self.tables.commands.keys().collect();
        let mut validations: Vec<_> = self.tables.validations.keys().collect();
        let mut events: Vec<_> = self.tables.events.keys().collect();
        commands.sort();
        validations.sort();
        events.sort();
        f.debug_struct("Handlers")
            .field("commands", &commands)
            .field("validations", &validations)
            .field("events", &events)
            .finish()
    }
}

/// Accumulates handler registrations, then [`build`](Self::build)s a [`Handlers`]
///
/// Registering a name twice keeps the later handler.
#[derive(Default)]
pub struct HandlersBuilder {
    tables: HandlerTables,
}

impl HandlersBuilder {
    pub fn command(mut self, name: impl Into<String>, handler: impl CommandRun + 'static) -> Self {
        self.tables.commands.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn validation(
        mut self,
        name: impl Into<String>,
        handler: impl Validation + 'static,
    ) -> Self {
        self.tables.validations.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn event(mut self, name: impl Into<String>, handler: impl EventHandler + 'static) -> Self {
        self.tables.events.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn build(self) -> Handlers {
        Handlers {
            tables: Arc::new(self.tables),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_from_bool() {
        assert_eq!(Flow::from(true), Flow::Stop);
        assert_eq!(Flow::from(false), Flow::Continue);
        assert!(Flow::Stop.is_stop());
        assert_eq!(Flow::default(), Flow::Continue);
    }

    #[test]
    fn test_builder_registers_by_kind() {
        let handlers = Handlers::builder()
            .command("ping", command_fn(|_ctx| async { anyhow::Ok(()) }))
            .validation("cooldown", validation_fn(|_ctx| async { anyhow::Ok(Flow::Continue) }))
            .event("greet", event_fn(|_ctx| async { anyhow::Ok(Flow::Stop) }))
            .build();

        assert_eq!(handlers.len(), 3);
        assert!(handlers.command("ping").is_some());
        assert!(handlers.command("greet").is_none());
        assert!(handlers.validation("cooldown").is_some());
        assert!(handlers.event("greet").is_some());
        assert!(handlers.event("missing").is_none());
    }

    #[test]
    fn test_empty_handlers() {
        let handlers = Handlers::default();
        assert!(handlers.is_empty());
        assert_eq!(
            format!("{:?}", handlers),
            "Handlers { commands: [], validations: [], events: [] }"
        );
    }
}
