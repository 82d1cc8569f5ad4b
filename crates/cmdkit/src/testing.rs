//! In-memory platform for tests
//!
//! Available to this crate's own tests and, behind the `test-utils` feature,
//! to downstream crates.
//!
//! - [`MockPlatform`] keeps a command list per scope and applies every
//!   create, edit and delete to it, so a second reconciliation sees what the
//!   first one did. Calls are recorded for assertions, failures can be
//!   injected per command name or per scope fetch, and subscribed listeners
//!   can be fired with [`MockPlatform::emit`] and [`MockPlatform::interact`].
//! - [`MockInteraction`] is a configurable invocation that records replies.
//!
//! ```rust
//! use cmdkit::testing::MockPlatform;
//! use cmdkit::{PlatformClient, Scope};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let platform = MockPlatform::new().with_guild("10", "Dev Server");
//! assert!(platform.guild("10").is_some());
//! assert!(platform.fetch_commands(&Scope::Global).await?.is_empty());
//! # Ok(())
//! # }
//! ```

use crate::error::{DispatchError, PlatformError};
use crate::permissions::Permissions;
use crate::platform::{
    EventArgs, EventListener, GuildInfo, Interaction, InteractionKind, InteractionListener,
    InteractionReply, PlatformClient, RemoteCommand, Scope,
};
use crate::types::CommandData;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// A mutating call the platform received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Create { scope: Scope, name: String },
    Edit { scope: Scope, name: String },
    Delete { scope: Scope, name: String },
}

#[derive(Default)]
struct MockState {
    guilds: Vec<GuildInfo>,
    commands: HashMap<Scope, Vec<RemoteCommand>>,
    calls: Vec<MockCall>,
    failing_commands: HashSet<String>,
    failing_fetches: HashSet<Scope>,
    next_id: u64,
    listeners: HashMap<String, Vec<(EventListener, bool)>>,
    interaction_listeners: Vec<InteractionListener>,
}

/// Platform client backed by in-memory state
#[derive(Clone, Default)]
pub struct MockPlatform {
    state: Arc<Mutex<MockState>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a guild
    pub fn with_guild(self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.state.lock().unwrap().guilds.push(GuildInfo {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    /// Start with `command` already registered in `scope`
    pub fn with_remote(self, scope: Scope, command: RemoteCommand) -> Self {
        self.insert_remote(&scope, command);
        self
    }

    /// Make every create, edit and delete of `name` fail
    pub fn fail_on(self, name: impl Into<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_commands
            .insert(name.into());
        self
    }

    /// Make fetching the command list of `scope` fail
    pub fn fail_fetch(self, scope: Scope) -> Self {
        self.state.lock().unwrap().failing_fetches.insert(scope);
        self
    }

    pub fn insert_remote(&self, scope: &Scope, command: RemoteCommand) {
        self.state
            .lock()
            .unwrap()
            .commands
            .entry(scope.clone())
            .or_default()
            .push(command);
    }

    /// The scope of a joined guild
    ///
    /// # Panics
    ///
    /// If the guild was never added with [`with_guild`](Self::with_guild).
    pub fn guild_scope(&self, id: &str) -> Scope {
        let guild = self
            .guild(id)
            .unwrap_or_else(|| panic!("mock platform has no guild {}", id));
        Scope::Guild(guild)
    }

    pub fn commands_in(&self, scope: &Scope) -> Vec<RemoteCommand> {
        self.state
            .lock()
            .unwrap()
            .commands
            .get(scope)
            .cloned()
            .unwrap_or_default()
    }

    pub fn global_commands(&self) -> Vec<RemoteCommand> {
        self.commands_in(&Scope::Global)
    }

    /// Every create, edit and delete received so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Listeners currently subscribed to `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .listeners
            .get(event)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn interaction_listener_count(&self) -> usize {
        self.state.lock().unwrap().interaction_listeners.len()
    }

    /// Fire `event` once, awaiting each subscribed listener in subscription order
    ///
    /// One-shot listeners are dropped before they run. The first listener
    /// error is returned after every listener has run.
    pub async fn emit(&self, event: &str, args: Vec<JsonValue>) -> Result<(), DispatchError> {
        let listeners: Vec<EventListener> = {
            let mut state = self.state.lock().unwrap();
            let Some(subscribed) = state.listeners.get_mut(event) else {
                return Ok(());
            };
            let listeners = subscribed.iter().map(|(l, _)| l.clone()).collect();
            subscribed.retain(|(_, once)| !once);
            listeners
        };

        let args: EventArgs = args.into();
        let mut first_error = None;
        for listener in listeners {
            if let Err(e) = listener(args.clone()).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Deliver `interaction` to every interaction listener
    pub async fn interact(&self, interaction: Arc<dyn Interaction>) -> Result<(), DispatchError> {
        let listeners = self.state.lock().unwrap().interaction_listeners.clone();
        for listener in listeners {
            listener(interaction.clone()).await?;
        }
        Ok(())
    }

    fn record(&self, call: MockCall, name: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.failing_commands.contains(name) {
            return Err(PlatformError::new("Missing Access").with_status(403));
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    fn guild(&self, guild_id: &str) -> Option<GuildInfo> {
        self.state
            .lock()
            .unwrap()
            .guilds
            .iter()
            .find(|g| g.id == guild_id)
            .cloned()
    }

    async fn fetch_commands(&self, scope: &Scope) -> Result<Vec<RemoteCommand>, PlatformError> {
        if self.state.lock().unwrap().failing_fetches.contains(scope) {
            return Err(PlatformError::new("Internal Server Error").with_status(500));
        }
        Ok(self.commands_in(scope))
    }

    async fn create_command(
        &self,
        scope: &Scope,
        data: &CommandData,
    ) -> Result<RemoteCommand, PlatformError> {
        self.record(
            MockCall::Create {
                scope: scope.clone(),
                name: data.name().to_string(),
            },
            data.name(),
        )?;

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let command =
            RemoteCommand::from_payload(state.next_id.to_string(), &data.to_payload());
        state
            .commands
            .entry(scope.clone())
            .or_default()
            .push(command.clone());
        Ok(command)
    }

    async fn edit_command(
        &self,
        scope: &Scope,
        existing: &RemoteCommand,
        data: &CommandData,
    ) -> Result<(), PlatformError> {
        self.record(
            MockCall::Edit {
                scope: scope.clone(),
                name: existing.name.clone(),
            },
            &existing.name,
        )?;

        let mut state = self.state.lock().unwrap();
        let command = state
            .commands
            .get_mut(scope)
            .and_then(|commands| commands.iter_mut().find(|c| c.id == existing.id))
            .ok_or_else(|| PlatformError::new("Unknown application command").with_status(404))?;
        *command = RemoteCommand::from_payload(existing.id.clone(), &data.to_payload());
        Ok(())
    }

    async fn delete_command(
        &self,
        scope: &Scope,
        existing: &RemoteCommand,
    ) -> Result<(), PlatformError> {
        self.record(
            MockCall::Delete {
                scope: scope.clone(),
                name: existing.name.clone(),
            },
            &existing.name,
        )?;

        let mut state = self.state.lock().unwrap();
        let commands = state.commands.entry(scope.clone()).or_default();
        let before = commands.len();
        commands.retain(|c| c.id != existing.id);
        if commands.len() == before {
            return Err(PlatformError::new("Unknown application command").with_status(404));
        }
        Ok(())
    }

    fn on(&self, event: &str, listener: EventListener) {
        self.state
            .lock()
            .unwrap()
            .listeners
            .entry(event.to_string())
            .or_default()
            .push((listener, false));
    }

    fn once(&self, event: &str, listener: EventListener) {
        self.state
            .lock()
            .unwrap()
            .listeners
            .entry(event.to_string())
            .or_default()
            .push((listener, true));
    }

    fn on_interaction(&self, listener: InteractionListener) {
        self.state
            .lock()
            .unwrap()
            .interaction_listeners
            .push(listener);
    }
}

/// A command invocation with fixed answers and a reply log
pub struct MockInteraction {
    kind: InteractionKind,
    command_name: String,
    user_id: String,
    guild_id: Option<String>,
    role_ids: Vec<String>,
    member_permissions: Option<Permissions>,
    bot_permissions: Option<Permissions>,
    replies: Mutex<Vec<InteractionReply>>,
}

impl MockInteraction {
    pub fn new(
        kind: InteractionKind,
        command_name: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            command_name: command_name.into(),
            user_id: user_id.into(),
            guild_id: None,
            role_ids: Vec::new(),
            member_permissions: None,
            bot_permissions: None,
            replies: Mutex::new(Vec::new()),
        }
    }

    /// A slash command used in direct messages
    pub fn chat_input(command_name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::new(InteractionKind::ChatInput, command_name, user_id)
    }

    pub fn user_context(command_name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::new(InteractionKind::UserContextMenu, command_name, user_id)
    }

    pub fn message_context(command_name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::new(InteractionKind::MessageContextMenu, command_name, user_id)
    }

    /// A component or modal interaction that happens to carry `command_name`
    pub fn other(command_name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::new(InteractionKind::Other, command_name, user_id)
    }

    pub fn in_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    pub fn with_roles<I, S>(mut self, role_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role_ids = role_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_member_permissions(mut self, permissions: Permissions) -> Self {
        self.member_permissions = Some(permissions);
        self
    }

    pub fn with_bot_permissions(mut self, permissions: Permissions) -> Self {
        self.bot_permissions = Some(permissions);
        self
    }

    /// Replies sent so far
    pub fn replies(&self) -> Vec<InteractionReply> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl Interaction for MockInteraction {
    fn kind(&self) -> InteractionKind {
        self.kind
    }

    fn command_name(&self) -> &str {
        &self.command_name
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn guild_id(&self) -> Option<&str> {
        self.guild_id.as_deref()
    }

    fn member_role_ids(&self) -> Vec<String> {
        self.role_ids.clone()
    }

    fn member_permissions(&self) -> Option<Permissions> {
        self.member_permissions
    }

    fn bot_permissions(&self) -> Option<Permissions> {
        self.bot_permissions
    }

    async fn reply(&self, reply: InteractionReply) -> Result<(), PlatformError> {
        self.replies.lock().unwrap().push(reply);
        Ok(())
    }
}
