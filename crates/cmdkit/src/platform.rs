//! The remote platform seen from the engine
//!
//! The gateway connection and the platform object model stay outside this
//! crate. The engine only needs the primitives below: command fetch, create,
//! edit and delete per scope, a guild cache lookup, event subscription, and
//! an interaction object it can inspect and reply to.

use crate::error::{DispatchError, PlatformError};
use crate::permissions::Permissions;
use crate::types::CommandData;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// A guild the platform client has joined
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuildInfo {
    pub id: String,
    pub name: String,
}

/// A command namespace on the platform
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Guild(GuildInfo),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "globally"),
            Self::Guild(guild) => write!(f, "in {}", guild.name),
        }
    }
}

/// A command as currently registered on the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Number of top-level options
    pub option_count: usize,
}

impl RemoteCommand {
    /// Remote view of a local definition, as the platform would store it
    pub fn from_data(id: impl Into<String>, data: &CommandData) -> Self {
        Self::from_payload(id, &data.to_payload())
    }

    /// Read the fields the reconciler compares out of a wire payload
    pub fn from_payload(id: impl Into<String>, payload: &JsonValue) -> Self {
        Self {
            id: id.into(),
            name: payload["name"].as_str().unwrap_or_default().to_string(),
            description: payload["description"].as_str().map(str::to_string),
            option_count: payload["options"].as_array().map_or(0, Vec::len),
        }
    }
}

/// Raw arguments of one event firing, as the platform delivered them
pub type EventArgs = Arc<[JsonValue]>;

/// Result a listener hands back to the platform
pub type ListenerResult = Result<(), DispatchError>;

/// Callback subscribed to a named platform event
pub type EventListener = Arc<dyn Fn(EventArgs) -> BoxFuture<'static, ListenerResult> + Send + Sync>;

/// Callback subscribed to inbound interactions
pub type InteractionListener =
    Arc<dyn Fn(Arc<dyn Interaction>) -> BoxFuture<'static, ListenerResult> + Send + Sync>;

/// The platform client: command CRUD per scope plus event subscription
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Look up a joined guild in the client's cache
    fn guild(&self, guild_id: &str) -> Option<GuildInfo>;

    /// List the commands currently registered in `scope`
    async fn fetch_commands(&self, scope: &Scope) -> Result<Vec<RemoteCommand>, PlatformError>;

    /// Register a new command in `scope`
    async fn create_command(
        &self,
        scope: &Scope,
        data: &CommandData,
    ) -> Result<RemoteCommand, PlatformError>;

    /// Replace an existing command's definition
    async fn edit_command(
        &self,
        scope: &Scope,
        existing: &RemoteCommand,
        data: &CommandData,
    ) -> Result<(), PlatformError>;

    /// Remove an existing command
    async fn delete_command(
        &self,
        scope: &Scope,
        existing: &RemoteCommand,
    ) -> Result<(), PlatformError>;

    /// Call `listener` on every firing of `event`
    fn on(&self, event: &str, listener: EventListener);

    /// Call `listener` on the next firing of `event` only
    fn once(&self, event: &str, listener: EventListener);

    /// Call `listener` for every inbound interaction
    fn on_interaction(&self, listener: InteractionListener);
}

/// What kind of interaction arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    ChatInput,
    UserContextMenu,
    MessageContextMenu,
    /// Buttons, autocomplete, modals and anything else not dispatched here
    Other,
}

impl InteractionKind {
    pub fn is_command(self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// A reply sent back to the invoking user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionReply {
    pub content: String,
    /// Visible only to the invoking user
    pub ephemeral: bool,
}

impl InteractionReply {
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

/// An inbound command invocation
#[async_trait]
pub trait Interaction: Send + Sync {
    fn kind(&self) -> InteractionKind;

    fn command_name(&self) -> &str;

    fn user_id(&self) -> &str;

    /// Guild the invocation came from, `None` in direct messages
    fn guild_id(&self) -> Option<&str>;

    fn in_guild(&self) -> bool {
        self.guild_id().is_some()
    }

    /// Role IDs of the invoking member, empty outside guilds
    fn member_role_ids(&self) -> Vec<String>;

    /// Effective permissions of the invoking member
    fn member_permissions(&self) -> Option<Permissions>;

    /// Effective permissions of the bot's own member in this guild
    fn bot_permissions(&self) -> Option<Permissions>;

    async fn reply(&self, reply: InteractionReply) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_display() {
        assert_eq!(Scope::Global.to_string(), "globally");
        let guild = Scope::Guild(GuildInfo {
            id: "1".into(),
            name: "Dev Server".into(),
        });
        assert_eq!(guild.to_string(), "in Dev Server");
    }

    #[test]
    fn test_remote_from_data() {
        let data: CommandData = serde_json::from_value(json!({
            "name": "echo",
            "description": "Echo text",
            "options": [{ "type": "string", "name": "text", "description": "Text" }]
        }))
        .unwrap();

        let remote = RemoteCommand::from_data("99", &data);
        assert_eq!(remote.name, "echo");
        assert_eq!(remote.description.as_deref(), Some("Echo text"));
        assert_eq!(remote.option_count, 1);
    }

    #[test]
    fn test_remote_from_context_menu_payload() {
        let remote = RemoteCommand::from_payload("7", &json!({ "name": "Avatar", "type": 2 }));
        assert_eq!(remote.id, "7");
        assert_eq!(remote.name, "Avatar");
        assert_eq!(remote.description, None);
        assert_eq!(remote.option_count, 0);
    }
}
