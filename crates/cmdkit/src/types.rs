//! Command definitions and registry entries

use crate::handlers::CommandRun;
use crate::permissions::{one_or_many, Permission};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Locale code → localized text
pub type Localizations = BTreeMap<String, String>;

/// The kind of application command
///
/// Manifests may name the kind (`"chat_input"`, `"User"`) or give its wire
/// code (`1`, `2`, `3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "KindRepr")]
pub enum CommandKind {
    /// Slash command typed into the chat input
    #[default]
    ChatInput,
    /// Context-menu command on a user
    User,
    /// Context-menu command on a message
    Message,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KindRepr {
    Code(u8),
    Name(String),
}

impl TryFrom<u8> for CommandKind {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::ChatInput),
            2 => Ok(Self::User),
            3 => Ok(Self::Message),
            other => Err(format!("unknown command type code {}", other)),
        }
    }
}

impl TryFrom<KindRepr> for CommandKind {
    type Error = String;

    fn try_from(repr: KindRepr) -> Result<Self, Self::Error> {
        match repr {
            KindRepr::Code(code) => Self::try_from(code),
            KindRepr::Name(name) => match name.as_str() {
                "chat_input" | "ChatInput" => Ok(Self::ChatInput),
                "user" | "User" => Ok(Self::User),
                "message" | "Message" => Ok(Self::Message),
                _ => Err(format!("unknown command type \"{}\"", name)),
            },
        }
    }
}

impl CommandKind {
    /// Platform wire code
    pub fn code(self) -> u8 {
        match self {
            Self::ChatInput => 1,
            Self::User => 2,
            Self::Message => 3,
        }
    }

    pub fn is_context_menu(self) -> bool {
        matches!(self, Self::User | Self::Message)
    }
}

/// Value type of a command option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    SubCommand,
    SubCommandGroup,
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Number,
    Attachment,
}

/// A fixed choice offered for an option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChoice {
    pub name: String,
    pub value: JsonValue,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub name_localizations: Localizations,
}

/// One typed option of a chat-input command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOptionSpec {
    #[serde(rename = "type")]
    pub kind: OptionKind,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<OptionChoice>,
    /// Nested options (sub-commands and groups)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOptionSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub name_localizations: Localizations,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub description_localizations: Localizations,
}

/// A slash command definition
#[derive(Debug, Clone, PartialEq)]
pub struct ChatInputCommand {
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOptionSpec>,
    pub name_localizations: Localizations,
    pub description_localizations: Localizations,
}

/// A user or message context-menu command definition
#[derive(Debug, Clone, PartialEq)]
pub struct ContextMenuCommand {
    pub name: String,
    pub name_localizations: Localizations,
}

/// The `data` export of a command module
///
/// Shape rules are checked once, when the module is loaded: chat-input
/// commands need a description, context-menu commands must not carry one
/// and take no options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCommandData", into = "RawCommandData")]
pub enum CommandData {
    ChatInput(ChatInputCommand),
    User(ContextMenuCommand),
    Message(ContextMenuCommand),
}

impl CommandData {
    pub fn name(&self) -> &str {
        match self {
            Self::ChatInput(c) => &c.name,
            Self::User(c) | Self::Message(c) => &c.name,
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Self::ChatInput(_) => CommandKind::ChatInput,
            Self::User(_) => CommandKind::User,
            Self::Message(_) => CommandKind::Message,
        }
    }

    /// Description, `None` for context-menu commands
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::ChatInput(c) => Some(&c.description),
            Self::User(_) | Self::Message(_) => None,
        }
    }

    /// Top-level options, empty for context-menu commands
    pub fn options(&self) -> &[CommandOptionSpec] {
        match self {
            Self::ChatInput(c) => &c.options,
            Self::User(_) | Self::Message(_) => &[],
        }
    }

    /// The JSON payload sent to the platform on create/edit
    pub fn to_payload(&self) -> JsonValue {
        let mut payload = serde_json::to_value(RawCommandData::from(self.clone()))
            .unwrap_or(JsonValue::Null);
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("type".to_string(), JsonValue::from(self.kind().code()));
        }
        payload
    }
}

/// Wire/manifest shape of [`CommandData`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawCommandData {
    name: String,
    #[serde(rename = "type", default)]
    kind: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    options: Vec<CommandOptionSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty", alias = "nameLocalizations")]
    name_localizations: Localizations,
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        alias = "descriptionLocalizations"
    )]
    description_localizations: Localizations,
}

impl TryFrom<RawCommandData> for CommandData {
    type Error = String;

    fn try_from(raw: RawCommandData) -> Result<Self, Self::Error> {
        if raw.name.trim().is_empty() {
            return Err("command name must not be empty".to_string());
        }

        match raw.kind {
            CommandKind::ChatInput => {
                let description = raw
                    .description
                    .filter(|d| !d.is_empty())
                    .ok_or_else(|| {
                        format!("chat-input command \"{}\" requires a description", raw.name)
                    })?;
                Ok(Self::ChatInput(ChatInputCommand {
                    name: raw.name,
                    description,
                    options: raw.options,
                    name_localizations: raw.name_localizations,
                    description_localizations: raw.description_localizations,
                }))
            }
            kind => {
                if raw.description.is_some() {
                    return Err(format!(
                        "context-menu command \"{}\" must not have a description",
                        raw.name
                    ));
                }
                if !raw.options.is_empty() {
                    return Err(format!(
                        "context-menu command \"{}\" must not have options",
                        raw.name
                    ));
                }
                let command = ContextMenuCommand {
                    name: raw.name,
                    name_localizations: raw.name_localizations,
                };
                Ok(if kind == CommandKind::User {
                    Self::User(command)
                } else {
                    Self::Message(command)
                })
            }
        }
    }
}

impl From<CommandData> for RawCommandData {
    fn from(data: CommandData) -> Self {
        let kind = data.kind();
        match data {
            CommandData::ChatInput(c) => Self {
                name: c.name,
                kind,
                description: Some(c.description),
                options: c.options,
                name_localizations: c.name_localizations,
                description_localizations: c.description_localizations,
            },
            CommandData::User(c) | CommandData::Message(c) => Self {
                name: c.name,
                kind,
                description: None,
                options: Vec::new(),
                name_localizations: c.name_localizations,
                description_localizations: Localizations::new(),
            },
        }
    }
}

/// The `options` export of a command module: access control and lifecycle flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessOptions {
    /// Remove the command from the platform instead of registering it
    #[serde(default)]
    pub deleted: bool,

    /// Register only in developer guilds and restrict to developers
    #[serde(default, alias = "devOnly")]
    pub dev_only: bool,

    /// Refuse invocations outside a guild
    #[serde(default, alias = "guildOnly")]
    pub guild_only: bool,

    /// Permissions the bot member needs to run the command
    #[serde(
        default,
        alias = "botPermissions",
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub bot_permissions: Vec<Permission>,

    /// Permissions the invoking member needs
    #[serde(
        default,
        alias = "userPermissions",
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub user_permissions: Vec<Permission>,
}

/// A loaded command: definition, access flags, handler and origin
///
/// Entries are built once at startup and never mutated afterwards.
#[derive(Clone)]
pub struct CommandEntry {
    pub data: CommandData,
    pub options: AccessOptions,
    pub run: Arc<dyn CommandRun>,
    pub file_path: PathBuf,
    /// First directory below the commands root, `None` for files in the root
    pub category: Option<String>,
}

impl CommandEntry {
    pub fn name(&self) -> &str {
        self.data.name()
    }

    /// Read-only view with the handler stripped
    pub fn info(&self) -> CommandInfo {
        CommandInfo {
            data: self.data.clone(),
            options: self.options.clone(),
            file_path: self.file_path.clone(),
            category: self.category.clone(),
        }
    }
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("name", &self.name())
            .field("kind", &self.data.kind())
            .field("options", &self.options)
            .field("file_path", &self.file_path)
            .field("category", &self.category)
            .finish()
    }
}

/// What read-only consumers see of a [`CommandEntry`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandInfo {
    pub data: CommandData,
    pub options: AccessOptions,
    pub file_path: PathBuf,
    pub category: Option<String>,
}

impl CommandInfo {
    pub fn name(&self) -> &str {
        self.data.name()
    }
}
