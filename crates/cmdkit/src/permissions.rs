//! Platform permission flags
//!
//! Members carry a [`Permissions`] bit set; commands declare the named
//! [`Permission`]s they need. Bit positions follow the platform's wire values.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

bitflags! {
    /// A member's effective permission set
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Permissions: u64 {
        const CREATE_INSTANT_INVITE = 1 << 0;
        const KICK_MEMBERS = 1 << 1;
        const BAN_MEMBERS = 1 << 2;
        const ADMINISTRATOR = 1 << 3;
        const MANAGE_CHANNELS = 1 << 4;
        const MANAGE_GUILD = 1 << 5;
        const ADD_REACTIONS = 1 << 6;
        const VIEW_AUDIT_LOG = 1 << 7;
        const VIEW_CHANNEL = 1 << 10;
        const SEND_MESSAGES = 1 << 11;
        const MANAGE_MESSAGES = 1 << 13;
        const EMBED_LINKS = 1 << 14;
        const ATTACH_FILES = 1 << 15;
        const READ_MESSAGE_HISTORY = 1 << 16;
        const MENTION_EVERYONE = 1 << 17;
        const CONNECT = 1 << 20;
        const SPEAK = 1 << 21;
        const MUTE_MEMBERS = 1 << 22;
        const MOVE_MEMBERS = 1 << 24;
        const MANAGE_NICKNAMES = 1 << 27;
        const MANAGE_ROLES = 1 << 28;
        const MANAGE_WEBHOOKS = 1 << 29;
        const USE_APPLICATION_COMMANDS = 1 << 31;
        const MANAGE_THREADS = 1 << 34;
        const MODERATE_MEMBERS = 1 << 40;
    }
}

impl Permissions {
    /// Whether this set grants `permission`
    ///
    /// Administrator implies every other permission.
    pub fn allows(&self, permission: Permission) -> bool {
        self.contains(Self::ADMINISTRATOR) || self.contains(permission.flag())
    }

    /// Permissions from `required` that this set does not grant, in order
    pub fn missing(&self, required: &[Permission]) -> Vec<Permission> {
        required
            .iter()
            .copied()
            .filter(|p| !self.allows(*p))
            .collect()
    }
}

/// A single named permission a command can require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    CreateInstantInvite,
    KickMembers,
    BanMembers,
    Administrator,
    ManageChannels,
    ManageGuild,
    AddReactions,
    ViewAuditLog,
    ViewChannel,
    SendMessages,
    ManageMessages,
    EmbedLinks,
    AttachFiles,
    ReadMessageHistory,
    MentionEveryone,
    Connect,
    Speak,
    MuteMembers,
    MoveMembers,
    ManageNicknames,
    ManageRoles,
    ManageWebhooks,
    UseApplicationCommands,
    ManageThreads,
    ModerateMembers,
}

impl Permission {
    /// The bit this permission occupies
    pub fn flag(self) -> Permissions {
        match self {
            Self::CreateInstantInvite => Permissions::CREATE_INSTANT_INVITE,
            Self::KickMembers => Permissions::KICK_MEMBERS,
            Self::BanMembers => Permissions::BAN_MEMBERS,
            Self::Administrator => Permissions::ADMINISTRATOR,
            Self::ManageChannels => Permissions::MANAGE_CHANNELS,
            Self::ManageGuild => Permissions::MANAGE_GUILD,
            Self::AddReactions => Permissions::ADD_REACTIONS,
            Self::ViewAuditLog => Permissions::VIEW_AUDIT_LOG,
            Self::ViewChannel => Permissions::VIEW_CHANNEL,
            Self::SendMessages => Permissions::SEND_MESSAGES,
            Self::ManageMessages => Permissions::MANAGE_MESSAGES,
            Self::EmbedLinks => Permissions::EMBED_LINKS,
            Self::AttachFiles => Permissions::ATTACH_FILES,
            Self::ReadMessageHistory => Permissions::READ_MESSAGE_HISTORY,
            Self::MentionEveryone => Permissions::MENTION_EVERYONE,
            Self::Connect => Permissions::CONNECT,
            Self::Speak => Permissions::SPEAK,
            Self::MuteMembers => Permissions::MUTE_MEMBERS,
            Self::MoveMembers => Permissions::MOVE_MEMBERS,
            Self::ManageNicknames => Permissions::MANAGE_NICKNAMES,
            Self::ManageRoles => Permissions::MANAGE_ROLES,
            Self::ManageWebhooks => Permissions::MANAGE_WEBHOOKS,
            Self::UseApplicationCommands => Permissions::USE_APPLICATION_COMMANDS,
            Self::ManageThreads => Permissions::MANAGE_THREADS,
            Self::ModerateMembers => Permissions::MODERATE_MEMBERS,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Deserialize either a single permission or a list of them
pub(crate) fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Permission>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Permission),
        Many(Vec<Permission>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(p) => vec![p],
        OneOrMany::Many(ps) => ps,
    })
}

/// Render a permission list the way rejection messages show it
pub(crate) fn format_missing(missing: &[Permission]) -> String {
    missing
        .iter()
        .map(|p| format!("`{}`", p))
        .collect::<Vec<_>>()
        .join(", ")
}
