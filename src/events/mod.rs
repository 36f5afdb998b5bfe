//! Canonical events and the publish/subscribe pipeline that produces them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::entity::{Channel, EntityKind, Guild, Interaction, Message, Role, Snowflake};

pub mod pipeline;

pub use pipeline::{
    Diagnostic, EventPipeline, EventSink, EventStream, PipelineState, SubscriberError, SubscriptionId,
};

/// Kind of canonical event. Subscriptions and sequence numbers are per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Guild became available.
    GuildCreated,
    /// Guild changed.
    GuildUpdated,
    /// Guild removed.
    GuildDeleted,
    /// Channel created.
    ChannelCreated,
    /// Channel changed.
    ChannelUpdated,
    /// Channel deleted.
    ChannelDeleted,
    /// Role created.
    RoleCreated,
    /// Role changed.
    RoleUpdated,
    /// Role deleted.
    RoleDeleted,
    /// New message.
    MessageReceived,
    /// Message edited.
    MessageUpdated,
    /// Message deleted.
    MessageDeleted,
    /// Slash command invoked.
    CommandInvoked,
    /// Message component used.
    ComponentUsed,
    /// User is typing into an autocompletable command option.
    AutocompleteRequested,
}

impl EventKind {
    /// Every event kind.
    pub const ALL: [EventKind; 15] = [
        EventKind::GuildCreated,
        EventKind::GuildUpdated,
        EventKind::GuildDeleted,
        EventKind::ChannelCreated,
        EventKind::ChannelUpdated,
        EventKind::ChannelDeleted,
        EventKind::RoleCreated,
        EventKind::RoleUpdated,
        EventKind::RoleDeleted,
        EventKind::MessageReceived,
        EventKind::MessageUpdated,
        EventKind::MessageDeleted,
        EventKind::CommandInvoked,
        EventKind::ComponentUsed,
        EventKind::AutocompleteRequested,
    ];

    /// Capability a backend needs before this kind can be subscribed to.
    pub fn required_capability(self) -> Option<Capability> {
        match self {
            Self::CommandInvoked | Self::AutocompleteRequested => Some(Capability::SlashCommands),
            Self::ComponentUsed => Some(Capability::ComponentInteractions),
            _ => None,
        }
    }

    /// Stable snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GuildCreated => "guild_created",
            Self::GuildUpdated => "guild_updated",
            Self::GuildDeleted => "guild_deleted",
            Self::ChannelCreated => "channel_created",
            Self::ChannelUpdated => "channel_updated",
            Self::ChannelDeleted => "channel_deleted",
            Self::RoleCreated => "role_created",
            Self::RoleUpdated => "role_updated",
            Self::RoleDeleted => "role_deleted",
            Self::MessageReceived => "message_received",
            Self::MessageUpdated => "message_updated",
            Self::MessageDeleted => "message_deleted",
            Self::CommandInvoked => "command_invoked",
            Self::ComponentUsed => "component_used",
            Self::AutocompleteRequested => "autocomplete_requested",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| format!("unknown event kind '{wanted}'"))
    }
}

/// Reference to a deleted entity. Deleted entities cannot be wrapped, only named.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Deletion {
    /// Kind of the deleted entity.
    pub entity: EntityKind,
    /// Its identifier.
    pub id: Snowflake,
    /// Owning guild or channel, when the backend reports it.
    pub parent: Option<Snowflake>,
}

/// Entities carried by a canonical event.
#[derive(Debug, Clone)]
pub enum EventPayload {
    /// Guild created or updated.
    Guild(Guild),
    /// Channel created or updated.
    Channel(Channel),
    /// Role created or updated.
    Role(Role),
    /// Message received or updated.
    Message(Message),
    /// Command or component interaction.
    Interaction(Interaction),
    /// Something was deleted.
    Deleted(Deletion),
}

/// A backend event translated into canonical entities.
#[derive(Debug, Clone)]
pub struct CanonicalEvent {
    /// Gapless position among events of this kind, starting at 1.
    pub sequence: u64,
    /// Position among all events of the session.
    pub session_sequence: u64,
    /// Event kind.
    pub kind: EventKind,
    /// Translated payload.
    pub payload: EventPayload,
}

impl CanonicalEvent {
    /// One-line human-readable description.
    pub fn summary(&self) -> String {
        match &self.payload {
            EventPayload::Guild(guild) => format!("guild {} '{}'", guild.id, guild.name),
            EventPayload::Channel(channel) => format!("channel {} ({:?})", channel.id, channel.kind),
            EventPayload::Role(role) => format!("role {} '{}'", role.id, role.name),
            EventPayload::Message(message) => format!(
                "message {} in {} from {}: {}",
                message.id, message.channel_id, message.author.name, message.content
            ),
            EventPayload::Interaction(interaction) => format!(
                "interaction {} by {}",
                interaction.id, interaction.user.name
            ),
            EventPayload::Deleted(deletion) => {
                format!("{} {} deleted", deletion.entity, deletion.id)
            }
        }
    }
}
