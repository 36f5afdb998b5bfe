//! The boundary every backend adapter implements.
//!
//! A backend supplies:
//! - a [`BackendFactory`] that opens (or adopts) a connected native client,
//! - the [`BackendClient`] itself, whose optional sub-interfaces define its
//!   capability set,
//! - translation hooks on its native entity types (see [`native`]),
//! - a native event source per event kind,
//! - native results shaped as one of the [`NativeCall`] variants.

use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

use futures::stream::BoxStream;

use crate::capability::CapabilitySet;
use crate::entity::{
    ChannelKind, CommandData, InteractionResponse, MessageDraft, OptionChoice, Snowflake,
};
use crate::error::NativeError;
use crate::events::{EventKind, EventSink};
use crate::runtime::NativeCall;

pub mod connection;
pub mod native;

pub use connection::{ConnectionConfig, Credential, Intent};
pub use native::{
    NativeChannel, NativeCommand, NativeGuild, NativeInteraction, NativeMessage, NativeRole,
    NativeUser,
};

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Static metadata a backend declares about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    /// Stable identifier used for explicit selection.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Rank for automatic selection; higher wins.
    pub priority: i32,
}

/// Entry point of a backend: produces connected native clients.
pub trait BackendFactory: Send + Sync + 'static {
    /// Identifier, name and priority.
    fn info(&self) -> BackendInfo;

    /// Capabilities this backend version declares.
    fn capabilities(&self) -> CapabilitySet;

    /// Channel kinds the backend's native model can represent.
    fn supported_channel_kinds(&self) -> BTreeSet<ChannelKind> {
        ChannelKind::ALL.into_iter().collect()
    }

    /// Perform the connection handshake.
    fn connect(&self, config: &ConnectionConfig) -> NativeCall<Arc<dyn BackendClient>>;

    /// Whether `native` is a client object this backend can wrap as-is.
    ///
    /// Returning `true` obliges [`BackendFactory::adopt`] to succeed.
    fn can_adopt(&self, _native: &(dyn Any + Send + Sync)) -> bool {
        false
    }

    /// Wrap an already-connected native client.
    ///
    /// # Errors
    ///
    /// Returns the native error if the object is not a client of this backend.
    fn adopt(
        &self,
        _native: Arc<dyn Any + Send + Sync>,
    ) -> Result<Arc<dyn BackendClient>, NativeError> {
        Err(format!("backend '{}' cannot adopt native clients", self.info().id).into())
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A connected native client.
///
/// Optional sub-interfaces return `None` when the backend structurally lacks
/// the feature; the facade never emulates them.
pub trait BackendClient: Send + Sync + 'static {
    /// All guilds the account is in.
    fn guilds(&self) -> NativeCall<Vec<Arc<dyn NativeGuild>>>;

    /// Look up a guild.
    fn guild(&self, id: Snowflake) -> NativeCall<Option<Arc<dyn NativeGuild>>>;

    /// Channels of a guild.
    fn channels(&self, guild: &Arc<dyn NativeGuild>) -> NativeCall<Vec<Arc<dyn NativeChannel>>>;

    /// Look up a channel.
    fn channel(&self, id: Snowflake) -> NativeCall<Option<Arc<dyn NativeChannel>>>;

    /// Look up a user.
    fn user(&self, id: Snowflake) -> NativeCall<Option<Arc<dyn NativeUser>>>;

    /// Roles of a guild.
    fn roles(&self, guild: &Arc<dyn NativeGuild>) -> NativeCall<Vec<Arc<dyn NativeRole>>>;

    /// Post a message.
    fn send_message(
        &self,
        channel: &Arc<dyn NativeChannel>,
        draft: &MessageDraft,
    ) -> NativeCall<Arc<dyn NativeMessage>>;

    /// Edit a message.
    fn edit_message(
        &self,
        message: &Arc<dyn NativeMessage>,
        draft: &MessageDraft,
    ) -> NativeCall<Arc<dyn NativeMessage>>;

    /// Delete a message.
    fn delete_message(&self, message: &Arc<dyn NativeMessage>) -> NativeCall<()>;

    /// Delete a channel.
    fn delete_channel(&self, channel: &Arc<dyn NativeChannel>) -> NativeCall<()>;

    /// Native event source for one event kind, `None` if never emitted.
    fn event_source(&self, kind: EventKind) -> Option<NativeEventSource>;

    /// Close the native session.
    fn shutdown(&self) -> NativeCall<()>;

    /// The native client object, for backend-specific calls.
    fn as_any(&self) -> &dyn Any;

    /// Voice sub-interface.
    fn voice(&self) -> Option<&dyn VoiceSupport> {
        None
    }

    /// Thread sub-interface.
    fn threads(&self) -> Option<&dyn ThreadSupport> {
        None
    }

    /// Slash command sub-interface.
    fn commands(&self) -> Option<&dyn CommandSupport> {
        None
    }

    /// Component interaction sub-interface.
    fn components(&self) -> Option<&dyn ComponentSupport> {
        None
    }

    /// Message history sub-interface.
    fn history(&self) -> Option<&dyn HistorySupport> {
        None
    }
}

/// Voice channel support.
pub trait VoiceSupport: Send + Sync {
    /// Join a voice channel.
    fn join(&self, channel: &Arc<dyn NativeChannel>) -> NativeCall<()>;
    /// Leave voice in a guild.
    fn leave(&self, guild: &Arc<dyn NativeGuild>) -> NativeCall<()>;
}

/// Thread support.
pub trait ThreadSupport: Send + Sync {
    /// Start a thread under `parent`.
    fn create_thread(
        &self,
        parent: &Arc<dyn NativeChannel>,
        name: &str,
    ) -> NativeCall<Arc<dyn NativeChannel>>;
}

/// Slash command support.
pub trait CommandSupport: Send + Sync {
    /// Registered global commands.
    fn global_commands(&self) -> NativeCall<Vec<Arc<dyn NativeCommand>>>;
    /// Overwrite the global command list.
    fn set_global_commands(&self, commands: &[CommandData])
        -> NativeCall<Vec<Arc<dyn NativeCommand>>>;
    /// Registered commands of a guild.
    fn guild_commands(&self, guild: &Arc<dyn NativeGuild>) -> NativeCall<Vec<Arc<dyn NativeCommand>>>;
    /// Overwrite a guild's command list.
    fn set_guild_commands(
        &self,
        guild: &Arc<dyn NativeGuild>,
        commands: &[CommandData],
    ) -> NativeCall<Vec<Arc<dyn NativeCommand>>>;
    /// Respond to a command invocation.
    fn respond(
        &self,
        interaction: &Arc<dyn NativeInteraction>,
        response: &InteractionResponse,
    ) -> NativeCall<()>;
    /// Answer an autocomplete interaction with suggested choices.
    fn suggest(
        &self,
        interaction: &Arc<dyn NativeInteraction>,
        choices: &[OptionChoice],
    ) -> NativeCall<()>;
    /// Send a followup message to an interaction that was already answered.
    fn followup(
        &self,
        interaction: &Arc<dyn NativeInteraction>,
        response: &InteractionResponse,
    ) -> NativeCall<Arc<dyn NativeMessage>>;
    /// Edit a followup message sent by [`Self::followup`].
    fn edit_followup(
        &self,
        interaction: &Arc<dyn NativeInteraction>,
        message: &Arc<dyn NativeMessage>,
        response: &InteractionResponse,
    ) -> NativeCall<Arc<dyn NativeMessage>>;
}

/// Message component support.
pub trait ComponentSupport: Send + Sync {
    /// Acknowledge a component interaction.
    fn acknowledge(
        &self,
        interaction: &Arc<dyn NativeInteraction>,
        response: &InteractionResponse,
    ) -> NativeCall<()>;
}

/// Message history support.
pub trait HistorySupport: Send + Sync {
    /// Messages of `channel`, newest first, at most `limit`.
    ///
    /// Each element of the native result is one message; streaming backends
    /// return [`NativeCall::Stream`].
    fn history(&self, channel: &Arc<dyn NativeChannel>, limit: usize)
        -> NativeCall<Arc<dyn NativeMessage>>;
}

// ---------------------------------------------------------------------------
// Native events
// ---------------------------------------------------------------------------

/// An event as the backend delivers it, carrying native objects.
#[derive(Clone)]
pub enum NativeEvent {
    /// Guild became available.
    GuildCreated(Arc<dyn NativeGuild>),
    /// Guild changed.
    GuildUpdated(Arc<dyn NativeGuild>),
    /// Guild removed.
    GuildDeleted(Snowflake),
    /// Channel created.
    ChannelCreated(Arc<dyn NativeChannel>),
    /// Channel changed.
    ChannelUpdated(Arc<dyn NativeChannel>),
    /// Channel deleted.
    ChannelDeleted {
        /// Owning guild, if any.
        guild_id: Option<Snowflake>,
        /// Deleted channel.
        channel_id: Snowflake,
    },
    /// Role created.
    RoleCreated(Arc<dyn NativeRole>),
    /// Role changed.
    RoleUpdated(Arc<dyn NativeRole>),
    /// Role deleted.
    RoleDeleted {
        /// Owning guild.
        guild_id: Snowflake,
        /// Deleted role.
        role_id: Snowflake,
    },
    /// New message.
    MessageReceived(Arc<dyn NativeMessage>),
    /// Message edited.
    MessageUpdated(Arc<dyn NativeMessage>),
    /// Message deleted.
    MessageDeleted {
        /// Channel of the message.
        channel_id: Snowflake,
        /// Deleted message.
        message_id: Snowflake,
    },
    /// Slash command invoked.
    CommandInvoked(Arc<dyn NativeInteraction>),
    /// Message component used.
    ComponentUsed(Arc<dyn NativeInteraction>),
    /// Autocomplete requested for a command option.
    AutocompleteRequested(Arc<dyn NativeInteraction>),
}

impl NativeEvent {
    /// Event kind this native event maps to.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::GuildCreated(_) => EventKind::GuildCreated,
            Self::GuildUpdated(_) => EventKind::GuildUpdated,
            Self::GuildDeleted(_) => EventKind::GuildDeleted,
            Self::ChannelCreated(_) => EventKind::ChannelCreated,
            Self::ChannelUpdated(_) => EventKind::ChannelUpdated,
            Self::ChannelDeleted { .. } => EventKind::ChannelDeleted,
            Self::RoleCreated(_) => EventKind::RoleCreated,
            Self::RoleUpdated(_) => EventKind::RoleUpdated,
            Self::RoleDeleted { .. } => EventKind::RoleDeleted,
            Self::MessageReceived(_) => EventKind::MessageReceived,
            Self::MessageUpdated(_) => EventKind::MessageUpdated,
            Self::MessageDeleted { .. } => EventKind::MessageDeleted,
            Self::CommandInvoked(_) => EventKind::CommandInvoked,
            Self::ComponentUsed(_) => EventKind::ComponentUsed,
            Self::AutocompleteRequested(_) => EventKind::AutocompleteRequested,
        }
    }
}

impl std::fmt::Debug for NativeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NativeEvent").field(&self.kind()).finish()
    }
}

/// Detaches a listener-style registration when called.
pub type Detach = Box<dyn FnOnce() + Send>;

/// How a backend delivers one kind of event.
pub enum NativeEventSource {
    /// Callback registration: the backend keeps the sink and calls it from
    /// its own threads. The returned [`Detach`] removes the registration.
    Listener(Box<dyn FnOnce(EventSink) -> Detach + Send>),
    /// Reactive stream of events; the pipeline drives it on a task.
    Stream(BoxStream<'static, NativeEvent>),
}

impl std::fmt::Debug for NativeEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listener(_) => f.write_str("NativeEventSource::Listener"),
            Self::Stream(_) => f.write_str("NativeEventSource::Stream"),
        }
    }
}
