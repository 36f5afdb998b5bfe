//! Canonical, backend-independent entities.
//!
//! Every entity is a plain value: a stable platform identifier plus fields
//! that mean the same thing on every backend. Fields a backend cannot supply
//! are [`Field::Unsupported`], never a default that could pass for real data.
//!
//! Equality and hashing use the platform identifier only. Two entities with the
//! same identifier are the same remote object, even when they were wrapped by
//! different sessions or different backends. The back-reference to the native
//! object never takes part in comparisons.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod adapter;
pub mod command;
pub mod session;

pub use adapter::{Canonical, NativeObject, ObjectAdapter};
pub use command::{
    ChoiceValue, CommandData, CommandDataError, CommandOptionData, Locale, OptionChoice,
    OptionKind, ValueBound, MAX_CHOICE_COUNT, MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH,
    MAX_OPTION_COUNT, NAME_PATTERN,
};
pub use session::{NativeHandle, SessionTable};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Platform-wide entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snowflake(pub u64);

impl Snowflake {
    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u64> for Snowflake {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Identifier of one connected backend session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

impl SessionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Kind of canonical entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A guild (server).
    Guild,
    /// A channel of any kind.
    Channel,
    /// A user account.
    User,
    /// A message.
    Message,
    /// A guild role.
    Role,
    /// A registered application command.
    Command,
    /// An incoming interaction.
    Interaction,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Guild => "guild",
            Self::Channel => "channel",
            Self::User => "user",
            Self::Message => "message",
            Self::Role => "role",
            Self::Command => "command",
            Self::Interaction => "interaction",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// A canonical field whose value may not be available from every backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Field<T> {
    /// The backend supplied this value.
    Known(T),
    /// The backend's native model has no such field.
    #[default]
    Unsupported,
}

impl<T> Field<T> {
    /// Borrow the value when known.
    pub fn known(&self) -> Option<&T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unsupported => None,
        }
    }

    /// Whether the backend supplies this field.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Convert into an `Option`, dropping the distinction between
    /// "unsupported" and any absence the value itself encodes.
    pub fn into_known(self) -> Option<T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unsupported => None,
        }
    }

    /// Map a known value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Self::Known(value) => Field::Known(f(value)),
            Self::Unsupported => Field::Unsupported,
        }
    }
}

// ---------------------------------------------------------------------------
// Channel kinds
// ---------------------------------------------------------------------------

/// Kind of channel. Backends may support only part of this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Direct message channel.
    Private,
    /// Group direct message channel.
    Group,
    /// Guild text channel.
    Text,
    /// Guild voice channel.
    Voice,
    /// Guild category.
    Category,
    /// Guild announcement channel.
    News,
    /// Guild stage channel.
    Stage,
    /// Thread under an announcement channel.
    NewsThread,
    /// Public thread.
    PublicThread,
    /// Private thread.
    PrivateThread,
    /// Forum channel.
    Forum,
    /// Media channel.
    Media,
    /// Any kind the backend cannot represent canonically.
    Unknown,
}

impl ChannelKind {
    /// Every channel kind except [`ChannelKind::Unknown`].
    pub const ALL: [ChannelKind; 12] = [
        ChannelKind::Private,
        ChannelKind::Group,
        ChannelKind::Text,
        ChannelKind::Voice,
        ChannelKind::Category,
        ChannelKind::News,
        ChannelKind::Stage,
        ChannelKind::NewsThread,
        ChannelKind::PublicThread,
        ChannelKind::PrivateThread,
        ChannelKind::Forum,
        ChannelKind::Media,
    ];

    /// Whether this is a thread kind.
    pub fn is_thread(self) -> bool {
        matches!(
            self,
            Self::NewsThread | Self::PublicThread | Self::PrivateThread
        )
    }

    /// Whether this kind belongs to a guild.
    pub fn is_guild_channel(self) -> bool {
        !matches!(self, Self::Private | Self::Group | Self::Unknown)
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

macro_rules! identity_by_id {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl PartialEq for $ty {
                fn eq(&self, other: &Self) -> bool {
                    self.id == other.id
                }
            }

            impl Eq for $ty {}

            impl Hash for $ty {
                fn hash<H: Hasher>(&self, state: &mut H) {
                    self.id.hash(state);
                }
            }
        )+
    };
}

/// A guild (server).
#[derive(Debug, Clone)]
pub struct Guild {
    /// Platform identifier.
    pub id: Snowflake,
    /// Guild name.
    pub name: String,
    /// Owner's user identifier.
    pub owner_id: Field<Snowflake>,
    /// Approximate member count.
    pub member_count: Field<u64>,
    pub(crate) handle: NativeHandle,
}

/// A channel of any kind.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Platform identifier.
    pub id: Snowflake,
    /// Channel kind, [`ChannelKind::Unknown`] if the backend cannot represent it.
    pub kind: ChannelKind,
    /// Channel name; direct messages have none.
    pub name: Field<Option<String>>,
    /// Owning guild, `None` for direct messages.
    pub guild_id: Field<Option<Snowflake>>,
    /// Parent category or thread parent.
    pub parent_id: Field<Option<Snowflake>>,
    /// Channel topic.
    pub topic: Field<Option<String>>,
    pub(crate) handle: NativeHandle,
}

/// A user account.
#[derive(Debug, Clone)]
pub struct User {
    /// Platform identifier.
    pub id: Snowflake,
    /// Unique username.
    pub name: String,
    /// Display name, if the user set one.
    pub display_name: Field<Option<String>>,
    /// Whether the account is a bot.
    pub bot: Field<bool>,
    pub(crate) handle: NativeHandle,
}

/// A message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Platform identifier.
    pub id: Snowflake,
    /// Channel the message was posted in.
    pub channel_id: Snowflake,
    /// Message author.
    pub author: User,
    /// Text content.
    pub content: String,
    /// Creation time.
    pub created_at: Field<DateTime<Utc>>,
    /// Last edit time, `None` if never edited.
    pub edited_at: Field<Option<DateTime<Utc>>>,
    pub(crate) handle: NativeHandle,
}

/// A guild role.
#[derive(Debug, Clone)]
pub struct Role {
    /// Platform identifier.
    pub id: Snowflake,
    /// Owning guild.
    pub guild_id: Field<Snowflake>,
    /// Role name.
    pub name: String,
    /// RGB colour.
    pub color: Field<u32>,
    /// Sort position.
    pub position: Field<i64>,
    /// Whether the role can be mentioned by everyone.
    pub mentionable: Field<bool>,
    pub(crate) handle: NativeHandle,
}

/// A registered application (slash) command.
#[derive(Debug, Clone)]
pub struct Command {
    /// Platform identifier.
    pub id: Snowflake,
    /// Command name.
    pub name: String,
    /// Command description.
    pub description: Field<String>,
    /// Guild the command is scoped to, `None` for global commands.
    pub guild_id: Field<Option<Snowflake>>,
    pub(crate) handle: NativeHandle,
}

/// Kind of incoming interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// A slash command invocation.
    Command,
    /// A message component (button, select menu) was used.
    Component,
    /// The user is typing into an autocompletable command option.
    Autocomplete,
}

/// An incoming interaction.
#[derive(Debug, Clone)]
pub struct Interaction {
    /// Platform identifier.
    pub id: Snowflake,
    /// Interaction kind.
    pub kind: InteractionKind,
    /// Channel the interaction happened in.
    pub channel_id: Field<Snowflake>,
    /// User who triggered it.
    pub user: User,
    /// Invoked command name, for command interactions.
    pub command_name: Field<String>,
    /// Component custom id, for component interactions.
    pub custom_id: Field<String>,
    /// Supplied command arguments.
    pub arguments: Field<Vec<CommandArgument>>,
    pub(crate) handle: NativeHandle,
}

impl Interaction {
    /// The argument being autocompleted, if any.
    pub fn focused_argument(&self) -> Option<&CommandArgument> {
        self.arguments.known()?.iter().find(|argument| argument.focused)
    }
}

identity_by_id!(Guild, Channel, User, Message, Role, Command, Interaction);

// ---------------------------------------------------------------------------
// Interaction arguments
// ---------------------------------------------------------------------------

/// Value supplied for a command option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OptionValue {
    /// Free text.
    String(String),
    /// Integer.
    Integer(i64),
    /// Floating point number.
    Number(f64),
    /// Boolean flag.
    Boolean(bool),
    /// User reference.
    User(Snowflake),
    /// Channel reference.
    Channel(Snowflake),
    /// Role reference.
    Role(Snowflake),
    /// User or role reference.
    Mentionable(Snowflake),
    /// Attachment reference.
    Attachment(Snowflake),
}

/// A named argument of a command invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandArgument {
    /// Option name.
    pub name: String,
    /// Supplied value. Possibly partial in an autocomplete interaction.
    pub value: OptionValue,
    /// The option the user is typing into, for autocomplete interactions.
    #[serde(default)]
    pub focused: bool,
}

// ---------------------------------------------------------------------------
// Outbound drafts
// ---------------------------------------------------------------------------

/// Content of a message to send or an edit to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDraft {
    /// Text content.
    pub content: String,
    /// Message being replied to.
    #[serde(default)]
    pub reply_to: Option<Snowflake>,
    /// Suppress push notifications.
    #[serde(default)]
    pub silent: bool,
}

impl MessageDraft {
    /// Plain text message.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Reply to an existing message.
    pub fn replying_to(mut self, message: Snowflake) -> Self {
        self.reply_to = Some(message);
        self
    }
}

/// Response to an interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionResponse {
    /// Text content.
    pub content: String,
    /// Only visible to the invoking user.
    #[serde(default)]
    pub ephemeral: bool,
}
