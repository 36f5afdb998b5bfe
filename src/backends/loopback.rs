//! In-memory chat platform and the backend that talks to it.
//!
//! [`LoopbackPlatform`] plays the remote service: tests and the CLI use it
//! to inject guilds, channels and messages as if other users had created
//! them. The backend answers queries synchronously, mutations as futures,
//! channel deletion as a suspended computation and message history as a
//! reactive stream, so every normalizer path is exercised against one
//! coherent data set.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::backend::{
    BackendClient, BackendFactory, BackendInfo, ConnectionConfig, Detach, HistorySupport,
    NativeChannel, NativeEvent, NativeEventSource, NativeGuild, NativeMessage, NativeRole,
    NativeUser, ThreadSupport,
};
use crate::capability::{Capability, CapabilitySet};
use crate::entity::{ChannelKind, EntityKind, Field, MessageDraft, Snowflake};
use crate::error::NativeError;
use crate::events::{EventKind, EventSink};
use crate::registry::BackendRegistration;
use crate::runtime::NativeCall;

/// Identifier the loopback backend registers under.
pub const LOOPBACK_ID: &str = "loopback";

/// Failures of the in-memory platform.
#[derive(Debug, thiserror::Error)]
pub enum LoopbackError {
    /// The connection token was empty.
    #[error("loopback requires a non-empty token")]
    MissingToken,
    /// The referenced entity does not exist on the platform.
    #[error("unknown {kind} {id}")]
    Unknown {
        /// Entity kind.
        kind: EntityKind,
        /// Entity identifier.
        id: Snowflake,
    },
    /// Threads can only be started under text or announcement channels.
    #[error("channel {0} cannot hold threads")]
    NotThreadable(Snowflake),
    /// The client was shut down.
    #[error("loopback client is shut down")]
    Closed,
}

// ---------------------------------------------------------------------------
// Native objects
// ---------------------------------------------------------------------------

/// Loopback guild.
#[derive(Debug, Clone)]
pub struct LoopGuild {
    id: Snowflake,
    name: String,
    owner_id: Snowflake,
}

impl NativeGuild for LoopGuild {
    fn id(&self) -> Snowflake {
        self.id
    }
    fn name(&self) -> String {
        self.name.clone()
    }
    fn owner_id(&self) -> Field<Snowflake> {
        Field::Known(self.owner_id)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Loopback channel.
#[derive(Debug, Clone)]
pub struct LoopChannel {
    id: Snowflake,
    kind: ChannelKind,
    name: String,
    guild_id: Option<Snowflake>,
    parent_id: Option<Snowflake>,
}

impl NativeChannel for LoopChannel {
    fn id(&self) -> Snowflake {
        self.id
    }
    fn kind(&self) -> ChannelKind {
        self.kind
    }
    fn name(&self) -> Field<Option<String>> {
        Field::Known(Some(self.name.clone()))
    }
    fn guild_id(&self) -> Field<Option<Snowflake>> {
        Field::Known(self.guild_id)
    }
    fn parent_id(&self) -> Field<Option<Snowflake>> {
        Field::Known(self.parent_id)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Loopback user.
#[derive(Debug, Clone)]
pub struct LoopUser {
    id: Snowflake,
    name: String,
    bot: bool,
}

impl NativeUser for LoopUser {
    fn id(&self) -> Snowflake {
        self.id
    }
    fn name(&self) -> String {
        self.name.clone()
    }
    fn display_name(&self) -> Field<Option<String>> {
        Field::Known(None)
    }
    fn bot(&self) -> Field<bool> {
        Field::Known(self.bot)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Loopback message.
#[derive(Debug, Clone)]
pub struct LoopMessage {
    id: Snowflake,
    channel_id: Snowflake,
    author: Arc<LoopUser>,
    content: String,
    created_at: DateTime<Utc>,
    edited_at: Option<DateTime<Utc>>,
}

impl NativeMessage for LoopMessage {
    fn id(&self) -> Snowflake {
        self.id
    }
    fn channel_id(&self) -> Snowflake {
        self.channel_id
    }
    fn author(&self) -> Arc<dyn NativeUser> {
        Arc::clone(&self.author) as Arc<dyn NativeUser>
    }
    fn content(&self) -> String {
        self.content.clone()
    }
    fn created_at(&self) -> Field<DateTime<Utc>> {
        Field::Known(self.created_at)
    }
    fn edited_at(&self) -> Field<Option<DateTime<Utc>>> {
        Field::Known(self.edited_at)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Loopback role. Colour and mentionability are not modelled.
#[derive(Debug, Clone)]
pub struct LoopRole {
    id: Snowflake,
    guild_id: Snowflake,
    name: String,
    position: i64,
}

impl NativeRole for LoopRole {
    fn id(&self) -> Snowflake {
        self.id
    }
    fn name(&self) -> String {
        self.name.clone()
    }
    fn guild_id(&self) -> Field<Snowflake> {
        Field::Known(self.guild_id)
    }
    fn position(&self) -> Field<i64> {
        Field::Known(self.position)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

struct PlatformState {
    next_id: u64,
    next_listener: u64,
    guilds: BTreeMap<Snowflake, Arc<LoopGuild>>,
    channels: BTreeMap<Snowflake, Arc<LoopChannel>>,
    users: BTreeMap<Snowflake, Arc<LoopUser>>,
    roles: BTreeMap<Snowflake, Arc<LoopRole>>,
    messages: BTreeMap<Snowflake, Arc<LoopMessage>>,
    listeners: BTreeMap<EventKind, BTreeMap<u64, EventSink>>,
}

impl PlatformState {
    fn allocate(&mut self) -> Snowflake {
        self.next_id = self.next_id.saturating_add(1);
        Snowflake(self.next_id)
    }

    fn sinks(&self, kind: EventKind) -> Vec<EventSink> {
        self.listeners
            .get(&kind)
            .map(|sinks| sinks.values().cloned().collect())
            .unwrap_or_default()
    }
}

/// The simulated remote service. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct LoopbackPlatform {
    state: Arc<Mutex<PlatformState>>,
    bot: Arc<LoopUser>,
}

impl Default for LoopbackPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackPlatform {
    /// An empty platform with a bot account.
    pub fn new() -> Self {
        let bot = Arc::new(LoopUser {
            id: Snowflake(1),
            name: "loopback-bot".to_owned(),
            bot: true,
        });
        let mut users = BTreeMap::new();
        users.insert(bot.id, Arc::clone(&bot));
        Self {
            state: Arc::new(Mutex::new(PlatformState {
                next_id: 1000,
                next_listener: 0,
                guilds: BTreeMap::new(),
                channels: BTreeMap::new(),
                users,
                roles: BTreeMap::new(),
                messages: BTreeMap::new(),
                listeners: BTreeMap::new(),
            })),
            bot,
        }
    }

    /// A platform with one guild, a few channels and a user.
    pub fn demo() -> Self {
        let platform = Self::new();
        let guild = platform.add_guild("Loopback Guild");
        let general = platform.add_channel(guild, "general", ChannelKind::Text);
        platform.add_channel(guild, "lounge", ChannelKind::Voice);
        platform.add_channel(guild, "showcase", ChannelKind::Forum);
        platform.add_role(guild, "moderator");
        let user = platform.add_user("alice");
        platform.post_message(general, user, "hello from the loopback platform");
        platform
    }

    /// Process-wide platform used by the registered backend.
    pub fn shared() -> Self {
        static SHARED: OnceLock<LoopbackPlatform> = OnceLock::new();
        SHARED.get_or_init(Self::demo).clone()
    }

    /// The bot account clients act as.
    pub fn bot_id(&self) -> Snowflake {
        self.bot.id
    }

    /// Create a guild owned by the bot.
    pub fn add_guild(&self, name: &str) -> Snowflake {
        let (guild, sinks) = {
            let mut state = self.state.lock();
            let guild = Arc::new(LoopGuild {
                id: state.allocate(),
                name: name.to_owned(),
                owner_id: self.bot.id,
            });
            state.guilds.insert(guild.id, Arc::clone(&guild));
            (guild, state.sinks(EventKind::GuildCreated))
        };
        let id = guild.id;
        emit(&sinks, &NativeEvent::GuildCreated(guild));
        id
    }

    /// Create a guild channel.
    pub fn add_channel(&self, guild: Snowflake, name: &str, kind: ChannelKind) -> Snowflake {
        let channel = self.insert_channel(Some(guild), None, name, kind);
        channel.id
    }

    /// Register a (non-bot) user.
    pub fn add_user(&self, name: &str) -> Snowflake {
        let mut state = self.state.lock();
        let user = Arc::new(LoopUser {
            id: state.allocate(),
            name: name.to_owned(),
            bot: false,
        });
        let id = user.id;
        state.users.insert(id, user);
        id
    }

    /// Create a role in `guild`.
    pub fn add_role(&self, guild: Snowflake, name: &str) -> Snowflake {
        let (role, sinks) = {
            let mut state = self.state.lock();
            let position = i64::try_from(state.roles.len()).unwrap_or(i64::MAX);
            let role = Arc::new(LoopRole {
                id: state.allocate(),
                guild_id: guild,
                name: name.to_owned(),
                position,
            });
            state.roles.insert(role.id, Arc::clone(&role));
            (role, state.sinks(EventKind::RoleCreated))
        };
        let id = role.id;
        emit(&sinks, &NativeEvent::RoleCreated(role));
        id
    }

    /// Post a message as `author`, as another client of the platform would.
    ///
    /// Returns `None` when the channel or author does not exist.
    pub fn post_message(&self, channel: Snowflake, author: Snowflake, content: &str) -> Option<Snowflake> {
        let author = self.state.lock().users.get(&author).cloned()?;
        self.insert_message(channel, author, content)
            .ok()
            .map(|message| message.id)
    }

    /// Simulate a session loss: every attached listener is told the backend
    /// disconnected.
    pub fn disconnect(&self, reason: &str) {
        let sinks: Vec<EventSink> = {
            let state = self.state.lock();
            state
                .listeners
                .values()
                .flat_map(|sinks| sinks.values().cloned())
                .collect()
        };
        for sink in sinks {
            sink.disconnected(reason);
        }
    }

    /// Contents of the messages in `channel`, oldest first.
    pub fn messages(&self, channel: Snowflake) -> Vec<String> {
        self.state
            .lock()
            .messages
            .values()
            .filter(|message| message.channel_id == channel)
            .map(|message| message.content.clone())
            .collect()
    }

    /// Number of attached listener registrations.
    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.values().map(BTreeMap::len).sum()
    }

    // -----------------------------------------------------------------------
    // Internals used by the client
    // -----------------------------------------------------------------------

    fn insert_channel(
        &self,
        guild: Option<Snowflake>,
        parent: Option<Snowflake>,
        name: &str,
        kind: ChannelKind,
    ) -> Arc<LoopChannel> {
        let (channel, sinks) = {
            let mut state = self.state.lock();
            let channel = Arc::new(LoopChannel {
                id: state.allocate(),
                kind,
                name: name.to_owned(),
                guild_id: guild,
                parent_id: parent,
            });
            state.channels.insert(channel.id, Arc::clone(&channel));
            (channel, state.sinks(EventKind::ChannelCreated))
        };
        emit(&sinks, &NativeEvent::ChannelCreated(Arc::clone(&channel) as Arc<dyn NativeChannel>));
        channel
    }

    fn insert_message(
        &self,
        channel: Snowflake,
        author: Arc<LoopUser>,
        content: &str,
    ) -> Result<Arc<LoopMessage>, LoopbackError> {
        let (message, sinks) = {
            let mut state = self.state.lock();
            if !state.channels.contains_key(&channel) {
                return Err(LoopbackError::Unknown {
                    kind: EntityKind::Channel,
                    id: channel,
                });
            }
            let message = Arc::new(LoopMessage {
                id: state.allocate(),
                channel_id: channel,
                author,
                content: content.to_owned(),
                created_at: Utc::now(),
                edited_at: None,
            });
            state.messages.insert(message.id, Arc::clone(&message));
            (message, state.sinks(EventKind::MessageReceived))
        };
        emit(&sinks, &NativeEvent::MessageReceived(Arc::clone(&message) as Arc<dyn NativeMessage>));
        Ok(message)
    }

    fn edit_message(&self, id: Snowflake, content: &str) -> Result<Arc<LoopMessage>, LoopbackError> {
        let (message, sinks) = {
            let mut state = self.state.lock();
            let previous = state.messages.get(&id).ok_or(LoopbackError::Unknown {
                kind: EntityKind::Message,
                id,
            })?;
            let message = Arc::new(LoopMessage {
                content: content.to_owned(),
                edited_at: Some(Utc::now()),
                ..LoopMessage::clone(previous)
            });
            state.messages.insert(id, Arc::clone(&message));
            (message, state.sinks(EventKind::MessageUpdated))
        };
        emit(&sinks, &NativeEvent::MessageUpdated(Arc::clone(&message) as Arc<dyn NativeMessage>));
        Ok(message)
    }

    fn remove_message(&self, id: Snowflake) -> Result<(), LoopbackError> {
        let (message, sinks) = {
            let mut state = self.state.lock();
            let message = state.messages.remove(&id).ok_or(LoopbackError::Unknown {
                kind: EntityKind::Message,
                id,
            })?;
            (message, state.sinks(EventKind::MessageDeleted))
        };
        emit(
            &sinks,
            &NativeEvent::MessageDeleted {
                channel_id: message.channel_id,
                message_id: message.id,
            },
        );
        Ok(())
    }

    fn remove_channel(&self, id: Snowflake) -> Result<(), LoopbackError> {
        let (channel, sinks) = {
            let mut state = self.state.lock();
            let channel = state.channels.remove(&id).ok_or(LoopbackError::Unknown {
                kind: EntityKind::Channel,
                id,
            })?;
            state.messages.retain(|_, message| message.channel_id != id);
            (channel, state.sinks(EventKind::ChannelDeleted))
        };
        emit(
            &sinks,
            &NativeEvent::ChannelDeleted {
                guild_id: channel.guild_id,
                channel_id: channel.id,
            },
        );
        Ok(())
    }

    fn attach(&self, kind: EventKind, sink: EventSink) -> u64 {
        let mut state = self.state.lock();
        state.next_listener = state.next_listener.saturating_add(1);
        let id = state.next_listener;
        state.listeners.entry(kind).or_default().insert(id, sink);
        id
    }

    fn detach(&self, kind: EventKind, id: u64) {
        let mut state = self.state.lock();
        if let Some(sinks) = state.listeners.get_mut(&kind) {
            sinks.remove(&id);
        }
    }
}

impl std::fmt::Debug for LoopbackPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LoopbackPlatform")
            .field("guilds", &state.guilds.len())
            .field("channels", &state.channels.len())
            .field("messages", &state.messages.len())
            .finish_non_exhaustive()
    }
}

fn emit(sinks: &[EventSink], event: &NativeEvent) {
    for sink in sinks {
        sink.emit(event.clone());
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Factory connecting to a [`LoopbackPlatform`].
#[derive(Debug, Clone)]
pub struct LoopbackFactory {
    platform: LoopbackPlatform,
}

impl LoopbackFactory {
    /// Factory for `platform`.
    pub fn new(platform: LoopbackPlatform) -> Self {
        Self { platform }
    }
}

fn registered_factory() -> Arc<dyn BackendFactory> {
    Arc::new(LoopbackFactory::new(LoopbackPlatform::shared()))
}

inventory::submit!(BackendRegistration::new(registered_factory));

impl BackendFactory for LoopbackFactory {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            id: LOOPBACK_ID.to_owned(),
            name: "Loopback (in-memory)".to_owned(),
            priority: 0,
        }
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::from([Capability::ThreadedChannels, Capability::MessageHistory])
    }

    fn supported_channel_kinds(&self) -> BTreeSet<ChannelKind> {
        ChannelKind::ALL
            .into_iter()
            .filter(|kind| !matches!(kind, ChannelKind::Forum | ChannelKind::Media | ChannelKind::Stage))
            .collect()
    }

    fn connect(&self, config: &ConnectionConfig) -> NativeCall<Arc<dyn BackendClient>> {
        let platform = self.platform.clone();
        let missing = config.credential.is_empty();
        let intents = config.intents.len();
        NativeCall::future(async move {
            if missing {
                return Err(Box::new(LoopbackError::MissingToken) as NativeError);
            }
            info!(intents, "loopback session opened");
            Ok(Arc::new(LoopbackClient::new(platform)) as Arc<dyn BackendClient>)
        })
    }

    fn can_adopt(&self, native: &(dyn Any + Send + Sync)) -> bool {
        native.is::<LoopbackClient>()
    }

    fn adopt(&self, native: Arc<dyn Any + Send + Sync>) -> Result<Arc<dyn BackendClient>, NativeError> {
        native
            .downcast::<LoopbackClient>()
            .map(|client| client as Arc<dyn BackendClient>)
            .map_err(|_| "not a loopback client".into())
    }
}

/// A connected loopback session.
#[derive(Debug)]
pub struct LoopbackClient {
    platform: LoopbackPlatform,
    closed: Arc<AtomicBool>,
}

impl LoopbackClient {
    /// Open a session on `platform` directly, bypassing the factory.
    pub fn new(platform: LoopbackPlatform) -> Self {
        Self {
            platform,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Platform this client talks to.
    pub fn platform(&self) -> &LoopbackPlatform {
        &self.platform
    }

    fn lookup<T: ?Sized + Send + Sync + 'static>(
        &self,
        find: impl FnOnce(&PlatformState) -> Option<Arc<T>> + Send + 'static,
    ) -> NativeCall<Option<Arc<T>>> {
        let platform = self.platform.clone();
        let closed = Arc::clone(&self.closed);
        NativeCall::blocking(move || {
            if closed.load(Ordering::Acquire) {
                return Err(LoopbackError::Closed.into());
            }
            Ok(find(&platform.state.lock()))
        })
    }

    fn list<T: ?Sized + Send + Sync + 'static>(
        &self,
        collect: impl FnOnce(&PlatformState) -> Vec<Arc<T>> + Send + 'static,
    ) -> NativeCall<Vec<Arc<T>>> {
        let platform = self.platform.clone();
        let closed = Arc::clone(&self.closed);
        NativeCall::blocking(move || {
            if closed.load(Ordering::Acquire) {
                return Err(LoopbackError::Closed.into());
            }
            Ok(collect(&platform.state.lock()))
        })
    }

    fn mutate<T, F>(&self, op: F) -> NativeCall<T>
    where
        T: Send + 'static,
        F: FnOnce(&LoopbackPlatform) -> Result<T, LoopbackError> + Send + 'static,
    {
        let platform = self.platform.clone();
        let closed = Arc::clone(&self.closed);
        NativeCall::future(async move {
            if closed.load(Ordering::Acquire) {
                return Err(LoopbackError::Closed.into());
            }
            op(&platform).map_err(NativeError::from)
        })
    }

    fn listener(&self, kind: EventKind) -> NativeEventSource {
        let platform = self.platform.clone();
        NativeEventSource::Listener(Box::new(move |sink: EventSink| -> Detach {
            let id = platform.attach(kind, sink);
            debug!(%kind, listener = id, "loopback listener attached");
            Box::new(move || platform.detach(kind, id))
        }))
    }
}

impl BackendClient for LoopbackClient {
    fn guilds(&self) -> NativeCall<Vec<Arc<dyn NativeGuild>>> {
        self.list(|state| {
            state
                .guilds
                .values()
                .map(|guild| Arc::clone(guild) as Arc<dyn NativeGuild>)
                .collect()
        })
    }

    fn guild(&self, id: Snowflake) -> NativeCall<Option<Arc<dyn NativeGuild>>> {
        self.lookup(move |state| {
            state
                .guilds
                .get(&id)
                .map(|guild| Arc::clone(guild) as Arc<dyn NativeGuild>)
        })
    }

    fn channels(&self, guild: &Arc<dyn NativeGuild>) -> NativeCall<Vec<Arc<dyn NativeChannel>>> {
        let guild = guild.id();
        self.list(move |state| {
            state
                .channels
                .values()
                .filter(|channel| channel.guild_id == Some(guild))
                .map(|channel| Arc::clone(channel) as Arc<dyn NativeChannel>)
                .collect()
        })
    }

    fn channel(&self, id: Snowflake) -> NativeCall<Option<Arc<dyn NativeChannel>>> {
        self.lookup(move |state| {
            state
                .channels
                .get(&id)
                .map(|channel| Arc::clone(channel) as Arc<dyn NativeChannel>)
        })
    }

    fn user(&self, id: Snowflake) -> NativeCall<Option<Arc<dyn NativeUser>>> {
        self.lookup(move |state| {
            state
                .users
                .get(&id)
                .map(|user| Arc::clone(user) as Arc<dyn NativeUser>)
        })
    }

    fn roles(&self, guild: &Arc<dyn NativeGuild>) -> NativeCall<Vec<Arc<dyn NativeRole>>> {
        let guild = guild.id();
        self.list(move |state| {
            state
                .roles
                .values()
                .filter(|role| role.guild_id == guild)
                .map(|role| Arc::clone(role) as Arc<dyn NativeRole>)
                .collect()
        })
    }

    fn send_message(
        &self,
        channel: &Arc<dyn NativeChannel>,
        draft: &MessageDraft,
    ) -> NativeCall<Arc<dyn NativeMessage>> {
        let channel = channel.id();
        let content = draft.content.clone();
        let bot = Arc::clone(&self.platform.bot);
        self.mutate(move |platform| {
            platform
                .insert_message(channel, bot, &content)
                .map(|message| message as Arc<dyn NativeMessage>)
        })
    }

    fn edit_message(
        &self,
        message: &Arc<dyn NativeMessage>,
        draft: &MessageDraft,
    ) -> NativeCall<Arc<dyn NativeMessage>> {
        let id = message.id();
        let content = draft.content.clone();
        self.mutate(move |platform| {
            platform
                .edit_message(id, &content)
                .map(|message| message as Arc<dyn NativeMessage>)
        })
    }

    fn delete_message(&self, message: &Arc<dyn NativeMessage>) -> NativeCall<()> {
        let id = message.id();
        self.mutate(move |platform| platform.remove_message(id))
    }

    fn delete_channel(&self, channel: &Arc<dyn NativeChannel>) -> NativeCall<()> {
        let id = channel.id();
        let platform = self.platform.clone();
        let closed = Arc::clone(&self.closed);
        NativeCall::suspend(move |token| async move {
            tokio::task::yield_now().await;
            if token.is_cancelled() {
                debug!(channel = %id, "channel deletion cancelled");
                return Ok(());
            }
            if closed.load(Ordering::Acquire) {
                return Err(LoopbackError::Closed.into());
            }
            platform.remove_channel(id).map_err(NativeError::from)
        })
    }

    fn event_source(&self, kind: EventKind) -> Option<NativeEventSource> {
        match kind {
            EventKind::CommandInvoked
            | EventKind::ComponentUsed
            | EventKind::AutocompleteRequested => None,
            _ => Some(self.listener(kind)),
        }
    }

    fn shutdown(&self) -> NativeCall<()> {
        let closed = Arc::clone(&self.closed);
        NativeCall::blocking(move || {
            closed.store(true, Ordering::Release);
            info!("loopback session closed");
            Ok(())
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn threads(&self) -> Option<&dyn ThreadSupport> {
        Some(self)
    }

    fn history(&self) -> Option<&dyn HistorySupport> {
        Some(self)
    }
}

impl ThreadSupport for LoopbackClient {
    fn create_thread(
        &self,
        parent: &Arc<dyn NativeChannel>,
        name: &str,
    ) -> NativeCall<Arc<dyn NativeChannel>> {
        let parent = parent.id();
        let name = name.to_owned();
        self.mutate(move |platform| {
            let parent = platform
                .state
                .lock()
                .channels
                .get(&parent)
                .cloned()
                .ok_or(LoopbackError::Unknown {
                    kind: EntityKind::Channel,
                    id: parent,
                })?;
            if !matches!(parent.kind, ChannelKind::Text | ChannelKind::News) {
                return Err(LoopbackError::NotThreadable(parent.id));
            }
            let thread = platform.insert_channel(
                parent.guild_id,
                Some(parent.id),
                &name,
                ChannelKind::PublicThread,
            );
            Ok(thread as Arc<dyn NativeChannel>)
        })
    }
}

impl HistorySupport for LoopbackClient {
    fn history(
        &self,
        channel: &Arc<dyn NativeChannel>,
        limit: usize,
    ) -> NativeCall<Arc<dyn NativeMessage>> {
        let channel = channel.id();
        let newest_first: Vec<Result<Arc<dyn NativeMessage>, NativeError>> = self
            .platform
            .state
            .lock()
            .messages
            .values()
            .rev()
            .filter(|message| message.channel_id == channel)
            .take(limit)
            .map(|message| Ok(Arc::clone(message) as Arc<dyn NativeMessage>))
            .collect();
        NativeCall::stream(futures::stream::iter(newest_first))
    }
}
