//! The canonical facade over one connected backend.
//!
//! Every operation returns a [`Deferred`] (or a [`Sequence`] for streaming
//! results). Capability-gated operations check the capability set first and
//! fail with [`BridgeError::UnsupportedCapability`] without touching the
//! backend. Entities are unwrapped before the backend is called, so a stale
//! or foreign entity fails the same way. Operations that take no entity fail
//! with a connection error once the session is closed.

use std::any::Any;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::backend::BackendClient;
use crate::capability::{self, Capability, CapabilitySet};
use crate::entity::{
    command, Canonical, Channel, ChannelKind, Command, CommandData, Guild, Interaction,
    InteractionKind, InteractionResponse, Message, MessageDraft, ObjectAdapter, OptionChoice, Role,
    SessionId, Snowflake, User,
};
use crate::error::BridgeError;
use crate::events::{
    CanonicalEvent, Diagnostic, EventKind, EventPipeline, EventStream, PipelineState,
    SubscriberError, SubscriptionId,
};
use crate::registry::{BackendDescriptor, CredentialLease};
use crate::runtime::{Deferred, NativeCall, Normalizer, Sequence};

/// One connected backend session behind the canonical API.
pub struct Bridge {
    descriptor: BackendDescriptor,
    client: Arc<dyn BackendClient>,
    capabilities: CapabilitySet,
    adapter: Arc<ObjectAdapter>,
    normalizer: Normalizer,
    pipeline: Arc<EventPipeline>,
    lease: Mutex<Option<CredentialLease>>,
    shut_down: AtomicBool,
}

impl Bridge {
    /// Finish construction once the backend is connected: inspect the client's
    /// capabilities and start listening.
    pub(crate) fn assemble(
        descriptor: BackendDescriptor,
        client: Arc<dyn BackendClient>,
        adapter: ObjectAdapter,
        normalizer: Normalizer,
        pipeline: Arc<EventPipeline>,
        lease: Option<CredentialLease>,
    ) -> Result<Self, BridgeError> {
        let capabilities = capability::inspect(client.as_ref());
        let declared = descriptor.capabilities();
        if declared != capabilities {
            warn!(
                backend = %descriptor.id,
                ?declared,
                inspected = ?capabilities,
                "declared capabilities differ from the client's sub-interfaces; using the client's"
            );
        }

        let kinds = EventKind::ALL.into_iter().filter(|kind| {
            kind.required_capability()
                .map_or(true, |needed| capabilities.contains(&needed))
        });
        if let Err(error) = pipeline.start(client.as_ref(), kinds) {
            pipeline.shutdown();
            return Err(error);
        }

        info!(
            backend = %descriptor.id,
            session = %adapter.session(),
            capabilities = ?capabilities,
            "bridge ready"
        );
        Ok(Self {
            descriptor,
            client,
            capabilities,
            adapter: Arc::new(adapter),
            normalizer,
            pipeline,
            lease: Mutex::new(lease),
            shut_down: AtomicBool::new(false),
        })
    }

    // -----------------------------------------------------------------------
    // Identity and capabilities
    // -----------------------------------------------------------------------

    /// Descriptor of the backend behind this facade.
    pub fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    /// Identifier of the backend behind this facade.
    pub fn backend_id(&self) -> &str {
        &self.descriptor.id
    }

    /// Session entities produced by this facade belong to.
    pub fn session(&self) -> SessionId {
        self.adapter.session()
    }

    /// Capability set, fixed for the life of the session.
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Whether the backend supports `capability`.
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Guard for capability-gated operations.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnsupportedCapability`] when the backend lacks it.
    pub fn require(&self, capability: Capability) -> Result<(), BridgeError> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(self.unsupported(capability))
        }
    }

    /// Channel kinds the backend can represent; others read as
    /// [`ChannelKind::Unknown`].
    pub fn supported_channel_kinds(&self) -> BTreeSet<ChannelKind> {
        self.descriptor.supported_channel_kinds()
    }

    /// Lifecycle state of the event pipeline.
    pub fn state(&self) -> PipelineState {
        self.pipeline.state()
    }

    // -----------------------------------------------------------------------
    // Escape hatch
    // -----------------------------------------------------------------------

    /// The backend's native client.
    pub fn implementation(&self) -> &dyn Any {
        self.client.as_any()
    }

    /// The native client as its concrete type, if it is a `T`.
    pub fn extension<T: Any>(&self) -> Option<&T> {
        self.implementation().downcast_ref::<T>()
    }

    /// Native object behind `entity`, for backend-specific calls.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Stale`] after shutdown and
    /// [`BridgeError::SessionMismatch`] for entities of another facade.
    pub fn native<E: Canonical>(&self, entity: &E) -> Result<Arc<E::Native>, BridgeError> {
        self.adapter.unwrap(entity)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Every guild the account is in.
    pub fn guilds(&self) -> Deferred<Vec<Guild>> {
        self.attempt(|| {
            self.ensure_open()?;
            Ok(self.wrap_many::<Guild>(self.client.guilds()))
        })
    }

    /// A guild by identifier, `None` if the backend does not know it.
    pub fn guild(&self, id: Snowflake) -> Deferred<Option<Guild>> {
        self.attempt(|| {
            self.ensure_open()?;
            Ok(self.wrap_optional::<Guild>(self.client.guild(id)))
        })
    }

    /// Channels of `guild`.
    pub fn channels(&self, guild: &Guild) -> Deferred<Vec<Channel>> {
        self.attempt(|| {
            let native = self.adapter.unwrap(guild)?;
            Ok(self.wrap_many::<Channel>(self.client.channels(&native)))
        })
    }

    /// A channel by identifier.
    pub fn channel(&self, id: Snowflake) -> Deferred<Option<Channel>> {
        self.attempt(|| {
            self.ensure_open()?;
            Ok(self.wrap_optional::<Channel>(self.client.channel(id)))
        })
    }

    /// A user by identifier.
    pub fn user(&self, id: Snowflake) -> Deferred<Option<User>> {
        self.attempt(|| {
            self.ensure_open()?;
            Ok(self.wrap_optional::<User>(self.client.user(id)))
        })
    }

    /// Roles of `guild`.
    pub fn roles(&self, guild: &Guild) -> Deferred<Vec<Role>> {
        self.attempt(|| {
            let native = self.adapter.unwrap(guild)?;
            Ok(self.wrap_many::<Role>(self.client.roles(&native)))
        })
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Post a message to `channel`.
    pub fn send_message(&self, channel: &Channel, draft: &MessageDraft) -> Deferred<Message> {
        self.attempt(|| {
            let native = self.adapter.unwrap(channel)?;
            Ok(self.wrap_one::<Message>(self.client.send_message(&native, draft)))
        })
    }

    /// Replace the content of `message`.
    pub fn edit_message(&self, message: &Message, draft: &MessageDraft) -> Deferred<Message> {
        self.attempt(|| {
            let native = self.adapter.unwrap(message)?;
            Ok(self.wrap_one::<Message>(self.client.edit_message(&native, draft)))
        })
    }

    /// Delete `message`.
    pub fn delete_message(&self, message: &Message) -> Deferred<()> {
        self.attempt(|| {
            let native = self.adapter.unwrap(message)?;
            Ok(self.unit(self.client.delete_message(&native)))
        })
    }

    /// Delete `channel`.
    pub fn delete_channel(&self, channel: &Channel) -> Deferred<()> {
        self.attempt(|| {
            let native = self.adapter.unwrap(channel)?;
            Ok(self.unit(self.client.delete_channel(&native)))
        })
    }

    // -----------------------------------------------------------------------
    // Capability-gated operations
    // -----------------------------------------------------------------------

    /// Start a thread under `parent`.
    pub fn create_thread(&self, parent: &Channel, name: &str) -> Deferred<Channel> {
        self.attempt(|| {
            let threads = self.feature(Capability::ThreadedChannels, self.client.threads())?;
            let native = self.adapter.unwrap(parent)?;
            Ok(self.wrap_one::<Channel>(threads.create_thread(&native, name)))
        })
    }

    /// Join a voice channel.
    pub fn join_voice(&self, channel: &Channel) -> Deferred<()> {
        self.attempt(|| {
            let voice = self.feature(Capability::Voice, self.client.voice())?;
            let native = self.adapter.unwrap(channel)?;
            Ok(self.unit(voice.join(&native)))
        })
    }

    /// Leave voice in `guild`.
    pub fn leave_voice(&self, guild: &Guild) -> Deferred<()> {
        self.attempt(|| {
            let voice = self.feature(Capability::Voice, self.client.voice())?;
            let native = self.adapter.unwrap(guild)?;
            Ok(self.unit(voice.leave(&native)))
        })
    }

    /// Registered global slash commands.
    pub fn global_commands(&self) -> Deferred<Vec<Command>> {
        self.attempt(|| {
            let commands = self.feature(Capability::SlashCommands, self.client.commands())?;
            self.ensure_open()?;
            Ok(self.wrap_many::<Command>(commands.global_commands()))
        })
    }

    /// Overwrite the global slash command list.
    pub fn set_global_commands(&self, data: &[CommandData]) -> Deferred<Vec<Command>> {
        self.attempt(|| {
            let commands = self.feature(Capability::SlashCommands, self.client.commands())?;
            self.ensure_open()?;
            Ok(self.wrap_many::<Command>(commands.set_global_commands(data)))
        })
    }

    /// Registered slash commands of `guild`.
    pub fn guild_commands(&self, guild: &Guild) -> Deferred<Vec<Command>> {
        self.attempt(|| {
            let commands = self.feature(Capability::SlashCommands, self.client.commands())?;
            let native = self.adapter.unwrap(guild)?;
            Ok(self.wrap_many::<Command>(commands.guild_commands(&native)))
        })
    }

    /// Overwrite the slash command list of `guild`.
    pub fn set_guild_commands(&self, guild: &Guild, data: &[CommandData]) -> Deferred<Vec<Command>> {
        self.attempt(|| {
            let commands = self.feature(Capability::SlashCommands, self.client.commands())?;
            let native = self.adapter.unwrap(guild)?;
            Ok(self.wrap_many::<Command>(commands.set_guild_commands(&native, data)))
        })
    }

    /// Respond to a slash command invocation.
    pub fn respond(&self, interaction: &Interaction, response: &InteractionResponse) -> Deferred<()> {
        self.attempt(|| {
            let commands = self.feature(Capability::SlashCommands, self.client.commands())?;
            let native = self.adapter.unwrap(interaction)?;
            Ok(self.unit(commands.respond(&native, response)))
        })
    }

    /// Answer an autocomplete interaction with up to
    /// [`MAX_CHOICE_COUNT`](crate::entity::MAX_CHOICE_COUNT) suggestions.
    ///
    /// Suggestions must all carry the same value type.
    pub fn suggest_choices(&self, interaction: &Interaction, choices: &[OptionChoice]) -> Deferred<()> {
        self.attempt(|| {
            let commands = self.feature(Capability::SlashCommands, self.client.commands())?;
            if interaction.kind != InteractionKind::Autocomplete {
                return Err(BridgeError::InvalidState(format!(
                    "interaction {} is not an autocomplete request",
                    interaction.id
                )));
            }
            command::check_suggestions(choices)?;
            let native = self.adapter.unwrap(interaction)?;
            Ok(self.unit(commands.suggest(&native, choices)))
        })
    }

    /// Send a followup message to an answered command interaction.
    pub fn followup(&self, interaction: &Interaction, response: &InteractionResponse) -> Deferred<Message> {
        self.attempt(|| {
            let commands = self.feature(Capability::SlashCommands, self.client.commands())?;
            let native = self.adapter.unwrap(interaction)?;
            Ok(self.wrap_one::<Message>(commands.followup(&native, response)))
        })
    }

    /// Edit a followup message previously sent to `interaction`.
    pub fn edit_followup(
        &self,
        interaction: &Interaction,
        message: &Message,
        response: &InteractionResponse,
    ) -> Deferred<Message> {
        self.attempt(|| {
            let commands = self.feature(Capability::SlashCommands, self.client.commands())?;
            let native = self.adapter.unwrap(interaction)?;
            let followup = self.adapter.unwrap(message)?;
            Ok(self.wrap_one::<Message>(commands.edit_followup(&native, &followup, response)))
        })
    }

    /// Acknowledge a message component interaction.
    pub fn acknowledge_component(
        &self,
        interaction: &Interaction,
        response: &InteractionResponse,
    ) -> Deferred<()> {
        self.attempt(|| {
            let components =
                self.feature(Capability::ComponentInteractions, self.client.components())?;
            let native = self.adapter.unwrap(interaction)?;
            Ok(self.unit(components.acknowledge(&native, response)))
        })
    }

    /// Messages of `channel`, newest first, at most `limit`.
    ///
    /// The sequence is lazy and is not subject to the per-operation timeout.
    pub fn message_history(&self, channel: &Channel, limit: usize) -> Sequence<Message> {
        let call = self
            .feature(Capability::MessageHistory, self.client.history())
            .and_then(|history| {
                let native = self.adapter.unwrap(channel)?;
                Ok(history.history(&native, limit))
            });
        match call {
            Ok(call) => {
                let adapter = Arc::clone(&self.adapter);
                self.normalizer
                    .normalize_stream(call, move |native| Ok(adapter.wrap::<Message>(native)))
            }
            Err(error) => Sequence::failed(error),
        }
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Register `callback` for events of `kind`.
    ///
    /// A subscriber registered while event N is being dispatched first sees
    /// event N+1. A failing callback is reported on [`Self::diagnostics`].
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnsupportedCapability`] for interaction kinds
    /// the backend cannot deliver, and [`BridgeError::InvalidState`] after
    /// shutdown.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> Result<SubscriptionId, BridgeError>
    where
        F: Fn(&CanonicalEvent) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.require_event(kind)?;
        self.pipeline.subscribe(kind, callback)
    }

    /// Stream of events of `kind`, ending at shutdown.
    ///
    /// # Errors
    ///
    /// Same as [`Self::subscribe`].
    pub fn listen(&self, kind: EventKind) -> Result<EventStream, BridgeError> {
        self.require_event(kind)?;
        self.pipeline.listen(kind)
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        self.pipeline.unsubscribe(subscription)
    }

    /// Subscriber failure reports.
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.pipeline.diagnostics()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Tear the session down.
    ///
    /// Every entity produced by this facade turns stale immediately; the
    /// credential lease is released once the backend has closed its session.
    /// Calling it again resolves at once.
    pub fn shutdown(&self) -> Deferred<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Deferred::ready(());
        }
        self.pipeline.shutdown();
        info!(backend = %self.descriptor.id, session = %self.session(), "shutting down");

        let lease = self.lease.lock().take();
        let closed = self.unit(self.client.shutdown());
        closed.on_complete(move |result| {
            if let Err(error) = result {
                warn!(error = %error, "backend shutdown failed");
            }
            drop(lease);
        });
        closed
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn attempt<T, F>(&self, op: F) -> Deferred<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<Deferred<T>, BridgeError>,
    {
        match op() {
            Ok(deferred) => deferred,
            Err(error) => {
                debug!(backend = %self.descriptor.id, error = %error, "operation rejected");
                Deferred::failed(error)
            }
        }
    }

    fn ensure_open(&self) -> Result<(), BridgeError> {
        if self.pipeline.state() == PipelineState::Closed {
            return Err(BridgeError::Connection {
                backend: self.descriptor.id.clone(),
                reason: "session is closed".to_owned(),
                source: None,
            });
        }
        Ok(())
    }

    fn feature<'a, S: ?Sized>(
        &self,
        capability: Capability,
        sub: Option<&'a S>,
    ) -> Result<&'a S, BridgeError> {
        self.require(capability)?;
        sub.ok_or_else(|| self.unsupported(capability))
    }

    fn require_event(&self, kind: EventKind) -> Result<(), BridgeError> {
        match kind.required_capability() {
            Some(capability) => self.require(capability),
            None => Ok(()),
        }
    }

    fn unsupported(&self, capability: Capability) -> BridgeError {
        BridgeError::UnsupportedCapability {
            backend: self.descriptor.id.clone(),
            capability,
        }
    }

    fn wrap_one<E>(&self, call: NativeCall<Arc<E::Native>>) -> Deferred<E>
    where
        E: Canonical + Send + 'static,
    {
        let adapter = Arc::clone(&self.adapter);
        self.normalizer
            .normalize(call, move |native| Ok(adapter.wrap::<E>(native)))
    }

    fn wrap_many<E>(&self, call: NativeCall<Vec<Arc<E::Native>>>) -> Deferred<Vec<E>>
    where
        E: Canonical + Send + 'static,
    {
        let adapter = Arc::clone(&self.adapter);
        self.normalizer
            .normalize(call, move |natives| Ok(adapter.wrap_all::<E>(natives)))
    }

    fn wrap_optional<E>(&self, call: NativeCall<Option<Arc<E::Native>>>) -> Deferred<Option<E>>
    where
        E: Canonical + Send + 'static,
    {
        let adapter = Arc::clone(&self.adapter);
        self.normalizer.normalize(call, move |native| {
            Ok(native.map(|native| adapter.wrap::<E>(native)))
        })
    }

    fn unit(&self, call: NativeCall<()>) -> Deferred<()> {
        self.normalizer.normalize(call, Ok)
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.pipeline.shutdown();
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("backend", &self.descriptor.id)
            .field("session", &self.session())
            .field("capabilities", &self.capabilities)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
