//! Event pipeline: native event sources in, sequenced canonical events out.
//!
//! State machine per session:
//!
//! ```text
//! Disconnected -> Connecting -> Listening -> Closed
//!        \              \
//!         `--------------`----------------> Closed
//! ```
//!
//! Every event kind has its own critical sections. A dispatch lock keeps
//! delivery of one kind in sequence order; a registry lock guards the
//! subscriber set and the per-kind sequence counter. The sequence number is
//! assigned and the subscriber snapshot taken under the same registry lock,
//! so a subscriber registered while event N is being delivered sees N+1
//! first. Callbacks run outside the registry lock and may (un)subscribe, but
//! must not synchronously emit another event of the kind being dispatched.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use crate::backend::{BackendClient, Detach, NativeEvent, NativeEventSource};
use crate::entity::{Channel, EntityKind, Guild, Interaction, Message, ObjectAdapter, Role};
use crate::error::BridgeError;

use super::{CanonicalEvent, Deletion, EventKind, EventPayload};

/// Error a subscriber callback reports back to the pipeline.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync + 'static>;

type Callback = Arc<dyn Fn(&CanonicalEvent) -> Result<(), SubscriberError> + Send + Sync>;

/// Stream of canonical events of one kind.
pub type EventStream = UnboundedReceiverStream<CanonicalEvent>;

/// Lifecycle of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Created, backend not yet contacted.
    Disconnected,
    /// Backend handshake in progress.
    Connecting,
    /// Native sources attached; events are dispatched.
    Listening,
    /// Shut down or disconnected for good.
    Closed,
}

/// Handle to one registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId {
    kind: EventKind,
    id: u64,
}

impl SubscriptionId {
    /// Event kind the subscription listens to.
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Report of a subscriber that failed while handling an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Event kind being dispatched.
    pub kind: EventKind,
    /// Sequence number of the event.
    pub sequence: u64,
    /// Failing subscriber.
    pub subscription: SubscriptionId,
    /// Error or panic message.
    pub message: String,
}

enum Subscriber {
    Callback(Callback),
    Channel(mpsc::UnboundedSender<CanonicalEvent>),
}

impl Clone for Subscriber {
    fn clone(&self) -> Self {
        match self {
            Self::Callback(callback) => Self::Callback(Arc::clone(callback)),
            Self::Channel(sender) => Self::Channel(sender.clone()),
        }
    }
}

#[derive(Default)]
struct Registry {
    /// Sequence number of the last event dispatched for this kind.
    last_sequence: u64,
    subscribers: BTreeMap<u64, Subscriber>,
}

#[derive(Default)]
struct KindChannel {
    dispatch: Mutex<()>,
    registry: Mutex<Registry>,
}

#[derive(Default)]
struct Attachments {
    detach: Vec<(EventKind, Detach)>,
    tasks: Vec<JoinHandle<()>>,
}

/// Converts one backend's native events into sequenced canonical events.
pub struct EventPipeline {
    backend: Arc<str>,
    adapter: ObjectAdapter,
    runtime: Handle,
    state: Mutex<PipelineState>,
    kinds: BTreeMap<EventKind, KindChannel>,
    session_sequence: AtomicU64,
    next_subscription: AtomicU64,
    diagnostics: broadcast::Sender<Diagnostic>,
    attachments: Mutex<Attachments>,
}

impl EventPipeline {
    /// A disconnected pipeline translating through `adapter`.
    pub fn new(
        backend: impl Into<Arc<str>>,
        adapter: ObjectAdapter,
        runtime: Handle,
        diagnostic_buffer: usize,
    ) -> Arc<Self> {
        let (diagnostics, _) = broadcast::channel(diagnostic_buffer.max(1));
        Arc::new(Self {
            backend: backend.into(),
            adapter,
            runtime,
            state: Mutex::new(PipelineState::Disconnected),
            kinds: EventKind::ALL
                .into_iter()
                .map(|kind| (kind, KindChannel::default()))
                .collect(),
            session_sequence: AtomicU64::new(0),
            next_subscription: AtomicU64::new(1),
            diagnostics,
            attachments: Mutex::new(Attachments::default()),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    /// Enter `Connecting`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidState`] unless the pipeline is disconnected.
    pub fn begin_connect(&self) -> Result<(), BridgeError> {
        self.transition(PipelineState::Disconnected, PipelineState::Connecting)
    }

    /// Enter `Listening` and attach the native source of every kind in
    /// `kinds`, each exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidState`] unless the pipeline is connecting.
    pub fn start(
        self: &Arc<Self>,
        client: &dyn BackendClient,
        kinds: impl IntoIterator<Item = EventKind>,
    ) -> Result<(), BridgeError> {
        self.transition(PipelineState::Connecting, PipelineState::Listening)?;

        let mut attached = Attachments::default();
        for kind in kinds {
            match client.event_source(kind) {
                Some(NativeEventSource::Listener(register)) => {
                    let sink = EventSink {
                        pipeline: Arc::downgrade(self),
                        kind,
                    };
                    attached.detach.push((kind, register(sink)));
                }
                Some(NativeEventSource::Stream(stream)) => {
                    attached.tasks.push(self.drive_stream(kind, stream));
                }
                None => {
                    debug!(backend = %self.backend, %kind, "backend emits no events of this kind");
                }
            }
        }

        let listeners = attached.detach.len();
        let streams = attached.tasks.len();
        let mut attachments = self.attachments.lock();
        attachments.detach.extend(attached.detach);
        attachments.tasks.extend(attached.tasks);
        drop(attachments);

        // A shutdown racing with `start` may already have drained the table.
        if self.state() == PipelineState::Closed {
            self.release_attachments();
        }
        info!(backend = %self.backend, listeners, streams, "event pipeline listening");
        Ok(())
    }

    /// Shut the pipeline down: detach every native source, end every
    /// subscriber stream and close the session table. Idempotent.
    pub fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), PipelineState::Closed);
        self.release_attachments();
        if previous == PipelineState::Closed {
            return;
        }
        for channel in self.kinds.values() {
            channel.registry.lock().subscribers.clear();
        }
        self.adapter.table().close();
        debug!(backend = %self.backend, ?previous, "event pipeline closed");
    }

    /// The backend lost its session for good.
    pub fn disconnected(&self, reason: &str) {
        let previous = std::mem::replace(&mut *self.state.lock(), PipelineState::Closed);
        if previous == PipelineState::Closed {
            return;
        }
        warn!(backend = %self.backend, reason, "backend disconnected");
        for channel in self.kinds.values() {
            channel.registry.lock().subscribers.clear();
        }
        self.adapter.table().close();
    }

    /// Register a callback for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidState`] once the pipeline is closed.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> Result<SubscriptionId, BridgeError>
    where
        F: Fn(&CanonicalEvent) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.register(kind, Subscriber::Callback(Arc::new(callback)))
    }

    /// Open a stream of events of `kind`. The stream ends when the pipeline
    /// closes.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidState`] once the pipeline is closed.
    pub fn listen(&self, kind: EventKind) -> Result<EventStream, BridgeError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.register(kind, Subscriber::Channel(sender))?;
        Ok(UnboundedReceiverStream::new(receiver))
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        self.kinds
            .get(&subscription.kind)
            .is_some_and(|channel| {
                channel
                    .registry
                    .lock()
                    .subscribers
                    .remove(&subscription.id)
                    .is_some()
            })
    }

    /// Number of subscribers of `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.kinds
            .get(&kind)
            .map_or(0, |channel| channel.registry.lock().subscribers.len())
    }

    /// Subscribe to subscriber-failure diagnostics.
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.diagnostics.subscribe()
    }

    /// Translate and deliver one native event of `kind`.
    ///
    /// Returns the canonical event's per-kind sequence number, or `None` if
    /// the event was dropped.
    pub fn dispatch(&self, kind: EventKind, event: NativeEvent) -> Option<u64> {
        if event.kind() != kind {
            warn!(
                backend = %self.backend,
                expected = %kind,
                actual = %event.kind(),
                "native source emitted an event of another kind; dropped"
            );
            return None;
        }
        let channel = self.kinds.get(&kind)?;
        let _ordered = channel.dispatch.lock();

        if self.state() != PipelineState::Listening {
            debug!(backend = %self.backend, %kind, state = ?self.state(), "event dropped outside listening state");
            return None;
        }

        let payload = self.translate(event);
        let (event, subscribers) = {
            let mut registry = channel.registry.lock();
            registry.last_sequence = registry.last_sequence.saturating_add(1);
            let event = CanonicalEvent {
                sequence: registry.last_sequence,
                session_sequence: self
                    .session_sequence
                    .fetch_add(1, Ordering::AcqRel)
                    .saturating_add(1),
                kind,
                payload,
            };
            let subscribers: Vec<(u64, Subscriber)> = registry
                .subscribers
                .iter()
                .map(|(id, subscriber)| (*id, subscriber.clone()))
                .collect();
            (event, subscribers)
        };

        let mut closed_streams = Vec::new();
        for (id, subscriber) in subscribers {
            match subscriber {
                Subscriber::Callback(callback) => {
                    let outcome = catch_unwind(AssertUnwindSafe(|| callback(&event)));
                    let failure = match outcome {
                        Ok(Ok(())) => None,
                        Ok(Err(error)) => Some(error.to_string()),
                        Err(panic) => Some(panic_message(panic.as_ref())),
                    };
                    if let Some(message) = failure {
                        self.report(SubscriptionId { kind, id }, event.sequence, message);
                    }
                }
                Subscriber::Channel(sender) => {
                    if sender.send(event.clone()).is_err() {
                        closed_streams.push(id);
                    }
                }
            }
        }

        if !closed_streams.is_empty() {
            let mut registry = channel.registry.lock();
            for id in closed_streams {
                registry.subscribers.remove(&id);
            }
        }
        Some(event.sequence)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn transition(&self, from: PipelineState, to: PipelineState) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(BridgeError::InvalidState(format!(
                "event pipeline cannot move from {:?} to {to:?}",
                *state
            )));
        }
        *state = to;
        Ok(())
    }

    fn register(&self, kind: EventKind, subscriber: Subscriber) -> Result<SubscriptionId, BridgeError> {
        if self.state() == PipelineState::Closed {
            return Err(BridgeError::InvalidState(
                "event pipeline is closed".to_owned(),
            ));
        }
        let channel = self
            .kinds
            .get(&kind)
            .ok_or_else(|| BridgeError::InvalidState(format!("no channel for {kind}")))?;
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        channel.registry.lock().subscribers.insert(id, subscriber);
        debug!(backend = %self.backend, %kind, subscription = id, "subscriber registered");
        Ok(SubscriptionId { kind, id })
    }

    fn report(&self, subscription: SubscriptionId, sequence: u64, message: String) {
        warn!(
            backend = %self.backend,
            kind = %subscription.kind,
            sequence,
            %subscription,
            error = %message,
            "event subscriber failed"
        );
        // No receivers is fine; the warning above is the fallback.
        let _ = self.diagnostics.send(Diagnostic {
            kind: subscription.kind,
            sequence,
            subscription,
            message,
        });
    }

    fn drive_stream(
        self: &Arc<Self>,
        kind: EventKind,
        mut stream: futures::stream::BoxStream<'static, NativeEvent>,
    ) -> JoinHandle<()> {
        let pipeline: Weak<Self> = Arc::downgrade(self);
        let backend = Arc::clone(&self.backend);
        self.runtime.spawn(async move {
            while let Some(event) = stream.next().await {
                let Some(pipeline) = pipeline.upgrade() else {
                    break;
                };
                pipeline.dispatch(kind, event);
            }
            debug!(backend = %backend, %kind, "native event stream ended");
        })
    }

    fn release_attachments(&self) {
        let Attachments { detach, tasks } = std::mem::take(&mut *self.attachments.lock());
        for (kind, detach) in detach {
            if catch_unwind(AssertUnwindSafe(detach)).is_err() {
                warn!(backend = %self.backend, %kind, "native listener detach panicked");
            }
        }
        for task in tasks {
            task.abort();
        }
    }

    fn translate(&self, event: NativeEvent) -> EventPayload {
        let adapter = &self.adapter;
        match event {
            NativeEvent::GuildCreated(guild) | NativeEvent::GuildUpdated(guild) => {
                EventPayload::Guild(adapter.wrap::<Guild>(guild))
            }
            NativeEvent::GuildDeleted(id) => EventPayload::Deleted(Deletion {
                entity: EntityKind::Guild,
                id,
                parent: None,
            }),
            NativeEvent::ChannelCreated(channel) | NativeEvent::ChannelUpdated(channel) => {
                EventPayload::Channel(adapter.wrap::<Channel>(channel))
            }
            NativeEvent::ChannelDeleted {
                guild_id,
                channel_id,
            } => EventPayload::Deleted(Deletion {
                entity: EntityKind::Channel,
                id: channel_id,
                parent: guild_id,
            }),
            NativeEvent::RoleCreated(role) | NativeEvent::RoleUpdated(role) => {
                EventPayload::Role(adapter.wrap::<Role>(role))
            }
            NativeEvent::RoleDeleted { guild_id, role_id } => EventPayload::Deleted(Deletion {
                entity: EntityKind::Role,
                id: role_id,
                parent: Some(guild_id),
            }),
            NativeEvent::MessageReceived(message) | NativeEvent::MessageUpdated(message) => {
                EventPayload::Message(adapter.wrap::<Message>(message))
            }
            NativeEvent::MessageDeleted {
                channel_id,
                message_id,
            } => EventPayload::Deleted(Deletion {
                entity: EntityKind::Message,
                id: message_id,
                parent: Some(channel_id),
            }),
            NativeEvent::CommandInvoked(interaction)
            | NativeEvent::ComponentUsed(interaction)
            | NativeEvent::AutocompleteRequested(interaction) => {
                EventPayload::Interaction(adapter.wrap::<Interaction>(interaction))
            }
        }
    }
}

impl std::fmt::Debug for EventPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPipeline")
            .field("backend", &self.backend)
            .field("state", &self.state())
            .field("session", &self.adapter.session())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("subscriber panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("subscriber panicked: {message}")
    } else {
        "subscriber panicked".to_owned()
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Entry point handed to listener-style native sources, one per event kind.
///
/// Holds the pipeline weakly; emitting after the facade is gone is a no-op.
#[derive(Clone)]
pub struct EventSink {
    pipeline: Weak<EventPipeline>,
    kind: EventKind,
}

impl EventSink {
    /// Event kind this sink accepts.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Deliver a native event. Returns its sequence number when dispatched.
    pub fn emit(&self, event: NativeEvent) -> Option<u64> {
        self.pipeline.upgrade()?.dispatch(self.kind, event)
    }

    /// Report an unrecoverable loss of the backend session.
    pub fn disconnected(&self, reason: &str) {
        if let Some(pipeline) = self.pipeline.upgrade() {
            pipeline.disconnected(reason);
        }
    }

    /// Whether the pipeline still accepts events.
    pub fn is_open(&self) -> bool {
        self.pipeline
            .upgrade()
            .is_some_and(|pipeline| pipeline.state() == PipelineState::Listening)
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("kind", &self.kind)
            .field("open", &self.is_open())
            .finish()
    }
}
