//! Chatbridge: one canonical chat-platform API over interchangeable backends.
//!
//! Backends register themselves at link time. At startup the
//! [`BackendRegistry`] discovers them, picks one (explicitly or by priority)
//! and connects it, yielding a [`Bridge`]. The facade translates native
//! objects into canonical entities, normalizes every backend call style
//! (blocking, future, reactive stream, suspended computation) into a
//! cancellable [`Deferred`] or [`Sequence`], gates optional features behind
//! [`Capability`] checks and republishes backend events as ordered
//! [`CanonicalEvent`]s.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod backends;
pub mod capability;
pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod facade;
pub mod logging;
pub mod registry;
pub mod runtime;

pub use backend::{BackendClient, BackendFactory, ConnectionConfig, Credential, Intent};
pub use capability::{Capability, CapabilitySet};
pub use config::BridgeConfig;
pub use entity::{
    Channel, ChannelKind, Command, Guild, Interaction, Message, MessageDraft, Role, Snowflake, User,
};
pub use error::{BridgeError, BridgeResult, ErrorKind};
pub use events::{CanonicalEvent, EventKind, EventPayload, SubscriptionId};
pub use facade::Bridge;
pub use registry::{AdoptMode, BackendDescriptor, BackendRegistration, BackendRegistry, BackendSelection};
pub use runtime::{Deferred, NativeCall, Sequence};
