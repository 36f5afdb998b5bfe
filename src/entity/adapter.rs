//! Object adapter layer: native objects in, canonical entities out, and back.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::backend::{
    NativeChannel, NativeCommand, NativeGuild, NativeInteraction, NativeMessage, NativeRole,
    NativeUser,
};
use crate::error::BridgeError;

use super::session::{NativeHandle, SessionTable};
use super::{
    Channel, ChannelKind, Command, EntityKind, Guild, Interaction, Message, Role, SessionId,
    Snowflake, User,
};

/// A native object stored in a session table.
#[derive(Clone)]
pub enum NativeObject {
    /// Native guild.
    Guild(Arc<dyn NativeGuild>),
    /// Native channel.
    Channel(Arc<dyn NativeChannel>),
    /// Native user.
    User(Arc<dyn NativeUser>),
    /// Native message.
    Message(Arc<dyn NativeMessage>),
    /// Native role.
    Role(Arc<dyn NativeRole>),
    /// Native command.
    Command(Arc<dyn NativeCommand>),
    /// Native interaction.
    Interaction(Arc<dyn NativeInteraction>),
}

/// A canonical entity type and its translation from a native object.
pub trait Canonical: Sized {
    /// Native trait object this entity is translated from.
    type Native: ?Sized + Send + Sync + 'static;

    /// Entity kind tag.
    const KIND: EntityKind;

    /// Platform identifier.
    fn id(&self) -> Snowflake;

    /// Back-reference to the native object.
    fn handle(&self) -> &NativeHandle;

    /// Copy the canonical fields off `native`.
    fn translate(adapter: &ObjectAdapter, native: &Self::Native, handle: NativeHandle) -> Self;

    /// Store form of the native object.
    fn into_object(native: Arc<Self::Native>) -> NativeObject;

    /// Recover the native object from its store form.
    fn from_object(object: NativeObject) -> Option<Arc<Self::Native>>;
}

/// Translates native objects of one session into canonical entities.
#[derive(Debug, Clone)]
pub struct ObjectAdapter {
    table: Arc<SessionTable>,
    channel_kinds: BTreeSet<ChannelKind>,
}

impl ObjectAdapter {
    /// Adapter over `table`, mapping channel kinds outside `channel_kinds`
    /// to [`ChannelKind::Unknown`].
    pub fn new(table: Arc<SessionTable>, channel_kinds: BTreeSet<ChannelKind>) -> Self {
        Self {
            table,
            channel_kinds,
        }
    }

    /// Session this adapter wraps objects for.
    pub fn session(&self) -> SessionId {
        self.table.id()
    }

    /// Underlying session table.
    pub fn table(&self) -> &Arc<SessionTable> {
        &self.table
    }

    /// Wrap a native object into a fresh canonical entity.
    ///
    /// The entity resolves back to exactly `native` for as long as the session
    /// is open, regardless of later wraps of the same identifier.
    pub fn wrap<E: Canonical>(&self, native: Arc<E::Native>) -> E {
        let handle = self.table.insert(E::into_object(Arc::clone(&native)));
        E::translate(self, &native, handle)
    }

    /// Wrap every native object of a collection.
    pub fn wrap_all<E: Canonical>(&self, natives: Vec<Arc<E::Native>>) -> Vec<E> {
        natives.into_iter().map(|native| self.wrap(native)).collect()
    }

    /// Recover the native object behind `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::SessionMismatch`] when the entity came from a
    /// different session, and [`BridgeError::Stale`] when its session is closed.
    pub fn unwrap<E: Canonical>(&self, entity: &E) -> Result<Arc<E::Native>, BridgeError> {
        let handle = entity.handle();
        if handle.session() != self.table.id() {
            return Err(BridgeError::SessionMismatch {
                kind: E::KIND,
                id: entity.id().to_string(),
                expected: self.table.id(),
                found: handle.session(),
            });
        }
        handle
            .resolve()
            .and_then(E::from_object)
            .ok_or_else(|| BridgeError::Stale {
                kind: E::KIND,
                id: entity.id().to_string(),
            })
    }

    fn channel_kind(&self, kind: ChannelKind) -> ChannelKind {
        if self.channel_kinds.contains(&kind) {
            kind
        } else {
            ChannelKind::Unknown
        }
    }
}

impl Canonical for Guild {
    type Native = dyn NativeGuild;
    const KIND: EntityKind = EntityKind::Guild;

    fn id(&self) -> Snowflake {
        self.id
    }

    fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    fn translate(_adapter: &ObjectAdapter, native: &Self::Native, handle: NativeHandle) -> Self {
        Self {
            id: native.id(),
            name: native.name(),
            owner_id: native.owner_id(),
            member_count: native.member_count(),
            handle,
        }
    }

    fn into_object(native: Arc<Self::Native>) -> NativeObject {
        NativeObject::Guild(native)
    }

    fn from_object(object: NativeObject) -> Option<Arc<Self::Native>> {
        match object {
            NativeObject::Guild(native) => Some(native),
            _ => None,
        }
    }
}

impl Canonical for Channel {
    type Native = dyn NativeChannel;
    const KIND: EntityKind = EntityKind::Channel;

    fn id(&self) -> Snowflake {
        self.id
    }

    fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    fn translate(adapter: &ObjectAdapter, native: &Self::Native, handle: NativeHandle) -> Self {
        Self {
            id: native.id(),
            kind: adapter.channel_kind(native.kind()),
            name: native.name(),
            guild_id: native.guild_id(),
            parent_id: native.parent_id(),
            topic: native.topic(),
            handle,
        }
    }

    fn into_object(native: Arc<Self::Native>) -> NativeObject {
        NativeObject::Channel(native)
    }

    fn from_object(object: NativeObject) -> Option<Arc<Self::Native>> {
        match object {
            NativeObject::Channel(native) => Some(native),
            _ => None,
        }
    }
}

impl Canonical for User {
    type Native = dyn NativeUser;
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> Snowflake {
        self.id
    }

    fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    fn translate(_adapter: &ObjectAdapter, native: &Self::Native, handle: NativeHandle) -> Self {
        Self {
            id: native.id(),
            name: native.name(),
            display_name: native.display_name(),
            bot: native.bot(),
            handle,
        }
    }

    fn into_object(native: Arc<Self::Native>) -> NativeObject {
        NativeObject::User(native)
    }

    fn from_object(object: NativeObject) -> Option<Arc<Self::Native>> {
        match object {
            NativeObject::User(native) => Some(native),
            _ => None,
        }
    }
}

impl Canonical for Message {
    type Native = dyn NativeMessage;
    const KIND: EntityKind = EntityKind::Message;

    fn id(&self) -> Snowflake {
        self.id
    }

    fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    fn translate(adapter: &ObjectAdapter, native: &Self::Native, handle: NativeHandle) -> Self {
        Self {
            id: native.id(),
            channel_id: native.channel_id(),
            author: adapter.wrap(native.author()),
            content: native.content(),
            created_at: native.created_at(),
            edited_at: native.edited_at(),
            handle,
        }
    }

    fn into_object(native: Arc<Self::Native>) -> NativeObject {
        NativeObject::Message(native)
    }

    fn from_object(object: NativeObject) -> Option<Arc<Self::Native>> {
        match object {
            NativeObject::Message(native) => Some(native),
            _ => None,
        }
    }
}

impl Canonical for Role {
    type Native = dyn NativeRole;
    const KIND: EntityKind = EntityKind::Role;

    fn id(&self) -> Snowflake {
        self.id
    }

    fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    fn translate(_adapter: &ObjectAdapter, native: &Self::Native, handle: NativeHandle) -> Self {
        Self {
            id: native.id(),
            guild_id: native.guild_id(),
            name: native.name(),
            color: native.color(),
            position: native.position(),
            mentionable: native.mentionable(),
            handle,
        }
    }

    fn into_object(native: Arc<Self::Native>) -> NativeObject {
        NativeObject::Role(native)
    }

    fn from_object(object: NativeObject) -> Option<Arc<Self::Native>> {
        match object {
            NativeObject::Role(native) => Some(native),
            _ => None,
        }
    }
}

impl Canonical for Command {
    type Native = dyn NativeCommand;
    const KIND: EntityKind = EntityKind::Command;

    fn id(&self) -> Snowflake {
        self.id
    }

    fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    fn translate(_adapter: &ObjectAdapter, native: &Self::Native, handle: NativeHandle) -> Self {
        Self {
            id: native.id(),
            name: native.name(),
            description: native.description(),
            guild_id: native.guild_id(),
            handle,
        }
    }

    fn into_object(native: Arc<Self::Native>) -> NativeObject {
        NativeObject::Command(native)
    }

    fn from_object(object: NativeObject) -> Option<Arc<Self::Native>> {
        match object {
            NativeObject::Command(native) => Some(native),
            _ => None,
        }
    }
}

impl Canonical for Interaction {
    type Native = dyn NativeInteraction;
    const KIND: EntityKind = EntityKind::Interaction;

    fn id(&self) -> Snowflake {
        self.id
    }

    fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    fn translate(adapter: &ObjectAdapter, native: &Self::Native, handle: NativeHandle) -> Self {
        Self {
            id: native.id(),
            kind: native.kind(),
            channel_id: native.channel_id(),
            user: adapter.wrap(native.user()),
            command_name: native.command_name(),
            custom_id: native.custom_id(),
            arguments: native.arguments(),
            handle,
        }
    }

    fn into_object(native: Arc<Self::Native>) -> NativeObject {
        NativeObject::Interaction(native)
    }

    fn from_object(object: NativeObject) -> Option<Arc<Self::Native>> {
        match object {
            NativeObject::Interaction(native) => Some(native),
            _ => None,
        }
    }
}
