//! Per-session table of native objects.
//!
//! Every `wrap` gets its own slot, so an entity always resolves to the exact
//! native object it was built from, even after the same identifier crosses
//! the boundary again. A slot lives as long as some clone of the entity that
//! owns it; the last one dropped frees it. Closing the table invalidates
//! every outstanding entity at once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use super::adapter::NativeObject;
use super::SessionId;

/// Native objects that crossed into one backend session.
pub struct SessionTable {
    id: SessionId,
    open: AtomicBool,
    slots: RwLock<Slots>,
}

#[derive(Default)]
struct Slots {
    next: u64,
    objects: HashMap<u64, NativeObject>,
}

impl SessionTable {
    /// Open a fresh table with a new session id.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: SessionId::next(),
            open: AtomicBool::new(true),
            slots: RwLock::new(Slots::default()),
        })
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Liveness flag; `false` once the session is torn down.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Number of native objects currently referenced by live entities.
    pub fn len(&self) -> usize {
        self.slots.read().objects.len()
    }

    /// Whether no live entity references a native object.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record `object` in a fresh slot and return a handle owning it.
    pub(crate) fn insert(self: &Arc<Self>, object: NativeObject) -> NativeHandle {
        let lease = {
            let mut slots = self.slots.write();
            // Checked under the lock so a concurrent close cannot leave a
            // populated table behind.
            if self.is_open() {
                let slot = slots.next;
                slots.next = slots.next.wrapping_add(1);
                slots.objects.insert(slot, object);
                Some(Arc::new(SlotLease {
                    table: Arc::downgrade(self),
                    slot,
                }))
            } else {
                None
            }
        };

        NativeHandle {
            session: self.id,
            lease,
        }
    }

    /// Native object in `slot`, or `None` when the session is closed.
    fn get(&self, slot: u64) -> Option<NativeObject> {
        let slots = self.slots.read();
        if !self.is_open() {
            return None;
        }
        slots.objects.get(&slot).cloned()
    }

    fn release(&self, slot: u64) {
        let removed = self.slots.write().objects.remove(&slot);
        // Dropped outside the lock.
        drop(removed);
    }

    /// Close the session, releasing every native reference.
    ///
    /// Returns the number of references released. Closing twice is a no-op.
    pub fn close(&self) -> usize {
        let released = {
            let mut slots = self.slots.write();
            if !self.open.swap(false, Ordering::AcqRel) {
                return 0;
            }
            std::mem::take(&mut slots.objects)
        };
        let count = released.len();
        drop(released);
        debug!(session = %self.id, released = count, "session table closed");
        count
    }
}

impl std::fmt::Debug for SessionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTable")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .field("len", &self.len())
            .finish()
    }
}

/// Ownership of one slot; frees it when the last entity clone goes away.
struct SlotLease {
    table: Weak<SessionTable>,
    slot: u64,
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            table.release(self.slot);
        }
    }
}

/// Back-reference from a canonical entity to its native object.
///
/// Holds the table weakly: the session's lifetime is never extended by an
/// entity outliving it.
#[derive(Clone)]
pub struct NativeHandle {
    session: SessionId,
    lease: Option<Arc<SlotLease>>,
}

impl NativeHandle {
    /// Session that produced the entity.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Whether the owning session is still open.
    pub fn is_live(&self) -> bool {
        self.lease.as_ref().is_some_and(|lease| {
            lease
                .table
                .upgrade()
                .is_some_and(|table| table.is_open())
        })
    }

    pub(crate) fn resolve(&self) -> Option<NativeObject> {
        let lease = self.lease.as_ref()?;
        lease.table.upgrade()?.get(lease.slot)
    }
}

impl std::fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeHandle")
            .field("session", &self.session)
            .field("slot", &self.lease.as_ref().map(|lease| lease.slot))
            .finish()
    }
}
