//! Subscriber lifetime protocol
//!
//! [`Asyncable`] is the identity an object embeds so that its lifetime
//! governs its subscriptions.  Each live binding is cross-linked: the
//! channel's receiver record points (non-owningly) at the subscriber,
//! and the subscriber's connection table points (non-owningly) at the
//! channel, tagged with the thread the subscription was registered on.
//! Either side can be destroyed first; its drop walks the back-links
//! and severs the other side.

use crate::tid::Tid;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Shared enable flag of one receiver record
///
/// The cross-link carries this so that a disconnect from a foreign
/// thread can take effect immediately (the record stops receiving and
/// the channel's enabled count drops) while the actual table removal is
/// posted to the registration thread.
pub(crate) struct ReceiverState {
    enabled: AtomicBool,
}

impl ReceiverState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            enabled: AtomicBool::new(true),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Clear the flag, returning whether it was previously set.  The
    /// caller decrements the channel's enabled count exactly when this
    /// returns true.
    pub fn disable(&self) -> bool {
        self.enabled.swap(false, Ordering::AcqRel)
    }
}

/// Capability of anything a subscriber can be bound to
///
/// Implemented by the channel dispatch cores; the set of implementers
/// is closed.  `disconnect_asyncable` is invoked by the subscriber's
/// drop, possibly from a thread other than the registration thread and
/// possibly while a dispatch is running there.
pub(crate) trait Connectable: Send + Sync {
    /// Identity of the dispatch object (its address)
    fn conn_key(&self) -> usize;

    fn disconnect_asyncable(
        self: Arc<Self>,
        owner: OwnerKey,
        reg_thread: Tid,
        state: &Arc<ReceiverState>,
    );
}

/// Identity of a subscriber (the address of its connection table)
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) struct OwnerKey(usize);

pub(crate) struct Connection {
    target: Weak<dyn Connectable>,
    target_key: usize,
    thread: Tid,
    state: Arc<ReceiverState>,
}

/// The subscriber side of the cross-link, shared so channels can hold a
/// weak back-reference that survives independently of the [`Asyncable`]
/// itself.
#[derive(Default)]
pub(crate) struct ConnTable {
    connections: Mutex<Vec<Connection>>,
}

impl ConnTable {
    /// Sever the back-link to one dispatch object.  Called by the
    /// channel when the connection is removed from its side.
    pub(crate) fn remove_target(&self, target_key: usize) {
        self.connections
            .lock()
            .unwrap()
            .retain(|c| c.target_key != target_key);
    }
}

/// Identity for any object whose lifetime governs subscriptions
///
/// Embed one as a field and pass `Some(&obj.asyncable)` to
/// [`Channel::on_receive`](crate::Channel::on_receive).  When the
/// `Asyncable` is dropped, every binding registered against it is
/// severed before any further send can invoke its callbacks, no matter
/// which thread the drop happens on.
///
/// Subscribing with `None` instead creates an anonymous binding that is
/// never automatically disconnected.
pub struct Asyncable {
    table: Arc<ConnTable>,
}

impl Asyncable {
    pub fn new() -> Self {
        Self {
            table: Arc::new(ConnTable::default()),
        }
    }

    /// Whether any binding is currently registered against this object
    pub fn is_connected_async(&self) -> bool {
        !self.table.connections.lock().unwrap().is_empty()
    }

    pub(crate) fn key(&self) -> OwnerKey {
        OwnerKey(Arc::as_ptr(&self.table) as usize)
    }

    pub(crate) fn backlink(&self) -> Weak<ConnTable> {
        Arc::downgrade(&self.table)
    }

    /// Record a binding to `target` registered on `thread`.  A second
    /// registration against the same target replaces the entry; the
    /// caller has already retired the old record.
    pub(crate) fn async_connect(
        &self,
        target: &Arc<dyn Connectable>,
        thread: Tid,
        state: Arc<ReceiverState>,
    ) {
        let key = target.conn_key();
        let mut conns = self.table.connections.lock().unwrap();
        if let Some(c) = conns.iter_mut().find(|c| c.target_key == key) {
            c.thread = thread;
            c.state = state;
        } else {
            conns.push(Connection {
                target: Arc::downgrade(target),
                target_key: key,
                thread,
                state,
            });
        }
    }

    pub(crate) fn async_disconnect(&self, target_key: usize) {
        self.table.remove_target(target_key);
    }

    /// The registration thread and enable flag of an existing binding
    pub(crate) fn async_connection(&self, target_key: usize) -> Option<(Tid, Arc<ReceiverState>)> {
        self.table
            .connections
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.target_key == target_key)
            .map(|c| (c.thread, c.state.clone()))
    }
}

impl Default for Asyncable {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Asyncable {
    fn drop(&mut self) {
        // Take the list first so the dispatch objects' removal paths
        // see an empty table and cannot re-enter it.
        let conns = mem::take(&mut *self.table.connections.lock().unwrap());
        let key = self.key();
        for c in conns {
            if let Some(target) = c.target.upgrade() {
                target.disconnect_asyncable(key, c.thread, &c.state);
            }
        }
    }
}
