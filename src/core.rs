//! Generic dispatch core
//!
//! A [`ChannelCore`] demultiplexes sends across the threads its
//! subscribers registered on.  It owns one subscriber table per thread,
//! stored in a fixed slot array: new slots are taken under a mutex,
//! published slots are read without locking because slots never move
//! and the visible count is an atomic monotonic counter.  Each table is
//! touched only by its owning thread; every cross-thread effect is
//! either an atomic flag or a message on an SPSC edge queue drained by
//! the owning thread's pump.

use crate::asyncable::{Asyncable, ConnTable, Connectable, OwnerKey, ReceiverState};
use crate::conf::{MAX_THREADS_PER_CHANNEL, QUEUE_CAPACITY};
use crate::pool;
use crate::queue::{spsc, PumpPort, RecvPort, SendPort};
use crate::tid::Tid;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicIsize, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::trace;

/// How `send` delivers to subscriber threads
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SendMode {
    /// Subscribers on the sending thread are invoked inline, before
    /// `send` returns; every other subscriber thread receives on its
    /// next pump.
    Auto,
    /// Every subscriber thread receives on its next pump, including the
    /// sending thread.  Nothing runs inline.
    Queue,
}

/// How a registration treats an existing callback for the same
/// subscriber
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AsyncMode {
    /// A second registration for the same subscriber is a programmer
    /// error, caught by a debug assertion.  Release builds replace the
    /// callback silently.
    SetOnce,
    /// Replace any existing callback for this subscriber.
    AsyncSet,
}

/// Message carried across one channel edge queue
enum ChanMsg<M> {
    /// Invoke every enabled receiver on the target thread with the
    /// payload.
    Deliver(M),
    /// Remove the (already disabled) records of this owner from the
    /// target thread's table.
    Disconnect(OwnerKey),
}

struct Owner {
    key: OwnerKey,
    backlink: Weak<ConnTable>,
}

/// One (channel, subscriber) binding, owned by the registration
/// thread's table.  While `state` is enabled the record contributes
/// exactly one to the core's enabled count.
struct Receiver<M> {
    owner: Option<Owner>, // None: anonymous, never auto-disconnected
    state: Arc<ReceiverState>,
    callback: Box<dyn Fn(&M) + Send>,
}

/// Outbound queue from the owning thread to one receiver thread,
/// discovered lazily on first send along that edge
struct EdgeQueue<M: Send + 'static> {
    recv_thread: Tid,
    send: SendPort<ChanMsg<M>>,
    recv: Arc<RecvPort<ChanMsg<M>>>,
}

struct SlotInner<M: Clone + Send + 'static> {
    /// Dispatch-pass nesting depth.  While non-zero, `receivers` must
    /// not be structurally modified; mutations go to the staging lists.
    depth: u32,
    receivers: Vec<Receiver<M>>,
    pending_add: Vec<Receiver<M>>,
    pending_remove: Vec<OwnerKey>,
    queues: Vec<EdgeQueue<M>>,
}

impl<M: Clone + Send + 'static> Default for SlotInner<M> {
    fn default() -> Self {
        Self {
            depth: 0,
            receivers: Vec::new(),
            pending_add: Vec::new(),
            pending_remove: Vec::new(),
            queues: Vec::new(),
        }
    }
}

struct ChanSlot<M: Clone + Send + 'static> {
    thread: AtomicU64, // 0 = unassigned; written once before publication
    inner: UnsafeCell<SlotInner<M>>,
}

pub(crate) struct ChannelCore<M: Clone + Send + 'static> {
    slots: Box<[ChanSlot<M>]>,
    count: AtomicUsize,
    grow: Mutex<()>,
    enabled: AtomicIsize,
}

// Safety: each `ChanSlot.inner` is accessed only by the thread whose id
// is published in `ChanSlot.thread` (asserted in debug builds); `Drop`
// has exclusive access.  Cross-thread effects go through the atomics
// (`count`, `enabled`, `ReceiverState`) or the edge queues.  Callbacks
// are `Send`, so the core may be dropped on any thread.
unsafe impl<M: Clone + Send + 'static> Sync for ChannelCore<M> {}

impl<M: Clone + Send + 'static> ChannelCore<M> {
    pub fn new() -> Arc<Self> {
        let slots = (0..MAX_THREADS_PER_CHANNEL)
            .map(|_| ChanSlot {
                thread: AtomicU64::new(0),
                inner: UnsafeCell::new(SlotInner::default()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Arc::new(Self {
            slots,
            count: AtomicUsize::new(0),
            grow: Mutex::new(()),
            enabled: AtomicIsize::new(0),
        })
    }

    /// Identity of this dispatch object
    pub fn addr(&self) -> usize {
        self as *const Self as *const () as usize
    }

    pub fn is_connected(&self) -> bool {
        self.enabled.load(Ordering::Acquire) > 0
    }

    /// Find or lazily allocate the slot for `thread`
    fn slot(&self, thread: Tid) -> &ChanSlot<M> {
        let raw = thread.to_raw();
        let count = self.count.load(Ordering::Acquire);
        for slot in &self.slots[..count] {
            if slot.thread.load(Ordering::Acquire) == raw {
                return slot;
            }
        }

        let _guard = self.grow.lock().unwrap();
        // Another thread may have published a slot for `thread` while
        // we waited for the lock.
        let count = self.count.load(Ordering::Acquire);
        for slot in &self.slots[..count] {
            if slot.thread.load(Ordering::Acquire) == raw {
                return slot;
            }
        }
        if count == self.slots.len() {
            tracing::error!(max = self.slots.len(), "channel thread slots exhausted");
            panic!(
                "sigchan: channel thread slots exhausted ({})",
                self.slots.len()
            );
        }
        let slot = &self.slots[count];
        slot.thread.store(raw, Ordering::Release);
        self.count.store(count + 1, Ordering::Release);
        trace!(thread = raw, slot = count, "channel thread slot allocated");
        slot
    }

    fn dec_enabled(&self) {
        let prev = self.enabled.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "enabled receiver count went negative");
    }

    /// Register `callback` against `subscriber`, attributed to the
    /// calling thread.  If a dispatch pass is running on this thread's
    /// table, the record is staged and merged after the pass.
    pub fn on_receive(
        this: &Arc<Self>,
        subscriber: Option<&Asyncable>,
        mode: AsyncMode,
        callback: Box<dyn Fn(&M) + Send>,
    ) {
        let tid = Tid::current();
        let key = this.addr();

        if let Some(sub) = subscriber {
            if let Some((reg_thread, state)) = sub.async_connection(key) {
                debug_assert!(
                    mode == AsyncMode::AsyncSet,
                    "subscriber already has a callback on this channel"
                );
                if reg_thread == tid {
                    let slot = this.slot(tid);
                    // Safety: the calling thread owns this slot.
                    let inner = unsafe { &mut *slot.inner.get() };
                    if inner.depth == 0 {
                        let found = inner
                            .receivers
                            .iter_mut()
                            .find(|r| r.owner.as_ref().map(|o| o.key) == Some(sub.key()));
                        if let Some(r) = found {
                            if r.state.is_enabled() {
                                r.callback = callback;
                                return;
                            }
                        }
                        // A disabled leftover awaiting its posted
                        // removal: bind afresh below.
                    } else {
                        // Mid-dispatch: never swap the callback of a
                        // record that may be executing.  Retire the old
                        // record and stage a fresh one.
                        if state.disable() {
                            this.dec_enabled();
                        }
                        inner.pending_remove.push(sub.key());
                    }
                } else {
                    // The old binding lives on another thread.  Disable
                    // it now and post its removal there.
                    if state.disable() {
                        this.dec_enabled();
                    }
                    let slot = this.slot(tid);
                    // Safety: the calling thread owns this slot.
                    let inner = unsafe { &mut *slot.inner.get() };
                    Self::send_to_queue(this, inner, reg_thread, ChanMsg::Disconnect(sub.key()));
                }
            }
        }

        let state = ReceiverState::new();
        let record = Receiver {
            owner: subscriber.map(|s| Owner {
                key: s.key(),
                backlink: s.backlink(),
            }),
            state: state.clone(),
            callback,
        };
        if let Some(sub) = subscriber {
            let target: Arc<dyn Connectable> = this.clone();
            sub.async_connect(&target, tid, state);
        }

        let slot = this.slot(tid);
        // Safety: the calling thread owns this slot.
        let inner = unsafe { &mut *slot.inner.get() };
        if inner.depth > 0 {
            inner.pending_add.push(record);
        } else {
            inner.receivers.push(record);
        }
        this.enabled.fetch_add(1, Ordering::AcqRel);
    }

    /// Remove the binding for `subscriber`, if any
    pub fn disconnect(this: &Arc<Self>, subscriber: &Asyncable) {
        let key = this.addr();
        let Some((reg_thread, state)) = subscriber.async_connection(key) else {
            return; // not connected: benign no-op
        };
        subscriber.async_disconnect(key);
        Self::disconnect_owner(this, subscriber.key(), reg_thread, &state);
    }

    /// Sever one binding on the channel side.  The registration thread
    /// removes its record synchronously when it is safe to do so; any
    /// other caller disables the record immediately and posts the
    /// removal to the registration thread.
    fn disconnect_owner(
        this: &Arc<Self>,
        owner: OwnerKey,
        reg_thread: Tid,
        state: &Arc<ReceiverState>,
    ) {
        if state.disable() {
            this.dec_enabled();
        }
        let tid = Tid::current();
        let slot = this.slot(tid);
        // Safety: the calling thread owns this slot.
        let inner = unsafe { &mut *slot.inner.get() };
        if reg_thread == tid {
            if inner.depth == 0 {
                Self::purge(inner, owner);
            } else {
                // The record must outlive the running pass; it is
                // skipped from here on because it is disabled.
                inner.pending_remove.push(owner);
            }
        } else {
            Self::send_to_queue(this, inner, reg_thread, ChanMsg::Disconnect(owner));
        }
    }

    /// Fast-path exit when nothing is listening, then dispatch
    /// according to `mode`
    pub fn send(this: &Arc<Self>, mode: SendMode, msg: M) {
        if this.enabled.load(Ordering::Acquire) <= 0 {
            return;
        }
        let tid = Tid::current();
        let slot = this.slot(tid);
        match mode {
            SendMode::Auto => {
                Self::dispatch_pass(slot, &msg);
                Self::fan_out(this, slot, Some(tid), &msg);
            }
            SendMode::Queue => Self::fan_out(this, slot, None, &msg),
        }
    }

    /// Enqueue `msg` for every known subscriber thread except `skip`
    fn fan_out(this: &Arc<Self>, slot: &ChanSlot<M>, skip: Option<Tid>, msg: &M) {
        // Safety: the calling thread owns this slot; no dispatch pass
        // holds a reference into `queues`.
        let inner = unsafe { &mut *slot.inner.get() };
        let count = this.count.load(Ordering::Acquire);
        for other in &this.slots[..count] {
            let Some(recv_thread) = Tid::from_raw(other.thread.load(Ordering::Acquire)) else {
                continue;
            };
            if skip == Some(recv_thread) {
                continue;
            }
            Self::send_to_queue(this, inner, recv_thread, ChanMsg::Deliver(msg.clone()));
        }
    }

    /// Push onto the edge queue for `recv_thread`, creating the edge
    /// and registering its receive port with the pool on first use
    fn send_to_queue(
        this: &Arc<Self>,
        inner: &mut SlotInner<M>,
        recv_thread: Tid,
        msg: ChanMsg<M>,
    ) {
        if let Some(edge) = inner.queues.iter().find(|q| q.recv_thread == recv_thread) {
            edge.send.send(msg);
            return;
        }

        let (tx, rx) = spsc::<ChanMsg<M>>(QUEUE_CAPACITY);
        let weak = Arc::downgrade(this);
        rx.on_message(move |m| {
            if let Some(core) = weak.upgrade() {
                ChannelCore::pump_deliver(&core, m);
            }
        });
        pool::pool().reg_port(recv_thread, rx.clone());
        trace!(to = recv_thread.to_raw(), "channel edge queue created");
        tx.send(msg);
        inner.queues.push(EdgeQueue {
            recv_thread,
            send: tx,
            recv: rx,
        });
    }

    /// Runs on a receiver thread when its pump drains one of this
    /// channel's edge queues
    fn pump_deliver(this: &Arc<Self>, msg: ChanMsg<M>) {
        let tid = Tid::current();
        let slot = this.slot(tid);
        match msg {
            ChanMsg::Deliver(m) => Self::dispatch_pass(slot, &m),
            ChanMsg::Disconnect(owner) => {
                // Safety: the calling thread owns this slot.
                let inner = unsafe { &mut *slot.inner.get() };
                if inner.depth > 0 {
                    // A pass further up this thread's stack is inside
                    // the table; defer the removal past it.
                    inner.pending_remove.push(owner);
                } else {
                    Self::purge(inner, owner);
                }
            }
        }
    }

    /// One pass over the calling thread's subscriber table: fold in
    /// staged mutations, invoke every enabled record, fold in the
    /// mutations the callbacks made
    fn dispatch_pass(slot: &ChanSlot<M>, msg: &M) {
        debug_assert_eq!(slot.thread.load(Ordering::Relaxed), Tid::current().to_raw());
        let inner = slot.inner.get();

        // Safety (whole pass): the calling thread owns this slot.  No
        // `&mut` borrow is held while a callback runs; each iteration
        // re-derives its pointer.  While `depth > 0` nothing modifies
        // the `receivers` vector structurally (re-entrant registration
        // and disconnection go to the staging lists), so the record
        // pointer stays valid across the callback.
        unsafe {
            if (*inner).depth == 0 {
                Self::apply_pending(&mut *inner);
            }
            (*inner).depth += 1;
        }

        let mut i = 0;
        loop {
            let record = unsafe {
                let r = &*inner;
                if i >= r.receivers.len() {
                    break;
                }
                &r.receivers[i] as *const Receiver<M>
            };
            unsafe {
                if (*record).state.is_enabled() {
                    ((*record).callback)(msg);
                }
            }
            i += 1;
        }

        unsafe {
            (*inner).depth -= 1;
            if (*inner).depth == 0 {
                Self::apply_pending(&mut *inner);
            }
        }
    }

    /// Fold staged mutations into the live list: removals first, then
    /// additions, so a disconnect-then-resubscribe within one pass nets
    /// out to the final subscription
    fn apply_pending(inner: &mut SlotInner<M>) {
        if !inner.pending_remove.is_empty() {
            for owner in std::mem::take(&mut inner.pending_remove) {
                Self::purge(inner, owner);
            }
        }
        if !inner.pending_add.is_empty() {
            let mut adds = std::mem::take(&mut inner.pending_add);
            inner.receivers.append(&mut adds);
        }
    }

    /// Drop every disabled record belonging to `owner`.  An enabled
    /// record with the same key is a newer binding and stays.
    fn purge(inner: &mut SlotInner<M>, owner: OwnerKey) {
        let dead = |r: &Receiver<M>| {
            r.owner.as_ref().map(|o| o.key) == Some(owner) && !r.state.is_enabled()
        };
        inner.receivers.retain(|r| !dead(r));
        inner.pending_add.retain(|r| !dead(r));
    }
}

impl<M: Clone + Send + 'static> Connectable for ChannelCore<M> {
    fn conn_key(&self) -> usize {
        self.addr()
    }

    fn disconnect_asyncable(
        self: Arc<Self>,
        owner: OwnerKey,
        reg_thread: Tid,
        state: &Arc<ReceiverState>,
    ) {
        Self::disconnect_owner(&self, owner, reg_thread, state);
    }
}

impl<M: Clone + Send + 'static> Drop for ChannelCore<M> {
    fn drop(&mut self) {
        let key = self.addr();
        let count = *self.count.get_mut();
        for slot in &mut self.slots[..count] {
            let inner = slot.inner.get_mut();
            for edge in inner.queues.drain(..) {
                pool::pool().unreg_port(edge.recv_thread, edge.recv.id());
            }
            for r in inner
                .receivers
                .drain(..)
                .chain(inner.pending_add.drain(..))
            {
                if let Some(owner) = r.owner {
                    if let Some(table) = owner.backlink.upgrade() {
                        table.remove_target(key);
                    }
                }
            }
        }
    }
}
