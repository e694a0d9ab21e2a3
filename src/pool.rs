//! Process-wide registry of per-thread receive ports
//!
//! Every thread that receives through this crate has one slot here
//! holding the receive ports of all its inbound queues.  The slot array
//! follows the same discipline as the per-channel tables: brand-new
//! slots are taken under a mutex, published slots are matched with a
//! single atomic load, and the visible count only grows.  A per-slot
//! `locked` flag serialises registration against a concurrent drain on
//! the owning thread.

use crate::conf::MAX_THREADS;
use crate::queue::PumpPort;
use crate::tid::Tid;
use once_cell::sync::Lazy;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, trace};

static POOL: Lazy<QueuePool> = Lazy::new(QueuePool::new);

pub(crate) fn pool() -> &'static QueuePool {
    &POOL
}

/// Drain the calling thread's inbound queues once
///
/// Must be called periodically by any thread that subscribed to a
/// channel whose producers run on other threads, or that is the target
/// of [`post`](crate::post()).  Each call drains everything currently
/// queued; it never blocks.  If a registration elsewhere is touching
/// this thread's slot at the same moment the call returns without
/// draining, so callers should invoke it in a loop (an event loop
/// iteration is the natural place).
pub fn process_events() {
    POOL.process_messages(Tid::current());
}

pub(crate) struct QueuePool {
    slots: Box<[Slot]>,
    count: AtomicUsize,
    grow: Mutex<()>,
}

struct Slot {
    thread: AtomicU64, // 0 = never assigned
    locked: AtomicBool,
    ports: UnsafeCell<Vec<Arc<dyn PumpPort>>>,
}

// Safety: `ports` is only touched while `locked` is held, by
// registrars and by the owning thread's drain alike (the drain takes a
// snapshot under the flag and processes outside it).  The pool mutex
// guards only the publication of brand-new slots.
unsafe impl Sync for Slot {}

impl Slot {
    fn lock(&self) {
        while self.locked.swap(true, Ordering::Acquire) {
            std::hint::spin_loop();
        }
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

impl QueuePool {
    fn new() -> Self {
        let slots = (0..MAX_THREADS)
            .map(|_| Slot {
                thread: AtomicU64::new(0),
                locked: AtomicBool::new(false),
                ports: UnsafeCell::new(Vec::new()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            count: AtomicUsize::new(0),
            grow: Mutex::new(()),
        }
    }

    /// Register a receive port under `thread`.  Appending into a
    /// published slot needs only that slot's `locked` flag; reusing a
    /// slot whose port list has emptied likewise.  Only taking a
    /// brand-new slot holds the pool mutex.
    pub fn reg_port(&self, thread: Tid, port: Arc<dyn PumpPort>) {
        let raw = thread.to_raw();
        let count = self.count.load(Ordering::Acquire);

        // existing slot for this thread
        for slot in &self.slots[..count] {
            if slot.thread.load(Ordering::Acquire) != raw {
                continue;
            }
            slot.lock();
            // An emptied slot can be retagged by a concurrent reuse;
            // re-check now that we hold the flag.
            if slot.thread.load(Ordering::Acquire) != raw {
                slot.unlock();
                continue;
            }
            // Safety: `locked` is held.
            unsafe { (*slot.ports.get()).push(port) };
            slot.unlock();
            return;
        }

        // reuse a slot whose port list has emptied
        for (i, slot) in self.slots[..count].iter().enumerate() {
            slot.lock();
            // Safety: `locked` is held.
            let ports = unsafe { &mut *slot.ports.get() };
            if ports.is_empty() {
                slot.thread.store(raw, Ordering::Release);
                ports.push(port);
                slot.unlock();
                trace!(thread = raw, slot = i, "queue pool slot reused");
                return;
            }
            slot.unlock();
        }

        // brand-new slot
        let _guard = self.grow.lock().unwrap();
        // Another thread may have published a slot for `thread` while
        // we waited for the lock.
        let count = self.count.load(Ordering::Acquire);
        for slot in &self.slots[..count] {
            if slot.thread.load(Ordering::Acquire) != raw {
                continue;
            }
            slot.lock();
            if slot.thread.load(Ordering::Acquire) != raw {
                slot.unlock();
                continue;
            }
            // Safety: `locked` is held.
            unsafe { (*slot.ports.get()).push(port) };
            slot.unlock();
            return;
        }
        if count == self.slots.len() {
            error!(max = self.slots.len(), "queue pool exhausted");
            panic!(
                "sigchan: queue pool exhausted ({} thread slots)",
                self.slots.len()
            );
        }
        let slot = &self.slots[count];
        slot.thread.store(raw, Ordering::Relaxed);
        // Safety: the slot is not yet published, so no other party can
        // be touching it.
        unsafe { (*slot.ports.get()).push(port) };
        self.count.store(count + 1, Ordering::Release);
        trace!(thread = raw, slot = count, "queue pool slot allocated");
    }

    /// Remove a previously registered port (identified by
    /// [`PumpPort::id`]) from `thread`'s slot.  Guarded by the per-slot
    /// `locked` flag only.
    pub fn unreg_port(&self, thread: Tid, port_id: usize) {
        let raw = thread.to_raw();
        let count = self.count.load(Ordering::Acquire);
        for slot in &self.slots[..count] {
            if slot.thread.load(Ordering::Acquire) != raw {
                continue;
            }
            slot.lock();
            if slot.thread.load(Ordering::Acquire) != raw {
                slot.unlock();
                continue;
            }
            // Safety: `locked` is held.
            unsafe { (*slot.ports.get()).retain(|p| p.id() != port_id) };
            slot.unlock();
        }
    }

    /// Drain all ports registered under `thread`
    ///
    /// The port list is snapshotted under the slot lock and processed
    /// outside it, so a handler may register or unregister ports on
    /// this same slot without deadlocking.
    pub fn process_messages(&self, thread: Tid) {
        let raw = thread.to_raw();
        let count = self.count.load(Ordering::Acquire);
        for slot in &self.slots[..count] {
            if slot.thread.load(Ordering::Acquire) != raw {
                continue;
            }
            // A registration is mid-flight on this slot: skip this
            // round rather than wait, the caller re-polls.
            if slot.locked.swap(true, Ordering::Acquire) {
                return;
            }
            // An emptied slot can be retagged to another thread by a
            // registrar; retagging happens under `locked`, so re-check
            // now that we hold it.
            if slot.thread.load(Ordering::Acquire) != raw {
                slot.unlock();
                continue;
            }
            // Safety: `locked` is held.
            let ports = unsafe { (*slot.ports.get()).clone() };
            slot.unlock();
            for port in &ports {
                port.process();
            }
            return;
        }
    }
}
