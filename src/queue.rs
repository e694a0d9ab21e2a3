//! Bounded single-producer/single-consumer queues and their ports
//!
//! Each queue connects exactly one sending thread to exactly one
//! receiving thread.  The two endpoints are handed out as a
//! [`SendPort`] and a [`RecvPort`]; the receive side carries one
//! installed handler and is drained by the receiving thread's pump via
//! the type-erased [`PumpPort`] trait.

use crossbeam_utils::CachePadded;
use once_cell::sync::OnceCell;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::error;

/// Lock-free bounded ring for one producer thread and one consumer
/// thread.  Capacity is rounded up to a power of two.  The positions
/// are free-running and wrap; occupancy is their difference.
pub(crate) struct RingQueue<T> {
    mask: usize,
    data: Box<[UnsafeCell<MaybeUninit<T>>]>,
    write_pos: CachePadded<AtomicUsize>,
    read_pos: CachePadded<AtomicUsize>,
}

// Safety: a slot is written by the producer strictly before the release
// store of `write_pos` that publishes it, and read by the consumer only
// after the acquire load that observes that store.  Each side mutates
// only its own position.  `T: Send` because values cross threads.
unsafe impl<T: Send> Send for RingQueue<T> {}
unsafe impl<T: Send> Sync for RingQueue<T> {}

impl<T> RingQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two();
        let data = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            mask: capacity - 1,
            data,
            write_pos: CachePadded::new(AtomicUsize::new(0)),
            read_pos: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Producer side.  Only the one producer thread may call this.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let write = self.write_pos.load(Ordering::Relaxed);
        let read = self.read_pos.load(Ordering::Acquire);
        if write.wrapping_sub(read) > self.mask {
            return Err(item);
        }
        // Safety: the occupancy check shows this slot is unoccupied, and
        // the consumer cannot observe it until the release store below.
        unsafe {
            (*self.data[write & self.mask].get()).write(item);
        }
        self.write_pos.store(write.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Consumer side.  Only the one consumer thread may call this.
    pub fn try_pop(&self) -> Option<T> {
        let read = self.read_pos.load(Ordering::Relaxed);
        let write = self.write_pos.load(Ordering::Acquire);
        if read == write {
            return None;
        }
        // Safety: the slot was initialised by the producer before the
        // acquire load above observed its publication, and the release
        // store below hands the slot back before reuse.
        let item = unsafe { (*self.data[read & self.mask].get()).assume_init_read() };
        self.read_pos.store(read.wrapping_add(1), Ordering::Release);
        Some(item)
    }

    // Occupancy accessors, for tests
    #[cfg(test)]
    pub fn available_read(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Relaxed);
        write.wrapping_sub(read)
    }

    #[cfg(test)]
    pub fn available_write(&self) -> usize {
        let write = self.write_pos.load(Ordering::Relaxed);
        let read = self.read_pos.load(Ordering::Acquire);
        self.capacity() - write.wrapping_sub(read)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.available_read() == 0
    }

    pub fn capacity(&self) -> usize {
        self.mask + 1
    }
}

impl<T> Drop for RingQueue<T> {
    fn drop(&mut self) {
        let mut read = *self.read_pos.get_mut();
        let write = *self.write_pos.get_mut();
        while read != write {
            // Safety: every slot in [read, write) holds an initialised
            // value that was never popped.
            unsafe {
                (*self.data[read & self.mask].get()).assume_init_drop();
            }
            read = read.wrapping_add(1);
        }
    }
}

/// Create the two ports of a bounded SPSC queue
pub(crate) fn spsc<T: Send + 'static>(capacity: usize) -> (SendPort<T>, Arc<RecvPort<T>>) {
    let ring = Arc::new(RingQueue::new(capacity));
    let recv = Arc::new(RecvPort {
        ring: ring.clone(),
        handler: OnceCell::new(),
    });
    (SendPort { ring }, recv)
}

/// The sending endpoint of an SPSC queue.  Owned by the one producer
/// thread for this edge; not cloneable.
pub(crate) struct SendPort<T: Send> {
    ring: Arc<RingQueue<T>>,
}

impl<T: Send> SendPort<T> {
    /// Non-blocking send.  Overflow means the receiving thread is not
    /// pumping; that is a fatal programmer error rather than silent
    /// message loss.
    pub fn send(&self, item: T) {
        if self.ring.try_push(item).is_err() {
            error!(capacity = self.ring.capacity(), "spsc queue overflow");
            panic!(
                "sigchan: SPSC queue overflow (capacity {}); is the receiving thread calling process_events()?",
                self.ring.capacity()
            );
        }
    }
}

/// The receiving endpoint of an SPSC queue
///
/// Carries one installed message handler.  Messages stay queued until a
/// handler is installed.  Shared as an `Arc` so the queue pool can hold
/// it, but `process` may only be called by the thread the port is
/// registered under.
pub(crate) struct RecvPort<T: Send> {
    ring: Arc<RingQueue<T>>,
    handler: OnceCell<Box<dyn Fn(T) + Send + Sync>>,
}

impl<T: Send> RecvPort<T> {
    /// Install the drain handler.  Installing twice is a programmer
    /// error.
    pub fn on_message(&self, f: impl Fn(T) + Send + Sync + 'static) {
        if self.handler.set(Box::new(f)).is_err() {
            panic!("sigchan: receive port handler installed twice");
        }
    }
}

/// Type-erased face a receive port presents to the queue pool
pub(crate) trait PumpPort: Send + Sync {
    /// Drain all currently available messages into the installed
    /// handler.  With no handler installed, messages are retained.
    fn process(&self);

    /// Stable identity used for unregistration
    fn id(&self) -> usize;
}

impl<T: Send + 'static> PumpPort for RecvPort<T> {
    fn process(&self) {
        let Some(handler) = self.handler.get() else {
            return;
        };
        while let Some(msg) = self.ring.try_pop() {
            handler(msg);
        }
    }

    fn id(&self) -> usize {
        self as *const Self as *const () as usize
    }
}
