//! Compile-time configuration
//!
//! These limits are fixed at compile time so that the thread-slot arrays
//! can be read lock-free after a lock-protected first write.  Raising
//! them costs a few hundred bytes per channel or per process.

use static_assertions::const_assert;

/// Total number of threads in the process that may interact through
/// this crate, i.e. threads that subscribe, send, or are targeted by
/// [`post`](crate::post()).
pub const MAX_THREADS: usize = 32;

/// Maximum number of distinct threads a single channel instance can
/// communicate across.  A thread takes a slot the first time it
/// subscribes to or sends on the channel, and keeps it for the life of
/// the channel.
pub const MAX_THREADS_PER_CHANNEL: usize = 16;

/// Capacity of each single-producer/single-consumer queue between a
/// thread pair.  Overflow is a fatal error: the receiving thread is not
/// pumping and messages would otherwise be lost silently.
pub const QUEUE_CAPACITY: usize = 2048;

const_assert!(MAX_THREADS_PER_CHANNEL <= MAX_THREADS);
const_assert!(QUEUE_CAPACITY.is_power_of_two());
const_assert!(QUEUE_CAPACITY >= 2);
