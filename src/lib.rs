//! **sigchan** is a lightweight in-process messaging runtime built
//! around a single primitive: a typed, multi-consumer channel whose
//! deliveries are marshalled onto the thread where each consumer
//! subscribed.  It is designed to be layered under whatever main loop
//! each thread already runs -- there are no runtime-managed threads,
//! and nothing blocks.  A receiving thread simply calls
//! [`process_events`] once per loop iteration to drain its inbound
//! queues.
//!
//! # Overview of types
//!
//! [`Channel`] is the public endpoint.  Producers call
//! [`Channel::send`] from any thread; subscribers register a callback
//! with [`Channel::on_receive`], and that callback is only ever invoked
//! on the thread that registered it.  Subscribers sharing the sender's
//! thread are invoked inline before `send` returns; every other
//! subscriber thread receives the value on its next pump, in send order
//! per sending thread.  Cloning a channel is cheap and produces another
//! alias of the same dispatch object.
//!
//! [`Asyncable`] ties subscriptions to an owner's lifetime.  Embed one
//! in any object that subscribes; when the object is dropped -- on any
//! thread, even mid-dispatch -- all its bindings are severed before any
//! further send can reach its callbacks.  Subscribing with `None`
//! instead creates an anonymous binding with no automatic cleanup.
//!
//! [`Notification`] is a `Channel<()>` for value-less signalling.
//! [`post()`](crate::post()) schedules a one-shot closure on a target
//! thread's pump.
//! [`Promise`] layers single-shot resolve/reject semantics over a pair
//! of channels, and [`NotifyList`] pairs a sequence with a
//! [`ChangedNotify`] bundle of collection-change channels.
//!
//! # Cross-thread example
//!
//! ```
//! use sigchan::{process_events, Channel};
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let ch = Channel::<i32>::new();
//! let seen = Arc::new(AtomicI32::new(0));
//! let seen2 = seen.clone();
//! ch.on_receive(None, move |v: &i32| seen2.store(*v, Ordering::SeqCst));
//!
//! let ch2 = ch.clone();
//! let worker = std::thread::spawn(move || ch2.send(42));
//!
//! // Emulate this thread's event loop.
//! for _ in 0..100 {
//!     process_events();
//!     if seen.load(Ordering::SeqCst) != 0 {
//!         break;
//!     }
//!     std::thread::sleep(Duration::from_millis(1));
//! }
//! worker.join().unwrap();
//! assert_eq!(seen.load(Ordering::SeqCst), 42);
//! ```
//!
//! # Delivery model
//!
//! Internally a channel keeps one subscriber table per thread, and one
//! bounded single-producer/single-consumer queue per `(sender thread,
//! receiver thread)` pair it has actually seen.  The receive side of
//! each queue is registered with a process-wide pool under the
//! receiving thread, which is what [`process_events`] drains.  Values
//! are captured at send time (`M: Clone`, one clone per receiver
//! thread) and handed to callbacks by reference, so a later mutation by
//! the sender is never observed by receivers.
//!
//! Ordering is guaranteed only per `(channel, sender thread, receiver
//! thread)` edge.  Nothing is promised across channels, across edges,
//! or between producers racing on one receiver.
//!
//! Queue overflow and thread-slot exhaustion (see [`conf`]) are treated
//! as fatal programmer errors and panic; a full queue means the
//! receiving thread is not pumping, and silent loss would be worse.
//!
//! # Logging
//!
//! The crate emits sparse [`tracing`] events (slot allocation, edge
//! creation, teardown) and never installs a subscriber; enable one in
//! the embedding application to see them.

pub use crate::asyncable::Asyncable;
pub use crate::channel::{Channel, ChannelKey};
pub use crate::core::{AsyncMode, SendMode};
pub use crate::notification::Notification;
pub use crate::notify::{ChangedNotify, NotifyList};
pub use crate::pool::process_events;
pub use crate::post::{post, post_here};
pub use crate::promise::{
    make_promise, make_promise_resolve, Promise, PromiseMode, Reject, Resolve, Settled,
};
pub use crate::tid::Tid;

pub mod conf;

mod asyncable;
mod channel;
mod core;
mod notification;
mod notify;
mod pool;
mod post;
mod promise;
mod queue;
mod tid;

#[cfg(test)]
mod test;
