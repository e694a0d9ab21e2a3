//! Public channel endpoint

use crate::asyncable::Asyncable;
use crate::core::ChannelCore;
use crate::{AsyncMode, SendMode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Typed multi-consumer channel with thread-aware delivery
///
/// A `Channel<M>` carries values of type `M` from any number of
/// producers to any number of subscribers.  Use a tuple for multiple
/// values and `()` for none (or the [`Notification`] wrapper).
/// Subscribers on the sending thread are invoked inline by
/// [`send`](Channel::send); subscribers on other threads receive the
/// value on their next [`process_events`](crate::process_events) call,
/// in send order per sending thread.
///
/// Cloning a channel produces another alias of the same underlying
/// dispatch object; two independently created channels are distinct
/// even if their type parameters match.  The channel stays alive while
/// any alias does, and severs all its bindings when the last alias is
/// dropped.
///
/// ```
/// use sigchan::Channel;
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
///
/// let ch = Channel::<i32>::new();
/// let seen = Arc::new(AtomicI32::new(0));
/// let seen2 = seen.clone();
/// ch.on_receive(None, move |v: &i32| seen2.store(*v, Ordering::SeqCst));
/// ch.send(42);
/// assert_eq!(seen.load(Ordering::SeqCst), 42);
/// ```
///
/// [`Notification`]: crate::Notification
pub struct Channel<M: Clone + Send + 'static> {
    shared: Arc<ChanShared<M>>,
}

struct ChanShared<M: Clone + Send + 'static> {
    recv: Arc<ChannelCore<M>>,
    close: Arc<ChannelCore<()>>,
    closed: AtomicBool,
}

/// Stable identity of a channel: equal for aliases of the same
/// underlying dispatch object, distinct otherwise
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ChannelKey(usize);

impl<M: Clone + Send + 'static> Channel<M> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(ChanShared {
                recv: ChannelCore::new(),
                close: ChannelCore::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Send a value with [`SendMode::Auto`]
    pub fn send(&self, msg: M) {
        ChannelCore::send(&self.shared.recv, SendMode::Auto, msg);
    }

    /// Send a value with an explicit mode
    pub fn send_mode(&self, mode: SendMode, msg: M) {
        ChannelCore::send(&self.shared.recv, mode, msg);
    }

    /// Subscribe with [`AsyncMode::SetOnce`]
    ///
    /// The callback is attributed to the calling thread and will only
    /// ever be invoked on it.  With `subscriber` present the binding is
    /// severed automatically when the subscriber is dropped; `None`
    /// subscribes anonymously, with no automatic disconnection.
    pub fn on_receive(&self, subscriber: Option<&Asyncable>, f: impl Fn(&M) + Send + 'static) {
        self.on_receive_mode(subscriber, AsyncMode::SetOnce, f);
    }

    /// Subscribe with an explicit registration mode
    pub fn on_receive_mode(
        &self,
        subscriber: Option<&Asyncable>,
        mode: AsyncMode,
        f: impl Fn(&M) + Send + 'static,
    ) {
        ChannelCore::on_receive(&self.shared.recv, subscriber, mode, Box::new(f));
    }

    /// Remove `subscriber`'s binding.  Disconnecting a subscriber that
    /// is not connected is a no-op, as is disconnecting twice.
    pub fn reset_on_receive(&self, subscriber: &Asyncable) {
        ChannelCore::disconnect(&self.shared.recv, subscriber);
    }

    /// Emit the close event.  Only the first call fires; close
    /// subscribers see it exactly once.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            ChannelCore::send(&self.shared.close, SendMode::Auto, ());
        }
    }

    pub fn on_close(&self, subscriber: Option<&Asyncable>, f: impl Fn() + Send + 'static) {
        self.on_close_mode(subscriber, AsyncMode::SetOnce, f);
    }

    pub fn on_close_mode(
        &self,
        subscriber: Option<&Asyncable>,
        mode: AsyncMode,
        f: impl Fn() + Send + 'static,
    ) {
        ChannelCore::on_receive(
            &self.shared.close,
            subscriber,
            mode,
            Box::new(move |_: &()| f()),
        );
    }

    /// Whether any enabled receive subscription exists right now
    pub fn is_connected(&self) -> bool {
        self.shared.recv.is_connected()
    }

    pub fn key(&self) -> ChannelKey {
        ChannelKey(self.shared.recv.addr())
    }
}

impl<M: Clone + Send + 'static> Clone for Channel<M> {
    /// Another alias of the same channel
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<M: Clone + Send + 'static> Default for Channel<M> {
    fn default() -> Self {
        Self::new()
    }
}
