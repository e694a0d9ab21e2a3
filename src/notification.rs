//! Value-less channel

use crate::asyncable::Asyncable;
use crate::channel::Channel;
use crate::AsyncMode;

/// A degenerate [`Channel`] carrying no values
///
/// Useful for "something happened" signalling.  Cloning aliases the
/// same underlying channel, as with [`Channel`].
#[derive(Clone, Default)]
pub struct Notification {
    ch: Channel<()>,
}

impl Notification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        self.ch.send(());
    }

    pub fn on_notify(&self, subscriber: Option<&Asyncable>, f: impl Fn() + Send + 'static) {
        self.ch.on_receive(subscriber, move |_| f());
    }

    pub fn on_notify_mode(
        &self,
        subscriber: Option<&Asyncable>,
        mode: AsyncMode,
        f: impl Fn() + Send + 'static,
    ) {
        self.ch.on_receive_mode(subscriber, mode, move |_| f());
    }

    pub fn reset_on_notify(&self, subscriber: &Asyncable) {
        self.ch.reset_on_receive(subscriber);
    }

    pub fn close(&self) {
        self.ch.close();
    }

    pub fn on_close(&self, subscriber: Option<&Asyncable>, f: impl Fn() + Send + 'static) {
        self.ch.on_close(subscriber, f);
    }

    pub fn is_connected(&self) -> bool {
        self.ch.is_connected()
    }
}
