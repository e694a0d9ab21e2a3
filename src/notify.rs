//! Collection-change notification
//!
//! [`ChangedNotify`] bundles five independent channels describing
//! mutations of a collection; [`NotifyList`] pairs an ordered sequence
//! with a shared notifier.  Nothing is emitted automatically: the
//! producer mutates the sequence and then fires the notifier
//! explicitly.

use crate::asyncable::Asyncable;
use crate::channel::Channel;
use crate::notification::Notification;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Five independent channels describing collection changes
pub struct ChangedNotify<T: Clone + Send + 'static> {
    changed: Notification,
    item_changed: Channel<T>,
    item_added: Channel<T>,
    item_removed: Channel<T>,
    item_replaced: Channel<(T, T)>,
}

impl<T: Clone + Send + 'static> ChangedNotify<T> {
    pub fn new() -> Self {
        Self {
            changed: Notification::new(),
            item_changed: Channel::new(),
            item_added: Channel::new(),
            item_removed: Channel::new(),
            item_replaced: Channel::new(),
        }
    }

    /// Fire the coarse "something changed" signal
    pub fn notify_changed(&self) {
        self.changed.notify();
    }

    pub fn item_changed(&self, item: &T) {
        self.item_changed.send(item.clone());
    }

    pub fn item_added(&self, item: &T) {
        self.item_added.send(item.clone());
    }

    pub fn item_removed(&self, item: &T) {
        self.item_removed.send(item.clone());
    }

    pub fn item_replaced(&self, old: &T, new: &T) {
        self.item_replaced.send((old.clone(), new.clone()));
    }

    pub fn on_changed(&self, subscriber: Option<&Asyncable>, f: impl Fn() + Send + 'static) {
        self.changed.on_notify(subscriber, f);
    }

    pub fn reset_on_changed(&self, subscriber: &Asyncable) {
        self.changed.reset_on_notify(subscriber);
    }

    pub fn on_item_changed(&self, subscriber: Option<&Asyncable>, f: impl Fn(&T) + Send + 'static) {
        self.item_changed.on_receive(subscriber, f);
    }

    pub fn reset_on_item_changed(&self, subscriber: &Asyncable) {
        self.item_changed.reset_on_receive(subscriber);
    }

    pub fn on_item_added(&self, subscriber: Option<&Asyncable>, f: impl Fn(&T) + Send + 'static) {
        self.item_added.on_receive(subscriber, f);
    }

    pub fn reset_on_item_added(&self, subscriber: &Asyncable) {
        self.item_added.reset_on_receive(subscriber);
    }

    pub fn on_item_removed(&self, subscriber: Option<&Asyncable>, f: impl Fn(&T) + Send + 'static) {
        self.item_removed.on_receive(subscriber, f);
    }

    pub fn reset_on_item_removed(&self, subscriber: &Asyncable) {
        self.item_removed.reset_on_receive(subscriber);
    }

    pub fn on_item_replaced(
        &self,
        subscriber: Option<&Asyncable>,
        f: impl Fn(&T, &T) + Send + 'static,
    ) {
        self.item_replaced
            .on_receive(subscriber, move |m: &(T, T)| f(&m.0, &m.1));
    }

    pub fn reset_on_item_replaced(&self, subscriber: &Asyncable) {
        self.item_replaced.reset_on_receive(subscriber);
    }
}

impl<T: Clone + Send + 'static> Default for ChangedNotify<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Clone for ChangedNotify<T> {
    /// Another alias of the same five channels
    fn clone(&self) -> Self {
        Self {
            changed: self.changed.clone(),
            item_changed: self.item_changed.clone(),
            item_added: self.item_added.clone(),
            item_removed: self.item_removed.clone(),
            item_replaced: self.item_replaced.clone(),
        }
    }
}

/// An ordered sequence paired with an optional shared notifier
///
/// Derefs to `Vec<T>`, so the full sequence API is available.  Mutating
/// the sequence emits nothing; the producer decides what counts as a
/// change and fires the notifier itself.
pub struct NotifyList<T: Clone + Send + 'static> {
    items: Vec<T>,
    notify: Option<Arc<ChangedNotify<T>>>,
}

impl<T: Clone + Send + 'static> NotifyList<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            notify: None,
        }
    }

    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            items,
            notify: None,
        }
    }

    pub fn set_notify(&mut self, notify: Arc<ChangedNotify<T>>) {
        self.notify = Some(notify);
    }

    pub fn notifier(&self) -> Option<&Arc<ChangedNotify<T>>> {
        self.notify.as_ref()
    }

    pub fn on_changed(&self, subscriber: Option<&Asyncable>, f: impl Fn() + Send + 'static) {
        debug_assert!(self.notify.is_some(), "notify list has no notifier");
        if let Some(n) = &self.notify {
            n.on_changed(subscriber, f);
        }
    }

    pub fn reset_on_changed(&self, subscriber: &Asyncable) {
        if let Some(n) = &self.notify {
            n.reset_on_changed(subscriber);
        }
    }

    pub fn on_item_changed(&self, subscriber: Option<&Asyncable>, f: impl Fn(&T) + Send + 'static) {
        debug_assert!(self.notify.is_some(), "notify list has no notifier");
        if let Some(n) = &self.notify {
            n.on_item_changed(subscriber, f);
        }
    }

    pub fn reset_on_item_changed(&self, subscriber: &Asyncable) {
        if let Some(n) = &self.notify {
            n.reset_on_item_changed(subscriber);
        }
    }

    pub fn on_item_added(&self, subscriber: Option<&Asyncable>, f: impl Fn(&T) + Send + 'static) {
        debug_assert!(self.notify.is_some(), "notify list has no notifier");
        if let Some(n) = &self.notify {
            n.on_item_added(subscriber, f);
        }
    }

    pub fn reset_on_item_added(&self, subscriber: &Asyncable) {
        if let Some(n) = &self.notify {
            n.reset_on_item_added(subscriber);
        }
    }

    pub fn on_item_removed(&self, subscriber: Option<&Asyncable>, f: impl Fn(&T) + Send + 'static) {
        debug_assert!(self.notify.is_some(), "notify list has no notifier");
        if let Some(n) = &self.notify {
            n.on_item_removed(subscriber, f);
        }
    }

    pub fn reset_on_item_removed(&self, subscriber: &Asyncable) {
        if let Some(n) = &self.notify {
            n.reset_on_item_removed(subscriber);
        }
    }

    pub fn on_item_replaced(
        &self,
        subscriber: Option<&Asyncable>,
        f: impl Fn(&T, &T) + Send + 'static,
    ) {
        debug_assert!(self.notify.is_some(), "notify list has no notifier");
        if let Some(n) = &self.notify {
            n.on_item_replaced(subscriber, f);
        }
    }

    pub fn reset_on_item_replaced(&self, subscriber: &Asyncable) {
        if let Some(n) = &self.notify {
            n.reset_on_item_replaced(subscriber);
        }
    }
}

impl<T: Clone + Send + 'static> Default for NotifyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Clone for NotifyList<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            notify: self.notify.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Deref for NotifyList<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.items
    }
}

impl<T: Clone + Send + 'static> DerefMut for NotifyList<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }
}
