//! ChangedNotify / NotifyList tests

use crate::{ChangedNotify, NotifyList};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

#[test]
fn five_channels_are_independent() {
    let notify = ChangedNotify::<i32>::new();

    let changed = Arc::new(AtomicI32::new(0));
    let item_changed = Arc::new(AtomicI32::new(0));
    let added = Arc::new(AtomicI32::new(0));
    let removed = Arc::new(AtomicI32::new(0));
    let replaced = Arc::new(AtomicI32::new(0));

    let c = changed.clone();
    notify.on_changed(None, move || {
        c.fetch_add(1, Ordering::SeqCst);
    });
    let c = item_changed.clone();
    notify.on_item_changed(None, move |v: &i32| {
        c.fetch_add(*v, Ordering::SeqCst);
    });
    let c = added.clone();
    notify.on_item_added(None, move |v: &i32| {
        c.fetch_add(*v, Ordering::SeqCst);
    });
    let c = removed.clone();
    notify.on_item_removed(None, move |v: &i32| {
        c.fetch_add(*v, Ordering::SeqCst);
    });
    let c = replaced.clone();
    notify.on_item_replaced(None, move |old: &i32, new: &i32| {
        c.fetch_add(new - old, Ordering::SeqCst);
    });

    notify.item_added(&7);
    assert_eq!(added.load(Ordering::SeqCst), 7);
    assert_eq!(changed.load(Ordering::SeqCst), 0);
    assert_eq!(item_changed.load(Ordering::SeqCst), 0);

    notify.notify_changed();
    assert_eq!(changed.load(Ordering::SeqCst), 1);

    notify.item_changed(&3);
    assert_eq!(item_changed.load(Ordering::SeqCst), 3);

    notify.item_removed(&2);
    assert_eq!(removed.load(Ordering::SeqCst), 2);

    notify.item_replaced(&10, &25);
    assert_eq!(replaced.load(Ordering::SeqCst), 15);

    // nothing else fired along the way
    assert_eq!(added.load(Ordering::SeqCst), 7);
    assert_eq!(changed.load(Ordering::SeqCst), 1);
}

#[test]
fn list_mutation_emits_nothing() {
    let mut list = NotifyList::<i32>::from_vec(vec![1, 2]);
    list.set_notify(Arc::new(ChangedNotify::new()));

    let changed = Arc::new(AtomicI32::new(0));
    let changed2 = changed.clone();
    list.on_changed(None, move || {
        changed2.fetch_add(1, Ordering::SeqCst);
    });

    // plain sequence mutation: no emission
    list.push(3);
    list[0] = 10;
    assert_eq!(changed.load(Ordering::SeqCst), 0);
    assert_eq!(list.len(), 3);

    // the producer decides when a change is announced
    list.notifier().unwrap().notify_changed();
    assert_eq!(changed.load(Ordering::SeqCst), 1);
}

#[test]
fn shared_notifier_between_list_aliases() {
    let notify = Arc::new(ChangedNotify::<i32>::new());
    let mut list = NotifyList::<i32>::new();
    list.set_notify(notify.clone());

    let added = Arc::new(AtomicI32::new(0));
    let added2 = added.clone();
    list.on_item_added(None, move |v: &i32| {
        added2.fetch_add(*v, Ordering::SeqCst);
    });

    list.push(4);
    notify.item_added(&4);
    assert_eq!(added.load(Ordering::SeqCst), 4);
}
