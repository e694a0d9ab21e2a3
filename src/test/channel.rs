//! Channel dispatch tests

use super::pump_until;
use crate::{process_events, Asyncable, AsyncMode, Channel, SendMode};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Some kind of service publishing its state changes
struct Counter {
    value: i32,
    ch: Channel<i32>,
}

impl Counter {
    fn new() -> Self {
        Self {
            value: 0,
            ch: Channel::new(),
        }
    }

    fn increment(&mut self) {
        self.value += 1;
        self.ch.send(self.value);
    }

    fn value_changed(&self) -> Channel<i32> {
        self.ch.clone()
    }
}

/// Something like a view-model mirroring the counter's value
struct Listener {
    on: Asyncable,
    value: Arc<AtomicI32>,
}

impl Listener {
    fn new() -> Self {
        Self {
            on: Asyncable::new(),
            value: Arc::new(AtomicI32::new(0)),
        }
    }

    fn attach(&self, src: &Counter) {
        let value = self.value.clone();
        src.value_changed()
            .on_receive(Some(&self.on), move |v: &i32| {
                value.store(*v, Ordering::SeqCst)
            });
    }

    fn detach(&self, src: &Counter) {
        src.value_changed().reset_on_receive(&self.on);
    }
}

#[test]
fn single_thread_send() {
    let ch = Channel::<i32>::new();
    let got = Arc::new(AtomicI32::new(0));
    let got2 = got.clone();
    ch.on_receive(None, move |v: &i32| got2.store(*v, Ordering::SeqCst));
    ch.send(42);
    assert_eq!(got.load(Ordering::SeqCst), 42);
}

#[test]
fn single_thread_send_from_object() {
    let mut counter = Counter::new();
    let got = Arc::new(AtomicI32::new(0));
    let got2 = got.clone();
    counter
        .value_changed()
        .on_receive(None, move |v: &i32| got2.store(*v, Ordering::SeqCst));

    assert_eq!(got.load(Ordering::SeqCst), 0);
    counter.increment();
    assert_eq!(got.load(Ordering::SeqCst), 1);
    counter.increment();
    assert_eq!(got.load(Ordering::SeqCst), 2);
}

#[test]
fn reset_stops_delivery() {
    let sub = Asyncable::new();
    let mut counter = Counter::new();
    let got = Arc::new(AtomicI32::new(0));
    let got2 = got.clone();
    counter
        .value_changed()
        .on_receive(Some(&sub), move |v: &i32| got2.store(*v, Ordering::SeqCst));

    counter.increment();
    assert_eq!(got.load(Ordering::SeqCst), 1);

    counter.value_changed().reset_on_receive(&sub);
    assert!(!counter.value_changed().is_connected());
    assert!(!sub.is_connected_async());

    counter.increment();
    assert_eq!(got.load(Ordering::SeqCst), 1);
}

#[test]
fn reset_is_idempotent() {
    let sub = Asyncable::new();
    let ch = Channel::<i32>::new();

    // disconnecting something that was never connected is a no-op
    ch.reset_on_receive(&sub);

    ch.on_receive(Some(&sub), |_v: &i32| {});
    ch.reset_on_receive(&sub);
    ch.reset_on_receive(&sub);
    assert!(!ch.is_connected());
}

#[test]
fn reset_inside_callback() {
    let sub = Arc::new(Asyncable::new());
    let ch = Channel::<i32>::new();
    let fired = Arc::new(AtomicI32::new(0));

    let ch2 = ch.clone();
    let sub2 = sub.clone();
    let fired2 = fired.clone();
    ch.on_receive(Some(&*sub), move |_v: &i32| {
        fired2.fetch_add(1, Ordering::SeqCst);
        ch2.reset_on_receive(&sub2);
    });

    ch.send(1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!ch.is_connected());

    ch.send(2);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn sender_receiver_objects() {
    let mut counter = Counter::new();
    let listener = Listener::new();

    listener.attach(&counter);
    assert_eq!(listener.value.load(Ordering::SeqCst), 0);

    counter.increment();
    assert_eq!(listener.value.load(Ordering::SeqCst), 1);

    listener.detach(&counter);
    counter.increment();
    assert_eq!(listener.value.load(Ordering::SeqCst), 1);
}

#[test]
fn one_sender_multiple_receivers() {
    let mut counter = Counter::new();
    let first = Listener::new();
    let second = Listener::new();

    first.attach(&counter);
    second.attach(&counter);

    counter.increment();
    assert_eq!(first.value.load(Ordering::SeqCst), 1);
    assert_eq!(second.value.load(Ordering::SeqCst), 1);

    first.detach(&counter);
    counter.increment();
    assert_eq!(first.value.load(Ordering::SeqCst), 1);
    assert_eq!(second.value.load(Ordering::SeqCst), 2);
}

#[test]
fn auto_disconnect_on_subscriber_drop() {
    let mut counter = Counter::new();
    {
        let listener = Listener::new();
        listener.attach(&counter);
        assert!(counter.value_changed().is_connected());

        counter.increment();
        assert_eq!(listener.value.load(Ordering::SeqCst), 1);
    }

    // the listener is gone and unsubscribed
    assert!(!counter.value_changed().is_connected());
    counter.increment();
}

#[test]
fn async_set_replaces_callback() {
    let sub = Asyncable::new();
    let ch = Channel::<i32>::new();
    let old = Arc::new(AtomicI32::new(0));
    let new = Arc::new(AtomicI32::new(0));

    let old2 = old.clone();
    ch.on_receive(Some(&sub), move |v: &i32| {
        old2.fetch_add(*v, Ordering::SeqCst);
    });
    let new2 = new.clone();
    ch.on_receive_mode(Some(&sub), AsyncMode::AsyncSet, move |v: &i32| {
        new2.fetch_add(*v, Ordering::SeqCst);
    });

    ch.send(5);
    assert_eq!(old.load(Ordering::SeqCst), 0);
    assert_eq!(new.load(Ordering::SeqCst), 5);

    // still a single binding
    ch.reset_on_receive(&sub);
    assert!(!ch.is_connected());
}

#[test]
fn close_fires_exactly_once() {
    let ch = Channel::<i32>::new();
    let closed = Arc::new(AtomicI32::new(0));
    let closed2 = closed.clone();
    ch.on_close(None, move || {
        closed2.fetch_add(1, Ordering::SeqCst);
    });

    ch.close();
    ch.close();
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn queue_mode_delivers_via_pump() {
    let ch = Channel::<i32>::new();
    let got = Arc::new(AtomicI32::new(0));
    let got2 = got.clone();
    ch.on_receive(None, move |v: &i32| got2.store(*v, Ordering::SeqCst));

    ch.send_mode(SendMode::Queue, 9);
    assert_eq!(got.load(Ordering::SeqCst), 0);

    process_events();
    assert_eq!(got.load(Ordering::SeqCst), 9);
}

#[test]
fn mid_dispatch_subscribe_lands_next_send() {
    let ch = Channel::<i32>::new();
    let first = Arc::new(AtomicI32::new(0));
    let second = Arc::new(AtomicI32::new(0));
    let added = Arc::new(AtomicBool::new(false));

    let ch2 = ch.clone();
    let first2 = first.clone();
    let second2 = second.clone();
    let added2 = added.clone();
    ch.on_receive(None, move |_v: &i32| {
        first2.fetch_add(1, Ordering::SeqCst);
        if !added2.swap(true, Ordering::SeqCst) {
            let second3 = second2.clone();
            ch2.on_receive(None, move |v: &i32| {
                second3.fetch_add(*v, Ordering::SeqCst);
            });
        }
    });

    ch.send(10);
    assert_eq!(first.load(Ordering::SeqCst), 1);
    // the new subscriber missed the pass that registered it
    assert_eq!(second.load(Ordering::SeqCst), 0);

    ch.send(10);
    assert_eq!(first.load(Ordering::SeqCst), 2);
    assert_eq!(second.load(Ordering::SeqCst), 10);
}

#[test]
fn cross_thread_receive() {
    let ch = Channel::<i32>::new();
    let got = Arc::new(AtomicI32::new(0));
    let got2 = got.clone();
    ch.on_receive(None, move |v: &i32| {
        assert_eq!(*v, 42);
        got2.store(*v, Ordering::SeqCst);
    });

    let ch2 = ch.clone();
    let t = thread::spawn(move || {
        // some kind of calculation or data acquisition
        let val = 40 + 2;
        ch2.send(val);
    });

    assert!(pump_until(|| got.load(Ordering::SeqCst) == 42));
    t.join().unwrap();
    assert_eq!(got.load(Ordering::SeqCst), 42);
}

#[test]
fn send_to_subscriber_on_other_thread() {
    let ch = Channel::<(i32, i32)>::new();
    let received = Arc::new(AtomicBool::new(false));
    let subscribed = Arc::new(AtomicBool::new(false));

    let ch2 = ch.clone();
    let received2 = received.clone();
    let subscribed2 = subscribed.clone();
    let t = thread::spawn(move || {
        let received3 = received2.clone();
        ch2.on_receive(None, move |v: &(i32, i32)| {
            assert_eq!(*v, (42, 73));
            received3.store(true, Ordering::SeqCst);
        });
        subscribed2.store(true, Ordering::SeqCst);

        for _ in 0..200 {
            process_events();
            if received2.load(Ordering::SeqCst) {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
    });

    while !subscribed.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));
    }
    ch.send((42, 73));

    t.join().unwrap();
    assert!(received.load(Ordering::SeqCst));
}

// The reset happens inside a callback fed from another thread's send.
// The registration thread performs the removal locally between passes,
// so nothing blocks and the second value is skipped.
#[test]
fn reset_inside_callback_from_remote_send() {
    let sub = Arc::new(Asyncable::new());
    let ch = Channel::<i32>::new();
    let got = Arc::new(AtomicI32::new(0));

    let ch2 = ch.clone();
    let sub2 = sub.clone();
    let got2 = got.clone();
    ch.on_receive(Some(&*sub), move |v: &i32| {
        assert_eq!(*v, 42);
        got2.store(*v, Ordering::SeqCst);
        ch2.reset_on_receive(&sub2);
    });

    let ch3 = ch.clone();
    let t = thread::spawn(move || {
        ch3.send(42);
        ch3.send(100);
    });

    for _ in 0..100 {
        process_events();
        thread::sleep(Duration::from_millis(1));
    }
    t.join().unwrap();
    assert_eq!(got.load(Ordering::SeqCst), 42);
}

#[test]
fn subscriber_dropped_on_foreign_thread() {
    let ch = Channel::<i32>::new();
    let calls = Arc::new(AtomicI32::new(0));
    let sub = Arc::new(Asyncable::new());
    let subscribed = Arc::new(AtomicBool::new(false));
    let stop = Arc::new(AtomicBool::new(false));

    let ch2 = ch.clone();
    let calls2 = calls.clone();
    let sub2 = sub.clone();
    let subscribed2 = subscribed.clone();
    let stop2 = stop.clone();
    let t = thread::spawn(move || {
        let calls3 = calls2.clone();
        ch2.on_receive(Some(&*sub2), move |_v: &i32| {
            calls3.fetch_add(1, Ordering::SeqCst);
        });
        drop(sub2);
        subscribed2.store(true, Ordering::SeqCst);

        while !stop2.load(Ordering::SeqCst) {
            process_events();
            thread::sleep(Duration::from_millis(1));
        }
    });

    while !subscribed.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));
    }

    // Last reference: severs the binding from this (foreign) thread.
    drop(sub);
    assert!(!ch.is_connected());

    ch.send(7);
    thread::sleep(Duration::from_millis(20));
    stop.store(true, Ordering::SeqCst);
    t.join().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
