//! Promise façade tests

use crate::{process_events, Promise, PromiseMode};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

#[test]
fn async_by_body_runs_inline() {
    let ran = Arc::new(AtomicBool::new(false));
    let ran2 = ran.clone();
    let _p = Promise::<i32>::new(PromiseMode::AsyncByBody, move |res, _rej| {
        ran2.store(true, Ordering::SeqCst);
        res.resolve(1)
    });
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn async_by_promise_resolves_on_pump() {
    let p = Promise::<i32>::new(PromiseMode::AsyncByPromise, |res, _rej| res.resolve(42));

    let got = Arc::new(AtomicI32::new(0));
    let got2 = got.clone();
    p.on_resolve(None, move |v: &i32| got2.store(*v, Ordering::SeqCst));

    // the body has not run yet
    assert_eq!(got.load(Ordering::SeqCst), 0);
    process_events();
    assert_eq!(got.load(Ordering::SeqCst), 42);
}

#[test]
fn multiple_resolve_handlers() {
    let p = Promise::<i32>::new(PromiseMode::AsyncByPromise, |res, _rej| res.resolve(2));

    let a = Arc::new(AtomicI32::new(0));
    let b = Arc::new(AtomicI32::new(0));
    let a2 = a.clone();
    let b2 = b.clone();
    p.on_resolve(None, move |v: &i32| a2.store(*v, Ordering::SeqCst))
        .on_resolve(None, move |v: &i32| b2.store(*v, Ordering::SeqCst));

    process_events();
    assert_eq!(a.load(Ordering::SeqCst), 2);
    assert_eq!(b.load(Ordering::SeqCst), 2);
}

#[test]
fn reject_delivery() {
    let p = Promise::<i32>::new(PromiseMode::AsyncByPromise, |_res, rej| rej.reject(-1, "boom"));

    let code = Arc::new(AtomicI32::new(0));
    let msg = Arc::new(Mutex::new(String::new()));
    let code2 = code.clone();
    let msg2 = msg.clone();
    p.on_reject(None, move |c, m| {
        code2.store(c, Ordering::SeqCst);
        *msg2.lock().unwrap() = m.to_string();
    });

    process_events();
    assert_eq!(code.load(Ordering::SeqCst), -1);
    assert_eq!(&*msg.lock().unwrap(), "boom");
}

#[test]
fn resolve_only_body() {
    let p = Promise::<i32>::new_resolve(PromiseMode::AsyncByPromise, |res| res.resolve(7));

    let got = Arc::new(AtomicI32::new(0));
    let got2 = got.clone();
    p.on_resolve(None, move |v: &i32| got2.store(*v, Ordering::SeqCst));

    process_events();
    assert_eq!(got.load(Ordering::SeqCst), 7);
}

// Fulfilment is not latched: a handler attached after resolution
// receives nothing.
#[test]
fn no_latch_for_late_subscriber() {
    let p = Promise::<i32>::new(PromiseMode::AsyncByPromise, |res, _rej| res.resolve(1));

    // resolve with nobody listening
    process_events();

    let got = Arc::new(AtomicI32::new(0));
    let got2 = got.clone();
    p.on_resolve(None, move |v: &i32| got2.store(*v, Ordering::SeqCst));
    process_events();
    assert_eq!(got.load(Ordering::SeqCst), 0);
}
