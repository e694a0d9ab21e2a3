//! Queue pool registration tests

use crate::pool::pool;
use crate::queue::{spsc, PumpPort};
use crate::{process_events, Tid};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn register_process_unregister() {
    let (tx, rx) = spsc::<u32>(16);
    let sum = Arc::new(AtomicUsize::new(0));
    let sum2 = sum.clone();
    rx.on_message(move |v: u32| {
        sum2.fetch_add(v as usize, Ordering::SeqCst);
    });

    pool().reg_port(Tid::current(), rx.clone());
    tx.send(5);
    process_events();
    assert_eq!(sum.load(Ordering::SeqCst), 5);

    pool().unreg_port(Tid::current(), rx.id());
    tx.send(6);
    process_events();
    // nothing drains the port any more
    assert_eq!(sum.load(Ordering::SeqCst), 5);
}

#[test]
fn multiple_ports_one_thread() {
    let (tx_a, rx_a) = spsc::<u32>(16);
    let (tx_b, rx_b) = spsc::<u32>(16);
    let sum = Arc::new(AtomicUsize::new(0));

    let sum2 = sum.clone();
    rx_a.on_message(move |v: u32| {
        sum2.fetch_add(v as usize, Ordering::SeqCst);
    });
    let sum3 = sum.clone();
    rx_b.on_message(move |v: u32| {
        sum3.fetch_add(v as usize, Ordering::SeqCst);
    });

    pool().reg_port(Tid::current(), rx_a.clone());
    pool().reg_port(Tid::current(), rx_b.clone());
    tx_a.send(1);
    tx_b.send(2);
    process_events();
    assert_eq!(sum.load(Ordering::SeqCst), 3);

    pool().unreg_port(Tid::current(), rx_a.id());
    pool().unreg_port(Tid::current(), rx_b.id());
}
