//! One-shot post-to-thread
//!
//! Built directly on the queue pool: a process-wide registry keeps one
//! SPSC edge per `(sending thread, receiving thread)` pair that has
//! ever posted, and the receiving side runs each posted closure during
//! its next pump.

use crate::asyncable::{Asyncable, ConnTable};
use crate::conf::QUEUE_CAPACITY;
use crate::pool;
use crate::queue::{spsc, RecvPort, SendPort};
use crate::tid::Tid;
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

static POSTER: Lazy<Poster> = Lazy::new(Poster::default);

struct PostMsg {
    caller: Option<Weak<ConnTable>>,
    func: Box<dyn FnOnce() + Send>,
}

struct PostEdge {
    send_thread: Tid,
    recv_thread: Tid,
    tx: SendPort<PostMsg>,
    // Kept alive for the life of the process; post edges are never
    // unregistered.
    _rx: Arc<RecvPort<PostMsg>>,
}

#[derive(Default)]
struct Poster {
    edges: Mutex<Vec<PostEdge>>,
}

impl Poster {
    fn post(&self, caller: Option<&Asyncable>, target: Tid, func: Box<dyn FnOnce() + Send>) {
        let msg = PostMsg {
            caller: caller.map(|c| c.backlink()),
            func,
        };
        let send_thread = Tid::current();

        let mut edges = self.edges.lock().unwrap();
        if let Some(edge) = edges
            .iter()
            .find(|e| e.send_thread == send_thread && e.recv_thread == target)
        {
            edge.tx.send(msg);
            return;
        }

        let (tx, rx) = spsc::<PostMsg>(QUEUE_CAPACITY);
        rx.on_message(|m: PostMsg| {
            // A caller destroyed before dispatch drops the call.
            let live = match &m.caller {
                Some(weak) => weak.upgrade().is_some(),
                None => true,
            };
            if live {
                (m.func)();
            }
        });
        pool::pool().reg_port(target, rx.clone());
        debug!(
            from = send_thread.to_raw(),
            to = target.to_raw(),
            "post edge created"
        );
        tx.send(msg);
        edges.push(PostEdge {
            send_thread,
            recv_thread: target,
            tx,
            _rx: rx,
        });
    }
}

/// Schedule `f` to run once on `target`'s thread
///
/// `f` is invoked during that thread's next
/// [`process_events`](crate::process_events) call.  If `caller` is
/// given and is destroyed before dispatch, `f` is silently dropped.
/// Posting to the current thread is allowed; `f` then runs after the
/// caller returns to its pump.
pub fn post(caller: Option<&Asyncable>, target: Tid, f: impl FnOnce() + Send + 'static) {
    POSTER.post(caller, target, Box::new(f));
}

/// [`post`] to the calling thread's own pump
pub fn post_here(caller: Option<&Asyncable>, f: impl FnOnce() + Send + 'static) {
    post(caller, Tid::current(), f);
}
