//! Single-shot resolve/reject façade over a pair of channels

use crate::asyncable::Asyncable;
use crate::channel::Channel;
use crate::post::post_here;
use std::sync::Arc;

/// When the promise body runs
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PromiseMode {
    /// The body is posted to the current thread and runs on its next
    /// pump, after the caller has had a chance to attach handlers.
    AsyncByPromise,
    /// The body runs inline, during construction.  Handlers attached
    /// afterwards miss an inline settlement: results are not latched.
    AsyncByBody,
}

/// Attestation that a promise body settled
///
/// Obtainable only by calling [`Resolve::resolve`] or
/// [`Reject::reject`], which forces every body to terminate through
/// exactly one of them.
#[must_use]
pub struct Settled(());

/// The resolving terminator handed to a promise body.  Consuming
/// `self` makes a second resolution unrepresentable.
pub struct Resolve<T: Clone + Send + 'static>(Promise<T>);

impl<T: Clone + Send + 'static> Resolve<T> {
    pub fn resolve(self, val: T) -> Settled {
        self.0.do_resolve(val);
        Settled(())
    }
}

/// The rejecting terminator handed to a promise body
pub struct Reject<T: Clone + Send + 'static>(Promise<T>);

impl<T: Clone + Send + 'static> Reject<T> {
    pub fn reject(self, code: i32, msg: impl Into<String>) -> Settled {
        self.0.do_reject(code, msg.into());
        Settled(())
    }
}

/// Single-shot asynchronous result
///
/// A promise owns a resolve channel of `T` and, unless constructed
/// with [`Promise::new_resolve`], a reject channel of `(code,
/// message)`.  Settlement is an ordinary channel send: handlers
/// attached after the fact receive nothing.  Clones alias the same
/// promise.
pub struct Promise<T: Clone + Send + 'static> {
    data: Arc<PromiseData<T>>,
}

struct PromiseData<T: Clone + Send + 'static> {
    resolve_ch: Channel<T>,
    has_reject: bool,
    reject_ch: Option<Channel<(i32, String)>>,
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Construct from a body that must settle through one of the two
    /// terminators
    pub fn new(
        mode: PromiseMode,
        body: impl FnOnce(Resolve<T>, Reject<T>) -> Settled + Send + 'static,
    ) -> Self {
        let p = Self {
            data: Arc::new(PromiseData {
                resolve_ch: Channel::new(),
                has_reject: true,
                reject_ch: Some(Channel::new()),
            }),
        };
        let res = Resolve(p.clone());
        let rej = Reject(p.clone());
        match mode {
            PromiseMode::AsyncByBody => {
                let _ = body(res, rej);
            }
            PromiseMode::AsyncByPromise => post_here(None, move || {
                let _ = body(res, rej);
            }),
        }
        p
    }

    /// Construct from a body that can only resolve.  Attaching
    /// `on_reject` to such a promise is a programmer error.
    pub fn new_resolve(
        mode: PromiseMode,
        body: impl FnOnce(Resolve<T>) -> Settled + Send + 'static,
    ) -> Self {
        let p = Self {
            data: Arc::new(PromiseData {
                resolve_ch: Channel::new(),
                has_reject: false,
                reject_ch: None,
            }),
        };
        let res = Resolve(p.clone());
        match mode {
            PromiseMode::AsyncByBody => {
                let _ = body(res);
            }
            PromiseMode::AsyncByPromise => post_here(None, move || {
                let _ = body(res);
            }),
        }
        p
    }

    /// Attach a resolution handler; chainable.  Multiple handlers are
    /// permitted (distinct subscribers, or anonymous).
    pub fn on_resolve(
        &self,
        subscriber: Option<&Asyncable>,
        f: impl Fn(&T) + Send + 'static,
    ) -> &Self {
        self.data.resolve_ch.on_receive(subscriber, f);
        self
    }

    /// Attach a rejection handler; chainable
    pub fn on_reject(
        &self,
        subscriber: Option<&Asyncable>,
        f: impl Fn(i32, &str) + Send + 'static,
    ) -> &Self {
        debug_assert!(self.data.has_reject, "this promise has no rejection");
        if let Some(ch) = &self.data.reject_ch {
            ch.on_receive(subscriber, move |m: &(i32, String)| f(m.0, &m.1));
        }
        self
    }

    fn do_resolve(&self, val: T) {
        self.data.resolve_ch.send(val);
    }

    fn do_reject(&self, code: i32, msg: String) {
        debug_assert!(self.data.has_reject, "this promise has no rejection");
        if let Some(ch) = &self.data.reject_ch {
            ch.send((code, msg));
        }
    }
}

impl<T: Clone + Send + 'static> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
        }
    }
}

/// Shorthand for [`Promise::new`] with [`PromiseMode::AsyncByPromise`]
pub fn make_promise<T: Clone + Send + 'static>(
    body: impl FnOnce(Resolve<T>, Reject<T>) -> Settled + Send + 'static,
) -> Promise<T> {
    Promise::new(PromiseMode::AsyncByPromise, body)
}

/// Shorthand for [`Promise::new_resolve`] with
/// [`PromiseMode::AsyncByPromise`]
pub fn make_promise_resolve<T: Clone + Send + 'static>(
    body: impl FnOnce(Resolve<T>) -> Settled + Send + 'static,
) -> Promise<T> {
    Promise::new_resolve(PromiseMode::AsyncByPromise, body)
}
