use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: Tid = {
        let raw = NEXT_TID.fetch_add(1, Ordering::Relaxed);
        Tid(NonZeroU64::new(raw).expect("thread id counter wrapped"))
    };
}

/// Identity of a thread, as seen by this crate
///
/// A `Tid` is minted the first time a thread touches the crate and is
/// unique for the life of the process.  Unlike `std::thread::ThreadId`
/// it has a numeric representation, which lets the thread-slot arrays
/// compare identities with a single atomic load.  Zero is reserved to
/// mean "no thread", so a `Tid` can be stored in an `AtomicU64`
/// alongside the empty state.
///
/// Obtain the identity of another thread by calling [`Tid::current`] on
/// that thread and sending the value back, e.g. over a channel.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Tid(NonZeroU64);

impl Tid {
    /// Return the identity of the calling thread
    #[inline]
    pub fn current() -> Self {
        CURRENT.with(|t| *t)
    }

    #[inline]
    pub(crate) fn to_raw(self) -> u64 {
        self.0.get()
    }

    #[inline]
    pub(crate) fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Tid)
    }
}
