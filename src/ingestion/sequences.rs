use std::sync::atomic::{AtomicI64, Ordering};

/// Profile-scoped ID counters shared by every ingestion worker of one run.
///
/// Each counter starts at 1 and is incremented atomically, so concurrent
/// writers never observe the same value for the same counter.
#[derive(Debug, Default)]
pub struct ProfileSequences {
    events: AtomicI64,
    stacktraces: AtomicI64,
    threads: AtomicI64,
}

impl ProfileSequences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_event_id(&self) -> i64 {
        self.events.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn next_stacktrace_id(&self) -> i64 {
        self.stacktraces.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn next_thread_id(&self) -> i64 {
        self.threads.fetch_add(1, Ordering::Relaxed) + 1
    }
}
