//! Crawl frontier: FIFO work queue with built-in deduplication
//!
//! The frontier owns the visited-set, so a URL can be handed to a worker
//! at most once per run. It also tracks how many dequeued entries are
//! still being processed; when the queue drains and that count reaches
//! zero the frontier closes itself and every blocked `next()` call
//! returns `None`, which is how workers learn the crawl is over.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;

/// A unit of work handed to a fetch worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Normalized URL to fetch
    pub url: String,

    /// Link depth from the seed
    pub depth: u32,
}

struct FrontierState {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    /// Entries dequeued but not yet reported done
    in_flight: usize,
    closed: bool,
}

/// Shared FIFO frontier for a single crawl run
///
/// All state sits under one mutex with short critical sections; `next()`
/// parks on a `Notify` while the queue is empty, so the lock is never
/// held across an await.
pub struct Frontier {
    state: Mutex<FrontierState>,
    notify: Notify,
}

impl Frontier {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FrontierState {
                queue: VecDeque::new(),
                visited: HashSet::new(),
                in_flight: 0,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Enqueues a URL if it has never been seen this run
    ///
    /// Returns true if the entry was accepted. A URL that is already in
    /// the visited-set, or arrives after the frontier closed, is dropped
    /// and false is returned.
    pub fn enqueue(&self, url: &str, depth: u32) -> bool {
        let mut state = self.state.lock().unwrap();

        if state.closed || !state.visited.insert(url.to_string()) {
            return false;
        }

        state.queue.push_back(FrontierEntry {
            url: url.to_string(),
            depth,
        });
        drop(state);

        self.notify.notify_one();
        true
    }

    /// Dequeues the next entry, suspending while the queue is empty
    ///
    /// Returns `None` once the frontier is closed (explicitly, or because
    /// the queue drained with nothing in flight). Every caller that gets
    /// `Some` must call `task_done()` exactly once when finished.
    pub async fn next(&self) -> Option<FrontierEntry> {
        loop {
            // Register for a wakeup before checking state, so a notify
            // between the check and the await is not lost
            let notified = self.notify.notified();

            {
                let mut state = self.state.lock().unwrap();

                if let Some(entry) = state.queue.pop_front() {
                    state.in_flight += 1;
                    return Some(entry);
                }

                if state.closed || state.in_flight == 0 {
                    state.closed = true;
                    drop(state);
                    // Wake the other parked workers so they observe
                    // exhaustion too
                    self.notify.notify_waiters();
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Reports that a dequeued entry finished processing
    ///
    /// The matching call for every `Some` returned by `next()`. When the
    /// last in-flight entry completes against an empty queue, all parked
    /// workers are woken to observe exhaustion.
    pub fn task_done(&self) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.in_flight > 0);
        state.in_flight = state.in_flight.saturating_sub(1);

        if state.in_flight == 0 && state.queue.is_empty() {
            state.closed = true;
            drop(state);
            self.notify.notify_waiters();
        }
    }

    /// Closes the frontier immediately, discarding queued entries
    ///
    /// Used by cancellation. Idempotent; by the time this returns no
    /// further `next()` call can yield an entry.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.queue.clear();
        drop(state);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Number of entries waiting to be dequeued
    pub fn queued(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    /// Number of dequeued entries still being processed
    pub fn in_flight(&self) -> usize {
        self.state.lock().unwrap().in_flight
    }
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}
