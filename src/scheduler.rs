//! Shared delayed-task scheduler keyed by what the task is for.
//!
//! One thread serves every eating timer, staggered arrival and simulated
//! movement. Scheduling under an existing key replaces the earlier job, and
//! closing the scheduler drops everything still pending.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use log::{error, trace, warn};
use parking_lot::{Condvar, Mutex};

use crate::types::{ActorId, CustomerId};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// What a pending job belongs to. At most one job per key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKey {
    Eating(CustomerId),
    Arrival(CustomerId),
    Move(ActorId),
}

struct Entry {
    key: TimerKey,
    job: Job,
}

struct SchedulerState {
    deadlines: BinaryHeap<Reverse<(Instant, u64)>>,
    entries: HashMap<u64, Entry>,
    by_key: HashMap<TimerKey, u64>,
    next_seq: u64,
    closed: bool,
}

pub struct Scheduler {
    state: Mutex<SchedulerState>,
    changed: Condvar,
}

impl Scheduler {
    /// Create an open scheduler with no jobs.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                deadlines: BinaryHeap::new(),
                entries: HashMap::new(),
                by_key: HashMap::new(),
                next_seq: 0,
                closed: false,
            }),
            changed: Condvar::new(),
        }
    }

    /// Run `job` after `delay`. Returns `false` if the scheduler is closed
    /// or `delay` reaches past what `Instant` can represent.
    pub fn schedule<F>(&self, key: TimerKey, delay: Duration, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(due) = Instant::now().checked_add(delay) else {
            warn!("[SCHED] {key:?} delayed by {delay:?} can never run; dropped");
            return false;
        };
        let replaced;
        {
            let mut guard = self.state.lock();
            if guard.closed {
                return false;
            }
            replaced = guard
                .by_key
                .remove(&key)
                .and_then(|seq| guard.entries.remove(&seq));
            let seq = guard.next_seq;
            guard.next_seq += 1;
            guard.entries.insert(
                seq,
                Entry {
                    key,
                    job: Box::new(job),
                },
            );
            guard.by_key.insert(key, seq);
            guard.deadlines.push(Reverse((due, seq)));
            self.changed.notify_one();
        }
        if replaced.is_some() {
            trace!("[SCHED] replaced pending job {key:?}");
        }
        true
    }

    /// Drop the pending job for `key`. Returns `true` if one was pending.
    pub fn cancel(&self, key: TimerKey) -> bool {
        let removed = {
            let mut guard = self.state.lock();
            guard
                .by_key
                .remove(&key)
                .and_then(|seq| guard.entries.remove(&seq))
        };
        removed.is_some()
    }

    /// Whether a job is waiting under `key`.
    pub fn is_pending(&self, key: TimerKey) -> bool {
        self.state.lock().by_key.contains_key(&key)
    }

    /// Number of jobs waiting to run.
    pub fn pending(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Stop the worker and discard every pending job.
    pub fn close(&self) {
        let dropped = {
            let mut guard = self.state.lock();
            guard.closed = true;
            guard.deadlines.clear();
            guard.by_key.clear();
            self.changed.notify_all();
            std::mem::take(&mut guard.entries)
        };
        // Jobs may own the last handle to shared state; drop them unlocked.
        drop(dropped);
    }

    /// Worker loop. Returns once the scheduler is closed.
    pub fn run(&self) {
        while let Some(entry) = self.next_due() {
            let key = entry.key;
            trace!("[SCHED] running {key:?}");
            if panic::catch_unwind(AssertUnwindSafe(entry.job)).is_err() {
                error!("[SCHED] job {key:?} panicked; scheduler keeps running");
            }
        }
    }

    fn next_due(&self) -> Option<Entry> {
        let mut guard = self.state.lock();
        loop {
            if guard.closed {
                return None;
            }
            let Some(&Reverse((due, seq))) = guard.deadlines.peek() else {
                self.changed.wait(&mut guard);
                continue;
            };
            if !guard.entries.contains_key(&seq) {
                // Cancelled or replaced.
                guard.deadlines.pop();
                continue;
            }
            if due > Instant::now() {
                // An earlier job may arrive meanwhile; re-check on wake.
                self.changed.wait_until(&mut guard, due);
                continue;
            }
            guard.deadlines.pop();
            let Some(entry) = guard.entries.remove(&seq) else {
                continue;
            };
            if guard.by_key.get(&entry.key) == Some(&seq) {
                guard.by_key.remove(&entry.key);
            }
            return Some(entry);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
