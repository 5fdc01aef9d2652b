//! Customer counters read by the display layer.

use log::warn;
use parking_lot::Mutex;

/// The four display counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Counter {
    WaitingForTable,
    WaitingForFood,
    Eating,
    AtTables,
}

/// Point-in-time copy of every counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub waiting_for_table: u64,
    pub waiting_for_food: u64,
    pub eating: u64,
    pub at_tables: u64,
    pub arrived: u64,
    pub departed: u64,
}

impl StatsSnapshot {
    fn slot(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::WaitingForTable => &mut self.waiting_for_table,
            Counter::WaitingForFood => &mut self.waiting_for_food,
            Counter::Eating => &mut self.eating,
            Counter::AtTables => &mut self.at_tables,
        }
    }

    /// True when no customer is counted as inside the restaurant.
    pub fn is_idle(&self) -> bool {
        self.waiting_for_table == 0
            && self.waiting_for_food == 0
            && self.eating == 0
            && self.at_tables == 0
    }
}

/// Thread-safe counters. Each customer transition updates all affected
/// counters in one critical section, so snapshots are always consistent.
pub struct StatsAggregator {
    counters: Mutex<StatsSnapshot>,
}

impl StatsAggregator {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(StatsSnapshot::default()),
        }
    }

    /// Add one to `counter`.
    pub fn increment(&self, counter: Counter) {
        self.apply(&[counter], &[]);
    }

    /// Subtract one from `counter`, stopping at zero.
    pub fn decrement(&self, counter: Counter) {
        self.apply(&[], &[counter]);
    }

    /// Consistent copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        *self.counters.lock()
    }

    /// A customer came through the door.
    pub fn record_arrival(&self) {
        self.counters.lock().arrived += 1;
    }

    /// Customer joined the receptionist backlog.
    pub fn record_backlogged(&self) {
        self.increment(Counter::WaitingForTable);
    }

    /// Backlogged customer was given a table.
    pub fn record_unbacklogged(&self) {
        self.decrement(Counter::WaitingForTable);
    }

    /// Customer sat down and is waiting to order and eat.
    pub fn record_seated(&self) {
        self.apply(&[Counter::AtTables, Counter::WaitingForFood], &[]);
    }

    /// Food reached the table: waiting for food becomes eating.
    pub fn record_served(&self) {
        self.apply(&[Counter::Eating], &[Counter::WaitingForFood]);
    }

    /// Customer finished eating and gave the table back.
    pub fn record_left_table(&self) {
        self.apply(&[], &[Counter::Eating, Counter::AtTables]);
    }

    /// A customer walked out.
    pub fn record_departure(&self) {
        self.counters.lock().departed += 1;
    }

    fn apply(&self, increments: &[Counter], decrements: &[Counter]) {
        let mut guard = self.counters.lock();
        for &counter in increments {
            *guard.slot(counter) += 1;
        }
        for &counter in decrements {
            let slot = guard.slot(counter);
            if *slot == 0 {
                // Never wrap; an underflow means a transition was skipped.
                warn!("[STATS] {counter:?} decremented below zero");
                continue;
            }
            *slot -= 1;
        }
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn full_visit_returns_to_baseline() {
        let stats = StatsAggregator::new();
        stats.record_arrival();
        stats.record_backlogged();
        assert_eq!(stats.snapshot().waiting_for_table, 1);
        stats.record_unbacklogged();
        stats.record_seated();
        let seated = stats.snapshot();
        assert_eq!(seated.at_tables, 1);
        assert_eq!(seated.waiting_for_food, 1);
        stats.record_served();
        let eating = stats.snapshot();
        assert_eq!(eating.eating, 1);
        assert_eq!(eating.waiting_for_food, 0);
        stats.record_left_table();
        stats.record_departure();

        let end = stats.snapshot();
        assert!(end.is_idle());
        assert_eq!(end.arrived, 1);
        assert_eq!(end.departed, 1);
    }

    #[test]
    fn decrement_never_wraps() {
        let stats = StatsAggregator::new();
        stats.decrement(Counter::Eating);
        assert_eq!(stats.snapshot().eating, 0);
    }

    #[test]
    fn seated_always_equals_waiting_plus_eating() {
        let stats = Arc::new(StatsAggregator::new());
        let workers = 4;
        let barrier = Arc::new(Barrier::new(workers + 1));
        let mut handles = Vec::new();
        for _ in 0..workers {
            let stats = Arc::clone(&stats);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                for _ in 0..500 {
                    stats.record_seated();
                    stats.record_served();
                    stats.record_left_table();
                }
            }));
        }
        barrier.wait();
        for _ in 0..1000 {
            let snap = stats.snapshot();
            assert_eq!(snap.at_tables, snap.waiting_for_food + snap.eating);
        }
        for handle in handles {
            handle.join().expect("stats worker panicked");
        }
        assert!(stats.snapshot().is_idle());
    }
}
