//! Table occupancy monitor.

use std::collections::HashSet;

use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::error::TableError;
use crate::types::{CustomerId, Table, TableId};

struct TableState {
    // Index is the table number; `Some` holds the seated customer.
    seats: Vec<Option<CustomerId>>,
    closed: bool,
}

/// Owns which customer holds which table.
pub struct TableAllocator {
    state: Mutex<TableState>,
    available: Condvar,
}

impl TableAllocator {
    /// Create `tables` free tables.
    pub fn new(tables: usize) -> Self {
        Self {
            state: Mutex::new(TableState {
                seats: vec![None; tables],
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.state.lock().seats.len()
    }

    /// Whether the restaurant has no tables.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lowest-numbered free table, if any. Informational only: the answer
    /// may be stale by the time the caller acts on it.
    pub fn find_available_table(&self) -> Option<TableId> {
        let guard = self.state.lock();
        guard.seats.iter().position(Option::is_none)
    }

    /// Find a free table and hand it to `customer` in one critical section.
    pub fn try_occupy(&self, customer: CustomerId) -> Option<TableId> {
        let mut guard = self.state.lock();
        let table = guard.seats.iter().position(Option::is_none)?;
        guard.seats[table] = Some(customer);
        debug!("[TABLE] customer {customer} occupied table {table}");
        Some(table)
    }

    /// Occupy a specific table. Re-validates that it is still free.
    pub fn occupy_table(&self, table: TableId, customer: CustomerId) -> Result<(), TableError> {
        let mut guard = self.state.lock();
        let total = guard.seats.len();
        let seat = guard
            .seats
            .get_mut(table)
            .ok_or(TableError::OutOfRange { table, total })?;
        if let Some(occupant) = *seat {
            return Err(TableError::AlreadyOccupied { table, occupant });
        }
        *seat = Some(customer);
        debug!("[TABLE] customer {customer} occupied table {table}");
        Ok(())
    }

    /// Free a table held by `customer` and wake every blocked waiter.
    pub fn release_table(&self, table: TableId, customer: CustomerId) -> Result<(), TableError> {
        let mut guard = self.state.lock();
        let total = guard.seats.len();
        let seat = guard
            .seats
            .get_mut(table)
            .ok_or(TableError::OutOfRange { table, total })?;
        match *seat {
            Some(owner) if owner == customer => {
                *seat = None;
                debug!("[TABLE] customer {customer} released table {table}");
                // Several threads may race for the slot; each re-checks.
                self.available.notify_all();
                Ok(())
            }
            Some(owner) => Err(TableError::NotOwner {
                table,
                owner,
                caller: customer,
            }),
            None => Err(TableError::NotOccupied(table)),
        }
    }

    /// Block until some table is free. Returns `false` if closed first.
    pub fn wait_for_available_table(&self) -> bool {
        let mut guard = self.state.lock();
        loop {
            if guard.closed {
                return false;
            }
            if guard.seats.iter().any(Option::is_none) {
                return true;
            }
            self.available.wait(&mut guard);
        }
    }

    /// Customer at `table`, if any.
    pub fn occupant(&self, table: TableId) -> Option<CustomerId> {
        let guard = self.state.lock();
        guard.seats.get(table).copied().flatten()
    }

    /// Indices of all occupied tables.
    pub fn occupied_tables(&self) -> HashSet<TableId> {
        let guard = self.state.lock();
        guard
            .seats
            .iter()
            .enumerate()
            .filter_map(|(table, seat)| seat.map(|_| table))
            .collect()
    }

    /// Read-only view of every table.
    pub fn snapshot(&self) -> Vec<Table> {
        let guard = self.state.lock();
        guard
            .seats
            .iter()
            .enumerate()
            .map(|(number, seat)| Table {
                number,
                current_customer: *seat,
            })
            .collect()
    }

    /// Wake all blocked waiters for shutdown.
    pub fn close(&self) {
        let mut guard = self.state.lock();
        guard.closed = true;
        self.available.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn occupied_set_matches_held_tables_under_contention() {
        let tables = Arc::new(TableAllocator::new(3));
        let contenders = 8;
        let barrier = Arc::new(Barrier::new(contenders));
        let held: Arc<parking_lot::Mutex<HashSet<TableId>>> =
            Arc::new(parking_lot::Mutex::new(HashSet::new()));
        let violation = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::new();
        for customer in 0..contenders as u64 {
            let tables = Arc::clone(&tables);
            let barrier = Arc::clone(&barrier);
            let held = Arc::clone(&held);
            let violation = Arc::clone(&violation);
            handles.push(thread::spawn(move || {
                barrier.wait();
                for _ in 0..50 {
                    let Some(table) = tables.try_occupy(customer) else {
                        thread::yield_now();
                        continue;
                    };
                    {
                        let mut guard = held.lock();
                        // Nobody else may believe they hold this table.
                        if !guard.insert(table) {
                            violation.store(true, Ordering::SeqCst);
                        }
                    }
                    thread::sleep(Duration::from_micros(200));
                    held.lock().remove(&table);
                    tables
                        .release_table(table, customer)
                        .expect("owner release should succeed");
                }
            }));
        }

        for handle in handles {
            handle.join().expect("contender thread panicked");
        }

        assert!(!violation.load(Ordering::SeqCst));
        assert!(tables.occupied_tables().is_empty());
    }

    #[test]
    fn occupying_a_taken_table_is_rejected() {
        let tables = TableAllocator::new(2);
        tables.occupy_table(1, 10).expect("free table");
        assert_eq!(
            tables.occupy_table(1, 11),
            Err(TableError::AlreadyOccupied {
                table: 1,
                occupant: 10
            })
        );
        assert_eq!(tables.occupant(1), Some(10));
        assert_eq!(
            tables.occupy_table(5, 11),
            Err(TableError::OutOfRange { table: 5, total: 2 })
        );
    }

    #[test]
    fn release_by_non_owner_keeps_table() {
        let tables = TableAllocator::new(1);
        assert_eq!(tables.try_occupy(1), Some(0));
        assert_eq!(
            tables.release_table(0, 2),
            Err(TableError::NotOwner {
                table: 0,
                owner: 1,
                caller: 2
            })
        );
        assert!(tables.occupied_tables().contains(&0));
        tables.release_table(0, 1).expect("owner release");
        assert_eq!(tables.release_table(0, 1), Err(TableError::NotOccupied(0)));
    }

    #[test]
    fn snapshot_reflects_occupancy() {
        let tables = TableAllocator::new(3);
        tables.occupy_table(2, 42).expect("free table");
        let snapshot = tables.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert!(!snapshot[0].is_occupied());
        assert_eq!(snapshot[2].current_customer, Some(42));
        assert_eq!(tables.find_available_table(), Some(0));
    }

    #[test]
    fn release_wakes_blocked_waiters() {
        let tables = Arc::new(TableAllocator::new(1));
        assert_eq!(tables.try_occupy(1), Some(0));

        let waiters = 3;
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let mut handles = Vec::new();
        for _ in 0..waiters {
            let tables = Arc::clone(&tables);
            let ready_tx = ready_tx.clone();
            let done_tx = done_tx.clone();
            handles.push(thread::spawn(move || {
                ready_tx.send(()).expect("ready");
                done_tx.send(tables.wait_for_available_table()).expect("done");
            }));
        }
        for _ in 0..waiters {
            ready_rx.recv_timeout(Duration::from_secs(1)).expect("ready");
        }
        // Nobody should get through while the table is held.
        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());

        tables.release_table(0, 1).expect("owner release");
        for _ in 0..waiters {
            let woke = done_rx
                .recv_timeout(Duration::from_secs(1))
                .expect("broadcast should wake every waiter");
            assert!(woke);
        }
        for handle in handles {
            handle.join().expect("waiter thread panicked");
        }
    }

    #[test]
    fn close_unblocks_waiters() {
        let tables = Arc::new(TableAllocator::new(1));
        assert_eq!(tables.try_occupy(1), Some(0));
        let (done_tx, done_rx) = mpsc::channel();
        let waiter = Arc::clone(&tables);
        let handle = thread::spawn(move || {
            done_tx.send(waiter.wait_for_available_table()).expect("done");
        });
        thread::sleep(Duration::from_millis(20));
        tables.close();
        let woke = done_rx.recv_timeout(Duration::from_secs(1)).expect("done");
        assert!(!woke);
        handle.join().expect("waiter thread panicked");
        // Closing never frees a held table.
        assert_eq!(tables.occupant(0), Some(1));
    }
}
