//! Thread-safe FIFO of "customer needs a waiter" requests.

use std::collections::VecDeque;

use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::types::{CustomerId, CustomerRequest, TableId};

/// Hand-off queue between seated customers and waiters.
pub struct ServiceQueue {
    inner: Mutex<ServiceQueueState>,
    available: Condvar,
}

struct ServiceQueueState {
    queue: VecDeque<CustomerRequest>,
    next_sequence: u64,
    closed: bool,
}

impl ServiceQueue {
    /// Create an empty, open service queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ServiceQueueState {
                queue: VecDeque::new(),
                next_sequence: 0,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Enqueue a request and wake one waiter. Returns `None` once closed,
    /// otherwise the request as stamped with its queue position.
    pub fn add_customer(&self, customer: CustomerId, table: TableId) -> Option<CustomerRequest> {
        let mut guard = self.inner.lock();
        if guard.closed {
            return None;
        }
        let request = CustomerRequest {
            customer,
            table,
            sequence: guard.next_sequence,
        };
        guard.next_sequence += 1;
        guard.queue.push_back(request);
        debug!("[QUEUE] customer {customer} at table {table} waiting for service");
        self.available.notify_one();
        Some(request)
    }

    /// Try to pop immediately without blocking.
    pub fn try_next_customer(&self) -> Option<CustomerRequest> {
        self.inner.lock().queue.pop_front()
    }

    /// Block until a request is available or the queue is closed.
    pub fn next_customer(&self) -> Option<CustomerRequest> {
        let mut guard = self.inner.lock();
        loop {
            if let Some(request) = guard.queue.pop_front() {
                return Some(request);
            }
            if guard.closed {
                return None;
            }
            // Wait releases the lock and re-acquires it before returning.
            self.available.wait(&mut guard);
        }
    }

    /// Whether any customer is waiting for a waiter.
    pub fn has_waiting_customers(&self) -> bool {
        !self.inner.lock().queue.is_empty()
    }

    /// Close the queue and wake all blocked consumers.
    pub fn close(&self) {
        let mut guard = self.inner.lock();
        guard.closed = true;
        self.available.notify_all();
    }

    /// Current number of queued requests.
    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Whether no request is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ServiceQueue {
    fn default() -> Self {
        Self::new()
    }
}
