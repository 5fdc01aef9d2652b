//! Order pipeline monitor: pending -> in process -> ready -> delivered.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};

use crate::error::OrderError;
use crate::types::{Order, OrderId, OrderStatus, TableId};

struct BoardState {
    pending: VecDeque<Order>,
    in_process: HashMap<OrderId, Order>,
    ready: VecDeque<Order>,
    closed: bool,
}

/// Owns every order between "taken" and "delivered".
pub struct OrderBoard {
    state: Mutex<BoardState>,
    // Cooks wait here for pending work.
    pending_available: Condvar,
    // Waiters wait here for finished dishes.
    ready_available: Condvar,
}

impl OrderBoard {
    /// Create an empty, open order board.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BoardState {
                pending: VecDeque::new(),
                in_process: HashMap::new(),
                ready: VecDeque::new(),
                closed: false,
            }),
            pending_available: Condvar::new(),
            ready_available: Condvar::new(),
        }
    }

    /// Queue a freshly taken order and wake one cook.
    pub fn add_order(&self, order: Order) {
        let mut guard = self.state.lock();
        debug!("[ORDER] order {} for table {} pending", order.id, order.table);
        guard.pending.push_back(order);
        self.pending_available.notify_one();
    }

    /// Block until an order is pending, then claim it for preparation.
    /// Returns `None` once the board is closed.
    pub fn next_order(&self) -> Option<Order> {
        let mut guard = self.state.lock();
        loop {
            if guard.closed {
                return None;
            }
            if let Some(order) = Self::claim_pending(&mut guard) {
                return Some(order);
            }
            self.pending_available.wait(&mut guard);
        }
    }

    /// Non-blocking variant of [`OrderBoard::next_order`].
    pub fn try_next_order(&self) -> Option<Order> {
        let mut guard = self.state.lock();
        if guard.closed {
            return None;
        }
        Self::claim_pending(&mut guard)
    }

    fn claim_pending(state: &mut BoardState) -> Option<Order> {
        while let Some(mut order) = state.pending.pop_front() {
            // Pending orders are always at the start of their lifecycle.
            if let Err(err) = order.advance(OrderStatus::InProcess) {
                warn!("[ORDER] dropping malformed pending order: {err}");
                continue;
            }
            state.in_process.insert(order.id, order.clone());
            trace!("[ORDER] order {} in process", order.id);
            return Some(order);
        }
        None
    }

    /// Move a prepared order to the ready shelf and wake every waiter.
    pub fn mark_order_as_ready(&self, order_id: OrderId) -> Result<(), OrderError> {
        let mut guard = self.state.lock();
        let mut order = guard
            .in_process
            .remove(&order_id)
            .ok_or(OrderError::NotInProcess(order_id))?;
        if let Err(err) = order.advance(OrderStatus::Ready) {
            guard.in_process.insert(order_id, order);
            return Err(err);
        }
        debug!("[ORDER] order {} for table {} ready", order.id, order.table);
        guard.ready.push_back(order);
        self.ready_available.notify_all();
        Ok(())
    }

    /// Claim the ready order for `table`, if any. The removal and the
    /// transition to delivered happen under one lock, so only one caller
    /// can ever win a given order.
    pub fn check_ready_order(&self, table: TableId) -> Option<Order> {
        let mut guard = self.state.lock();
        let index = guard.ready.iter().position(|order| order.table == table)?;
        let mut order = guard.ready.remove(index)?;
        if let Err(err) = order.advance(OrderStatus::Delivered) {
            warn!("[ORDER] ready shelf held a bad order: {err}");
            return None;
        }
        trace!("[ORDER] order {} claimed for delivery", order.id);
        Some(order)
    }

    /// Wait up to `timeout` for anything to reach the ready shelf.
    /// Returns `true` if a ready order exists when the wait ends.
    pub fn wait_for_ready(&self, timeout: Duration) -> bool {
        let mut guard = self.state.lock();
        if guard.ready.is_empty() && !guard.closed {
            self.ready_available.wait_for(&mut guard, timeout);
        }
        !guard.ready.is_empty()
    }

    /// Orders waiting for a cook.
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Orders being prepared.
    pub fn in_process_len(&self) -> usize {
        self.state.lock().in_process.len()
    }

    /// Orders waiting for a waiter.
    pub fn ready_len(&self) -> usize {
        self.state.lock().ready.len()
    }

    /// Wake every blocked cook and waiter for shutdown. Orders still on the
    /// board are abandoned in whatever stage they reached.
    pub fn close(&self) {
        let mut guard = self.state.lock();
        guard.closed = true;
        self.pending_available.notify_all();
        self.ready_available.notify_all();
    }
}

impl Default for OrderBoard {
    fn default() -> Self {
        Self::new()
    }
}
