//! Matches arriving customers to tables, backlogging them when full.

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::customer::CustomerActor;
use crate::restaurant::Restaurant;
use crate::types::{CustomerId, TableId};

pub struct Receptionist {
    backlog: Mutex<VecDeque<Arc<CustomerActor>>>,
}

impl Receptionist {
    /// Create a receptionist with an empty backlog.
    pub fn new() -> Self {
        Self {
            backlog: Mutex::new(VecDeque::new()),
        }
    }

    /// Seat `customer` now if a table is free and nobody is queued ahead,
    /// otherwise append it to the backlog.
    pub fn admit(&self, restaurant: &Restaurant, customer: Arc<CustomerActor>) {
        let mut backlog = self.backlog.lock();
        if backlog.is_empty() {
            if let Some(table) = restaurant.tables().try_occupy(customer.id()) {
                Self::seat(restaurant, &customer, table);
                return;
            }
        }
        customer.wait_for_table();
        debug!(
            "[RECEPTION] customer {} waits for a table ({} ahead)",
            customer.id(),
            backlog.len()
        );
        backlog.push_back(customer);
        restaurant.stats().record_backlogged();
    }

    /// Seat backlogged customers in arrival order while tables are free.
    /// Returns how many were seated.
    pub fn process_backlog(&self, restaurant: &Restaurant) -> usize {
        let mut backlog = self.backlog.lock();
        let mut seated = 0;
        loop {
            let Some(next) = backlog.front().map(|customer| customer.id()) else {
                break;
            };
            let Some(table) = restaurant.tables().try_occupy(next) else {
                break;
            };
            let Some(customer) = backlog.pop_front() else {
                break;
            };
            restaurant.stats().record_unbacklogged();
            if Self::seat(restaurant, &customer, table) {
                seated += 1;
            }
        }
        seated
    }

    fn seat(restaurant: &Restaurant, customer: &CustomerActor, table: TableId) -> bool {
        if customer.assign_table(restaurant, table) {
            return true;
        }
        // The customer moved on; give the table back.
        warn!(
            "[RECEPTION] customer {} no longer needs table {table}",
            customer.id()
        );
        if let Err(err) = restaurant.tables().release_table(table, customer.id()) {
            warn!("[RECEPTION] failed to return table {table}: {err}");
        }
        false
    }

    /// Customers waiting for a table.
    pub fn backlog_len(&self) -> usize {
        self.backlog.lock().len()
    }

    /// Backlogged customer ids in arrival order.
    pub fn backlog_ids(&self) -> Vec<CustomerId> {
        self.backlog.lock().iter().map(|customer| customer.id()).collect()
    }

    /// Worker loop: drain the backlog every tick until shutdown.
    pub fn run(&self, restaurant: &Arc<Restaurant>) {
        let tick = restaurant.config().receptionist_tick();
        info!("[RECEPTION] receptionist on duty (tick {tick:?})");
        while restaurant.shutdown().sleep(tick) {
            let seated = self.process_backlog(restaurant);
            if seated > 0 {
                debug!("[RECEPTION] seated {seated} backlogged customer(s)");
            }
        }
    }

    /// Drop every backlogged customer. Returns how many were dropped.
    pub(crate) fn clear(&self) -> usize {
        let drained: Vec<_> = self.backlog.lock().drain(..).collect();
        drained.len()
    }
}

impl Default for Receptionist {
    fn default() -> Self {
        Self::new()
    }
}
