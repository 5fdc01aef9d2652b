//! Per-customer state machine.
//!
//! Movement completions (from the presentation layer) and the eating timer
//! (from the scheduler) arrive on different threads; every transition goes
//! through the customer's own lock so they cannot interleave.

use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::restaurant::Restaurant;
use crate::scheduler::TimerKey;
use crate::types::{ActorId, CustomerId, Location, TableId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CustomerState {
    Entering,
    WaitingForReceptionist,
    WaitingForTable,
    MovingToTable,
    WaitingForWaiter,
    WaitingForFood,
    Eating,
    Leaving,
    Gone,
}

struct CustomerInner {
    state: CustomerState,
    table: Option<TableId>,
}

pub struct CustomerActor {
    id: CustomerId,
    inner: Mutex<CustomerInner>,
}

impl CustomerActor {
    /// Create a customer at the entrance.
    pub(crate) fn new(id: CustomerId) -> Self {
        Self {
            id,
            inner: Mutex::new(CustomerInner {
                state: CustomerState::Entering,
                table: None,
            }),
        }
    }

    /// Customer id.
    pub fn id(&self) -> CustomerId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CustomerState {
        self.inner.lock().state
    }

    /// Table assigned to this customer, if any.
    pub fn table(&self) -> Option<TableId> {
        self.inner.lock().table
    }

    fn actor(&self) -> ActorId {
        ActorId::Customer(self.id)
    }

    /// Walk from the door to the receptionist.
    pub(crate) fn enter(&self, restaurant: &Restaurant) {
        restaurant.request_move(self.actor(), Location::Reception);
    }

    /// Resume the state machine after a requested move finished.
    pub(crate) fn on_target_reached(self: &Arc<Self>, restaurant: &Arc<Restaurant>) {
        let mut inner = self.inner.lock();
        match inner.state {
            CustomerState::Entering => {
                inner.state = CustomerState::WaitingForReceptionist;
                drop(inner);
                debug!("[CUSTOMER] {} at the reception desk", self.id);
                restaurant.receptionist().admit(restaurant, Arc::clone(self));
            }
            CustomerState::MovingToTable => {
                let Some(table) = inner.table else {
                    warn!("[CUSTOMER] {} reached a table it does not hold", self.id);
                    return;
                };
                inner.state = CustomerState::WaitingForWaiter;
                restaurant.stats().record_seated();
                drop(inner);
                debug!("[CUSTOMER] {} seated at table {table}", self.id);
                if restaurant.service_queue().add_customer(self.id, table).is_none() {
                    debug!("[CUSTOMER] {} seated after service closed", self.id);
                }
            }
            CustomerState::Leaving => {
                inner.state = CustomerState::Gone;
                drop(inner);
                restaurant.stats().record_departure();
                restaurant.remove_customer(self.id);
                info!("[CUSTOMER] {} left the restaurant", self.id);
            }
            other => {
                warn!("[CUSTOMER] {} reached a target while {other:?}", self.id);
            }
        }
    }

    /// Receptionist found no table; wait in the backlog.
    pub(crate) fn wait_for_table(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CustomerState::WaitingForReceptionist {
            inner.state = CustomerState::WaitingForTable;
        }
    }

    /// Take ownership of `table` and walk to it. Returns `false` if this
    /// customer is no longer looking for a table.
    pub(crate) fn assign_table(&self, restaurant: &Restaurant, table: TableId) -> bool {
        {
            let mut inner = self.inner.lock();
            match inner.state {
                CustomerState::WaitingForReceptionist | CustomerState::WaitingForTable => {
                    inner.state = CustomerState::MovingToTable;
                    inner.table = Some(table);
                }
                _ => return false,
            }
        }
        debug!("[CUSTOMER] {} assigned table {table}", self.id);
        restaurant.request_move(self.actor(), Location::Table(table));
        true
    }

    /// A waiter wrote down the order.
    pub(crate) fn order_taken(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != CustomerState::WaitingForWaiter {
            return false;
        }
        inner.state = CustomerState::WaitingForFood;
        true
    }

    /// Food arrived; start eating and arm the finish timer.
    pub(crate) fn start_eating(self: &Arc<Self>, restaurant: &Arc<Restaurant>) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != CustomerState::WaitingForFood {
            return false;
        }
        inner.state = CustomerState::Eating;
        restaurant.stats().record_served();
        let duration = restaurant.sample_eating_time();
        let customer = Arc::clone(self);
        let target = Arc::clone(restaurant);
        restaurant
            .scheduler()
            .schedule(TimerKey::Eating(self.id), duration, move || {
                customer.finish_eating(&target)
            });
        debug!("[CUSTOMER] {} eating for {duration:?}", self.id);
        true
    }

    /// Eating timer fired: give the table back and head for the door.
    pub(crate) fn finish_eating(&self, restaurant: &Restaurant) {
        {
            let mut inner = self.inner.lock();
            if inner.state != CustomerState::Eating {
                return;
            }
            if let Some(table) = inner.table.take() {
                if let Err(err) = restaurant.tables().release_table(table, self.id) {
                    warn!("[CUSTOMER] {} could not release table: {err}", self.id);
                }
            }
            inner.state = CustomerState::Leaving;
            restaurant.stats().record_left_table();
        }
        restaurant.request_move(self.actor(), Location::Entrance);
    }
}
