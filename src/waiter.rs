//! Waiter worker: an idle scan loop feeding a private queue of movement
//! tasks.
//!
//! Only the front task is ever in flight. When the movement layer reports
//! arrival, the front task's action runs and may queue the next leg of the
//! sequence; `busy` stays set until the sequence's last action clears it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};

use crate::restaurant::Restaurant;
use crate::types::{ActorId, CustomerRequest, Location, Order, WaiterId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaiterState {
    Resting,
    MovingToTable,
    /// At the table; lasts until the walk to the kitchen starts.
    TakingOrder,
    MovingToKitchen,
    DeliveringOrder,
    ReturningToRest,
}

/// What to do once a task's target is reached.
#[derive(Clone, Debug, PartialEq, Eq)]
enum TaskAction {
    TakeOrder(CustomerRequest),
    SubmitOrder(Order),
    CollectOrder(Order),
    HandOff(Order),
    Rest,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Task {
    state: WaiterState,
    target: Location,
    action: TaskAction,
}

struct WaiterInner {
    state: WaiterState,
    busy: bool,
    in_flight: bool,
    tasks: VecDeque<Task>,
    served: u64,
    delivered: u64,
}

impl WaiterInner {
    fn is_idle(&self) -> bool {
        !self.busy && !self.in_flight && self.tasks.is_empty()
    }
}

/// Read-only view for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaiterSnapshot {
    pub id: WaiterId,
    pub state: WaiterState,
    pub busy: bool,
    pub queued_tasks: usize,
    pub orders_taken: u64,
    pub orders_delivered: u64,
}

pub struct WaiterActor {
    id: WaiterId,
    inner: Mutex<WaiterInner>,
    wake: Condvar,
}

impl WaiterActor {
    /// Create a resting waiter.
    pub(crate) fn new(id: WaiterId) -> Self {
        Self {
            id,
            inner: Mutex::new(WaiterInner {
                state: WaiterState::Resting,
                busy: false,
                in_flight: false,
                tasks: VecDeque::new(),
                served: 0,
                delivered: 0,
            }),
            wake: Condvar::new(),
        }
    }

    /// Waiter id.
    pub fn id(&self) -> WaiterId {
        self.id
    }

    /// Current movement state.
    pub fn state(&self) -> WaiterState {
        self.inner.lock().state
    }

    /// Read-only view for display.
    pub fn snapshot(&self) -> WaiterSnapshot {
        let inner = self.inner.lock();
        WaiterSnapshot {
            id: self.id,
            state: inner.state,
            busy: inner.busy,
            queued_tasks: inner.tasks.len(),
            orders_taken: inner.served,
            orders_delivered: inner.delivered,
        }
    }

    /// No sequence running and nothing queued or in flight.
    pub fn is_idle(&self) -> bool {
        self.inner.lock().is_idle()
    }

    /// Worker loop. Runs until shutdown is triggered.
    pub fn run(&self, restaurant: &Arc<Restaurant>) {
        let idle_wait = restaurant.config().waiter_idle_wait();
        info!("[WAITER] waiter {} on duty", self.id);
        while !restaurant.shutdown().is_triggered() {
            if !self.is_idle() {
                self.wait_while_occupied(restaurant, idle_wait);
                continue;
            }
            if self.try_deliver(restaurant)
                || self.try_serve(restaurant)
                || self.try_return_to_rest(restaurant)
            {
                continue;
            }
            restaurant.orders().wait_for_ready(idle_wait);
        }
        debug!("[WAITER] waiter {} off duty", self.id);
    }

    fn wait_while_occupied(&self, restaurant: &Restaurant, timeout: Duration) {
        let mut inner = self.inner.lock();
        if !inner.is_idle() && !restaurant.shutdown().is_triggered() {
            self.wake.wait_for(&mut inner, timeout);
        }
    }

    /// Pick up at most one ready order.
    fn try_deliver(&self, restaurant: &Arc<Restaurant>) -> bool {
        let orders = restaurant.orders();
        let Some(order) = (0..restaurant.tables().len()).find_map(|t| orders.check_ready_order(t))
        else {
            return false;
        };
        info!(
            "[WAITER] waiter {} collecting order {} for table {}",
            self.id, order.id, order.table
        );
        self.begin(
            restaurant,
            Task {
                state: WaiterState::MovingToKitchen,
                target: Location::Kitchen,
                action: TaskAction::CollectOrder(order),
            },
        );
        true
    }

    fn try_serve(&self, restaurant: &Arc<Restaurant>) -> bool {
        let queue = restaurant.service_queue();
        if !queue.has_waiting_customers() {
            return false;
        }
        let Some(request) = queue.try_next_customer() else {
            return false;
        };
        info!(
            "[WAITER] waiter {} serving customer {} at table {}",
            self.id, request.customer, request.table
        );
        self.begin(
            restaurant,
            Task {
                state: WaiterState::MovingToTable,
                target: Location::Table(request.table),
                action: TaskAction::TakeOrder(request),
            },
        );
        true
    }

    fn try_return_to_rest(&self, restaurant: &Arc<Restaurant>) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.state == WaiterState::Resting || !inner.is_idle() {
                return false;
            }
            inner.tasks.push_back(Task {
                state: WaiterState::ReturningToRest,
                target: Location::WaiterStation(self.id),
                action: TaskAction::Rest,
            });
        }
        self.start_next(restaurant);
        true
    }

    /// Mark busy and start the first leg of a sequence.
    fn begin(&self, restaurant: &Restaurant, task: Task) {
        {
            let mut inner = self.inner.lock();
            inner.busy = true;
            inner.tasks.push_back(task);
        }
        self.start_next(restaurant);
    }

    fn push_task(&self, task: Task) {
        self.inner.lock().tasks.push_back(task);
    }

    fn finish_sequence(&self) {
        self.inner.lock().busy = false;
        self.wake.notify_all();
    }

    /// Issue the move for the front task unless one is already in flight.
    fn start_next(&self, restaurant: &Restaurant) {
        let target = {
            let mut inner = self.inner.lock();
            if inner.in_flight {
                return;
            }
            let Some(task) = inner.tasks.front() else {
                return;
            };
            let (state, target) = (task.state, task.target);
            inner.state = state;
            inner.in_flight = true;
            target
        };
        restaurant.request_move(ActorId::Waiter(self.id), target);
    }

    /// Movement layer finished the in-flight task.
    pub(crate) fn on_target_reached(&self, restaurant: &Arc<Restaurant>) {
        if let Some(action) = self.take_arrived() {
            self.complete(action, restaurant);
        }
        self.start_next(restaurant);
        self.wake.notify_all();
    }

    /// Pop the in-flight task and record the state it arrives in, under one lock.
    fn take_arrived(&self) -> Option<TaskAction> {
        let mut inner = self.inner.lock();
        if !inner.in_flight {
            warn!("[WAITER] waiter {} arrived with no move in flight", self.id);
            return None;
        }
        inner.in_flight = false;
        let task = inner.tasks.pop_front()?;
        match task.action {
            TaskAction::TakeOrder(_) => inner.state = WaiterState::TakingOrder,
            TaskAction::Rest => inner.state = WaiterState::Resting,
            _ => {}
        }
        Some(task.action)
    }

    fn complete(&self, action: TaskAction, restaurant: &Arc<Restaurant>) {
        match action {
            TaskAction::TakeOrder(request) => {
                let taken = restaurant
                    .customer(request.customer)
                    .is_some_and(|customer| customer.order_taken());
                if !taken {
                    warn!(
                        "[WAITER] waiter {} found no order to take at table {}",
                        self.id, request.table
                    );
                    self.finish_sequence();
                    return;
                }
                let order = restaurant.new_order(request.table);
                debug!(
                    "[WAITER] waiter {} took order {} at table {}",
                    self.id, order.id, order.table
                );
                self.inner.lock().served += 1;
                self.push_task(Task {
                    state: WaiterState::MovingToKitchen,
                    target: Location::Kitchen,
                    action: TaskAction::SubmitOrder(order),
                });
            }
            TaskAction::SubmitOrder(order) => {
                debug!("[WAITER] waiter {} submits order {}", self.id, order.id);
                restaurant.orders().add_order(order);
                self.finish_sequence();
            }
            TaskAction::CollectOrder(order) => {
                self.push_task(Task {
                    state: WaiterState::DeliveringOrder,
                    target: Location::Table(order.table),
                    action: TaskAction::HandOff(order),
                });
            }
            TaskAction::HandOff(order) => {
                let served = restaurant
                    .tables()
                    .occupant(order.table)
                    .and_then(|id| restaurant.customer(id))
                    .is_some_and(|customer| customer.start_eating(restaurant));
                if served {
                    self.inner.lock().delivered += 1;
                    info!(
                        "[WAITER] waiter {} delivered order {} to table {}",
                        self.id, order.id, order.table
                    );
                } else {
                    warn!(
                        "[WAITER] order {} has nobody to eat it at table {}",
                        order.id, order.table
                    );
                }
                self.finish_sequence();
            }
            TaskAction::Rest => debug!("[WAITER] waiter {} resting", self.id),
        }
    }

    /// Wake the worker loop (used on shutdown).
    pub(crate) fn wake(&self) {
        let _guard = self.inner.lock();
        self.wake.notify_all();
    }
}
