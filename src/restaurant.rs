//! The shared world every actor works in, and the simulation lifecycle
//! that starts and stops its worker threads.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::arrivals::{ArrivalGenerator, PoissonArrivals};
use crate::config::SimConfig;
use crate::cook::CookActor;
use crate::customer::CustomerActor;
use crate::error::{ConfigError, SimError};
use crate::movement::TimedMover;
use crate::order_board::OrderBoard;
use crate::receptionist::Receptionist;
use crate::scheduler::Scheduler;
use crate::service_queue::ServiceQueue;
use crate::shutdown::Shutdown;
use crate::stats::StatsAggregator;
use crate::tables::TableAllocator;
use crate::types::{ActorId, CustomerId, Location, MoveRequest, Order, TableId};
use crate::waiter::WaiterActor;

// Independent random streams derived from one seed.
const WORLD_STREAM: u64 = 0;
const ARRIVAL_STREAM: u64 = 1;

fn seeded_rng(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
        None => StdRng::from_entropy(),
    }
}

pub struct Restaurant {
    config: SimConfig,
    tables: TableAllocator,
    orders: OrderBoard,
    service: ServiceQueue,
    stats: StatsAggregator,
    receptionist: Receptionist,
    scheduler: Scheduler,
    shutdown: Shutdown,
    customers: Mutex<HashMap<CustomerId, Arc<CustomerActor>>>,
    waiters: Vec<Arc<WaiterActor>>,
    cooks: Vec<Arc<CookActor>>,
    moves: Sender<MoveRequest>,
    rng: Mutex<StdRng>,
    next_customer_id: AtomicU64,
    next_order_id: AtomicU64,
}

impl Restaurant {
    /// Validate `config` and build the world. The returned receiver carries
    /// every movement request the core issues.
    pub(crate) fn new(config: SimConfig) -> Result<(Arc<Self>, Receiver<MoveRequest>), ConfigError> {
        config.validate()?;
        let (moves, requests) = crossbeam_channel::unbounded();
        let restaurant = Self {
            tables: TableAllocator::new(config.tables),
            orders: OrderBoard::new(),
            service: ServiceQueue::new(),
            stats: StatsAggregator::new(),
            receptionist: Receptionist::new(),
            scheduler: Scheduler::new(),
            shutdown: Shutdown::new(),
            customers: Mutex::new(HashMap::new()),
            waiters: (0..config.waiters)
                .map(|id| Arc::new(WaiterActor::new(id)))
                .collect(),
            cooks: (0..config.cooks).map(|id| Arc::new(CookActor::new(id))).collect(),
            moves,
            rng: Mutex::new(seeded_rng(config.seed, WORLD_STREAM)),
            next_customer_id: AtomicU64::new(1),
            next_order_id: AtomicU64::new(1),
            config,
        };
        Ok((Arc::new(restaurant), requests))
    }

    /// Validated configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Table allocator.
    pub fn tables(&self) -> &TableAllocator {
        &self.tables
    }

    /// Order board shared by waiters and cooks.
    pub fn orders(&self) -> &OrderBoard {
        &self.orders
    }

    /// Seated customers waiting for a waiter.
    pub fn service_queue(&self) -> &ServiceQueue {
        &self.service
    }

    /// Display counters.
    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    /// Receptionist and its backlog.
    pub fn receptionist(&self) -> &Receptionist {
        &self.receptionist
    }

    /// Delayed-job scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Shutdown signal shared by every worker.
    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// All waiters, indexed by id.
    pub fn waiters(&self) -> &[Arc<WaiterActor>] {
        &self.waiters
    }

    /// All cooks, indexed by id.
    pub fn cooks(&self) -> &[Arc<CookActor>] {
        &self.cooks
    }

    /// Customer `id`, if still inside.
    pub fn customer(&self, id: CustomerId) -> Option<Arc<CustomerActor>> {
        self.customers.lock().get(&id).cloned()
    }

    /// Customers currently inside the restaurant.
    pub fn customer_count(&self) -> usize {
        self.customers.lock().len()
    }

    /// Reserve a fresh customer id.
    pub fn next_customer_id(&self) -> CustomerId {
        self.next_customer_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Create a customer and send it towards the receptionist.
    pub fn spawn_customer(self: &Arc<Self>, id: CustomerId) -> Result<Arc<CustomerActor>, SimError> {
        if self.shutdown.is_triggered() {
            return Err(SimError::ShutDown);
        }
        let customer = Arc::new(CustomerActor::new(id));
        match self.customers.lock().entry(id) {
            Entry::Occupied(_) => return Err(SimError::DuplicateCustomer(id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&customer));
            }
        }
        self.stats.record_arrival();
        info!("[CUSTOMER] {id} arrived");
        customer.enter(self);
        Ok(customer)
    }

    /// Movement-layer callback: `actor` reached the target it was sent to.
    pub fn on_target_reached(self: &Arc<Self>, actor: ActorId) -> Result<(), SimError> {
        if self.shutdown.is_triggered() {
            return Err(SimError::ShutDown);
        }
        match actor {
            ActorId::Customer(id) => {
                let customer = self.customer(id).ok_or(SimError::UnknownActor(actor))?;
                customer.on_target_reached(self);
            }
            ActorId::Waiter(id) => {
                let waiter = self
                    .waiters
                    .get(id)
                    .cloned()
                    .ok_or(SimError::UnknownActor(actor))?;
                waiter.on_target_reached(self);
            }
        }
        Ok(())
    }

    /// Ask the movement layer to walk `actor` to `target`.
    pub(crate) fn request_move(&self, actor: ActorId, target: Location) {
        if self.moves.send(MoveRequest { actor, target }).is_err() {
            debug!("[SIM] no movement layer listening; {actor} stays put");
        }
    }

    /// Forget a customer that has left.
    pub(crate) fn remove_customer(&self, id: CustomerId) {
        self.customers.lock().remove(&id);
    }

    /// New order for `table` with a random preparation time.
    pub(crate) fn new_order(&self, table: TableId) -> Order {
        let id = self.next_order_id.fetch_add(1, Ordering::Relaxed);
        let prep = self
            .rng
            .lock()
            .gen_range(self.config.prep_min_ms..=self.config.prep_max_ms);
        Order::new(id, table, prep)
    }

    /// Random scaled eating time.
    pub(crate) fn sample_eating_time(&self) -> Duration {
        let ms = self
            .rng
            .lock()
            .gen_range(self.config.eating_min_ms..=self.config.eating_max_ms);
        self.config.scaled_ms(ms)
    }

    /// Cross-check table occupancy against what each customer believes.
    /// Only meaningful once no worker is running.
    pub fn audit_tables(&self) -> Vec<TableViolation> {
        let customers = self.customers.lock();
        let mut violations = Vec::new();
        for table in self.tables.snapshot() {
            let Some(occupant) = table.current_customer else {
                continue;
            };
            match customers.get(&occupant) {
                None => violations.push(TableViolation::UnknownOccupant {
                    table: table.number,
                    customer: occupant,
                }),
                Some(customer) if customer.table() != Some(table.number) => {
                    violations.push(TableViolation::OccupantDisagrees {
                        table: table.number,
                        customer: occupant,
                        believes: customer.table(),
                    })
                }
                Some(_) => {}
            }
        }
        for customer in customers.values() {
            if let Some(table) = customer.table() {
                if self.tables.occupant(table) != Some(customer.id()) {
                    violations.push(TableViolation::Unrecorded {
                        table,
                        customer: customer.id(),
                    });
                }
            }
        }
        violations
    }

    /// Signal shutdown and unblock every monitor.
    fn begin_shutdown(&self) {
        self.shutdown.trigger();
        self.tables.close();
        self.orders.close();
        self.service.close();
        self.scheduler.close();
        for waiter in &self.waiters {
            waiter.wake();
        }
    }

    /// Drop every customer handle still held by the world.
    fn clear(&self) {
        let backlog = self.receptionist.clear();
        let customers: Vec<_> = self.customers.lock().drain().collect();
        if backlog > 0 || !customers.is_empty() {
            debug!(
                "[SIM] abandoned {} customer(s), {backlog} still backlogged",
                customers.len()
            );
        }
    }
}

/// A disagreement between the table allocator and the customers.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TableViolation {
    #[error("table {table} is held by unknown customer {customer}")]
    UnknownOccupant { table: TableId, customer: CustomerId },
    #[error("table {table} is held by customer {customer}, who believes it has {believes:?}")]
    OccupantDisagrees {
        table: TableId,
        customer: CustomerId,
        believes: Option<TableId>,
    },
    #[error("customer {customer} believes it has table {table}, which is not recorded")]
    Unrecorded { table: TableId, customer: CustomerId },
}

/// How the worker threads ended.
#[derive(Clone, Debug, Default)]
pub struct ShutdownReport {
    pub joined: Vec<String>,
    pub timed_out: Vec<String>,
    pub panicked: Vec<String>,
    pub violations: Vec<TableViolation>,
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// Every worker joined and no table violation was found.
    pub fn is_clean(&self) -> bool {
        self.timed_out.is_empty() && self.panicked.is_empty() && self.violations.is_empty()
    }
}

/// A running restaurant and the threads that drive it.
pub struct Simulation {
    restaurant: Arc<Restaurant>,
    workers: Vec<(String, JoinHandle<()>)>,
    moves: Option<Receiver<MoveRequest>>,
    stopped: bool,
}

impl Simulation {
    /// Start every worker with the built-in timed movement layer.
    pub fn start_headless(config: SimConfig) -> Result<Self, SimError> {
        Self::launch(config, true)
    }

    /// Start every worker but leave movement to the caller, who must drain
    /// [`Simulation::take_move_requests`] and answer with
    /// [`Restaurant::on_target_reached`].
    pub fn start(config: SimConfig) -> Result<Self, SimError> {
        Self::launch(config, false)
    }

    fn launch(config: SimConfig, headless: bool) -> Result<Self, SimError> {
        let arrivals = PoissonArrivals::new(config.arrival_rate)?;
        let (restaurant, moves) = Restaurant::new(config)?;
        let mut sim = Simulation {
            restaurant: Arc::clone(&restaurant),
            workers: Vec::new(),
            moves: Some(moves),
            stopped: false,
        };
        let config = restaurant.config().clone();

        let world = Arc::clone(&restaurant);
        sim.spawn_worker("scheduler".to_string(), move || world.scheduler().run())?;

        let world = Arc::clone(&restaurant);
        sim.spawn_worker("receptionist".to_string(), move || {
            world.receptionist().run(&world)
        })?;

        for cook in restaurant.cooks() {
            let cook = Arc::clone(cook);
            let world = Arc::clone(&restaurant);
            sim.spawn_worker(format!("cook-{}", cook.id()), move || cook.run(&world))?;
        }
        for waiter in restaurant.waiters() {
            let waiter = Arc::clone(waiter);
            let world = Arc::clone(&restaurant);
            sim.spawn_worker(format!("waiter-{}", waiter.id()), move || waiter.run(&world))?;
        }

        if headless {
            if let Some(requests) = sim.moves.take() {
                let mover = TimedMover::new(&config);
                let world = Arc::clone(&restaurant);
                sim.spawn_worker("mover".to_string(), move || mover.run(requests, &world))?;
            }
        }

        if config.auto_arrivals {
            let generator = ArrivalGenerator::new(
                arrivals,
                seeded_rng(config.seed, ARRIVAL_STREAM),
                config.max_customers,
            );
            let world = Arc::clone(&restaurant);
            sim.spawn_worker("arrivals".to_string(), move || generator.run(world))?;
        }

        info!(
            "[SIM] started: {} tables, {} waiters, {} cooks, lambda={}",
            config.tables, config.waiters, config.cooks, config.arrival_rate
        );
        Ok(sim)
    }

    fn spawn_worker<F>(&mut self, name: String, body: F) -> Result<(), SimError>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(body)
            .map_err(SimError::Spawn)?;
        self.workers.push((name, handle));
        Ok(())
    }

    /// Shared world of this run.
    pub fn restaurant(&self) -> &Arc<Restaurant> {
        &self.restaurant
    }

    /// Movement requests, for a caller-provided movement layer. `None` when
    /// running headless or once taken.
    pub fn take_move_requests(&mut self) -> Option<Receiver<MoveRequest>> {
        self.moves.take()
    }

    /// Stop every worker, waiting at most the configured grace period.
    /// Threads still running after that are detached and reported.
    pub fn shutdown(&mut self) -> ShutdownReport {
        if self.stopped {
            return ShutdownReport::default();
        }
        self.stopped = true;
        let started = Instant::now();
        info!("[SIM] shutting down");
        self.restaurant.begin_shutdown();

        let deadline = started + self.restaurant.config().shutdown_grace();
        while Instant::now() < deadline && self.workers.iter().any(|(_, h)| !h.is_finished()) {
            thread::sleep(Duration::from_millis(5));
        }

        let mut report = ShutdownReport::default();
        for (name, handle) in self.workers.drain(..) {
            if !handle.is_finished() {
                warn!("[SIM] {name} did not stop within the grace period");
                report.timed_out.push(name);
                continue;
            }
            match handle.join() {
                Ok(()) => report.joined.push(name),
                Err(_) => {
                    error!("[SIM] {name} panicked");
                    report.panicked.push(name);
                }
            }
        }
        if report.timed_out.is_empty() {
            report.violations = self.restaurant.audit_tables();
            for violation in &report.violations {
                error!("[SIM] {violation}");
            }
        }
        self.restaurant.clear();
        report.elapsed = started.elapsed();
        info!(
            "[SIM] stopped {} worker(s) in {:?}",
            report.joined.len(),
            report.elapsed
        );
        report
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        if !self.stopped {
            self.shutdown();
        }
    }
}
