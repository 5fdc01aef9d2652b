//! End-to-end behaviour through the public boundary: spawn customers,
//! answer move requests, shut down.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use restaurant_sim::customer::CustomerState;
use restaurant_sim::error::{ConfigError, SimError};
use restaurant_sim::types::{ActorId, MoveRequest};
use restaurant_sim::{Restaurant, SimConfig, Simulation};

/// Answers every move request immediately, standing in for a renderer.
fn spawn_instant_mover(
    restaurant: Arc<Restaurant>,
    requests: Receiver<MoveRequest>,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("instant-mover".to_string())
        .spawn(move || {
            while !restaurant.shutdown().is_triggered() {
                if let Ok(request) = requests.recv_timeout(Duration::from_millis(10)) {
                    let _ = restaurant.on_target_reached(request.actor);
                }
            }
        })
        .expect("failed to spawn mover")
}

fn wait_until<F: Fn() -> bool>(what: &str, timeout: Duration, condition: F) {
    let start = Instant::now();
    while !condition() {
        assert!(start.elapsed() < timeout, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

fn quick_config(tables: usize, waiters: usize, cooks: usize) -> SimConfig {
    SimConfig {
        tables,
        waiters,
        cooks,
        eating_min_ms: 100,
        eating_max_ms: 200,
        prep_min_ms: 50,
        prep_max_ms: 100,
        receptionist_tick_ms: 20,
        waiter_idle_ms: 20,
        auto_arrivals: false,
        seed: Some(2432),
        ..SimConfig::default()
    }
}

fn start_with_mover(config: SimConfig) -> (Simulation, thread::JoinHandle<()>) {
    let mut sim = Simulation::start(config).expect("simulation starts");
    let requests = sim.take_move_requests().expect("move requests");
    let mover = spawn_instant_mover(Arc::clone(sim.restaurant()), requests);
    (sim, mover)
}

#[test]
fn single_customer_eats_and_counters_return_to_baseline() {
    let (mut sim, mover) = start_with_mover(quick_config(1, 1, 1));
    let restaurant = Arc::clone(sim.restaurant());
    let baseline = restaurant.stats().snapshot();

    let id = restaurant.next_customer_id();
    let customer = restaurant.spawn_customer(id).expect("spawned");
    wait_until("customer to eat", Duration::from_secs(5), || {
        customer.state() == CustomerState::Eating
    });
    assert_eq!(restaurant.tables().occupant(0), Some(id));
    assert_eq!(restaurant.stats().snapshot().eating, 1);

    wait_until("customer to leave", Duration::from_secs(5), || {
        restaurant.customer(id).is_none()
    });
    assert_eq!(customer.state(), CustomerState::Gone);
    assert_eq!(restaurant.tables().occupant(0), None);

    let end = restaurant.stats().snapshot();
    assert_eq!(end.waiting_for_table, baseline.waiting_for_table);
    assert_eq!(end.waiting_for_food, baseline.waiting_for_food);
    assert_eq!(end.eating, baseline.eating);
    assert_eq!(end.at_tables, baseline.at_tables);
    assert_eq!((end.arrived, end.departed), (1, 1));

    let waiter = restaurant.waiters()[0].snapshot();
    assert_eq!((waiter.orders_taken, waiter.orders_delivered), (1, 1));
    assert_eq!(restaurant.cooks()[0].prepared(), 1);

    let report = sim.shutdown();
    assert!(report.is_clean(), "{report:?}");
    mover.join().expect("mover panicked");
}

#[test]
fn backlogged_customers_are_seated_in_arrival_order() {
    let (mut sim, mover) = start_with_mover(quick_config(1, 1, 1));
    let restaurant = Arc::clone(sim.restaurant());
    // Somebody else already holds the only table.
    restaurant
        .tables()
        .occupy_table(0, 999)
        .expect("table starts free");

    let first = restaurant
        .spawn_customer(restaurant.next_customer_id())
        .expect("first");
    wait_until("first to wait for a table", Duration::from_secs(2), || {
        first.state() == CustomerState::WaitingForTable
    });
    let second = restaurant
        .spawn_customer(restaurant.next_customer_id())
        .expect("second");
    wait_until("second to wait for a table", Duration::from_secs(2), || {
        second.state() == CustomerState::WaitingForTable
    });
    assert_eq!(
        restaurant.receptionist().backlog_ids(),
        vec![first.id(), second.id()]
    );
    assert_eq!(restaurant.stats().snapshot().waiting_for_table, 2);

    restaurant
        .tables()
        .release_table(0, 999)
        .expect("dummy owns the table");
    wait_until("first to get the table", Duration::from_secs(2), || {
        first.state() != CustomerState::WaitingForTable
    });
    assert_eq!(second.state(), CustomerState::WaitingForTable);
    assert_eq!(second.table(), None);
    assert_eq!(restaurant.receptionist().backlog_ids(), vec![second.id()]);
    assert_eq!(restaurant.stats().snapshot().waiting_for_table, 1);

    let report = sim.shutdown();
    assert!(report.violations.is_empty(), "{:?}", report.violations);
    mover.join().expect("mover panicked");
}

#[test]
fn shutdown_while_every_worker_is_blocked_finishes_within_grace() {
    let config = quick_config(2, 3, 3);
    let grace = config.shutdown_grace();
    let mut sim = Simulation::start(config).expect("simulation starts");
    // Let cooks block on the empty board and waiters settle into idle waits.
    thread::sleep(Duration::from_millis(100));

    let report = sim.shutdown();
    assert!(report.timed_out.is_empty(), "{:?}", report.timed_out);
    assert!(report.panicked.is_empty(), "{:?}", report.panicked);
    assert!(report.elapsed < grace, "took {:?}", report.elapsed);
    // scheduler + receptionist + 3 cooks + 3 waiters
    assert_eq!(report.joined.len(), 8, "{:?}", report.joined);

    // Monitors are still usable (nothing left locked).
    let restaurant = sim.restaurant();
    assert!(restaurant.tables().occupied_tables().is_empty());
    assert_eq!(restaurant.orders().pending_len(), 0);
    assert!(restaurant.service_queue().is_empty());
}

#[test]
fn headless_run_serves_every_arrival() {
    let customers = 8;
    let config = SimConfig {
        tables: 3,
        waiters: 2,
        cooks: 2,
        arrival_rate: 2.0,
        time_scale: 0.01,
        max_customers: Some(customers),
        seed: Some(7),
        ..SimConfig::default()
    };
    let mut sim = Simulation::start_headless(config).expect("simulation starts");
    let restaurant = Arc::clone(sim.restaurant());
    wait_until("every customer to leave", Duration::from_secs(30), || {
        restaurant.stats().snapshot().departed == customers
    });
    let report = sim.shutdown();
    assert!(report.is_clean(), "{report:?}");

    let stats = restaurant.stats().snapshot();
    assert!(stats.is_idle(), "{stats:?}");
    assert_eq!(stats.arrived, customers);
    let delivered: u64 = restaurant
        .waiters()
        .iter()
        .map(|w| w.snapshot().orders_delivered)
        .sum();
    let prepared: u64 = restaurant.cooks().iter().map(|c| c.prepared()).sum();
    assert_eq!(delivered, customers);
    assert_eq!(prepared, customers);
}

#[test]
fn invalid_configuration_is_rejected_before_start() {
    let no_tables = SimConfig {
        tables: 0,
        ..SimConfig::default()
    };
    assert!(matches!(
        Simulation::start(no_tables),
        Err(SimError::Config(ConfigError::NoTables))
    ));

    let no_rate = SimConfig {
        arrival_rate: 0.0,
        ..SimConfig::default()
    };
    assert!(matches!(
        Simulation::start_headless(no_rate),
        Err(SimError::Config(ConfigError::NonPositiveArrivalRate(_)))
    ));
}

#[test]
fn huge_time_scale_is_rejected_and_slow_walkers_do_not_crash_workers() {
    let stretched = SimConfig {
        time_scale: 1e19,
        ..SimConfig::default()
    };
    assert!(matches!(
        Simulation::start_headless(stretched),
        Err(SimError::Config(ConfigError::ScaledDelayTooLong { .. }))
    ));

    // Valid, but a single walk would overflow an unclamped duration.
    let crawling = SimConfig {
        customer_speed: 1e-300,
        arrival_rate: 5.0,
        time_scale: 0.01,
        seed: Some(11),
        ..SimConfig::default()
    };
    let mut sim = Simulation::start_headless(crawling).expect("simulation starts");
    thread::sleep(Duration::from_millis(200));
    let report = sim.shutdown();
    assert!(report.panicked.is_empty(), "{:?}", report.panicked);
    assert!(report.timed_out.is_empty(), "{:?}", report.timed_out);
}

#[test]
fn boundary_rejects_duplicates_unknown_actors_and_late_arrivals() {
    let (mut sim, mover) = start_with_mover(quick_config(2, 1, 1));
    let restaurant = Arc::clone(sim.restaurant());

    let id = restaurant.next_customer_id();
    restaurant.spawn_customer(id).expect("first spawn");
    assert!(matches!(
        restaurant.spawn_customer(id),
        Err(SimError::DuplicateCustomer(dup)) if dup == id
    ));
    assert!(matches!(
        restaurant.on_target_reached(ActorId::Waiter(42)),
        Err(SimError::UnknownActor(ActorId::Waiter(42)))
    ));

    sim.shutdown();
    mover.join().expect("mover panicked");
    assert!(matches!(
        restaurant.spawn_customer(restaurant.next_customer_id()),
        Err(SimError::ShutDown)
    ));
}
