//! Demo, benchmark, and stress-test runners for the restaurant simulation.

use std::time::{Duration, Instant};

use log::info;

use crate::config::SimConfig;
use crate::error::SimError;
use crate::restaurant::{ShutdownReport, Simulation};
use crate::stats::StatsSnapshot;

// How often the runners sample the counters.
const SAMPLE_EVERY: Duration = Duration::from_millis(10);
// How often the demo logs a progress line.
const REPORT_EVERY: Duration = Duration::from_secs(1);

/// Best-effort CPU user/system time snapshot (seconds) on Unix platforms.
#[cfg(unix)]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
    // SAFETY: getrusage only writes into the struct we hand it.
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: zero-initialised and filled in by a successful getrusage.
    let usage = unsafe { usage.assume_init() };
    let user = usage.ru_utime.tv_sec as f64 + (usage.ru_utime.tv_usec as f64 / 1_000_000.0);
    let sys = usage.ru_stime.tv_sec as f64 + (usage.ru_stime.tv_usec as f64 / 1_000_000.0);
    Some((user, sys))
}

/// Stub on non-Unix platforms.
#[cfg(not(unix))]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    None
}

/// What a run observed while it was going.
#[derive(Clone, Debug, Default)]
pub struct RunObservation {
    pub last: StatsSnapshot,
    pub max_at_tables: u64,
    pub elapsed: Duration,
}

/// Sample the counters until `done` holds or `limit` elapses.
fn observe<F>(sim: &Simulation, limit: Duration, log_progress: bool, done: F) -> RunObservation
where
    F: Fn(&StatsSnapshot) -> bool,
{
    let stats = sim.restaurant().stats();
    let start = Instant::now();
    let mut last_report = start;
    let mut observation = RunObservation::default();
    loop {
        let snapshot = stats.snapshot();
        observation.max_at_tables = observation.max_at_tables.max(snapshot.at_tables);
        observation.last = snapshot;
        if done(&snapshot) || start.elapsed() >= limit {
            break;
        }
        if log_progress && last_report.elapsed() >= REPORT_EVERY {
            last_report = Instant::now();
            info!(
                "[SIM] waiting_for_table={} waiting_for_food={} eating={} at_tables={} departed={}",
                snapshot.waiting_for_table,
                snapshot.waiting_for_food,
                snapshot.eating,
                snapshot.at_tables,
                snapshot.departed
            );
        }
        std::thread::sleep(SAMPLE_EVERY);
    }
    observation.elapsed = start.elapsed();
    observation
}

fn table_violation(config: &SimConfig, observed: &RunObservation, report: &ShutdownReport) -> bool {
    observed.max_at_tables > config.tables as u64 || !report.violations.is_empty()
}

/// Run the simulation with the headless movement layer for `duration`,
/// then shut down and print a summary.
pub fn run_demo(config: SimConfig, duration: Duration) -> Result<(), SimError> {
    info!("[SIM] demo for {duration:?} at time scale {}", config.time_scale);
    let mut sim = Simulation::start_headless(config.clone())?;
    let observed = observe(&sim, duration, true, |_| false);

    let restaurant = sim.restaurant();
    let waiters: Vec<_> = restaurant.waiters().iter().map(|w| w.snapshot()).collect();
    let prepared: Vec<u64> = restaurant.cooks().iter().map(|c| c.prepared()).collect();
    let backlog = restaurant.receptionist().backlog_len();
    let occupied = restaurant.tables().occupied_tables().len();
    let report = sim.shutdown();
    let stats = observed.last;

    println!("SIMULATION SUMMARY");
    println!(
        "tables={} waiters={} cooks={} lambda={} time_scale={}",
        config.tables, config.waiters, config.cooks, config.arrival_rate, config.time_scale
    );
    println!(
        "customers_arrived={} customers_departed={}",
        stats.arrived, stats.departed
    );
    println!(
        "waiting_for_table={} waiting_for_food={} eating={} at_tables={}",
        stats.waiting_for_table, stats.waiting_for_food, stats.eating, stats.at_tables
    );
    println!("backlog_at_end={backlog} occupied_tables_at_end={occupied}");
    println!(
        "orders_taken={:?} orders_delivered={:?}",
        waiters.iter().map(|w| w.orders_taken).collect::<Vec<_>>(),
        waiters.iter().map(|w| w.orders_delivered).collect::<Vec<_>>()
    );
    println!("orders_prepared={prepared:?}");
    println!("max_at_tables_observed={}", observed.max_at_tables);
    println!(
        "table_violation={}",
        table_violation(&config, &observed, &report)
    );
    println!("shutdown_clean={}", report.is_clean());
    if !report.timed_out.is_empty() {
        println!("threads_timed_out={:?}", report.timed_out);
    }
    Ok(())
}

/// Result of a single benchmark run.
#[derive(Clone, Debug)]
pub struct BenchResult {
    pub tables: usize,
    pub waiters: usize,
    pub cooks: usize,
    pub customers: u64,
    pub departed: u64,
    pub elapsed_ms: f64,
    pub throughput: f64,
    pub cpu_user_s: Option<f64>,
    pub cpu_sys_s: Option<f64>,
    pub max_at_tables: u64,
    pub table_violation: bool,
    pub shutdown_clean: bool,
}

const CSV_HEADER: &str = "tables,waiters,cooks,customers,departed,elapsed_ms,throughput_customers_per_s,cpu_user_s,cpu_sys_s,max_at_tables,table_violation,shutdown_clean";

impl BenchResult {
    fn csv_row(&self) -> String {
        let fmt_cpu = |value: Option<f64>| {
            value
                .map(|v| format!("{v:.4}"))
                .unwrap_or_else(|| "NA".to_string())
        };
        format!(
            "{},{},{},{},{},{:.2},{:.2},{},{},{},{},{}",
            self.tables,
            self.waiters,
            self.cooks,
            self.customers,
            self.departed,
            self.elapsed_ms,
            self.throughput,
            fmt_cpu(self.cpu_user_s),
            fmt_cpu(self.cpu_sys_s),
            self.max_at_tables,
            self.table_violation,
            self.shutdown_clean
        )
    }
}

/// Serve `customers` customers (or give up after `limit`) and measure.
pub fn benchmark_once(
    mut config: SimConfig,
    customers: u64,
    limit: Duration,
) -> Result<BenchResult, SimError> {
    config.auto_arrivals = true;
    config.max_customers = Some(customers);
    let cpu_start = cpu_times_seconds();
    let mut sim = Simulation::start_headless(config.clone())?;
    let observed = observe(&sim, limit, false, |s| s.departed >= customers);
    let report = sim.shutdown();
    let cpu_end = cpu_times_seconds();

    let (cpu_user_s, cpu_sys_s) = match (cpu_start, cpu_end) {
        (Some((u0, s0)), Some((u1, s1))) => (Some(u1 - u0), Some(s1 - s0)),
        _ => (None, None),
    };
    let elapsed_secs = observed.elapsed.as_secs_f64();
    let departed = observed.last.departed;
    Ok(BenchResult {
        tables: config.tables,
        waiters: config.waiters,
        cooks: config.cooks,
        customers,
        departed,
        elapsed_ms: elapsed_secs * 1000.0,
        throughput: if elapsed_secs > 0.0 {
            departed as f64 / elapsed_secs
        } else {
            0.0
        },
        cpu_user_s,
        cpu_sys_s,
        max_at_tables: observed.max_at_tables,
        table_violation: table_violation(&config, &observed, &report),
        shutdown_clean: report.is_clean(),
    })
}

fn print_result(result: &BenchResult) {
    println!("{}", result.csv_row());
    if result.departed < result.customers {
        eprintln!(
            "# warning,unfinished_customers,{}",
            result.customers - result.departed
        );
    }
    if result.table_violation {
        eprintln!("# violation,table_exclusivity");
    }
    if !result.shutdown_clean {
        eprintln!("# warning,unclean_shutdown");
    }
}

/// Run a single benchmark and print it as CSV.
pub fn run_benchmark(config: SimConfig, customers: u64, limit: Duration) -> Result<(), SimError> {
    let result = benchmark_once(config, customers, limit)?;
    println!("{CSV_HEADER}");
    print_result(&result);
    Ok(())
}

/// Sweep table/waiter/cook counts and print one CSV row per combination.
pub fn run_stress(
    base: SimConfig,
    table_sets: &[usize],
    waiter_sets: &[usize],
    cook_sets: &[usize],
    customers: u64,
    limit: Duration,
) -> Result<(), SimError> {
    println!("{CSV_HEADER}");
    for &tables in table_sets {
        for &waiters in waiter_sets {
            for &cooks in cook_sets {
                let config = SimConfig {
                    tables,
                    waiters,
                    cooks,
                    ..base.clone()
                };
                let result = benchmark_once(config, customers, limit)?;
                print_result(&result);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_row_matches_header_width() {
        let result = BenchResult {
            tables: 2,
            waiters: 1,
            cooks: 1,
            customers: 5,
            departed: 5,
            elapsed_ms: 12.5,
            throughput: 400.0,
            cpu_user_s: None,
            cpu_sys_s: Some(0.25),
            max_at_tables: 2,
            table_violation: false,
            shutdown_clean: true,
        };
        let row = result.csv_row();
        assert_eq!(row.split(',').count(), CSV_HEADER.split(',').count());
        assert!(row.contains(",NA,0.2500,"));
    }

    #[cfg(unix)]
    #[test]
    fn cpu_times_are_available_on_unix() {
        let (user, sys) = cpu_times_seconds().expect("getrusage");
        assert!(user >= 0.0 && sys >= 0.0);
    }
}
