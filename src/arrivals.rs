//! Poisson arrival process.

use std::sync::Arc;

use log::{debug, info, warn};
use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::Distribution;

use crate::error::ConfigError;
use crate::restaurant::Restaurant;
use crate::scheduler::TimerKey;

/// Poisson-distributed arrival counts with exponential gaps, both at rate
/// `lambda`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoissonArrivals {
    lambda: f64,
}

impl PoissonArrivals {
    /// Create an arrival process with rate `lambda` per tick.
    pub fn new(lambda: f64) -> Result<Self, ConfigError> {
        if !(lambda.is_finite() && lambda > 0.0) {
            return Err(ConfigError::NonPositiveArrivalRate(lambda));
        }
        Ok(Self { lambda })
    }

    /// Mean arrivals per tick.
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Product-of-uniforms: multiply uniform draws until the product falls to
    /// `e^-lambda` or below; the number of draws minus one is the count.
    pub fn sample_count<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let limit = (-self.lambda).exp();
        let mut product = 1.0_f64;
        let mut draws = 0u32;
        loop {
            draws += 1;
            let u: f64 = rng.gen_range(0.0..1.0);
            product *= u;
            if product <= limit {
                return draws - 1;
            }
        }
    }

    /// Exponential inter-arrival gap in seconds, by inverse transform.
    pub fn sample_gap_secs<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.gen_range(0.0..1.0);
        -(1.0 - u).ln() / self.lambda
    }
}

impl Distribution<u32> for PoissonArrivals {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        self.sample_count(rng)
    }
}

/// Spawns customers on a fixed tick until shutdown or the customer cap.
pub struct ArrivalGenerator {
    process: PoissonArrivals,
    rng: StdRng,
    max_customers: Option<u64>,
    scheduled: u64,
}

impl ArrivalGenerator {
    /// Create a generator; `max_customers` caps the total scheduled.
    pub fn new(process: PoissonArrivals, rng: StdRng, max_customers: Option<u64>) -> Self {
        Self {
            process,
            rng,
            max_customers,
            scheduled: 0,
        }
    }

    fn exhausted(&self) -> bool {
        self.max_customers.is_some_and(|max| self.scheduled >= max)
    }

    /// Draw one tick's worth of arrivals and stagger them on the scheduler.
    /// Returns how many customers were scheduled.
    pub fn tick(&mut self, restaurant: &Arc<Restaurant>) -> u32 {
        let count = self.process.sample(&mut self.rng);
        let mut scheduled = 0;
        for _ in 0..count {
            if self.exhausted() {
                break;
            }
            let id = restaurant.next_customer_id();
            let gap = self.process.sample_gap_secs(&mut self.rng);
            let delay = restaurant.config().scaled_secs(gap);
            let target = Arc::clone(restaurant);
            let accepted = restaurant.scheduler().schedule(TimerKey::Arrival(id), delay, move || {
                if let Err(err) = target.spawn_customer(id) {
                    warn!("[ARRIVAL] customer {id} could not enter: {err}");
                }
            });
            if !accepted {
                break;
            }
            debug!("[ARRIVAL] customer {id} arrives in {delay:?}");
            self.scheduled += 1;
            scheduled += 1;
        }
        scheduled
    }

    /// Worker loop: one tick immediately, then one per interval.
    pub fn run(mut self, restaurant: Arc<Restaurant>) {
        let interval = restaurant.config().arrival_tick();
        info!(
            "[ARRIVAL] generator started (lambda={}, every {interval:?})",
            self.process.lambda()
        );
        loop {
            self.tick(&restaurant);
            if self.exhausted() {
                info!("[ARRIVAL] customer cap reached after {}", self.scheduled);
                return;
            }
            if !restaurant.shutdown().sleep(interval) {
                return;
            }
        }
    }
}
