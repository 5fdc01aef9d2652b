//! Headless movement layer: turns move requests into timed completions.
//!
//! Stands in for a renderer. Every actor walks in a straight line at its
//! configured speed; arrival is reported through the shared scheduler.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info, trace};

use crate::config::{SimConfig, clamp_delay};
use crate::restaurant::Restaurant;
use crate::scheduler::TimerKey;
use crate::types::{ActorId, Location, MoveRequest, WaiterId};

const POLL: Duration = Duration::from_millis(20);

const ENTRANCE: Point = Point::new(900.0, 120.0);
const RECEPTION: Point = Point::new(895.0, 100.0);
const KITCHEN_PASS: Point = Point::new(120.0, 200.0);
const WAITER_STATION: Point = Point::new(205.0, 290.0);
const WAITER_SPACING: f64 = 40.0;
const TABLE_ORIGIN: Point = Point::new(300.0, 100.0);
const TABLE_SPACING: f64 = 64.0;

/// A position on the restaurant floor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Straight-line distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Fixed floor plan: entrance and desk on the right, kitchen on the left,
/// tables in a grid between them.
#[derive(Clone, Copy, Debug)]
pub struct Layout {
    tables_per_row: usize,
}

impl Layout {
    /// Create a layout with `tables_per_row` tables per row.
    pub fn new(tables_per_row: usize) -> Self {
        Self {
            tables_per_row: tables_per_row.max(1),
        }
    }

    /// Floor position of `location`.
    pub fn point(&self, location: Location) -> Point {
        match location {
            Location::Entrance => ENTRANCE,
            Location::Reception => RECEPTION,
            Location::Kitchen => KITCHEN_PASS,
            Location::WaiterStation(id) => Self::station(id),
            Location::Table(table) => {
                let row = table / self.tables_per_row;
                let col = table % self.tables_per_row;
                Point::new(
                    TABLE_ORIGIN.x + col as f64 * TABLE_SPACING,
                    TABLE_ORIGIN.y + row as f64 * TABLE_SPACING,
                )
            }
        }
    }

    fn station(id: WaiterId) -> Point {
        Point::new(WAITER_STATION.x + id as f64 * WAITER_SPACING, WAITER_STATION.y)
    }
}

pub struct TimedMover {
    layout: Layout,
    customer_speed: f64,
    waiter_speed: f64,
    time_scale: f64,
    positions: HashMap<ActorId, Point>,
}

impl TimedMover {
    /// Create a mover using the configured speeds and time scale.
    pub fn new(config: &SimConfig) -> Self {
        Self {
            layout: Layout::new(config.tables_per_row),
            customer_speed: config.customer_speed,
            waiter_speed: config.waiter_speed,
            time_scale: config.time_scale,
            positions: HashMap::new(),
        }
    }

    /// Last known position of `actor`, or its spawn point.
    pub fn position(&self, actor: ActorId) -> Point {
        self.positions
            .get(&actor)
            .copied()
            .unwrap_or_else(|| Self::spawn_point(actor))
    }

    fn spawn_point(actor: ActorId) -> Point {
        match actor {
            ActorId::Customer(_) => ENTRANCE,
            ActorId::Waiter(id) => Layout::station(id),
        }
    }

    /// Record the move and return how long it takes in wall-clock time.
    pub fn travel_time(&mut self, request: MoveRequest) -> Duration {
        let from = self.position(request.actor);
        let to = self.layout.point(request.target);
        let speed = match request.actor {
            ActorId::Customer(_) => self.customer_speed,
            ActorId::Waiter(_) => self.waiter_speed,
        };
        match (request.actor, request.target) {
            // A customer walking out is forgotten.
            (ActorId::Customer(_), Location::Entrance) => {
                self.positions.remove(&request.actor);
            }
            _ => {
                self.positions.insert(request.actor, to);
            }
        }
        clamp_delay(from.distance(&to) / speed * self.time_scale)
    }

    /// Serve move requests until shutdown.
    pub fn run(mut self, requests: Receiver<MoveRequest>, restaurant: &Arc<Restaurant>) {
        info!("[SIM] headless movement layer running");
        loop {
            if restaurant.shutdown().is_triggered() {
                return;
            }
            match requests.recv_timeout(POLL) {
                Ok(request) => self.dispatch(request, restaurant),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    fn dispatch(&mut self, request: MoveRequest, restaurant: &Arc<Restaurant>) {
        let delay = self.travel_time(request);
        let actor = request.actor;
        trace!("[SIM] {actor} -> {:?} in {delay:?}", request.target);
        let world = Arc::clone(restaurant);
        restaurant
            .scheduler()
            .schedule(TimerKey::Move(actor), delay, move || {
                if let Err(err) = world.on_target_reached(actor) {
                    debug!("[SIM] arrival of {actor} ignored: {err}");
                }
            });
    }
}
