//! Restaurant concurrency simulation.
//!
//! Customers, waiters, cooks and a receptionist run as independent threads
//! coordinating through three monitors: the [`tables::TableAllocator`], the
//! [`order_board::OrderBoard`] and the [`service_queue::ServiceQueue`].
//! Movement is delegated to a presentation layer through
//! [`types::MoveRequest`]s; [`movement::TimedMover`] is the built-in
//! headless one.

pub mod arrivals;
pub mod config;
pub mod cook;
pub mod customer;
pub mod error;
pub mod logging;
pub mod movement;
pub mod order_board;
pub mod receptionist;
pub mod restaurant;
pub mod scheduler;
pub mod service_queue;
pub mod shutdown;
pub mod sim;
pub mod stats;
pub mod tables;
pub mod types;
pub mod waiter;

pub use config::SimConfig;
pub use error::{ConfigError, SimError};
pub use restaurant::{Restaurant, ShutdownReport, Simulation};
