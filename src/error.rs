//! Error types for configuration, monitors and the simulation lifecycle.

use thiserror::Error;

use crate::types::{ActorId, CustomerId, OrderId, OrderStatus, TableId};

/// Rejected configuration. Always raised before any worker starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("restaurant needs at least one table")]
    NoTables,
    #[error("restaurant needs at least one waiter")]
    NoWaiters,
    #[error("restaurant needs at least one cook")]
    NoCooks,
    #[error("arrival rate must be > 0, got {0}")]
    NonPositiveArrivalRate(f64),
    #[error("{name}: min {min} is greater than max {max}")]
    InvalidRange {
        name: &'static str,
        min: u64,
        max: u64,
    },
    #[error("{name} must be > 0, got {value}")]
    NonPositiveSpeed { name: &'static str, value: f64 },
    #[error("{0} must be > 0")]
    ZeroInterval(&'static str),
    #[error("time scale must be > 0, got {0}")]
    InvalidTimeScale(f64),
    #[error("scaled {name} of {secs}s exceeds the longest supported wait")]
    ScaledDelayTooLong { name: &'static str, secs: f64 },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Table operations that would break occupancy accounting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("table {table} does not exist ({total} tables)")]
    OutOfRange { table: TableId, total: usize },
    #[error("table {table} is already occupied by customer {occupant}")]
    AlreadyOccupied { table: TableId, occupant: CustomerId },
    #[error("table {0} is not occupied")]
    NotOccupied(TableId),
    #[error("table {table} is held by customer {owner}, not {caller}")]
    NotOwner {
        table: TableId,
        owner: CustomerId,
        caller: CustomerId,
    },
}

/// Order pipeline misuse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("order {id} cannot go from {from:?} to {to:?}")]
    InvalidTransition {
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },
    #[error("order {0} is not being prepared")]
    NotInProcess(OrderId),
}

/// Lifecycle and routing failures at the simulation boundary.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("simulation is shutting down")]
    ShutDown,
    #[error("customer {0} already exists")]
    DuplicateCustomer(CustomerId),
    #[error("unknown actor {0}")]
    UnknownActor(ActorId),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}
