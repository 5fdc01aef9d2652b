//! Shared identifiers and value types used across the restaurant.

use std::fmt;

/// Unique identifier for a customer.
pub type CustomerId = u64;
/// Unique identifier for a waiter thread.
pub type WaiterId = usize;
/// Unique identifier for a cook thread.
pub type CookId = usize;
/// Zero-based table index.
pub type TableId = usize;
/// Unique identifier for an order.
pub type OrderId = u64;

/// Anything the presentation layer moves around.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActorId {
    Customer(CustomerId),
    Waiter(WaiterId),
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorId::Customer(id) => write!(f, "customer-{id}"),
            ActorId::Waiter(id) => write!(f, "waiter-{id}"),
        }
    }
}

/// Symbolic movement target. The core never deals in coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    Entrance,
    Reception,
    Table(TableId),
    Kitchen,
    WaiterStation(WaiterId),
}

/// Request handed to the presentation layer; answered by
/// `Restaurant::on_target_reached`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveRequest {
    pub actor: ActorId,
    pub target: Location,
}

/// Lifecycle of an order. Only ever moves forward one step at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrderStatus {
    Pending,
    InProcess,
    Ready,
    Delivered,
}

impl OrderStatus {
    /// The only status this one may advance to.
    pub fn successor(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::InProcess),
            OrderStatus::InProcess => Some(OrderStatus::Ready),
            OrderStatus::Ready => Some(OrderStatus::Delivered),
            OrderStatus::Delivered => None,
        }
    }
}

/// A dish for one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub table: TableId,
    /// Preparation time drawn once when the order is taken.
    pub preparation_ms: u64,
    status: OrderStatus,
}

impl Order {
    /// Create a pending order.
    pub fn new(id: OrderId, table: TableId, preparation_ms: u64) -> Self {
        Self {
            id,
            table,
            preparation_ms,
            status: OrderStatus::Pending,
        }
    }

    /// Current pipeline stage.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Move to `next`; fails unless `next` is the direct successor.
    pub fn advance(&mut self, next: OrderStatus) -> Result<(), crate::error::OrderError> {
        if self.status.successor() != Some(next) {
            return Err(crate::error::OrderError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// "Customer needs a waiter at table N", consumed exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CustomerRequest {
    pub customer: CustomerId,
    pub table: TableId,
    /// Position in the service queue; assigned on enqueue.
    pub sequence: u64,
}

/// Read-only view of a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Table {
    pub number: TableId,
    pub current_customer: Option<CustomerId>,
}

impl Table {
    /// Whether a customer holds the table.
    pub fn is_occupied(&self) -> bool {
        self.current_customer.is_some()
    }
}
