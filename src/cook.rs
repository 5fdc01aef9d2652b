//! Cook worker: take the next pending order, prepare it, mark it ready.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::restaurant::Restaurant;
use crate::types::{CookId, OrderId};

pub struct CookActor {
    id: CookId,
    current: Mutex<Option<OrderId>>,
    prepared: AtomicU64,
}

impl CookActor {
    /// Create an idle cook.
    pub(crate) fn new(id: CookId) -> Self {
        Self {
            id,
            current: Mutex::new(None),
            prepared: AtomicU64::new(0),
        }
    }

    /// Cook id.
    pub fn id(&self) -> CookId {
        self.id
    }

    /// Order on the stove, if any.
    pub fn current_order(&self) -> Option<OrderId> {
        *self.current.lock()
    }

    /// Orders finished so far.
    pub fn prepared(&self) -> u64 {
        self.prepared.load(Ordering::Relaxed)
    }

    /// Worker loop. Exits when the board closes or preparation is cut short
    /// by shutdown.
    pub fn run(&self, restaurant: &Arc<Restaurant>) {
        info!("[COOK] cook {} on duty", self.id);
        while let Some(order) = restaurant.orders().next_order() {
            *self.current.lock() = Some(order.id);
            let prep = restaurant.config().scaled_ms(order.preparation_ms);
            debug!(
                "[COOK] cook {} preparing order {} for table {} ({prep:?})",
                self.id, order.id, order.table
            );
            if !restaurant.shutdown().sleep(prep) {
                debug!("[COOK] cook {} abandons order {}", self.id, order.id);
                break;
            }
            match restaurant.orders().mark_order_as_ready(order.id) {
                Ok(()) => {
                    self.prepared.fetch_add(1, Ordering::Relaxed);
                    info!("[COOK] order {} ready for table {}", order.id, order.table);
                }
                Err(err) => warn!("[COOK] cook {}: {err}", self.id),
            }
            *self.current.lock() = None;
        }
        *self.current.lock() = None;
        debug!("[COOK] cook {} off duty", self.id);
    }
}
