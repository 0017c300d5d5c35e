use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::repository::{ProductRepository, StockDecrement};

/// A stock decrement that has been applied against the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservedLine {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Stock left right after this decrement.
    pub remaining: i32,
}

/// Stock decrements applied on behalf of one order.
///
/// Lines are reserved one by one with a conditional decrement. If any line
/// cannot be reserved, the lines already taken are handed back, so a failed
/// order never leaves stock removed.
#[derive(Debug, Default)]
pub struct StockReservation {
    lines: Vec<ReservedLine>,
}

impl StockReservation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve every `(product, quantity)` pair or none of them.
    pub async fn reserve_all(
        repo: &dyn ProductRepository,
        requests: &[(Uuid, i32)],
    ) -> Result<Self, InventoryError> {
        let mut reservation = Self::new();

        for &(product_id, quantity) in requests {
            let outcome = match repo.decrement_stock(product_id, quantity).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    reservation.release(repo).await;
                    return Err(InventoryError::Storage(e.to_string()));
                }
            };

            match outcome {
                StockDecrement::Applied { remaining } => {
                    reservation.lines.push(ReservedLine { product_id, quantity, remaining });
                }
                StockDecrement::Insufficient { available } => {
                    reservation.release(repo).await;
                    return Err(InventoryError::InsufficientInventory {
                        product_id,
                        requested: quantity,
                        available,
                    });
                }
                StockDecrement::Missing => {
                    reservation.release(repo).await;
                    return Err(InventoryError::NotFound(product_id.to_string()));
                }
            }
        }

        Ok(reservation)
    }

    /// Gives every reserved unit back. Failures are logged and skipped so one
    /// bad line does not strand the rest.
    pub async fn release(&mut self, repo: &dyn ProductRepository) {
        for line in self.lines.drain(..).rev() {
            match repo.restock(line.product_id, line.quantity).await {
                Ok(()) => info!("Released {} unit(s) of {}", line.quantity, line.product_id),
                Err(e) => warn!(
                    "Failed to release {} unit(s) of {}: {}",
                    line.quantity, line.product_id, e
                ),
            }
        }
    }

    pub fn lines(&self) -> &[ReservedLine] {
        &self.lines
    }

    /// Products this reservation drove to zero stock.
    pub fn depleted(&self) -> Vec<Uuid> {
        self.lines
            .iter()
            .filter(|line| line.remaining <= 0)
            .map(|line| line.product_id)
            .collect()
    }

    /// The order is persisted; the reservation becomes permanent.
    pub fn commit(self) -> Vec<ReservedLine> {
        self.lines
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Inventory not found: {0}")]
    NotFound(String),

    #[error("Insufficient inventory for {product_id}: requested {requested}, available {available}")]
    InsufficientInventory {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Inventory storage error: {0}")]
    Storage(String),
}
