pub mod product;
pub mod coupon;
pub mod pricing;
pub mod inventory;
pub mod repository;

pub use product::{Product, ProductError};
pub use coupon::{Coupon, CouponError};
pub use pricing::{OrderQuote, PricedLine};
pub use inventory::{InventoryError, ReservedLine, StockReservation};
pub use repository::{CouponRepository, ProductRepository, StockDecrement};
