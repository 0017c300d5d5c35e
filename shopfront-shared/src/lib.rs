pub mod money;
pub mod pii;
pub mod models;

pub use money::{apply_percentage_discount, round_money};
pub use pii::Masked;
