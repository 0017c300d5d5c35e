pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod events;
pub mod memory;
pub mod order_repo;
pub mod paypal;
pub mod redis_repo;
pub mod retry;

pub use app_config::Config;
pub use catalog_repo::PgCatalogRepository;
pub use database::DbClient;
pub use events::RedisEventPublisher;
pub use memory::InMemoryStore;
pub use order_repo::{PgOrderRepository, PgPaymentRepository};
pub use paypal::PaypalClient;
pub use redis_repo::RedisClient;
