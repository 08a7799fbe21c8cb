pub mod admin_repo;
pub mod agent_repo;
pub mod app_config;
pub mod counter;
pub mod database;
pub mod payment_repo;
pub mod property_repo;
pub mod redis_repo;
pub mod reservation_repo;
pub mod user_repo;

pub use counter::{FileCounterStore, RedisCounterStore};
pub use database::DbClient;
pub use redis_repo::RedisClient;

/// Erase a concrete error into the boxed form the repository seams use.
pub(crate) fn boxed(
    e: impl std::error::Error + Send + Sync + 'static,
) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(e)
}
