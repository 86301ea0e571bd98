pub mod db;
pub mod models;
pub mod telemetry;
pub mod test_environment;

pub use db::DbPool;
