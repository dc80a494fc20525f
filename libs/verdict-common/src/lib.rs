pub mod config;
pub mod testing;
pub mod types;

pub use config::ExecutionConfig;
