pub mod loader;
pub mod model;

pub use loader::{ConfigLoader, DATABASE_ENV_VAR, apply_env_overrides};
pub use model::{AppConfig, DatabaseConfig, DatabaseLocation, LogConfig};
