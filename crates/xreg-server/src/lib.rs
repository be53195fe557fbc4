//! The xRegistry gateway server: composition, scheduling, and CLI glue.

pub mod refresh;
pub mod server;

pub use refresh::{DEFAULT_REFRESH_INTERVAL, RefreshConfig, run as run_refresh};
pub use server::{ServerConfig, build_app, serve};
