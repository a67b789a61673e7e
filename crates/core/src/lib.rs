//! Shared foundation for the scholar workspace: layered configuration and the
//! error taxonomy used at crate boundaries.

pub mod config;
pub mod errors;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use errors::{ApplicationError, InterfaceError};
