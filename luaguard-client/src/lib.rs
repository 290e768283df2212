//! LuaGuard client
//!
//! Coordinates obfuscation between the remote authoritative transformer and
//! the local `luaguard-core` pipeline.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod remote;

pub use config::CoordinatorConfig;
pub use coordinator::ObfuscationCoordinator;
pub use error::{CoordinatorError, Result};
