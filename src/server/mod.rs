//! Server module for Vaporvibe
//!
//! # Module Structure
//!
//! - `config`: Configuration structures
//! - `loader`: Configuration loading from files and environment
//! - `persistence`: Session snapshot file read/write
//! - `init`: Main server initialization and run loop

pub mod config;
mod init;
mod loader;
pub mod persistence;

// Re-export public API
pub use init::run;
pub use loader::load_config;
