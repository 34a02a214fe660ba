//! Logging utilities.
//!
//! The engine only talks to the `log` facade. Binaries and tests that want
//! output call [`init_logging`] once; `env_logger` is the backend.

mod init;

pub use init::{init_logging, LoggingConfig};
