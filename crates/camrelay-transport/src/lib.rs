//! Camrelay Transport Library
//!
//! This crate provides the remote file session abstraction used to fetch camera
//! images and publish the stamped results, the connection pool that shares one
//! session per transfer direction across all jobs, and the backends:
//!
//! - **FTP** (`transport-ftp`, default): blocking `suppaftp` sessions driven
//!   from `spawn_blocking`.
//! - **Memory** (`memory`): an in-process server with scripted faults, used by
//!   tests.
//!
//! # Error taxonomy
//!
//! [`TransportError`] separates logical protocol failures (the server answered
//! and refused, e.g. `550` not found) from transport faults (reset, broken pipe,
//! malformed reply). Only transport faults invalidate a pooled session.

pub mod error;
#[cfg(feature = "transport-ftp")]
pub mod ftp;
#[cfg(feature = "memory")]
pub mod memory;
pub mod pool;
pub mod session;

// Re-export commonly used types
pub use error::{TransportError, TransportResult};
#[cfg(feature = "transport-ftp")]
pub use ftp::FtpSessionFactory;
#[cfg(feature = "memory")]
pub use memory::MemoryServer;
pub use pool::{ConnectionPool, Direction, SessionLease, SessionSlot};
pub use session::{RemoteSession, SessionFactory};
