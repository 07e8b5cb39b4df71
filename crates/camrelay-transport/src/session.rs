//! Remote session abstraction
//!
//! A [`RemoteSession`] is one connected, authenticated conversation with a file
//! server. Sessions are stateful and not safe to interleave, which is why they
//! are handed out through [`crate::ConnectionPool`] one holder at a time.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::TransportResult;

/// Connected file server session
///
/// All backends (FTP, in-memory) implement this trait so jobs never couple to
/// a specific protocol client.
#[async_trait]
pub trait RemoteSession: Send {
    /// Retrieve the full contents of a file
    async fn retrieve(&mut self, name: &str) -> TransportResult<Vec<u8>>;

    /// Modification time of a file as reported by the server (UTC)
    async fn modified_time(&mut self, name: &str) -> TransportResult<NaiveDateTime>;

    /// Store bytes under a name, replacing any existing file
    async fn store(&mut self, name: &str, data: &[u8]) -> TransportResult<()>;

    /// Rename a file server-side
    async fn rename(&mut self, from: &str, to: &str) -> TransportResult<()>;

    /// Delete a file
    async fn delete(&mut self, name: &str) -> TransportResult<()>;

    /// Names in the session's working directory
    async fn list(&mut self) -> TransportResult<Vec<String>>;

    /// Politely close the session
    async fn quit(&mut self) -> TransportResult<()>;
}

/// Creates new authenticated sessions for one server/credential pair
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Connect and authenticate
    async fn connect(&self) -> TransportResult<Box<dyn RemoteSession>>;

    /// Human-readable endpoint for logs (never includes the password)
    fn describe(&self) -> String;
}
