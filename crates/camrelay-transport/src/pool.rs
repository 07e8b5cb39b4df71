//! Connection pool
//!
//! Holds exactly one lazily-created session per transfer direction. Each slot is
//! guarded by its own lock, so commands from different jobs never interleave on
//! a session, while a download and an upload can still run at the same time.
//!
//! A session that reports a transport fault is discarded, never repaired: the
//! next holder of the lease connects from scratch.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::{TransportError, TransportResult};
use crate::session::{RemoteSession, SessionFactory};

/// Transfer direction of a pooled session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Download,
    Upload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Download => f.write_str("download"),
            Direction::Upload => f.write_str("upload"),
        }
    }
}

/// One direction's cached session and the lock serialising access to it
pub struct SessionSlot {
    direction: Direction,
    factory: Arc<dyn SessionFactory>,
    handle: Mutex<Option<Box<dyn RemoteSession>>>,
    opened: AtomicU64,
    invalidated: AtomicU64,
}

impl SessionSlot {
    pub fn new(direction: Direction, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            direction,
            factory,
            handle: Mutex::new(None),
            opened: AtomicU64::new(0),
            invalidated: AtomicU64::new(0),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Wait for exclusive use of this direction's session.
    pub async fn lock(&self) -> SessionLease<'_> {
        SessionLease {
            slot: self,
            handle: self.handle.lock().await,
        }
    }

    /// Number of sessions created over the slot's lifetime
    pub fn sessions_opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of sessions discarded after a transport fault
    pub fn invalidations(&self) -> u64 {
        self.invalidated.load(Ordering::SeqCst)
    }

    /// Quit and drop the cached session, if any.
    pub async fn shutdown(&self) {
        let mut handle = self.handle.lock().await;
        if let Some(mut session) = handle.take() {
            match session.quit().await {
                Ok(()) => tracing::info!(direction = %self.direction, "Closed session"),
                Err(e) => tracing::debug!(
                    direction = %self.direction,
                    error = %e,
                    "Session did not close cleanly"
                ),
            }
        }
    }
}

/// Exclusive access to a direction's session for as long as it is held.
///
/// Every operation goes through the lease so a transport fault can discard the
/// cached session before the error reaches the caller.
pub struct SessionLease<'a> {
    slot: &'a SessionSlot,
    handle: MutexGuard<'a, Option<Box<dyn RemoteSession>>>,
}

impl SessionLease<'_> {
    pub fn direction(&self) -> Direction {
        self.slot.direction
    }

    /// Whether a session is currently cached
    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// The cached session, connecting first if there is none.
    ///
    /// Any failure to connect is reported as [`TransportError::Connect`] and
    /// nothing is cached.
    pub async fn session(&mut self) -> TransportResult<&mut dyn RemoteSession> {
        if self.handle.is_none() {
            let start = Instant::now();
            let session = self.slot.factory.connect().await.map_err(|e| {
                tracing::warn!(
                    direction = %self.slot.direction,
                    endpoint = %self.slot.factory.describe(),
                    error = %e,
                    "Failed to open session"
                );
                match e {
                    TransportError::Connect(_) | TransportError::Io(_) => e,
                    other => TransportError::Connect(other.to_string()),
                }
            })?;

            self.slot.opened.fetch_add(1, Ordering::SeqCst);
            tracing::info!(
                direction = %self.slot.direction,
                endpoint = %self.slot.factory.describe(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Opened session"
            );
            *self.handle = Some(session);
        }

        match self.handle.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(TransportError::Broken(
                "session slot empty after connect".to_string(),
            )),
        }
    }

    /// Discard the cached session so the next holder reconnects.
    pub fn invalidate(&mut self) {
        if self.handle.take().is_some() {
            self.slot.invalidated.fetch_add(1, Ordering::SeqCst);
            tracing::warn!(direction = %self.slot.direction, "Invalidated session");
        }
    }

    fn check<T>(&mut self, result: TransportResult<T>) -> TransportResult<T> {
        if let Err(e) = &result {
            if e.is_transport_fault() {
                tracing::warn!(
                    direction = %self.slot.direction,
                    error = %e,
                    "Transport fault on pooled session"
                );
                self.invalidate();
            }
        }
        result
    }

    pub async fn retrieve(&mut self, name: &str) -> TransportResult<Vec<u8>> {
        let result = self.session().await?.retrieve(name).await;
        self.check(result)
    }

    pub async fn modified_time(&mut self, name: &str) -> TransportResult<NaiveDateTime> {
        let result = self.session().await?.modified_time(name).await;
        self.check(result)
    }

    pub async fn store(&mut self, name: &str, data: &[u8]) -> TransportResult<()> {
        let result = self.session().await?.store(name, data).await;
        self.check(result)
    }

    pub async fn rename(&mut self, from: &str, to: &str) -> TransportResult<()> {
        let result = self.session().await?.rename(from, to).await;
        self.check(result)
    }

    pub async fn delete(&mut self, name: &str) -> TransportResult<()> {
        let result = self.session().await?.delete(name).await;
        self.check(result)
    }

    pub async fn list(&mut self) -> TransportResult<Vec<String>> {
        let result = self.session().await?.list().await;
        self.check(result)
    }
}

/// The process-wide pair of shared sessions, injected into every job
pub struct ConnectionPool {
    download: SessionSlot,
    upload: SessionSlot,
}

impl ConnectionPool {
    pub fn new(download: Arc<dyn SessionFactory>, upload: Arc<dyn SessionFactory>) -> Self {
        Self {
            download: SessionSlot::new(Direction::Download, download),
            upload: SessionSlot::new(Direction::Upload, upload),
        }
    }

    pub fn download(&self) -> &SessionSlot {
        &self.download
    }

    pub fn upload(&self) -> &SessionSlot {
        &self.upload
    }

    pub fn slot(&self, direction: Direction) -> &SessionSlot {
        match direction {
            Direction::Download => &self.download,
            Direction::Upload => &self.upload,
        }
    }

    /// Close both sessions; called once at process shutdown.
    pub async fn shutdown(&self) {
        self.download.shutdown().await;
        self.upload.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::AtomicBool;

    /// Session that fails every command with a reset once `poisoned` is set
    struct FakeSession {
        id: u64,
        poisoned: Arc<AtomicBool>,
    }

    #[async_trait]
    impl RemoteSession for FakeSession {
        async fn retrieve(&mut self, name: &str) -> TransportResult<Vec<u8>> {
            if self.poisoned.swap(false, Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset").into());
            }
            if name == "missing.jpg" {
                return Err(TransportError::NotFound(name.to_string()));
            }
            Ok(self.id.to_be_bytes().to_vec())
        }

        async fn modified_time(&mut self, name: &str) -> TransportResult<NaiveDateTime> {
            Err(TransportError::NotFound(name.to_string()))
        }

        async fn store(&mut self, _name: &str, _data: &[u8]) -> TransportResult<()> {
            Ok(())
        }

        async fn rename(&mut self, _from: &str, _to: &str) -> TransportResult<()> {
            Ok(())
        }

        async fn delete(&mut self, _name: &str) -> TransportResult<()> {
            Ok(())
        }

        async fn list(&mut self) -> TransportResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn quit(&mut self) -> TransportResult<()> {
            Ok(())
        }
    }

    struct FakeFactory {
        next_id: AtomicU64,
        poisoned: Arc<AtomicBool>,
        refuse: AtomicBool,
    }

    impl FakeFactory {
        fn new() -> Self {
            Self {
                next_id: AtomicU64::new(1),
                poisoned: Arc::new(AtomicBool::new(false)),
                refuse: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl SessionFactory for FakeFactory {
        async fn connect(&self) -> TransportResult<Box<dyn RemoteSession>> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(TransportError::Rejected {
                    code: 530,
                    message: "Login incorrect".to_string(),
                });
            }
            Ok(Box::new(FakeSession {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                poisoned: self.poisoned.clone(),
            }))
        }

        fn describe(&self) -> String {
            "fake".to_string()
        }
    }

    #[tokio::test]
    async fn test_session_created_lazily_and_reused() {
        let factory = Arc::new(FakeFactory::new());
        let slot = SessionSlot::new(Direction::Download, factory);
        assert_eq!(slot.sessions_opened(), 0);

        let first = slot.lock().await.retrieve("a.jpg").await.unwrap();
        let second = slot.lock().await.retrieve("a.jpg").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(slot.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn test_transport_fault_invalidates_session() {
        let factory = Arc::new(FakeFactory::new());
        let slot = SessionSlot::new(Direction::Download, factory.clone());

        let before = slot.lock().await.retrieve("a.jpg").await.unwrap();
        factory.poisoned.store(true, Ordering::SeqCst);

        let mut lease = slot.lock().await;
        let err = lease.retrieve("a.jpg").await.unwrap_err();
        assert!(err.is_transport_fault());
        assert!(!lease.is_connected());
        drop(lease);

        let after = slot.lock().await.retrieve("a.jpg").await.unwrap();
        assert_ne!(before, after, "faulted session must not be reused");
        assert_eq!(slot.sessions_opened(), 2);
        assert_eq!(slot.invalidations(), 1);
    }

    #[tokio::test]
    async fn test_logical_error_keeps_session() {
        let factory = Arc::new(FakeFactory::new());
        let slot = SessionSlot::new(Direction::Download, factory);

        let mut lease = slot.lock().await;
        let err = lease.retrieve("missing.jpg").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(lease.is_connected());
        drop(lease);

        assert_eq!(slot.invalidations(), 0);
        assert_eq!(slot.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_is_connection_class_and_not_cached() {
        let factory = Arc::new(FakeFactory::new());
        factory.refuse.store(true, Ordering::SeqCst);
        let slot = SessionSlot::new(Direction::Upload, factory.clone());

        let mut lease = slot.lock().await;
        let err = lease.store("a.jpg", b"data").await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)));
        assert!(!lease.is_connected());
        drop(lease);

        factory.refuse.store(false, Ordering::SeqCst);
        slot.lock().await.store("a.jpg", b"data").await.unwrap();
        assert_eq!(slot.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn test_directions_lock_independently() {
        let pool = ConnectionPool::new(Arc::new(FakeFactory::new()), Arc::new(FakeFactory::new()));

        let _download = pool.download().lock().await;
        // Must not deadlock while the download lease is held
        let mut upload = pool.upload().lock().await;
        upload.store("x.jpg", b"x").await.unwrap();

        assert_eq!(pool.slot(Direction::Upload).sessions_opened(), 1);
        assert_eq!(pool.slot(Direction::Download).sessions_opened(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_clears_sessions() {
        let pool = ConnectionPool::new(Arc::new(FakeFactory::new()), Arc::new(FakeFactory::new()));
        pool.download().lock().await.retrieve("a.jpg").await.unwrap();

        pool.shutdown().await;
        assert!(!pool.download().lock().await.is_connected());
    }
}
