//! In-memory file server
//!
//! A [`MemoryServer`] behaves like a single-directory FTP server held in
//! process memory. Faults can be scripted per operation to reproduce missing
//! files, refusals, dropped connections, interrupted uploads and corrupted
//! downloads. A session that suffered a connection fault is dead: any further
//! command on it fails, exactly as a real socket would.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};

use crate::error::{TransportError, TransportResult};
use crate::session::{RemoteSession, SessionFactory};

/// Operations a fault can be scripted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    Retrieve,
    ModifiedTime,
    Store,
    Rename,
    Delete,
    List,
}

/// A scripted failure consumed by the next matching operation
#[derive(Debug, Clone)]
pub enum Fault {
    /// Reply `550`
    NotFound,
    /// Reply with the given code
    Rejected(u32),
    /// Drop the connection before doing anything
    ConnectionReset,
    /// Store only: write the first half of the payload, then drop the connection
    DropMidTransfer,
    /// Retrieve only: serve these bytes instead of the stored file
    Serve(Vec<u8>),
}

#[derive(Debug, Clone)]
struct MemoryFile {
    data: Vec<u8>,
    modified: NaiveDateTime,
}

#[derive(Default)]
struct MemoryState {
    files: BTreeMap<String, MemoryFile>,
    faults: HashMap<Operation, VecDeque<(Option<String>, Fault)>>,
    connections: u64,
    dead_sessions: HashSet<u64>,
    history: HashMap<String, Vec<Option<Vec<u8>>>>,
    log: Vec<(u64, Operation, String)>,
    no_modified_time: bool,
}

impl MemoryState {
    /// Pop the first queued fault for `operation` that applies to `subject`.
    fn take_fault(&mut self, operation: Operation, subject: &str) -> Option<Fault> {
        let queue = self.faults.get_mut(&operation)?;
        let index = queue
            .iter()
            .position(|(target, _)| target.as_deref().map_or(true, |t| t == subject))?;
        queue.remove(index).map(|(_, fault)| fault)
    }

    fn record(&mut self, name: &str) {
        let visible = self.files.get(name).map(|f| f.data.clone());
        self.history.entry(name.to_string()).or_default().push(visible);
    }
}

/// Shared handle to an in-memory server
#[derive(Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        lock(&self.state)
    }

    /// Place a file on the server, stamped with the current time
    pub fn put(&self, name: &str, data: impl Into<Vec<u8>>) {
        self.put_with_time(name, data, Utc::now().naive_utc());
    }

    pub fn put_with_time(&self, name: &str, data: impl Into<Vec<u8>>, modified: NaiveDateTime) {
        let mut state = self.state();
        state.files.insert(
            name.to_string(),
            MemoryFile {
                data: data.into(),
                modified,
            },
        );
        state.record(name);
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.state().files.get(name).map(|f| f.data.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state().files.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.state().files.keys().cloned().collect()
    }

    /// Queue a fault for the next operation of the given kind
    pub fn inject(&self, operation: Operation, fault: Fault) {
        self.queue_fault(operation, None, fault);
    }

    /// Queue a fault for the next operation of the given kind on `name`
    /// (the source name for renames).
    pub fn inject_for(&self, operation: Operation, name: &str, fault: Fault) {
        self.queue_fault(operation, Some(name.to_string()), fault);
    }

    fn queue_fault(&self, operation: Operation, target: Option<String>, fault: Fault) {
        self.state()
            .faults
            .entry(operation)
            .or_default()
            .push_back((target, fault));
    }

    /// Refuse modification time queries like servers without `MDTM` support
    pub fn disable_modified_time(&self) {
        self.state().no_modified_time = true;
    }

    /// Number of successful logins
    pub fn connections(&self) -> u64 {
        self.state().connections
    }

    /// Every state the name has been visible in, oldest first (`None` = absent)
    pub fn history(&self, name: &str) -> Vec<Option<Vec<u8>>> {
        self.state().history.get(name).cloned().unwrap_or_default()
    }

    /// `(session id, operation, subject)` for every command received
    pub fn operations(&self) -> Vec<(u64, Operation, String)> {
        self.state().log.clone()
    }

    pub fn factory(&self) -> Arc<dyn SessionFactory> {
        Arc::new(self.clone())
    }
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn reset() -> TransportError {
    TransportError::Io(io::Error::new(
        io::ErrorKind::ConnectionReset,
        "connection reset by peer",
    ))
}

#[async_trait]
impl SessionFactory for MemoryServer {
    async fn connect(&self) -> TransportResult<Box<dyn RemoteSession>> {
        let mut state = self.state();
        match state.take_fault(Operation::Connect, "") {
            Some(Fault::Rejected(code)) => {
                return Err(TransportError::Rejected {
                    code,
                    message: "Login incorrect".to_string(),
                })
            }
            Some(_) => return Err(TransportError::Connect("connection refused".to_string())),
            None => {}
        }

        state.connections += 1;
        Ok(Box::new(MemorySession {
            id: state.connections,
            state: self.state.clone(),
        }))
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

/// One session against a [`MemoryServer`]
pub struct MemorySession {
    id: u64,
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySession {
    /// Common prologue: refuse dead sessions, log the command, pop a fault.
    fn begin(
        &self,
        state: &mut MemoryState,
        operation: Operation,
        subject: &str,
    ) -> TransportResult<Option<Fault>> {
        if state.dead_sessions.contains(&self.id) {
            return Err(TransportError::Broken(format!(
                "session {} used after a connection fault",
                self.id
            )));
        }
        state.log.push((self.id, operation, subject.to_string()));

        match state.take_fault(operation, subject) {
            Some(Fault::ConnectionReset) => {
                state.dead_sessions.insert(self.id);
                Err(reset())
            }
            Some(Fault::NotFound) => Err(TransportError::NotFound(subject.to_string())),
            Some(Fault::Rejected(code)) => Err(TransportError::Rejected {
                code,
                message: format!("{:?} refused", operation),
            }),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl RemoteSession for MemorySession {
    async fn retrieve(&mut self, name: &str) -> TransportResult<Vec<u8>> {
        let mut state = lock(&self.state);
        if let Some(Fault::Serve(bytes)) = self.begin(&mut state, Operation::Retrieve, name)? {
            return Ok(bytes);
        }
        state
            .files
            .get(name)
            .map(|f| f.data.clone())
            .ok_or_else(|| TransportError::NotFound(name.to_string()))
    }

    async fn modified_time(&mut self, name: &str) -> TransportResult<NaiveDateTime> {
        let mut state = lock(&self.state);
        self.begin(&mut state, Operation::ModifiedTime, name)?;
        if state.no_modified_time {
            return Err(TransportError::Rejected {
                code: 502,
                message: "Command not implemented".to_string(),
            });
        }
        state
            .files
            .get(name)
            .map(|f| f.modified)
            .ok_or_else(|| TransportError::NotFound(name.to_string()))
    }

    async fn store(&mut self, name: &str, data: &[u8]) -> TransportResult<()> {
        let mut state = lock(&self.state);
        let fault = self.begin(&mut state, Operation::Store, name)?;

        let (written, result) = match fault {
            Some(Fault::DropMidTransfer) => {
                state.dead_sessions.insert(self.id);
                (&data[..data.len() / 2], Err(reset()))
            }
            _ => (data, Ok(())),
        };

        state.files.insert(
            name.to_string(),
            MemoryFile {
                data: written.to_vec(),
                modified: Utc::now().naive_utc(),
            },
        );
        state.record(name);
        result
    }

    async fn rename(&mut self, from: &str, to: &str) -> TransportResult<()> {
        let mut state = lock(&self.state);
        self.begin(&mut state, Operation::Rename, from)?;

        let file = state
            .files
            .remove(from)
            .ok_or_else(|| TransportError::NotFound(from.to_string()))?;
        state.files.insert(to.to_string(), file);
        state.record(from);
        state.record(to);
        Ok(())
    }

    async fn delete(&mut self, name: &str) -> TransportResult<()> {
        let mut state = lock(&self.state);
        self.begin(&mut state, Operation::Delete, name)?;

        state
            .files
            .remove(name)
            .ok_or_else(|| TransportError::NotFound(name.to_string()))?;
        state.record(name);
        Ok(())
    }

    async fn list(&mut self) -> TransportResult<Vec<String>> {
        let mut state = lock(&self.state);
        self.begin(&mut state, Operation::List, ".")?;
        Ok(state.files.keys().cloned().collect())
    }

    async fn quit(&mut self) -> TransportResult<()> {
        lock(&self.state).dead_sessions.insert(self.id);
        Ok(())
    }
}
