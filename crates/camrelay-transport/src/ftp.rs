//! FTP backend
//!
//! `suppaftp`'s blocking client does the protocol work; every command runs on
//! the blocking thread pool so camera tasks never stall the runtime. The stream
//! is moved into the blocking closure and handed back with the result, so a
//! panic or lost worker leaves the session without a stream and every later
//! command reports [`TransportError::Broken`].

use std::io::Cursor;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpResult, FtpStream, Status};

use camrelay_core::ServerConfig;

use crate::error::{TransportError, TransportResult};
use crate::session::{RemoteSession, SessionFactory};

/// Connects authenticated FTP sessions for one server/credential pair
#[derive(Clone)]
pub struct FtpSessionFactory {
    server: ServerConfig,
}

impl FtpSessionFactory {
    pub fn new(server: ServerConfig) -> Self {
        Self { server }
    }
}

#[async_trait]
impl SessionFactory for FtpSessionFactory {
    async fn connect(&self) -> TransportResult<Box<dyn RemoteSession>> {
        let server = self.server.clone();
        let start = Instant::now();

        let stream = tokio::task::spawn_blocking(move || open_stream(&server))
            .await
            .map_err(|e| TransportError::Connect(format!("connect worker failed: {}", e)))??;

        tracing::debug!(
            endpoint = %self.describe(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "FTP login successful"
        );

        Ok(Box::new(FtpSession {
            stream: Some(stream),
            endpoint: self.describe(),
        }))
    }

    fn describe(&self) -> String {
        format!("ftp://{}", self.server.describe())
    }
}

fn open_stream(server: &ServerConfig) -> TransportResult<FtpStream> {
    let addr: SocketAddr = (server.host.as_str(), server.port)
        .to_socket_addrs()
        .map_err(|e| TransportError::Connect(format!("Failed to resolve {}: {}", server.host, e)))?
        .next()
        .ok_or_else(|| TransportError::Connect(format!("No address for {}", server.host)))?;

    let mut stream = FtpStream::connect_timeout(addr, server.connect_timeout)
        .map_err(|e| TransportError::Connect(format!("Failed to connect to {}: {}", addr, e)))?;

    set_io_timeout(&stream, server.connect_timeout.saturating_mul(6));

    stream
        .login(&server.username, &server.password)
        .map_err(|e| TransportError::Connect(format!("Login as {} failed: {}", server.username, e)))?;
    stream
        .transfer_type(FileType::Binary)
        .map_err(|e| TransportError::Connect(format!("Failed to select binary mode: {}", e)))?;

    Ok(stream)
}

/// Bound reads and writes on the control connection so a silently dropped
/// connection surfaces as an IO error instead of hanging the lease forever.
fn set_io_timeout(stream: &FtpStream, timeout: Duration) {
    let socket = stream.get_ref();
    if let Err(e) = socket
        .set_read_timeout(Some(timeout))
        .and_then(|_| socket.set_write_timeout(Some(timeout)))
    {
        tracing::debug!(error = %e, "Could not set FTP socket timeouts");
    }
}

/// Map a `suppaftp` error onto the transport taxonomy.
fn classify(err: FtpError, subject: &str) -> TransportError {
    match err {
        FtpError::ConnectionError(io) => TransportError::Io(io),
        FtpError::UnexpectedResponse(response) if response.status == Status::FileUnavailable => {
            TransportError::NotFound(subject.to_string())
        }
        FtpError::UnexpectedResponse(response) => TransportError::Rejected {
            code: response.status.code(),
            message: String::from_utf8_lossy(&response.body).trim().to_string(),
        },
        FtpError::BadResponse => {
            TransportError::Broken(format!("malformed server reply while handling {}", subject))
        }
        other => TransportError::Broken(other.to_string()),
    }
}

/// One logged-in FTP control connection
pub struct FtpSession {
    stream: Option<FtpStream>,
    endpoint: String,
}

impl FtpSession {
    /// Run one blocking command against the stream.
    async fn run<T, F>(&mut self, subject: &str, command: F) -> TransportResult<T>
    where
        F: FnOnce(&mut FtpStream) -> FtpResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut stream = self.stream.take().ok_or_else(|| {
            TransportError::Broken(format!("session to {} already failed", self.endpoint))
        })?;

        let (stream, result) = tokio::task::spawn_blocking(move || {
            let result = command(&mut stream);
            (stream, result)
        })
        .await
        .map_err(|e| TransportError::Broken(format!("transfer worker failed: {}", e)))?;

        self.stream = Some(stream);
        result.map_err(|e| classify(e, subject))
    }
}

#[async_trait]
impl RemoteSession for FtpSession {
    async fn retrieve(&mut self, name: &str) -> TransportResult<Vec<u8>> {
        let start = Instant::now();
        let file = name.to_string();
        let data = self
            .run(name, move |s| s.retr_as_buffer(&file).map(Cursor::into_inner))
            .await?;

        tracing::debug!(
            endpoint = %self.endpoint,
            file = %name,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "FTP retrieve successful"
        );

        Ok(data)
    }

    async fn modified_time(&mut self, name: &str) -> TransportResult<NaiveDateTime> {
        let file = name.to_string();
        self.run(name, move |s| s.mdtm(&file)).await
    }

    async fn store(&mut self, name: &str, data: &[u8]) -> TransportResult<()> {
        let start = Instant::now();
        let file = name.to_string();
        let mut reader = Cursor::new(data.to_vec());
        let size = self.run(name, move |s| s.put_file(&file, &mut reader)).await?;

        tracing::debug!(
            endpoint = %self.endpoint,
            file = %name,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "FTP store successful"
        );

        Ok(())
    }

    async fn rename(&mut self, from: &str, to: &str) -> TransportResult<()> {
        let (from_name, to_name) = (from.to_string(), to.to_string());
        self.run(from, move |s| s.rename(&from_name, &to_name)).await
    }

    async fn delete(&mut self, name: &str) -> TransportResult<()> {
        let file = name.to_string();
        self.run(name, move |s| s.rm(&file)).await
    }

    async fn list(&mut self) -> TransportResult<Vec<String>> {
        self.run(".", |s| s.nlst(None)).await
    }

    async fn quit(&mut self) -> TransportResult<()> {
        self.run("QUIT", |s| s.quit()).await?;
        self.stream = None;
        Ok(())
    }
}
