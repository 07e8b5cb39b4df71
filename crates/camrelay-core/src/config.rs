//! Configuration module
//!
//! Relay settings come from the environment (optionally seeded from a `.env`
//! file): server endpoints and credentials for each transfer direction, retry
//! policies, publish naming and schedule. Camera definitions live in a separate
//! JSON document, see [`crate::camera`].

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::retry::RetryPolicy;

// Common constants
const FTP_PORT: u16 = 21;
const CONNECT_TIMEOUT_SECS: u64 = 10;
const DOWNLOAD_MAX_ATTEMPTS: u32 = 3;
const DOWNLOAD_RETRY_DELAY_SECS: u64 = 5;
const UPLOAD_MAX_ATTEMPTS: u32 = 3;
const UPLOAD_RETRY_DELAY_SECS: u64 = 5;
const CYCLE_MAX_ATTEMPTS: u32 = 3;
const CYCLE_RETRY_DELAY_SECS: u64 = 2;
const NOT_FOUND_GRACE_SECS: u64 = 6;
const JPEG_QUALITY: u8 = 90;
const FFMPEG_TIMEOUT_SECS: u64 = 600;
const SCHEDULE_RUNS: u32 = 2;
const SCHEDULE_INTERVAL_SECS: u64 = 45;
const PUBLIC_BASE_URL: &str = "https://glacier.org/webcam";
const PUBLISH_TEMP_SUFFIX: &str = ".tmp";
const LABEL_TIMEZONE: &str = "America/Denver";

/// Endpoint and credentials for one transfer direction
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl ServerConfig {
    /// `user@host:port`, for logs
    pub fn describe(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Relay configuration
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub download: ServerConfig,
    pub upload: ServerConfig,
    pub public_base_url: String,
    pub cameras_file: PathBuf,
    pub download_retry: RetryPolicy,
    pub upload_retry: RetryPolicy,
    pub cycle_retry: RetryPolicy,
    pub not_found_grace: Duration,
    pub publish_temp_suffix: String,
    pub label_timezone: Tz,
    pub jpeg_quality: u8,
    pub ffmpeg_path: String,
    pub ffmpeg_timeout: Duration,
    pub schedule_runs: u32,
    pub schedule_interval: Duration,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let shared_host = env::var("FTP_HOST").ok();
        let shared_port = parse_or("FTP_PORT", FTP_PORT)?;
        let connect_timeout = Duration::from_secs(parse_or(
            "FTP_CONNECT_TIMEOUT_SECS",
            CONNECT_TIMEOUT_SECS,
        )?);

        let download = server_from_env("DOWNLOAD", shared_host.as_deref(), shared_port, connect_timeout)?;
        let upload = server_from_env("UPLOAD", shared_host.as_deref(), shared_port, connect_timeout)?;

        let label_timezone = env::var("LABEL_TIMEZONE")
            .unwrap_or_else(|_| LABEL_TIMEZONE.to_string());
        let label_timezone = Tz::from_str(&label_timezone)
            .map_err(|e| anyhow::anyhow!("LABEL_TIMEZONE is not a valid zone: {}", e))?;

        let config = RelayConfig {
            download,
            upload,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| PUBLIC_BASE_URL.to_string()),
            cameras_file: env::var("CAMERAS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("webcams.json")),
            download_retry: RetryPolicy::new(
                parse_or("DOWNLOAD_MAX_ATTEMPTS", DOWNLOAD_MAX_ATTEMPTS)?,
                Duration::from_secs(parse_or("DOWNLOAD_RETRY_DELAY_SECS", DOWNLOAD_RETRY_DELAY_SECS)?),
            ),
            upload_retry: RetryPolicy::new(
                parse_or("UPLOAD_MAX_ATTEMPTS", UPLOAD_MAX_ATTEMPTS)?,
                Duration::from_secs(parse_or("UPLOAD_RETRY_DELAY_SECS", UPLOAD_RETRY_DELAY_SECS)?),
            ),
            cycle_retry: RetryPolicy::new(
                parse_or("CYCLE_MAX_ATTEMPTS", CYCLE_MAX_ATTEMPTS)?,
                Duration::from_secs(parse_or("CYCLE_RETRY_DELAY_SECS", CYCLE_RETRY_DELAY_SECS)?),
            ),
            not_found_grace: Duration::from_secs(parse_or("NOT_FOUND_GRACE_SECS", NOT_FOUND_GRACE_SECS)?),
            publish_temp_suffix: env::var("PUBLISH_TEMP_SUFFIX")
                .unwrap_or_else(|_| PUBLISH_TEMP_SUFFIX.to_string()),
            label_timezone,
            jpeg_quality: parse_or("JPEG_QUALITY", JPEG_QUALITY)?,
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffmpeg_timeout: Duration::from_secs(parse_or("FFMPEG_TIMEOUT_SECS", FFMPEG_TIMEOUT_SECS)?),
            schedule_runs: parse_or("SCHEDULE_RUNS", SCHEDULE_RUNS)?,
            schedule_interval: Duration::from_secs(parse_or("SCHEDULE_INTERVAL_SECS", SCHEDULE_INTERVAL_SECS)?),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for (direction, server) in [("DOWNLOAD", &self.download), ("UPLOAD", &self.upload)] {
            if server.host.trim().is_empty() {
                return Err(anyhow::anyhow!("{}_FTP_HOST must not be empty", direction));
            }
            if server.username.is_empty() {
                return Err(anyhow::anyhow!("{}_FTP_USER must not be empty", direction));
            }
        }

        if self.publish_temp_suffix.is_empty() {
            return Err(anyhow::anyhow!(
                "PUBLISH_TEMP_SUFFIX must not be empty, uploads would overwrite the published file directly"
            ));
        }

        if !self.public_base_url.starts_with("http://") && !self.public_base_url.starts_with("https://") {
            return Err(anyhow::anyhow!("PUBLIC_BASE_URL must be an http(s) URL"));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow::anyhow!("JPEG_QUALITY must be between 1 and 100"));
        }

        if self.ffmpeg_timeout.is_zero() {
            return Err(anyhow::anyhow!("FFMPEG_TIMEOUT_SECS must be greater than 0"));
        }

        Ok(())
    }
}

fn server_from_env(
    direction: &str,
    shared_host: Option<&str>,
    shared_port: u16,
    connect_timeout: Duration,
) -> Result<ServerConfig, anyhow::Error> {
    let host = env::var(format!("{direction}_FTP_HOST"))
        .ok()
        .or_else(|| shared_host.map(String::from))
        .ok_or_else(|| anyhow::anyhow!("{direction}_FTP_HOST or FTP_HOST must be set"))?;

    Ok(ServerConfig {
        host,
        port: parse_or(&format!("{direction}_FTP_PORT"), shared_port)?,
        username: env::var(format!("{direction}_FTP_USER"))
            .map_err(|_| anyhow::anyhow!("{direction}_FTP_USER must be set"))?,
        password: env::var(format!("{direction}_FTP_PASSWORD"))
            .map_err(|_| anyhow::anyhow!("{direction}_FTP_PASSWORD must be set"))?,
        connect_timeout,
    })
}

fn parse_or<T>(name: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> ServerConfig {
        ServerConfig {
            host: "ftp.example.org".to_string(),
            port: 21,
            username: "cam".to_string(),
            password: "secret".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    fn config() -> RelayConfig {
        RelayConfig {
            download: server(),
            upload: server(),
            public_base_url: PUBLIC_BASE_URL.to_string(),
            cameras_file: PathBuf::from("webcams.json"),
            download_retry: RetryPolicy::default(),
            upload_retry: RetryPolicy::default(),
            cycle_retry: RetryPolicy::default(),
            not_found_grace: Duration::from_secs(6),
            publish_temp_suffix: ".tmp".to_string(),
            label_timezone: chrono_tz::America::Denver,
            jpeg_quality: 90,
            ffmpeg_path: "ffmpeg".to_string(),
            ffmpeg_timeout: Duration::from_secs(600),
            schedule_runs: 2,
            schedule_interval: Duration::from_secs(45),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_empty_suffix_rejected() {
        let mut c = config();
        c.publish_temp_suffix.clear();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_base_url_must_be_http() {
        let mut c = config();
        c.public_base_url = "ftp://glacier.org".to_string();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_jpeg_quality_bounds() {
        let mut c = config();
        c.jpeg_quality = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let printed = format!("{:?}", server());
        assert!(!printed.contains("secret"));
        assert_eq!(server().describe(), "cam@ftp.example.org:21");
    }
}
