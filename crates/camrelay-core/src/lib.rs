//! Camrelay Core Library
//!
//! Shared building blocks for the webcam relay: environment configuration,
//! camera and overlay definitions, the bounded retry policy, timestamp labels
//! and the failure taxonomy every job reports against.

pub mod camera;
pub mod config;
pub mod error;
pub mod retry;
pub mod timestamp;

// Re-export commonly used types
pub use camera::{
    load_cameras, CamerasFile, LogoSpec, OverlayEntry, OverlaySpec, TemperatureSpec, VideoSpec,
    WebcamSpec,
};
pub use config::{RelayConfig, ServerConfig};
pub use error::{Classify, FailureKind};
pub use retry::RetryPolicy;
pub use timestamp::format_label;
