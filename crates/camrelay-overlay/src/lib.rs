//! Camrelay Overlay Library
//!
//! Image annotation for camera frames:
//! - Logo: paste a scaled logo, optionally replacing the burned-in timestamp
//! - Temperature: a translucent badge with a live reading
//! - Composite: a chain of overlays, each stage annotating the previous output
//!
//! Every overlay keeps its own output buffer, valid until the next call to
//! [`Overlay::apply`].

pub mod composite;
pub mod error;
pub mod factory;
pub mod logo;
pub mod overlay;
pub mod render;
pub mod temperature;

// Re-export commonly used types
pub use composite::CompositeOverlay;
pub use error::{OverlayError, OverlayResult};
pub use factory::OverlayFactory;
pub use logo::{CoverDate, LogoOverlay, LogoSettings};
pub use overlay::Overlay;
pub use temperature::{
    badge_text, FeedError, HttpTemperatureFeed, TemperatureFeed, TemperatureOverlay,
    TemperatureSettings,
};
