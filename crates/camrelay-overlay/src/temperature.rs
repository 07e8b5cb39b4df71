//! Temperature badge overlay
//!
//! The reading comes from a plaintext HTTP endpoint. The endpoint is treated as
//! unreliable: any failure renders the placeholder instead of failing the
//! overlay.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ab_glyph::FontArc;
use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use rand::Rng;
use thiserror::Error;

use crate::error::OverlayResult;
use crate::overlay::Overlay;
use crate::render::{self, TextStyle};

pub const FEED_TIMEOUT: Duration = Duration::from_secs(10);
pub const FEED_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Reading the endpoint reports when the sensor has no value
const UNAVAILABLE: &str = "N/A";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Temperature request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Temperature feed unavailable: {0}")]
    Unavailable(String),
}

/// Source of the current temperature reading
#[async_trait]
pub trait TemperatureFeed: Send + Sync {
    /// Raw reading, e.g. `"42"` or `"N/A"`
    async fn current(&self) -> Result<String, FeedError>;

    fn describe(&self) -> String;
}

/// Feed backed by an HTTP endpoint returning the reading as plain text
pub struct HttpTemperatureFeed {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTemperatureFeed {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Client with the feed timeout and a browser User-Agent; the endpoint
    /// refuses obvious scripts.
    pub fn build_client() -> Result<reqwest::Client, FeedError> {
        Ok(reqwest::Client::builder()
            .timeout(FEED_TIMEOUT)
            .user_agent(FEED_USER_AGENT)
            .build()?)
    }
}

#[async_trait]
impl TemperatureFeed for HttpTemperatureFeed {
    async fn current(&self) -> Result<String, FeedError> {
        // Defeats intermediate caches
        let nonce: u32 = rand::rng().random_range(1000..10000);
        let start = Instant::now();

        let body = self
            .client
            .get(&self.endpoint)
            .query(&[("rand", nonce)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        tracing::debug!(
            endpoint = %self.endpoint,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Fetched temperature"
        );

        Ok(body.trim().to_string())
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

/// Badge text for a raw reading; `None` when there is nothing to show.
pub fn badge_text(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == UNAVAILABLE {
        return None;
    }
    Some(format!("{} °F", raw))
}

#[derive(Debug, Clone)]
pub struct TemperatureSettings {
    /// Top-left corner of the badge; top-right of the frame when absent
    pub place: Option<(i64, i64)>,
    pub badge_size: (u32, u32),
    pub background: Rgba<u8>,
    pub font_size: f32,
    pub text_color: Rgba<u8>,
    /// Pixels the text is raised above the badge's vertical center
    pub text_lift: i32,
    pub placeholder: String,
    pub subname: Option<String>,
    pub jpeg_quality: u8,
}

impl Default for TemperatureSettings {
    fn default() -> Self {
        Self {
            place: None,
            badge_size: (175, 44),
            background: Rgba([0, 0, 0, 64]),
            font_size: 38.0,
            text_color: Rgba([255, 255, 255, 255]),
            text_lift: 10,
            placeholder: String::new(),
            subname: None,
            jpeg_quality: render::DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Translucent badge with the current temperature
pub struct TemperatureOverlay {
    settings: TemperatureSettings,
    feed: Arc<dyn TemperatureFeed>,
    style: TextStyle,
    output: Vec<u8>,
}

impl TemperatureOverlay {
    pub fn new(
        settings: TemperatureSettings,
        feed: Arc<dyn TemperatureFeed>,
        font: Option<FontArc>,
    ) -> Self {
        let style = TextStyle::new(font, settings.font_size, settings.text_color);
        Self {
            settings,
            feed,
            style,
            output: Vec::new(),
        }
    }

    /// Badge text, or the placeholder when the feed fails or has no value.
    pub async fn reading(&self) -> String {
        match self.feed.current().await {
            Ok(raw) => badge_text(&raw).unwrap_or_else(|| self.settings.placeholder.clone()),
            Err(e) => {
                tracing::warn!(
                    feed = %self.feed.describe(),
                    error = %e,
                    "Temperature unavailable, using placeholder"
                );
                self.settings.placeholder.clone()
            }
        }
    }

    /// Badge position for a frame of the given width
    pub fn position(&self, frame_width: u32) -> (i64, i64) {
        match self.settings.place {
            Some(place) => place,
            None => (i64::from(frame_width) - i64::from(self.settings.badge_size.0), 0),
        }
    }

    pub fn render(&self, frame: &mut RgbaImage, text: &str) {
        let (width, height) = self.settings.badge_size;
        if width == 0 || height == 0 {
            return;
        }

        let mut badge = RgbaImage::from_pixel(width, height, self.settings.background);
        let (text_width, text_height) = self.style.measure(text);
        let tx = (i64::from(width) - i64::from(text_width)) / 2;
        let ty = (i64::from(height) - i64::from(text_height)) / 2 - i64::from(self.settings.text_lift);
        self.style.draw(&mut badge, clamp_i32(tx), clamp_i32(ty), text);

        let (x, y) = self.position(frame.width());
        render::paste_masked(frame, &badge, x, y);
    }
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[async_trait]
impl Overlay for TemperatureOverlay {
    async fn apply(&mut self, source: &[u8], _label: &str) -> OverlayResult<()> {
        let mut frame = render::decode_frame(source)?;
        let text = self.reading().await;
        self.render(&mut frame, &text);
        self.output = render::encode_jpeg(&frame, self.settings.jpeg_quality)?;
        Ok(())
    }

    fn output(&self) -> &[u8] {
        &self.output
    }

    fn subname(&self) -> Option<&str> {
        self.settings.subname.as_deref()
    }

    fn kind(&self) -> &'static str {
        "temperature"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StaticFeed(Result<&'static str, &'static str>, AtomicU32);

    impl StaticFeed {
        fn ok(value: &'static str) -> Arc<Self> {
            Arc::new(Self(Ok(value), AtomicU32::new(0)))
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self(Err("connection refused"), AtomicU32::new(0)))
        }
    }

    #[async_trait]
    impl TemperatureFeed for StaticFeed {
        async fn current(&self) -> Result<String, FeedError> {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0
                .map(String::from)
                .map_err(|e| FeedError::Unavailable(e.to_string()))
        }

        fn describe(&self) -> String {
            "static".to_string()
        }
    }

    fn png(img: &RgbaImage) -> Vec<u8> {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_badge_text() {
        assert_eq!(badge_text("42"), Some("42 °F".to_string()));
        assert_eq!(badge_text(" -3\n"), Some("-3 °F".to_string()));
        assert_eq!(badge_text("N/A"), None);
        assert_eq!(badge_text(""), None);
    }

    #[tokio::test]
    async fn test_reading_falls_back_to_placeholder() {
        let settings = TemperatureSettings {
            placeholder: "--".to_string(),
            ..Default::default()
        };

        let failing = TemperatureOverlay::new(settings.clone(), StaticFeed::failing(), None);
        assert_eq!(failing.reading().await, "--");

        let unavailable = TemperatureOverlay::new(settings.clone(), StaticFeed::ok("N/A"), None);
        assert_eq!(unavailable.reading().await, "--");

        let ok = TemperatureOverlay::new(settings, StaticFeed::ok("57"), None);
        assert_eq!(ok.reading().await, "57 °F");
    }

    #[tokio::test]
    async fn test_feed_failure_does_not_fail_overlay() {
        let feed = StaticFeed::failing();
        let source = png(&RgbaImage::from_pixel(400, 200, Rgba([255, 255, 255, 255])));
        let mut overlay = TemperatureOverlay::new(TemperatureSettings::default(), feed.clone(), None);

        overlay.apply(&source, "").await.unwrap();

        assert_eq!(feed.1.load(Ordering::SeqCst), 1);
        let out = render::decode_frame(overlay.output()).unwrap();
        assert_eq!(out.dimensions(), (400, 200));
    }

    #[tokio::test]
    async fn test_badge_anchored_to_decoded_width() {
        let settings = TemperatureSettings {
            background: Rgba([0, 0, 0, 255]),
            ..Default::default()
        };
        let mut overlay = TemperatureOverlay::new(settings, StaticFeed::ok("40"), None);
        assert_eq!(overlay.position(640), (465, 0));

        let source = png(&RgbaImage::from_pixel(640, 120, Rgba([255, 255, 255, 255])));
        overlay.apply(&source, "").await.unwrap();

        let out = render::decode_frame(overlay.output()).unwrap();
        let dark = |x, y| out.get_pixel(x, y)[0] < 40;
        assert!(dark(630, 20));
        assert!(dark(480, 30));
        assert!(!dark(450, 20));
        assert!(!dark(630, 60));
    }

    #[tokio::test]
    async fn test_translucent_background_blends() {
        let mut overlay =
            TemperatureOverlay::new(TemperatureSettings::default(), StaticFeed::ok("40"), None);
        let source = png(&RgbaImage::from_pixel(300, 100, Rgba([255, 255, 255, 255])));
        overlay.apply(&source, "").await.unwrap();

        let out = render::decode_frame(overlay.output()).unwrap();
        let shaded = out.get_pixel(290, 20)[0];
        assert!(shaded > 150 && shaded < 230, "got {}", shaded);
    }

    #[tokio::test]
    async fn test_fixed_place_wins() {
        let settings = TemperatureSettings {
            place: Some((5, 7)),
            ..Default::default()
        };
        let overlay = TemperatureOverlay::new(settings, StaticFeed::ok("1"), None);
        assert_eq!(overlay.position(2000), (5, 7));
    }

    #[tokio::test]
    async fn test_corrupted_source_skips_feed() {
        let feed = StaticFeed::ok("40");
        let mut overlay = TemperatureOverlay::new(TemperatureSettings::default(), feed.clone(), None);

        let err = overlay.apply(b"garbage", "").await.unwrap_err();
        assert!(err.is_corrupted_image());
        assert_eq!(feed.1.load(Ordering::SeqCst), 0);
    }
}
