//! Builds overlays from camera definitions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ab_glyph::FontArc;
use camrelay_core::{LogoSpec, OverlayEntry, OverlaySpec, TemperatureSpec};
use image::Rgba;

use crate::composite::CompositeOverlay;
use crate::error::{OverlayError, OverlayResult};
use crate::logo::{CoverDate, LogoOverlay, LogoSettings};
use crate::overlay::Overlay;
use crate::temperature::{HttpTemperatureFeed, TemperatureFeed, TemperatureOverlay, TemperatureSettings};

/// Overlay factory
///
/// Shares one HTTP client across all temperature feeds and reads each font
/// file once.
pub struct OverlayFactory {
    http: reqwest::Client,
    jpeg_quality: u8,
    fonts: HashMap<PathBuf, Option<FontArc>>,
}

impl OverlayFactory {
    pub fn new(jpeg_quality: u8) -> OverlayResult<Self> {
        let http = HttpTemperatureFeed::build_client()
            .map_err(|e| OverlayError::InvalidConfig(e.to_string()))?;
        Ok(Self::with_client(http, jpeg_quality))
    }

    pub fn with_client(http: reqwest::Client, jpeg_quality: u8) -> Self {
        Self {
            http,
            jpeg_quality,
            fonts: HashMap::new(),
        }
    }

    /// One overlay per configured entry; groups become composites.
    pub fn create_all(&mut self, entries: &[OverlayEntry]) -> Vec<Box<dyn Overlay>> {
        entries.iter().map(|entry| self.create_entry(entry)).collect()
    }

    pub fn create_entry(&mut self, entry: &OverlayEntry) -> Box<dyn Overlay> {
        match entry {
            OverlayEntry::Single(spec) => self.create_overlay(spec),
            OverlayEntry::Group(specs) => {
                let stages = specs.iter().map(|spec| self.create_overlay(spec)).collect();
                Box::new(CompositeOverlay::new(stages, None))
            }
        }
    }

    pub fn create_overlay(&mut self, spec: &OverlaySpec) -> Box<dyn Overlay> {
        match spec {
            OverlaySpec::Logo(logo) => Box::new(self.logo(logo)),
            OverlaySpec::Temperature(temperature) => Box::new(self.temperature(temperature)),
        }
    }

    fn logo(&mut self, spec: &LogoSpec) -> LogoOverlay {
        let label_font = spec.cover_date.then(|| spec.label_font.clone());
        let settings = LogoSettings {
            place: spec.place,
            size: spec.size,
            subname: spec.subname.clone(),
            cover_date: spec.cover_date.then(CoverDate::default),
            jpeg_quality: self.jpeg_quality,
        };
        LogoOverlay::from_path(settings, &spec.img, label_font)
    }

    fn temperature(&mut self, spec: &TemperatureSpec) -> TemperatureOverlay {
        let [r, g, b] = spec.text_color;
        let settings = TemperatureSettings {
            place: spec.place,
            badge_size: spec.bg_size,
            background: Rgba(spec.bg_color),
            font_size: spec.font_size,
            text_color: Rgba([r, g, b, 255]),
            subname: spec.subname.clone(),
            jpeg_quality: self.jpeg_quality,
            ..Default::default()
        };
        let feed: Arc<dyn TemperatureFeed> =
            Arc::new(HttpTemperatureFeed::new(self.http.clone(), spec.endpoint.clone()));
        let font = self.font(&spec.font_path);
        TemperatureOverlay::new(settings, feed, font)
    }

    fn font(&mut self, path: &Path) -> Option<FontArc> {
        self.fonts
            .entry(path.to_path_buf())
            .or_insert_with(|| crate::render::load_font(path))
            .clone()
    }
}
