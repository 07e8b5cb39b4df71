//! Logo overlay

use std::path::PathBuf;
use std::sync::Arc;

use ab_glyph::FontArc;
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};

use crate::error::{OverlayError, OverlayResult};
use crate::overlay::Overlay;
use crate::render::{self, TextStyle};

/// Area masking the timestamp the camera burns into its frames, and where the
/// replacement label is drawn.
#[derive(Debug, Clone)]
pub struct CoverDate {
    pub origin: (i32, i32),
    pub size: (u32, u32),
    pub fill: Rgba<u8>,
    /// Label offset relative to `origin`
    pub label_offset: (i32, i32),
    pub font_size: f32,
    pub text_color: Rgba<u8>,
}

impl Default for CoverDate {
    fn default() -> Self {
        Self {
            origin: (0, 0),
            size: (215, 26),
            fill: Rgba([0, 0, 0, 255]),
            label_offset: (4, 3),
            font_size: 16.0,
            text_color: Rgba([255, 255, 255, 255]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogoSettings {
    pub place: (i64, i64),
    pub size: (u32, u32),
    pub subname: Option<String>,
    pub cover_date: Option<CoverDate>,
    pub jpeg_quality: u8,
}

enum LogoAsset {
    /// Not read yet
    Path(PathBuf),
    /// Scaled to the configured size
    Ready(Arc<RgbaImage>),
}

/// Pastes a scaled logo onto the frame, optionally replacing the camera's own
/// timestamp with the supplied label.
pub struct LogoOverlay {
    settings: LogoSettings,
    asset: LogoAsset,
    label_style: TextStyle,
    /// Label font still to be read
    pending_font: Option<PathBuf>,
    output: Vec<u8>,
}

impl LogoOverlay {
    /// Logo (and, with a cover date, the label font) read from disk on first
    /// use. A missing or unreadable file fails that `apply`.
    pub fn from_path(
        settings: LogoSettings,
        path: impl Into<PathBuf>,
        label_font: Option<PathBuf>,
    ) -> Self {
        let label_style = label_style(&settings, None);
        Self {
            settings,
            asset: LogoAsset::Path(path.into()),
            label_style,
            pending_font: label_font,
            output: Vec::new(),
        }
    }

    /// In-memory logo. Without a label font the cover box is drawn with no
    /// text on it.

    pub fn from_image(
        settings: LogoSettings,
        logo: RgbaImage,
        label_font: Option<FontArc>,
    ) -> OverlayResult<Self> {
        let scaled = scale_logo(logo, settings.size)?;
        let label_style = label_style(&settings, label_font);
        Ok(Self {
            settings,
            asset: LogoAsset::Ready(Arc::new(scaled)),
            label_style,
            pending_font: None,
            output: Vec::new(),
        })
    }

    pub fn settings(&self) -> &LogoSettings {
        &self.settings
    }

    fn logo(&mut self) -> OverlayResult<Arc<RgbaImage>> {
        let path = match &self.asset {
            LogoAsset::Ready(logo) => return Ok(logo.clone()),
            LogoAsset::Path(path) => path.clone(),
        };

        let scaled = Arc::new(scale_logo(render::load_asset(&path)?, self.settings.size)?);
        tracing::debug!(
            path = %path.display(),
            width = scaled.width(),
            height = scaled.height(),
            "Loaded logo"
        );
        self.asset = LogoAsset::Ready(scaled.clone());
        Ok(scaled)
    }

    fn load_label_font(&mut self) -> OverlayResult<()> {
        if self.settings.cover_date.is_none() {
            return Ok(());
        }
        if let Some(path) = &self.pending_font {
            let font = render::read_font(path)?;
            tracing::debug!(path = %path.display(), "Loaded label font");
            self.label_style.font = Some(font);
            self.pending_font = None;
        }
        Ok(())
    }

    /// Draw onto a decoded frame.
    pub fn render(&self, frame: &mut RgbaImage, logo: &RgbaImage, label: &str) {
        let (x, y) = self.settings.place;
        render::paste_masked(frame, logo, x, y);

        if let Some(cover) = &self.settings.cover_date {
            let (cx, cy) = cover.origin;
            render::fill_rect(frame, cx, cy, cover.size, cover.fill);
            self.label_style.draw(
                frame,
                cx + cover.label_offset.0,
                cy + cover.label_offset.1,
                label,
            );
        }
    }
}

fn label_style(settings: &LogoSettings, font: Option<FontArc>) -> TextStyle {
    let cover = settings.cover_date.clone().unwrap_or_default();
    TextStyle::new(font, cover.font_size, cover.text_color)
}

fn scale_logo(logo: RgbaImage, size: (u32, u32)) -> OverlayResult<RgbaImage> {
    let (width, height) = size;
    if width == 0 || height == 0 {
        return Err(OverlayError::InvalidConfig(format!(
            "logo size must be positive, got {}x{}",
            width, height
        )));
    }
    if logo.dimensions() == size {
        return Ok(logo);
    }
    Ok(image::imageops::resize(&logo, width, height, FilterType::CatmullRom))
}

#[async_trait]
impl Overlay for LogoOverlay {
    async fn apply(&mut self, source: &[u8], label: &str) -> OverlayResult<()> {
        let logo = self.logo()?;
        self.load_label_font()?;
        let mut frame = render::decode_frame(source)?;
        self.render(&mut frame, &logo, label);
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
        "logo"
    }
}
