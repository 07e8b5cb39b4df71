//! Overlay chains

use async_trait::async_trait;

use crate::error::OverlayResult;
use crate::overlay::Overlay;

/// An ordered chain of overlays applied as one.
///
/// The first stage reads the job's source bytes, every later stage reads the
/// previous stage's output, and the composite's output is a copy of the last
/// stage's. An empty chain passes the source through unchanged.
pub struct CompositeOverlay {
    stages: Vec<Box<dyn Overlay>>,
    subname: Option<String>,
    output: Vec<u8>,
}

impl CompositeOverlay {
    /// Without an explicit subname the composite publishes under the first
    /// stage's.
    pub fn new(stages: Vec<Box<dyn Overlay>>, subname: Option<String>) -> Self {
        let subname = subname.or_else(|| {
            stages
                .first()
                .and_then(|stage| stage.subname().map(String::from))
        });
        Self {
            stages,
            subname,
            output: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[async_trait]
impl Overlay for CompositeOverlay {
    async fn apply(&mut self, source: &[u8], label: &str) -> OverlayResult<()> {
        for i in 0..self.stages.len() {
            let (done, rest) = self.stages.split_at_mut(i);
            let input = match done.last() {
                Some(previous) => previous.output(),
                None => source,
            };
            rest[0].apply(input, label).await?;
        }

        self.output = match self.stages.last() {
            Some(last) => last.output().to_vec(),
            None => source.to_vec(),
        };
        Ok(())
    }

    fn output(&self) -> &[u8] {
        &self.output
    }

    fn subname(&self) -> Option<&str> {
        self.subname.as_deref()
    }

    fn kind(&self) -> &'static str {
        "composite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OverlayError;
    use crate::logo::{LogoOverlay, LogoSettings};
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    /// Appends a marker byte; fails on a configured input
    struct Marker {
        mark: u8,
        fail_on: Option<Vec<u8>>,
        subname: Option<String>,
        output: Vec<u8>,
    }

    impl Marker {
        fn new(mark: u8) -> Self {
            Self {
                mark,
                fail_on: None,
                subname: None,
                output: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Overlay for Marker {
        async fn apply(&mut self, source: &[u8], _label: &str) -> OverlayResult<()> {
            if self.fail_on.as_deref() == Some(source) {
                return Err(OverlayError::InvalidConfig("marker".to_string()));
            }
            self.output = source.to_vec();
            self.output.push(self.mark);
            Ok(())
        }

        fn output(&self) -> &[u8] {
            &self.output
        }

        fn subname(&self) -> Option<&str> {
            self.subname.as_deref()
        }

        fn kind(&self) -> &'static str {
            "marker"
        }
    }

    fn png(img: &RgbaImage) -> Vec<u8> {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn logo(place: (i64, i64), color: [u8; 4]) -> LogoOverlay {
        LogoOverlay::from_image(
            LogoSettings {
                place,
                size: (30, 30),
                subname: None,
                cover_date: None,
                jpeg_quality: 90,
            },
            RgbaImage::from_pixel(30, 30, Rgba(color)),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let mut composite = CompositeOverlay::new(
            vec![Box::new(Marker::new(b'a')), Box::new(Marker::new(b'b'))],
            None,
        );

        composite.apply(b"src", "").await.unwrap();

        assert_eq!(composite.output(), b"srcab");
    }

    #[tokio::test]
    async fn test_matches_manual_chaining() {
        let source = png(&RgbaImage::from_pixel(120, 80, Rgba([255, 255, 255, 255])));

        let mut a = logo((0, 0), [255, 0, 0, 255]);
        let mut b = logo((60, 40), [0, 0, 255, 255]);
        a.apply(&source, "").await.unwrap();
        b.apply(a.output(), "").await.unwrap();

        let mut composite = CompositeOverlay::new(
            vec![
                Box::new(logo((0, 0), [255, 0, 0, 255])),
                Box::new(logo((60, 40), [0, 0, 255, 255])),
            ],
            None,
        );
        composite.apply(&source, "").await.unwrap();

        assert_eq!(composite.output(), b.output());
    }

    #[tokio::test]
    async fn test_failing_stage_aborts_chain() {
        let mut failing = Marker::new(b'b');
        failing.fail_on = Some(b"srca".to_vec());
        let mut composite = CompositeOverlay::new(
            vec![
                Box::new(Marker::new(b'a')),
                Box::new(failing),
                Box::new(Marker::new(b'c')),
            ],
            None,
        );

        assert!(composite.apply(b"src", "").await.is_err());
        assert!(composite.output().is_empty());
    }

    #[tokio::test]
    async fn test_empty_chain_passes_source_through() {
        let mut composite = CompositeOverlay::new(Vec::new(), None);
        assert!(composite.is_empty());

        composite.apply(b"raw", "").await.unwrap();

        assert_eq!(composite.output(), b"raw");
    }

    #[test]
    fn test_subname_inherited_from_first_stage() {
        let mut first = Marker::new(b'a');
        first.subname = Some("temp".to_string());
        let composite = CompositeOverlay::new(vec![Box::new(first), Box::new(Marker::new(b'b'))], None);
        assert_eq!(composite.output_name("alpha"), "alpha_temp.jpg");

        let explicit = CompositeOverlay::new(vec![Box::new(Marker::new(b'a'))], Some("x".to_string()));
        assert_eq!(explicit.subname(), Some("x"));
    }

    #[tokio::test]
    async fn test_nested_composite() {
        let inner = CompositeOverlay::new(
            vec![Box::new(Marker::new(b'a')), Box::new(Marker::new(b'b'))],
            None,
        );
        let mut outer = CompositeOverlay::new(vec![Box::new(inner), Box::new(Marker::new(b'c'))], None);

        outer.apply(b">", "").await.unwrap();

        assert_eq!(outer.output(), b">abc");
    }
}
