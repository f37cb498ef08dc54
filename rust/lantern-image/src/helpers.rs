//! Test fixtures for pipeline-dependent code.

use std::path::Path;

use async_trait::async_trait;

use crate::{Dimensions, ImagePipeline, LanternImageError, ParameterSet, RenderedImage};

/// An [`ImagePipeline`] that echoes the source bytes unchanged and reports
/// fixed dimensions, so tests can assert on exact payloads without a real
/// image toolchain installed.
#[derive(Debug, Clone)]
pub struct StubPipeline {
    dimensions: Dimensions,
}

impl StubPipeline {
    /// Creates a stub that reports the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            dimensions: Dimensions { width, height },
        }
    }
}

impl Default for StubPipeline {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

#[async_trait]
impl ImagePipeline for StubPipeline {
    async fn render(
        &self,
        source: &Path,
        parameters: &ParameterSet,
    ) -> Result<RenderedImage, LanternImageError> {
        let bytes = tokio::fs::read(source)
            .await
            .map_err(|error| LanternImageError::Io(format!("{error}")))?;

        Ok(RenderedImage {
            bytes: bytes.into(),
            media_type: parameters.format.media_type().to_string(),
        })
    }

    async fn dimensions(&self, _source: &Path) -> Result<Dimensions, LanternImageError> {
        Ok(self.dimensions)
    }
}
