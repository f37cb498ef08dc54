//! Per-request image resources.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde_json::{Map, Value};

use crate::{
    Dimensions, Identifier, ImagePipeline, LanternImageError, ParameterSet, RenderedImage,
};

/// An [`ImageResource`] couples an identifier with a resolved source file
/// and the pipeline that can transform it. Resources are built fresh for
/// every request and dropped when the response is sent; the source path
/// may point into a long-lived cache the resource does not own.
#[derive(Clone)]
pub struct ImageResource {
    identifier: Identifier,
    source: PathBuf,
    pipeline: Arc<dyn ImagePipeline>,
}

impl ImageResource {
    /// Creates a resource for `identifier` backed by the file at `source`.
    pub fn new(identifier: Identifier, source: PathBuf, pipeline: Arc<dyn ImagePipeline>) -> Self {
        Self {
            identifier,
            source,
            pipeline,
        }
    }

    /// The identifier this resource was built for.
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// The resolved local path of the source image.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Renders this resource according to `parameters`.
    pub async fn render(
        &self,
        parameters: &ParameterSet,
    ) -> Result<RenderedImage, LanternImageError> {
        self.pipeline.render(&self.source, parameters).await
    }

    /// Probes the source image's pixel dimensions.
    pub async fn dimensions(&self) -> Result<Dimensions, LanternImageError> {
        self.pipeline.dimensions(&self.source).await
    }

    /// Describes this resource for the information document: currently the
    /// source image's `width` and `height`.
    pub async fn describe(&self) -> Result<Map<String, Value>, LanternImageError> {
        let dimensions = self.dimensions().await?;

        let mut description = Map::new();
        description.insert("width".into(), Value::from(dimensions.width));
        description.insert("height".into(), Value::from(dimensions.height));

        Ok(description)
    }
}
