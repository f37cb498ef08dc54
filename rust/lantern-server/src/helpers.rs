//! Test fixtures for exercising the server.

use async_trait::async_trait;
use lantern_image::ImageResource;
use serde_json::{Map, Value};
use url::Url;

use crate::{AuthorizationPolicy, ImageAction};

/// An [`AuthorizationPolicy`] answering from fixed fields, so tests can
/// put the handler into every authorization branch.
#[derive(Clone, Debug)]
pub struct StaticPolicy {
    /// Whether the image route is permitted
    pub allow_show: bool,
    /// Whether the info route is permitted
    pub allow_info: bool,
    /// Redirect target offered after an info denial
    pub degraded_uri: Option<Url>,
    /// Extra keys merged into every info document
    pub service_info: Map<String, Value>,
}

impl Default for StaticPolicy {
    fn default() -> Self {
        Self {
            allow_show: true,
            allow_info: true,
            degraded_uri: None,
            service_info: Map::new(),
        }
    }
}

#[async_trait]
impl AuthorizationPolicy for StaticPolicy {
    async fn can(&self, action: ImageAction, _resource: &ImageResource) -> bool {
        match action {
            ImageAction::Show => self.allow_show,
            ImageAction::Info => self.allow_info,
        }
    }

    async fn has_degraded(&self, _resource: &ImageResource) -> bool {
        self.degraded_uri.is_some()
    }

    async fn degraded_image_uri(&self, _resource: &ImageResource) -> Option<Url> {
        self.degraded_uri.clone()
    }

    async fn service_info(&self, _resource: &ImageResource) -> Map<String, Value> {
        self.service_info.clone()
    }
}
