//! Pluggable authorization over image resources.

use async_trait::async_trait;
use lantern_image::ImageResource;
use serde_json::{Map, Value};
use url::Url;

/// The request kinds an [`AuthorizationPolicy`] gates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageAction {
    /// Rendering transformed image bytes
    Show,
    /// Describing the image as `info.json`
    Info,
}

/// Decides what a caller may see of an image resource.
///
/// Denial is not an error. A denied [`ImageAction::Show`] still returns
/// image bytes (the configured substitute) with an unauthorized status,
/// and a denied [`ImageAction::Info`] either redirects to a degraded
/// alternative or returns the description with an unauthorized status.
/// The handler consumes these answers as ordinary state-machine
/// branches.
#[async_trait]
pub trait AuthorizationPolicy: Send + Sync {
    /// Whether `action` is permitted on `resource`.
    async fn can(&self, action: ImageAction, resource: &ImageResource) -> bool;

    /// Whether a degraded alternative exists for `resource`.
    ///
    /// Consulted only after `can` denied [`ImageAction::Info`]: `true`
    /// turns the denial into a redirect, `false` into an unauthorized
    /// description response.
    async fn has_degraded(&self, _resource: &ImageResource) -> bool {
        false
    }

    /// Where the degraded alternative of `resource` lives.
    async fn degraded_image_uri(&self, _resource: &ImageResource) -> Option<Url> {
        None
    }

    /// Extra key/value pairs merged into the info document for
    /// `resource`, such as licensing or custom service descriptors.
    async fn service_info(&self, _resource: &ImageResource) -> Map<String, Value> {
        Map::new()
    }
}

/// The default policy: everyone may see everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

#[async_trait]
impl AuthorizationPolicy for AllowAll {
    async fn can(&self, _action: ImageAction, _resource: &ImageResource) -> bool {
        true
    }
}
