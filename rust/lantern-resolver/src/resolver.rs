//! Identifier resolution strategies.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lantern_image::Identifier;

use crate::LanternResolverError;

mod local;
pub use local::*;

mod remote;
pub use remote::*;

/// The outcome of resolving an identifier to a local source file.
///
/// Absence is a first-class outcome rather than an error: the request
/// handler branches on [`Resolution::NotFound`] to substitute the
/// configured not-found image, while errors mean the resolver itself
/// could not do its job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The identifier names a readable local file
    Resolved(PathBuf),
    /// No source exists for this identifier
    NotFound,
}

impl Resolution {
    /// Returns the resolved path, if there is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Resolution::Resolved(path) => Some(path),
            Resolution::NotFound => None,
        }
    }
}

/// A strategy for turning identifiers into local source files.
///
/// Implementations may consult the local filesystem, a remote object
/// store, or anything else addressable; whatever the strategy, the
/// returned path must reference a fully written, readable file.
#[async_trait]
pub trait FileResolver: Send + Sync {
    /// Resolves `identifier` to a local file, fetching and caching remote
    /// bytes when the strategy calls for it.
    async fn resolve(&self, identifier: &Identifier)
    -> Result<Resolution, LanternResolverError>;
}
