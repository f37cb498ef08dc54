//! Local filesystem resolution.

use std::path::PathBuf;

use async_trait::async_trait;
use lantern_image::Identifier;

use crate::{FileResolver, LanternResolverError, Location, Resolution};

/// Resolves identifiers as files under a configured root directory.
///
/// The identifier is joined to the root through [`Location`], so traversal
/// attempts fail before any filesystem access happens. The identifier is
/// probed as given first, then with each configured source extension
/// appended; the first existing file wins.
#[derive(Clone, Debug)]
pub struct LocalResolver {
    root: Location,
    extensions: Vec<String>,
}

impl LocalResolver {
    /// Source extensions probed by default, in order.
    pub const DEFAULT_EXTENSIONS: &'static [&'static str] = &["jpg", "jpeg", "png", "tif", "tiff"];

    /// Creates a resolver rooted at `root`.
    ///
    /// Accepts a `PathBuf`, `file:` URL string, or `Url`.
    pub fn new(
        root: impl TryInto<Location, Error = LanternResolverError>,
    ) -> Result<Self, LanternResolverError> {
        Ok(Self {
            root: root.try_into()?,
            extensions: Self::DEFAULT_EXTENSIONS
                .iter()
                .map(|extension| extension.to_string())
                .collect(),
        })
    }

    /// Replaces the probed source extensions.
    pub fn with_extensions(
        mut self,
        extensions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    async fn probe(&self, segment: &str) -> Result<Option<PathBuf>, LanternResolverError> {
        let path: PathBuf = self.root.resolve(segment)?.try_into()?;

        match tokio::fs::try_exists(&path).await {
            Ok(true) => Ok(Some(path)),
            Ok(false) => Ok(None),
            Err(error) => Err(LanternResolverError::Io(format!("{error}"))),
        }
    }
}

#[async_trait]
impl FileResolver for LocalResolver {
    async fn resolve(
        &self,
        identifier: &Identifier,
    ) -> Result<Resolution, LanternResolverError> {
        if let Some(path) = self.probe(identifier.as_str()).await? {
            return Ok(Resolution::Resolved(path));
        }

        for extension in &self.extensions {
            let candidate = format!("{}.{}", identifier.as_str(), extension);
            if let Some(path) = self.probe(&candidate).await? {
                return Ok(Resolution::Resolved(path));
            }
        }

        Ok(Resolution::NotFound)
    }
}
