//! Containment-checked filesystem locations.

use std::path::PathBuf;

use url::Url;

use crate::LanternResolverError;

/// A directory in the filesystem, represented as a `file:` URL.
///
/// Child paths are resolved with URL join semantics, which normalize dot
/// segments (including percent-encoded ones) before the containment check
/// runs. A segment that would land outside this location fails with
/// [`LanternResolverError::Containment`], which is the hardening boundary
/// for caller-supplied identifiers.
#[derive(Clone, Debug)]
#[repr(transparent)]
pub struct Location(Url);

impl TryFrom<Url> for Location {
    type Error = LanternResolverError;

    fn try_from(mut url: Url) -> Result<Self, Self::Error> {
        if url.scheme() != "file" {
            return Err(LanternResolverError::Io(format!(
                "Expected file: URL, got {}:",
                url.scheme()
            )));
        }

        // Trailing slash gives the URL directory semantics for joins
        if !url.path().ends_with('/') {
            url.set_path(&format!("{}/", url.path()));
        }

        Ok(Self(url))
    }
}

impl TryFrom<String> for Location {
    type Error = LanternResolverError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Location::try_from(s.as_str())
    }
}

impl TryFrom<&str> for Location {
    type Error = LanternResolverError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let url =
            Url::parse(s).map_err(|e| LanternResolverError::Io(format!("Invalid URL: {e}")))?;
        url.try_into()
    }
}

impl TryFrom<PathBuf> for Location {
    type Error = LanternResolverError;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        let absolute = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()
                .map_err(|e| LanternResolverError::Io(e.to_string()))?
                .join(path)
        };

        let url = Url::from_file_path(&absolute).map_err(|_| {
            LanternResolverError::Io("Invalid path for URL conversion".to_string())
        })?;

        url.try_into()
    }
}

impl TryFrom<Location> for PathBuf {
    type Error = LanternResolverError;

    fn try_from(location: Location) -> Result<Self, Self::Error> {
        location
            .0
            .to_file_path()
            .map_err(|_| LanternResolverError::Io("Failed to convert URL to path".to_string()))
    }
}

impl Location {
    /// Returns the URL path component of this location.
    pub fn path(&self) -> &str {
        self.0.path()
    }

    /// Resolves a path segment relative to this location, validating
    /// containment.
    ///
    /// The segment is prefixed with `./` so that segments containing `:`
    /// cannot be parsed as URL schemes. After joining, the result's path
    /// must still start with this location's path; anything else (reached
    /// via `..`, encoded dot segments, or similar) is a containment error.
    pub fn resolve(&self, segment: &str) -> Result<Self, LanternResolverError> {
        // Re-normalize: a location produced by resolve() names a file, and
        // joining against it without the trailing slash would produce a
        // sibling instead of a child.
        let base = if self.0.path().ends_with('/') {
            self.0.clone()
        } else {
            let mut url = self.0.clone();
            url.set_path(&format!("{}/", self.0.path()));
            url
        };

        let relative_segment = format!("./{}", segment);

        let joined = base
            .join(&relative_segment)
            .map_err(|e| LanternResolverError::Io(format!("Invalid path segment: {e}")))?;

        if !joined.path().starts_with(base.path()) {
            return Err(LanternResolverError::Containment(format!(
                "Path '{}' escapes base '{}'",
                segment,
                base.as_str()
            )));
        }

        Ok(Self(joined))
    }

    /// Ensures this location exists as a directory.
    pub async fn ensure_dir(&self) -> Result<(), LanternResolverError> {
        let path: PathBuf = self.clone().try_into()?;
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| LanternResolverError::Io(e.to_string()))
    }
}
