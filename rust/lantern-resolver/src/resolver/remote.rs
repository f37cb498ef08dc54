//! Remote object resolution with a locator-addressed disk cache.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Weak},
    time::Instant,
};

use futures_util::StreamExt;
use lantern_image::Identifier;
use tokio::{
    fs::{File, create_dir_all, rename, try_exists},
    io::AsyncWriteExt,
    sync::Mutex,
};
use url::Url;

use crate::{FileResolver, LanternResolverError, ObjectStore, Resolution};

/// Maps identifiers to remote object locators.
///
/// The mapping is configuration, not convention: a
/// [`RemoteCachingResolver`] cannot be constructed without one. Returning
/// `None` declines the identifier, which resolves as
/// [`Resolution::NotFound`].
pub type LocatorMapping = Arc<dyn Fn(&Identifier) -> Option<Url> + Send + Sync>;

/// Settings for a [`RemoteCachingResolver`].
#[derive(Clone)]
pub struct RemoteCacheConfig {
    /// Directory holding cached remote objects; created on demand
    pub cache_dir: PathBuf,
    /// The identifier-to-locator mapping
    pub mapping: LocatorMapping,
}

impl RemoteCacheConfig {
    /// Creates a configuration from a cache directory and a mapping
    /// closure.
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        mapping: impl Fn(&Identifier) -> Option<Url> + Send + Sync + 'static,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            mapping: Arc::new(mapping),
        }
    }
}

/// Resolves identifiers by fetching remote objects into a local cache
/// addressed by locator digest.
///
/// The cache key is the MD5 digest of the locator string, so exactly one
/// local file exists per unique remote address; identical bytes behind
/// two locators are cached twice, trading disk for never re-reading
/// payloads. Entries are written to a temporary file and committed with
/// an atomic rename: a file observed at its final path is always
/// complete. The cache is append-only; nothing here evicts.
///
/// Concurrent resolutions of the same uncached locator elect a single
/// fetcher through a per-key gate; followers wait and then find the file
/// already in place.
#[derive(Clone)]
pub struct RemoteCachingResolver<Store>
where
    Store: ObjectStore,
{
    store: Store,
    cache_dir: PathBuf,
    mapping: LocatorMapping,
    gates: Arc<Mutex<HashMap<String, Weak<Mutex<()>>>>>,
}

impl<Store> RemoteCachingResolver<Store>
where
    Store: ObjectStore,
{
    /// Creates a resolver that fetches through `store` as directed by
    /// `config`.
    pub fn new(store: Store, config: RemoteCacheConfig) -> Self {
        Self {
            store,
            cache_dir: config.cache_dir,
            mapping: config.mapping,
            gates: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The cache file name for `locator`: the digest of the full locator
    /// string, keeping the locator path's extension so downstream
    /// consumers can sniff the payload type from the name.
    fn cache_file_name(locator: &Url) -> String {
        let digest = format!("{:x}", md5::compute(locator.as_str().as_bytes()));

        match Path::new(locator.path()).extension().and_then(|e| e.to_str()) {
            Some(extension) => format!("{digest}.{extension}"),
            None => digest,
        }
    }

    /// Returns the per-key gate for `file_name`, creating it on first use.
    ///
    /// Gates are held by weak reference so the map stays bounded by the
    /// number of in-flight fetches rather than the size of the cache.
    async fn gate(&self, file_name: &str) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().await;
        gates.retain(|_, gate| gate.strong_count() > 0);

        if let Some(gate) = gates.get(file_name).and_then(Weak::upgrade) {
            return gate;
        }

        let gate = Arc::new(Mutex::new(()));
        gates.insert(file_name.to_string(), Arc::downgrade(&gate));
        gate
    }

    /// Streams the remote object into place at `local_path`.
    ///
    /// Returns `Ok(false)` when the remote object does not exist. On any
    /// failure the partially written temporary file is removed before the
    /// error propagates, so the final path never holds partial bytes.
    async fn download(
        &self,
        locator: &Url,
        local_path: &Path,
    ) -> Result<bool, LanternResolverError> {
        let Some(mut body) = self.store.get(locator).await? else {
            return Ok(false);
        };

        let mut temp_name = local_path.as_os_str().to_owned();
        temp_name.push(format!(".{:08x}.tmp", rand::random::<u32>()));
        let temp_path = PathBuf::from(temp_name);
        let mut guard = TempFileGuard::new(temp_path.clone());
        let started = Instant::now();

        let mut file = File::create(&temp_path)
            .await
            .map_err(|error| LanternResolverError::Io(format!("{error}")))?;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|error| LanternResolverError::Io(format!("{error}")))?;
        }

        file.flush()
            .await
            .map_err(|error| LanternResolverError::Io(format!("{error}")))?;
        drop(file);

        rename(&temp_path, local_path)
            .await
            .map_err(|error| LanternResolverError::Io(format!("{error}")))?;
        guard.commit();

        tracing::debug!(
            "downloaded {locator} in {}ms",
            started.elapsed().as_millis()
        );

        Ok(true)
    }
}

#[async_trait::async_trait]
impl<Store> FileResolver for RemoteCachingResolver<Store>
where
    Store: ObjectStore,
{
    async fn resolve(
        &self,
        identifier: &Identifier,
    ) -> Result<Resolution, LanternResolverError> {
        let Some(locator) = (self.mapping)(identifier) else {
            return Ok(Resolution::NotFound);
        };

        let file_name = Self::cache_file_name(&locator);
        let local_path = self.cache_dir.join(&file_name);

        // Fast path: a file at the final path is always complete
        if file_present(&local_path).await? {
            return Ok(Resolution::Resolved(local_path));
        }

        // One fetch per cache key at a time. Whoever takes the gate first
        // downloads; followers wake up and re-check the final path.
        let gate = self.gate(&file_name).await;
        let _leader = gate.lock().await;

        if file_present(&local_path).await? {
            return Ok(Resolution::Resolved(local_path));
        }

        create_dir_all(&self.cache_dir)
            .await
            .map_err(|error| LanternResolverError::Io(format!("{error}")))?;

        if self.download(&locator, &local_path).await? {
            Ok(Resolution::Resolved(local_path))
        } else {
            Ok(Resolution::NotFound)
        }
    }
}

async fn file_present(path: &Path) -> Result<bool, LanternResolverError> {
    try_exists(path)
        .await
        .map_err(|error| LanternResolverError::Io(format!("{error}")))
}

/// Removes the temporary download file on drop unless the rename
/// committed first.
struct TempFileGuard {
    path: Option<PathBuf>,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn commit(&mut self) {
        self.path = None;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}
