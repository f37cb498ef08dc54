//! The model registry: named bundles of resolver, policy and pipeline.
//!
//! Every request is served in the context of exactly one [`Model`].
//! Models are registered under explicit keys at startup and looked up
//! by the leading path segment; nothing is materialized per request.

use std::{collections::HashMap, sync::Arc};

use lantern_image::{CommandPipeline, Identifier, ImagePipeline};
use lantern_resolver::{
    Access, FileResolver, HttpObjectStore, LocalResolver, LocatorMapping, RemoteCacheConfig,
    RemoteCachingResolver, S3Config, S3ObjectStore,
};
use url::Url;

use crate::{
    AllowAll, AuthorizationPolicy, LanternServerError, ResolverConfig, ServerConfig, StoreConfig,
};

/// Key of the model used when the request path names none.
pub const DEFAULT_MODEL: &str = "default";

const IDENTIFIER_PLACEHOLDER: &str = "{identifier}";

/// Everything needed to serve requests for one class of images.
#[derive(Clone)]
pub struct Model {
    resolver: Arc<dyn FileResolver>,
    policy: Arc<dyn AuthorizationPolicy>,
    pipeline: Arc<dyn ImagePipeline>,
}

impl Model {
    /// Assembles a model from its three capabilities.
    pub fn new(
        resolver: Arc<dyn FileResolver>,
        policy: Arc<dyn AuthorizationPolicy>,
        pipeline: Arc<dyn ImagePipeline>,
    ) -> Self {
        Self {
            resolver,
            policy,
            pipeline,
        }
    }

    /// The resolver mapping identifiers to source files.
    pub fn resolver(&self) -> &dyn FileResolver {
        self.resolver.as_ref()
    }

    /// The policy gating access to images under this model.
    pub fn policy(&self) -> &dyn AuthorizationPolicy {
        self.policy.as_ref()
    }

    /// A handle on the render capability, shareable with resources.
    pub fn pipeline(&self) -> Arc<dyn ImagePipeline> {
        Arc::clone(&self.pipeline)
    }
}

/// Registry of [`Model`]s by key.
///
/// A registry is only serviceable once it holds a model under
/// [`DEFAULT_MODEL`]; [`ModelRegistry::validate`] enforces this at
/// startup so request handling can rely on the fallback existing.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Model>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `model` under `key`, replacing any previous holder.
    pub fn register(&mut self, key: impl Into<String>, model: Model) {
        self.models.insert(key.into(), model);
    }

    /// Looks up the model registered under `key`.
    pub fn get(&self, key: &str) -> Option<&Model> {
        self.models.get(key)
    }

    /// Whether a model is registered under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.models.contains_key(key)
    }

    /// The model requests fall back to when the path names none.
    pub fn default_model(&self) -> Result<&Model, LanternServerError> {
        self.get(DEFAULT_MODEL).ok_or_else(|| {
            LanternServerError::Configuration(format!("No '{DEFAULT_MODEL}' model is registered"))
        })
    }

    /// Verifies the registry can serve requests.
    pub fn validate(&self) -> Result<(), LanternServerError> {
        self.default_model().map(|_| ())
    }

    /// Builds a registry from configuration, constructing each model's
    /// resolver, policy and pipeline.
    pub fn from_config(config: &ServerConfig) -> Result<Self, LanternServerError> {
        let mut registry = Self::new();

        for (key, model_config) in &config.models {
            let pipeline = CommandPipeline::new(
                model_config.pipeline.render.clone(),
                model_config.pipeline.probe.clone(),
            )
            .map_err(|error| {
                LanternServerError::Configuration(format!("Model '{key}' pipeline: {error}"))
            })?;

            let resolver = build_resolver(key, &model_config.resolver)?;

            // PolicyConfig currently has a single variant; matching keeps
            // future kinds from silently falling through to allow-all.
            let policy: Arc<dyn AuthorizationPolicy> = match model_config.policy {
                crate::PolicyConfig::AllowAll => Arc::new(AllowAll),
            };

            registry.register(key, Model::new(resolver, policy, Arc::new(pipeline)));
        }

        registry.validate()?;

        Ok(registry)
    }
}

fn build_resolver(
    key: &str,
    config: &ResolverConfig,
) -> Result<Arc<dyn FileResolver>, LanternServerError> {
    match config {
        ResolverConfig::Local { root, extensions } => {
            let mut resolver = LocalResolver::new(root.clone()).map_err(|error| {
                LanternServerError::Configuration(format!("Model '{key}' resolver: {error}"))
            })?;
            if let Some(extensions) = extensions {
                resolver = resolver.with_extensions(extensions.clone());
            }
            Ok(Arc::new(resolver))
        }
        ResolverConfig::Remote {
            cache_dir,
            locator_template,
            store,
        } => {
            let cache_config = RemoteCacheConfig {
                cache_dir: cache_dir.clone(),
                mapping: locator_mapping(key, locator_template)?,
            };

            match store {
                StoreConfig::Http => Ok(Arc::new(RemoteCachingResolver::new(
                    HttpObjectStore::new(),
                    cache_config,
                ))),
                StoreConfig::S3 {
                    endpoint,
                    region,
                    credentials,
                } => {
                    let access = match credentials {
                        Some(credentials) => Access::Credentials {
                            access_key_id: credentials.access_key_id.clone(),
                            secret_access_key: credentials.secret_access_key.clone(),
                        },
                        None => Access::Public,
                    };
                    let store = S3ObjectStore::new(S3Config {
                        endpoint: endpoint.clone(),
                        region: region.clone(),
                        access,
                    });
                    Ok(Arc::new(RemoteCachingResolver::new(store, cache_config)))
                }
            }
        }
    }
}

/// Compiles a locator template into a mapping closure. The template must
/// mention `{identifier}`, otherwise every identifier would map to the
/// same object.
fn locator_mapping(key: &str, template: &str) -> Result<LocatorMapping, LanternServerError> {
    if !template.contains(IDENTIFIER_PLACEHOLDER) {
        return Err(LanternServerError::Configuration(format!(
            "Model '{key}' locator template {template:?} does not mention {IDENTIFIER_PLACEHOLDER}"
        )));
    }

    let template = template.to_string();

    Ok(Arc::new(move |identifier: &Identifier| {
        Url::parse(&template.replace(IDENTIFIER_PLACEHOLDER, identifier.as_str())).ok()
    }))
}
