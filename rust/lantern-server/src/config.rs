//! Server configuration loaded from a JSON file.
//!
//! Everything a running server depends on is declared here and passed
//! down by value; there is no process-wide mutable configuration. Kind
//! selectors (`resolver`, `store`, `policy`) are closed enums, so an
//! unknown kind fails at load time instead of resolving arbitrary
//! strings into behavior.

use std::{
    collections::HashMap,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::LanternServerError;

/// Top-level configuration for the image server.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address the server binds
    #[serde(default = "default_address")]
    pub address: SocketAddr,
    /// Image rendered in place of missing or denied sources
    pub substitute_image: PathBuf,
    /// Output format tags advertised in info documents
    #[serde(default = "default_output_formats")]
    pub output_formats: Vec<String>,
    /// Model definitions by registry key; a `default` model is required
    pub models: HashMap<String, ModelConfig>,
}

impl ServerConfig {
    /// Reads a configuration from the JSON file at `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LanternServerError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|error| {
            LanternServerError::Configuration(format!(
                "Failed to read '{}': {error}",
                path.display()
            ))
        })?;

        serde_json::from_str(&contents).map_err(|error| {
            LanternServerError::Configuration(format!(
                "Failed to parse '{}': {error}",
                path.display()
            ))
        })
    }
}

fn default_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_output_formats() -> Vec<String> {
    vec!["jpg".to_string(), "png".to_string()]
}

/// One model: the resolver, policy, and pipeline requests under its key
/// are served with.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ModelConfig {
    /// How identifiers are resolved to source files
    pub resolver: ResolverConfig,
    /// Which authorization policy gates requests
    #[serde(default)]
    pub policy: PolicyConfig,
    /// External command templates for rendering and probing
    pub pipeline: PipelineConfig,
}

/// Resolver selection and settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResolverConfig {
    /// Serve source files from a directory
    Local {
        /// Root directory holding source images
        root: PathBuf,
        /// Extensions probed when the identifier names no exact file
        #[serde(default)]
        extensions: Option<Vec<String>>,
    },
    /// Fetch remote objects into a local cache
    Remote {
        /// Directory holding cached remote objects
        cache_dir: PathBuf,
        /// Locator template; `{identifier}` is replaced per request
        locator_template: String,
        /// Object store the locators address
        store: StoreConfig,
    },
}

/// Object store selection and settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StoreConfig {
    /// Plain HTTP(S) GET on the locator
    Http,
    /// S3-compatible service addressed by `s3://bucket/key` locators
    S3 {
        /// Base URL of the service
        endpoint: Url,
        /// Region name used when signing requests
        region: String,
        /// Signing credentials; omit for public buckets
        #[serde(default)]
        credentials: Option<CredentialsConfig>,
    },
}

/// Credentials for signing object store requests.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CredentialsConfig {
    /// AWS Access Key ID
    pub access_key_id: String,
    /// AWS Secret Access Key
    pub secret_access_key: String,
}

/// Authorization policy selection.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PolicyConfig {
    /// Permit every action
    #[default]
    AllowAll,
}

/// External command templates for the render capability.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Argv template producing transformed bytes on stdout
    pub render: Vec<String>,
    /// Argv template printing `width height` on stdout
    pub probe: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_parses_a_full_configuration() -> anyhow::Result<()> {
        let config: ServerConfig = serde_json::from_value(json!({
            "address": "127.0.0.1:4000",
            "substitute_image": "/srv/lantern/not_found.png",
            "output_formats": ["jpg", "png", "tif"],
            "models": {
                "default": {
                    "resolver": { "kind": "local", "root": "/srv/images" },
                    "pipeline": {
                        "render": ["vips-render", "{source}", "{region}", "{size}"],
                        "probe": ["vips-probe", "{source}"]
                    }
                },
                "scrolls": {
                    "resolver": {
                        "kind": "remote",
                        "cache_dir": "/var/cache/lantern",
                        "locator_template": "s3://scrolls/{identifier}.jpg",
                        "store": {
                            "kind": "s3",
                            "endpoint": "https://objects.example.com",
                            "region": "auto",
                            "credentials": {
                                "access_key_id": "id",
                                "secret_access_key": "secret"
                            }
                        }
                    },
                    "policy": { "kind": "allow-all" },
                    "pipeline": {
                        "render": ["vips-render", "{source}"],
                        "probe": ["vips-probe", "{source}"]
                    }
                }
            }
        }))?;

        assert_eq!(config.address.port(), 4000);
        assert_eq!(config.output_formats, ["jpg", "png", "tif"]);
        assert!(matches!(
            config.models["default"].resolver,
            ResolverConfig::Local { .. }
        ));
        assert!(matches!(
            config.models["scrolls"].resolver,
            ResolverConfig::Remote {
                store: StoreConfig::S3 { .. },
                ..
            }
        ));

        Ok(())
    }

    #[test]
    fn it_defaults_the_address_formats_and_policy() -> anyhow::Result<()> {
        let config: ServerConfig = serde_json::from_value(json!({
            "substitute_image": "/srv/lantern/not_found.png",
            "models": {
                "default": {
                    "resolver": { "kind": "local", "root": "/srv/images" },
                    "pipeline": { "render": ["true"], "probe": ["true"] }
                }
            }
        }))?;

        assert_eq!(config.address, default_address());
        assert_eq!(config.output_formats, ["jpg", "png"]);
        assert!(matches!(
            config.models["default"].policy,
            PolicyConfig::AllowAll
        ));

        Ok(())
    }

    #[test]
    fn it_rejects_unknown_resolver_kinds() {
        let result = serde_json::from_value::<ResolverConfig>(json!({
            "kind": "carrier-pigeon",
            "root": "/srv/images"
        }));

        assert!(result.is_err());
    }

    #[test]
    fn it_rejects_unknown_policy_kinds() {
        let result = serde_json::from_value::<PolicyConfig>(json!({
            "kind": "deny-by-vibes"
        }));

        assert!(result.is_err());
    }
}
