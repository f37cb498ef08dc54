//! End-to-end tests over a live listener: real sockets, real pipeline
//! commands, real remote-object fetches.

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use lantern_image::{CommandPipeline, Identifier, ImageResource, PROFILE_LINK_HEADER};
use lantern_resolver::{
    Access, LocalObjectServer, LocalResolver, RemoteCacheConfig, RemoteCachingResolver, S3Config,
    S3ObjectStore,
};
use lantern_server::{
    AllowAll, AuthorizationPolicy, DEFAULT_MODEL, ImageAction, ImageServer, ImageService, Model,
    ModelRegistry, RequestHandler, ServerConfig,
};
use serde_json::{Map, Value};
use url::Url;

/// A policy answering from fixed fields.
#[derive(Clone, Debug)]
struct FixedPolicy {
    allow_show: bool,
    allow_info: bool,
    degraded_uri: Option<Url>,
    service_info: Map<String, Value>,
}

impl Default for FixedPolicy {
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
impl AuthorizationPolicy for FixedPolicy {
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

fn passthrough_pipeline() -> Result<CommandPipeline> {
    Ok(CommandPipeline::new(
        vec!["cat".to_string(), "{source}".to_string()],
        vec!["echo".to_string(), "800 600".to_string()],
    )?)
}

fn local_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

/// Starts a server over a local-directory model holding `cat.jpg`.
async fn serve_local(root: &Path, policy: Arc<dyn AuthorizationPolicy>) -> Result<ImageServer> {
    tokio::fs::write(root.join("cat.jpg"), b"cat bytes").await?;
    let substitute = root.join("substitute.png");
    tokio::fs::write(&substitute, b"substitute bytes").await?;

    let model = Model::new(
        Arc::new(LocalResolver::new(root.to_path_buf())?),
        policy,
        Arc::new(passthrough_pipeline()?),
    );

    let mut registry = ModelRegistry::new();
    registry.register(DEFAULT_MODEL, model);

    let handler = RequestHandler::new(
        Arc::new(registry),
        substitute,
        &["jpg".to_string(), "png".to_string()],
    )?;

    Ok(ImageServer::start(local_address(), ImageService::new(handler)).await?)
}

fn base_url(server: &ImageServer) -> String {
    format!("http://{}", server.address)
}

fn no_redirect_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

#[tokio::test]
async fn it_serves_rendered_bytes_for_a_local_image() -> Result<()> {
    let tempdir = tempfile::tempdir()?;
    let server = serve_local(tempdir.path(), Arc::new(AllowAll)).await?;
    let base = base_url(&server);

    let response = reqwest::get(format!("{base}/cat/full/full/0/default.jpg")).await?;

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").map(|v| v.as_bytes()),
        Some(b"image/jpeg".as_slice())
    );
    assert_eq!(
        response.headers().get("link").and_then(|v| v.to_str().ok()),
        Some(PROFILE_LINK_HEADER)
    );
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .map(|v| v.as_bytes()),
        Some(b"*".as_slice())
    );
    assert_eq!(
        response
            .headers()
            .get("content-disposition")
            .map(|v| v.as_bytes()),
        Some(b"inline".as_slice())
    );
    assert_eq!(response.bytes().await?.as_ref(), b"cat bytes");

    server.stop();

    Ok(())
}

#[tokio::test]
async fn it_rejects_malformed_parameters_with_an_empty_body() -> Result<()> {
    let tempdir = tempfile::tempdir()?;
    let server = serve_local(tempdir.path(), Arc::new(AllowAll)).await?;
    let base = base_url(&server);

    let response = reqwest::get(format!("{base}/cat/banana/full/0/default.jpg")).await?;

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get("link").and_then(|v| v.to_str().ok()),
        Some(PROFILE_LINK_HEADER)
    );
    assert!(response.bytes().await?.is_empty());

    server.stop();

    Ok(())
}

#[tokio::test]
async fn it_substitutes_the_not_found_image() -> Result<()> {
    let tempdir = tempfile::tempdir()?;
    let server = serve_local(tempdir.path(), Arc::new(AllowAll)).await?;
    let base = base_url(&server);

    let response = reqwest::get(format!("{base}/ghost/full/full/0/default.jpg")).await?;

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(response.headers().get("access-control-allow-origin").is_none());
    assert_eq!(response.bytes().await?.as_ref(), b"substitute bytes");

    server.stop();

    Ok(())
}

#[tokio::test]
async fn it_denies_show_but_still_returns_the_substitute() -> Result<()> {
    let tempdir = tempfile::tempdir()?;
    let policy = Arc::new(FixedPolicy {
        allow_show: false,
        ..FixedPolicy::default()
    });
    let server = serve_local(tempdir.path(), policy).await?;
    let base = base_url(&server);

    let response = reqwest::get(format!("{base}/cat/full/full/0/default.jpg")).await?;

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert_eq!(response.bytes().await?.as_ref(), b"substitute bytes");

    server.stop();

    Ok(())
}

#[tokio::test]
async fn it_serves_info_json() -> Result<()> {
    let tempdir = tempfile::tempdir()?;
    let mut service_info = Map::new();
    service_info.insert("license".into(), Value::from("CC-BY"));
    let policy = Arc::new(FixedPolicy {
        service_info,
        ..FixedPolicy::default()
    });
    let server = serve_local(tempdir.path(), policy).await?;
    let base = base_url(&server);

    let response = reqwest::get(format!("{base}/cat/info.json")).await?;

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").map(|v| v.as_bytes()),
        Some(b"application/ld+json".as_slice())
    );
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .map(|v| v.as_bytes()),
        Some(b"*".as_slice())
    );

    let document: Value = serde_json::from_slice(&response.bytes().await?)?;
    assert_eq!(document["@id"], format!("http://{}/cat", server.address));
    assert_eq!(document["@context"], "http://iiif.io/api/image/2/context.json");
    assert_eq!(document["protocol"], "http://iiif.io/api/image");
    assert_eq!(document["width"], 800);
    assert_eq!(document["height"], 600);
    assert_eq!(document["profile"][0], "http://iiif.io/api/image/2/level1.json");
    assert_eq!(document["profile"][1]["formats"], serde_json::json!(["jpg", "png"]));
    assert_eq!(document["license"], "CC-BY");

    server.stop();

    Ok(())
}

#[tokio::test]
async fn it_redirects_the_bare_identifier() -> Result<()> {
    let tempdir = tempfile::tempdir()?;
    let server = serve_local(tempdir.path(), Arc::new(AllowAll)).await?;
    let base = base_url(&server);

    let response = no_redirect_client()?
        .get(format!("{base}/cat"))
        .send()
        .await?;

    assert_eq!(response.status(), reqwest::StatusCode::FOUND);
    assert_eq!(
        response.headers().get("location").map(|v| v.as_bytes()),
        Some(b"/cat/info.json".as_slice())
    );

    server.stop();

    Ok(())
}

#[tokio::test]
async fn it_redirects_denied_info_to_the_degraded_image() -> Result<()> {
    let tempdir = tempfile::tempdir()?;
    let policy = Arc::new(FixedPolicy {
        allow_info: false,
        degraded_uri: Some(Url::parse("http://example.test/degraded/cat")?),
        ..FixedPolicy::default()
    });
    let server = serve_local(tempdir.path(), policy).await?;
    let base = base_url(&server);

    let response = no_redirect_client()?
        .get(format!("{base}/cat/info.json"))
        .send()
        .await?;

    assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get("location").map(|v| v.as_bytes()),
        Some(b"http://example.test/degraded/cat".as_slice())
    );

    server.stop();

    Ok(())
}

#[tokio::test]
async fn it_discloses_the_description_when_info_is_denied() -> Result<()> {
    let tempdir = tempfile::tempdir()?;
    let policy = Arc::new(FixedPolicy {
        allow_info: false,
        ..FixedPolicy::default()
    });
    let server = serve_local(tempdir.path(), policy).await?;
    let base = base_url(&server);

    let response = reqwest::get(format!("{base}/cat/info.json")).await?;

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert!(response.headers().get("access-control-allow-origin").is_none());

    let document: Value = serde_json::from_slice(&response.bytes().await?)?;
    assert_eq!(document["width"], 800);
    assert_eq!(document["height"], 600);

    server.stop();

    Ok(())
}

#[tokio::test]
async fn it_answers_unknown_info_requests_with_an_error_document() -> Result<()> {
    let tempdir = tempfile::tempdir()?;
    let server = serve_local(tempdir.path(), Arc::new(AllowAll)).await?;
    let base = base_url(&server);

    let response = reqwest::get(format!("{base}/ghost/info.json")).await?;

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get("link").and_then(|v| v.to_str().ok()),
        Some(PROFILE_LINK_HEADER)
    );

    let document: Value = serde_json::from_slice(&response.bytes().await?)?;
    assert_eq!(document["error"], "Unknown image: ghost");

    server.stop();

    Ok(())
}

#[tokio::test]
async fn it_selects_the_model_from_the_leading_path_segment() -> Result<()> {
    let tempdir = tempfile::tempdir()?;
    let default_root = tempdir.path().join("default");
    let scrolls_root = tempdir.path().join("scrolls");
    tokio::fs::create_dir_all(&default_root).await?;
    tokio::fs::create_dir_all(&scrolls_root).await?;
    tokio::fs::write(default_root.join("cat.jpg"), b"cat bytes").await?;
    tokio::fs::write(scrolls_root.join("dead-sea.jpg"), b"scroll bytes").await?;

    let substitute = tempdir.path().join("substitute.png");
    tokio::fs::write(&substitute, b"substitute bytes").await?;

    let mut registry = ModelRegistry::new();
    for (key, root) in [(DEFAULT_MODEL, &default_root), ("scrolls", &scrolls_root)] {
        registry.register(
            key,
            Model::new(
                Arc::new(LocalResolver::new(root.clone())?),
                Arc::new(AllowAll),
                Arc::new(passthrough_pipeline()?),
            ),
        );
    }

    let handler = RequestHandler::new(Arc::new(registry), substitute, &["jpg".to_string()])?;
    let server = ImageServer::start(local_address(), ImageService::new(handler)).await?;
    let base = base_url(&server);

    let scoped = reqwest::get(format!("{base}/scrolls/dead-sea/full/full/0/default.jpg")).await?;
    assert_eq!(scoped.status(), reqwest::StatusCode::OK);
    assert_eq!(scoped.bytes().await?.as_ref(), b"scroll bytes");

    let unscoped = reqwest::get(format!("{base}/dead-sea/full/full/0/default.jpg")).await?;
    assert_eq!(unscoped.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(unscoped.bytes().await?.as_ref(), b"substitute bytes");

    server.stop();

    Ok(())
}

#[tokio::test]
async fn it_serves_a_remote_image_through_the_cache() -> Result<()> {
    let tempdir = tempfile::tempdir()?;
    let cache_dir = tempdir.path().join("cache");
    let substitute = tempdir.path().join("substitute.png");
    tokio::fs::write(&substitute, b"substitute bytes").await?;

    let remote = LocalObjectServer::start(&[("pictures/cat.jpg", b"remote cat bytes")]).await?;

    let store = S3ObjectStore::new(S3Config {
        endpoint: Url::parse(&remote.endpoint)?,
        region: "auto".to_string(),
        access: Access::Credentials {
            access_key_id: "my-id".to_string(),
            secret_access_key: "my-secret".to_string(),
        },
    });

    let resolver = RemoteCachingResolver::new(
        store,
        RemoteCacheConfig::new(&cache_dir, |identifier: &Identifier| {
            Url::parse(&format!("s3://pictures/{identifier}.jpg")).ok()
        }),
    );

    let model = Model::new(
        Arc::new(resolver),
        Arc::new(AllowAll),
        Arc::new(passthrough_pipeline()?),
    );

    let mut registry = ModelRegistry::new();
    registry.register(DEFAULT_MODEL, model);

    let handler = RequestHandler::new(Arc::new(registry), substitute, &["jpg".to_string()])?;
    let server = ImageServer::start(local_address(), ImageService::new(handler)).await?;
    let base = base_url(&server);

    // The second request must be served from the cache.
    for _ in 0..2 {
        let response = reqwest::get(format!("{base}/cat/full/100,/0/default.jpg")).await?;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.bytes().await?.as_ref(), b"remote cat bytes");
    }

    assert_eq!(remote.hits("pictures/cat.jpg").await, 1);

    let locator = Url::parse("s3://pictures/cat.jpg")?;
    let cached: PathBuf = cache_dir.join(format!(
        "{:x}.jpg",
        md5::compute(locator.as_str().as_bytes())
    ));
    assert!(cached.is_file());

    server.stop();
    remote.stop();

    Ok(())
}

#[tokio::test]
async fn it_boots_from_a_configuration_file() -> Result<()> {
    let tempdir = tempfile::tempdir()?;
    let root = tempdir.path().join("images");
    tokio::fs::create_dir_all(&root).await?;
    tokio::fs::write(root.join("cat.jpg"), b"cat bytes").await?;
    let substitute = tempdir.path().join("substitute.png");
    tokio::fs::write(&substitute, b"substitute bytes").await?;

    let config_path = tempdir.path().join("lantern.json");
    tokio::fs::write(
        &config_path,
        serde_json::to_vec_pretty(&serde_json::json!({
            "address": "127.0.0.1:0",
            "substitute_image": substitute,
            "output_formats": ["jpg", "png"],
            "models": {
                "default": {
                    "resolver": { "kind": "local", "root": root },
                    "pipeline": {
                        "render": ["cat", "{source}"],
                        "probe": ["echo", "800 600"]
                    }
                }
            }
        }))?,
    )
    .await?;

    let config = ServerConfig::load(&config_path).await?;
    let registry = ModelRegistry::from_config(&config)?;
    let handler = RequestHandler::new(
        Arc::new(registry),
        config.substitute_image.clone(),
        &config.output_formats,
    )?;
    let server = ImageServer::start(config.address, ImageService::new(handler)).await?;
    let base = base_url(&server);

    let response = reqwest::get(format!("{base}/cat/full/full/0/default.jpg")).await?;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.bytes().await?.as_ref(), b"cat bytes");

    let info = reqwest::get(format!("{base}/cat/info.json")).await?;
    let document: Value = serde_json::from_slice(&info.bytes().await?)?;
    assert_eq!(document["width"], 800);

    server.stop();

    Ok(())
}
