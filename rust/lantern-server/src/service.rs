//! HTTP routing for the protocol's three GET routes.
//!
//! The path shape decides the route: one segment is a bare identifier
//! (redirected to its `info.json`), two segments ending in `info.json`
//! are the info route, and five segments are the image route. A leading
//! segment naming a registered model scopes the request to that model;
//! otherwise the whole path is interpreted under the default model.

use std::{collections::HashMap, sync::Arc};

use hyper::{Method, Request, Response, StatusCode, header};

use crate::{LanternServerError, Model, RequestHandler, ResponseBody};

/// Routes requests to a [`RequestHandler`]. Cheap to clone; the server
/// clones it once per connection.
#[derive(Clone)]
pub struct ImageService {
    handler: Arc<RequestHandler>,
}

impl ImageService {
    /// Creates a service around `handler`.
    pub fn new(handler: RequestHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Responds to one request.
    ///
    /// Handler errors are logged and collapsed into an empty 500;
    /// protocol-level failures (bad parameters, unknown images, denied
    /// access) are ordinary responses and never land here.
    pub async fn respond<Body>(&self, request: Request<Body>) -> Response<ResponseBody> {
        match self.route(request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::error!("request failed: {error}");
                empty_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    async fn route<Body>(
        &self,
        request: Request<Body>,
    ) -> Result<Response<ResponseBody>, LanternServerError> {
        if request.method() != Method::GET {
            return Ok(empty_response(StatusCode::NOT_FOUND));
        }

        let path = request.uri().path().to_string();
        // Strip exactly one leading slash: "//cat" must keep its empty
        // first segment and fall to the guard below.
        let segments: Vec<&str> = path.strip_prefix('/').unwrap_or(&path).split('/').collect();

        if segments.iter().any(|segment| segment.is_empty()) {
            return Ok(empty_response(StatusCode::NOT_FOUND));
        }

        let (model, rest) = self.select_model(&segments)?;

        match rest {
            [_] => self.handler.redirect(&path),
            [identifier, "info.json"] => {
                let canonical_url = canonical_url(&request, &path);
                self.handler.info(model, identifier, &canonical_url).await
            }
            [identifier, region, size, rotation, quality_format] => {
                match quality_format.rsplit_once('.') {
                    Some((quality, format)) => {
                        let raw_parameters =
                            raw_parameters(region, size, rotation, quality, format);
                        self.handler.show(model, identifier, &raw_parameters).await
                    }
                    None => Ok(empty_response(StatusCode::NOT_FOUND)),
                }
            }
            _ => Ok(empty_response(StatusCode::NOT_FOUND)),
        }
    }

    /// Scopes the request to a model. A leading segment only selects a
    /// model when more segments follow, so a single-segment path is
    /// always an identifier, even one that collides with a model key.
    fn select_model<'s>(
        &self,
        segments: &'s [&'s str],
    ) -> Result<(&Model, &'s [&'s str]), LanternServerError> {
        let registry = self.handler.registry();

        if segments.len() > 1 {
            if let Some(model) = registry.get(segments[0]) {
                return Ok((model, &segments[1..]));
            }
        }

        Ok((registry.default_model()?, segments))
    }
}

/// The document URL reported as `@id`: rebuilt from the request's scheme
/// and `Host` header, with the `/info.json` suffix dropped. A proxy that
/// terminates TLS declares the outward scheme via `X-Forwarded-Proto`;
/// absent both that and an absolute request target, plain `http` is
/// assumed.
fn canonical_url<Body>(request: &Request<Body>, path: &str) -> String {
    let base = path.strip_suffix("/info.json").unwrap_or(path);
    let scheme = request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().scheme_str())
        .unwrap_or("http");
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");

    format!("{scheme}://{host}{base}")
}

fn raw_parameters(
    region: &str,
    size: &str,
    rotation: &str,
    quality: &str,
    format: &str,
) -> HashMap<String, String> {
    HashMap::from([
        ("region".to_string(), region.to_string()),
        ("size".to_string(), size.to_string()),
        ("rotation".to_string(), rotation.to_string()),
        ("quality".to_string(), quality.to_string()),
        ("format".to_string(), format.to_string()),
    ])
}

pub(crate) fn empty_response(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::default());
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AllowAll, DEFAULT_MODEL, ModelRegistry};
    use http_body_util::BodyExt;
    use lantern_image::{CommandPipeline, StubPipeline};
    use lantern_resolver::LocalResolver;
    use serde_json::Value;
    use std::path::Path;

    fn get(path: &str) -> Request<()> {
        Request::builder()
            .uri(path)
            .body(())
            .expect("request builds")
    }

    fn local_model(root: &Path) -> anyhow::Result<Model> {
        Ok(Model::new(
            Arc::new(LocalResolver::new(root.to_path_buf())?),
            Arc::new(AllowAll),
            Arc::new(StubPipeline::default()),
        ))
    }

    async fn service_for(root: &Path) -> anyhow::Result<ImageService> {
        tokio::fs::write(root.join("cat.jpg"), b"cat bytes").await?;
        let substitute = root.join("substitute.png");
        tokio::fs::write(&substitute, b"substitute bytes").await?;

        let mut registry = ModelRegistry::new();
        registry.register(DEFAULT_MODEL, local_model(root)?);

        let handler = RequestHandler::new(
            Arc::new(registry),
            substitute,
            &["jpg".to_string(), "png".to_string()],
        )?;

        Ok(ImageService::new(handler))
    }

    async fn body_bytes(response: Response<ResponseBody>) -> anyhow::Result<Vec<u8>> {
        Ok(response.into_body().collect().await?.to_bytes().to_vec())
    }

    #[tokio::test]
    async fn it_routes_the_image_request() -> anyhow::Result<()> {
        let tempdir = tempfile::tempdir()?;
        let service = service_for(tempdir.path()).await?;

        let response = service.respond(get("/cat/full/full/0/default.jpg")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await?, b"cat bytes");

        Ok(())
    }

    #[tokio::test]
    async fn it_routes_the_info_request_with_a_canonical_id() -> anyhow::Result<()> {
        let tempdir = tempfile::tempdir()?;
        let service = service_for(tempdir.path()).await?;

        let request = Request::builder()
            .uri("/cat/info.json")
            .header(header::HOST, "images.test:5004")
            .body(())?;
        let response = service.respond(request).await;

        assert_eq!(response.status(), StatusCode::OK);

        let document: Value = serde_json::from_slice(&body_bytes(response).await?)?;
        assert_eq!(document["@id"], "http://images.test:5004/cat");

        Ok(())
    }

    #[tokio::test]
    async fn it_honors_the_forwarded_proto_in_the_canonical_id() -> anyhow::Result<()> {
        let tempdir = tempfile::tempdir()?;
        let service = service_for(tempdir.path()).await?;

        let request = Request::builder()
            .uri("/cat/info.json")
            .header(header::HOST, "images.test")
            .header("x-forwarded-proto", "https")
            .body(())?;
        let response = service.respond(request).await;

        assert_eq!(response.status(), StatusCode::OK);

        let document: Value = serde_json::from_slice(&body_bytes(response).await?)?;
        assert_eq!(document["@id"], "https://images.test/cat");

        Ok(())
    }

    #[tokio::test]
    async fn it_redirects_the_bare_identifier() -> anyhow::Result<()> {
        let tempdir = tempfile::tempdir()?;
        let service = service_for(tempdir.path()).await?;

        let response = service.respond(get("/cat")).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION),
            Some(&"/cat/info.json".parse()?)
        );

        Ok(())
    }

    #[tokio::test]
    async fn it_answers_unroutable_paths_with_not_found() -> anyhow::Result<()> {
        let tempdir = tempfile::tempdir()?;
        let service = service_for(tempdir.path()).await?;

        // "//cat" and "//evil.example" must not reach the redirect
        // route: a 302 to "//evil.example/info.json" would be a
        // scheme-relative URL pointing at another host.
        for path in [
            "/",
            "/cat/",
            "//cat",
            "//evil.example",
            "/cat/full/full/0",
            "/cat/full/full/0/default.jpg/extra",
            "/cat/full/full/0/default",
        ] {
            let response = service.respond(get(path)).await;
            assert_eq!(
                response.status(),
                StatusCode::NOT_FOUND,
                "expected 404 for {path:?}"
            );
            assert!(body_bytes(response).await?.is_empty());
        }

        Ok(())
    }

    #[tokio::test]
    async fn it_ignores_non_get_methods() -> anyhow::Result<()> {
        let tempdir = tempfile::tempdir()?;
        let service = service_for(tempdir.path()).await?;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/cat/info.json")
            .body(())?;
        let response = service.respond(request).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        Ok(())
    }

    #[tokio::test]
    async fn it_selects_the_model_from_the_leading_path_segment() -> anyhow::Result<()> {
        let tempdir = tempfile::tempdir()?;
        let default_root = tempdir.path().join("default");
        let scrolls_root = tempdir.path().join("scrolls");
        tokio::fs::create_dir_all(&default_root).await?;
        tokio::fs::create_dir_all(&scrolls_root).await?;
        tokio::fs::write(scrolls_root.join("dead-sea.jpg"), b"scroll bytes").await?;

        let substitute = tempdir.path().join("substitute.png");
        tokio::fs::write(&substitute, b"substitute bytes").await?;

        let mut registry = ModelRegistry::new();
        registry.register(DEFAULT_MODEL, local_model(&default_root)?);
        registry.register("scrolls", local_model(&scrolls_root)?);

        let handler =
            RequestHandler::new(Arc::new(registry), substitute, &["jpg".to_string()])?;
        let service = ImageService::new(handler);

        let scoped = service
            .respond(get("/scrolls/dead-sea/full/full/0/default.jpg"))
            .await;
        assert_eq!(scoped.status(), StatusCode::OK);
        assert_eq!(body_bytes(scoped).await?, b"scroll bytes");

        // Under the default model the same identifier does not exist.
        let unscoped = service
            .respond(get("/dead-sea/full/full/0/default.jpg"))
            .await;
        assert_eq!(unscoped.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_bytes(unscoped).await?, b"substitute bytes");

        // A bare model key is an identifier, not a model selection.
        let bare = service.respond(get("/scrolls")).await;
        assert_eq!(bare.status(), StatusCode::FOUND);
        assert_eq!(
            bare.headers().get(header::LOCATION),
            Some(&"/scrolls/info.json".parse()?)
        );

        Ok(())
    }

    #[tokio::test]
    async fn it_falls_back_to_the_default_model_for_unknown_prefixes() -> anyhow::Result<()> {
        let tempdir = tempfile::tempdir()?;
        let service = service_for(tempdir.path()).await?;

        // "unknown" is not a model, so it is the identifier.
        let response = service.respond(get("/unknown/info.json")).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let document: Value = serde_json::from_slice(&body_bytes(response).await?)?;
        assert_eq!(document["error"], "Unknown image: unknown");

        Ok(())
    }

    #[tokio::test]
    async fn it_collapses_handler_errors_into_an_empty_500() -> anyhow::Result<()> {
        let tempdir = tempfile::tempdir()?;
        tokio::fs::write(tempdir.path().join("cat.jpg"), b"cat bytes").await?;
        let substitute = tempdir.path().join("substitute.png");
        tokio::fs::write(&substitute, b"substitute bytes").await?;

        // A probe command that always fails makes describe() error out.
        let broken = Model::new(
            Arc::new(LocalResolver::new(tempdir.path().to_path_buf())?),
            Arc::new(AllowAll),
            Arc::new(CommandPipeline::new(
                vec!["cat".to_string(), "{source}".to_string()],
                vec!["false".to_string()],
            )?),
        );

        let mut registry = ModelRegistry::new();
        registry.register(DEFAULT_MODEL, broken);

        let handler =
            RequestHandler::new(Arc::new(registry), substitute, &["jpg".to_string()])?;
        let service = ImageService::new(handler);

        let response = service.respond(get("/cat/info.json")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::LINK).is_none());
        assert!(body_bytes(response).await?.is_empty());

        Ok(())
    }
}
