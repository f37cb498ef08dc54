//! The request state machine behind the protocol routes.
//!
//! The image route never answers a missing or denied source with an
//! empty error body. It renders the configured substitute image with
//! the request's own transformation parameters and pairs those bytes
//! with a 404 or 401, so `<img>` tags degrade gracefully. Parameter
//! errors (400) and internal failures (500) do return empty bodies.

use std::{collections::HashMap, path::PathBuf, str::FromStr, sync::Arc};

use http_body_util::Full;
use hyper::{Response, StatusCode, header};
use lantern_image::{
    Format, Identifier, ImageResource, PROFILE_LINK_HEADER, ParameterSet, information_document,
};
use lantern_resolver::{LanternResolverError, Resolution};

use crate::{ImageAction, LanternServerError, Model, ModelRegistry};

/// The body type of every response this server produces.
pub type ResponseBody = Full<bytes::Bytes>;

/// Media type of `info.json` responses.
const INFO_MEDIA_TYPE: &str = "application/ld+json";

/// Identifier under which the substitute image is rendered.
const SUBSTITUTE_IDENTIFIER: &str = "not-found";

/// Serves the three operations of the protocol, one model at a time.
pub struct RequestHandler {
    registry: Arc<ModelRegistry>,
    substitute_image: PathBuf,
    substitute_identifier: Identifier,
    output_formats: Vec<Format>,
}

impl RequestHandler {
    /// Creates a handler over `registry`.
    ///
    /// `substitute_image` must name an existing file and every entry of
    /// `output_formats` must be a valid format tag; both are checked
    /// here so requests never trip over bad configuration.
    pub fn new(
        registry: Arc<ModelRegistry>,
        substitute_image: impl Into<PathBuf>,
        output_formats: &[String],
    ) -> Result<Self, LanternServerError> {
        registry.validate()?;

        let substitute_image = substitute_image.into();
        if !substitute_image.is_file() {
            return Err(LanternServerError::Configuration(format!(
                "Substitute image '{}' is not a readable file",
                substitute_image.display()
            )));
        }

        let output_formats = output_formats
            .iter()
            .map(|format| Format::from_str(format))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| {
                LanternServerError::Configuration(format!("Output formats: {error}"))
            })?;

        let substitute_identifier = Identifier::from_str(SUBSTITUTE_IDENTIFIER)
            .map_err(|error| LanternServerError::Configuration(format!("{error}")))?;

        Ok(Self {
            registry,
            substitute_image,
            substitute_identifier,
            output_formats,
        })
    }

    /// The registry this handler serves from.
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Serves the image route: transformed bytes for `identifier` under
    /// `model`, or the substitute image when the source is missing or
    /// access is denied.
    pub async fn show(
        &self,
        model: &Model,
        identifier: &str,
        raw_parameters: &HashMap<String, String>,
    ) -> Result<Response<ResponseBody>, LanternServerError> {
        let parameters = match ParameterSet::parse(raw_parameters) {
            Ok(parameters) => parameters,
            Err(error) => {
                tracing::debug!("rejecting malformed parameters: {error}");
                return Ok(Response::builder()
                    .status(StatusCode::BAD_REQUEST)
                    .header(header::LINK, PROFILE_LINK_HEADER)
                    .body(Full::default())?);
            }
        };

        let (status, resource) = self.locate(model, identifier).await?;
        let rendered = resource.render(&parameters).await?;

        let mut response = Response::builder()
            .status(status)
            .header(header::LINK, PROFILE_LINK_HEADER)
            .header(header::CONTENT_TYPE, rendered.media_type.as_str())
            .header(header::CONTENT_DISPOSITION, "inline");

        if status == StatusCode::OK {
            response = response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*");
        }

        Ok(response.body(Full::from(rendered.bytes))?)
    }

    /// Serves the `info.json` route for `identifier` under `model`.
    ///
    /// `canonical_url` becomes the document's `@id`. Denied access
    /// redirects to a degraded alternative when the policy offers one,
    /// and otherwise returns the document with an unauthorized status;
    /// the description itself is not withheld.
    pub async fn info(
        &self,
        model: &Model,
        identifier: &str,
        canonical_url: &str,
    ) -> Result<Response<ResponseBody>, LanternServerError> {
        let Some(resource) = self.resolve_for_info(model, identifier).await? else {
            let body = serde_json::to_vec(&serde_json::json!({
                "error": format!("Unknown image: {identifier}")
            }))?;
            return Ok(Response::builder()
                .status(StatusCode::NOT_FOUND)
                .header(header::LINK, PROFILE_LINK_HEADER)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Full::from(body))?);
        };

        let description = resource.describe().await?;
        let service_info = model.policy().service_info(&resource).await;
        let document =
            information_document(description, canonical_url, &self.output_formats, service_info);
        let body = serde_json::to_vec(&document)?;

        if model.policy().can(ImageAction::Info, &resource).await {
            return Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::LINK, PROFILE_LINK_HEADER)
                .header(header::CONTENT_TYPE, INFO_MEDIA_TYPE)
                .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
                .body(Full::from(body))?);
        }

        if model.policy().has_degraded(&resource).await {
            if let Some(location) = model.policy().degraded_image_uri(&resource).await {
                return Ok(Response::builder()
                    .status(StatusCode::SEE_OTHER)
                    .header(header::LOCATION, location.as_str())
                    .body(Full::default())?);
            }
        }

        // Denial still discloses the description; only the status differs.
        Ok(Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .header(header::LINK, PROFILE_LINK_HEADER)
            .header(header::CONTENT_TYPE, INFO_MEDIA_TYPE)
            .body(Full::from(body))?)
    }

    /// Serves the bare-identifier route: a redirect from `path` to the
    /// resource's `info.json`.
    pub fn redirect(&self, path: &str) -> Result<Response<ResponseBody>, LanternServerError> {
        Ok(Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, format!("{path}/info.json"))
            .body(Full::default())?)
    }

    /// Resolves `identifier` for the image route, substituting on
    /// absence or denial. Containment violations are logged and served
    /// as not-found rather than surfaced to the caller.
    async fn locate(
        &self,
        model: &Model,
        identifier: &str,
    ) -> Result<(StatusCode, ImageResource), LanternServerError> {
        let identifier = match Identifier::from_str(identifier) {
            Ok(identifier) => identifier,
            Err(error) => {
                tracing::debug!("substituting for unusable identifier: {error}");
                return Ok((StatusCode::NOT_FOUND, self.substitute(model)));
            }
        };

        match model.resolver().resolve(&identifier).await {
            Ok(Resolution::Resolved(source)) => {
                let resource = ImageResource::new(identifier, source, model.pipeline());
                if model.policy().can(ImageAction::Show, &resource).await {
                    Ok((StatusCode::OK, resource))
                } else {
                    Ok((StatusCode::UNAUTHORIZED, self.substitute(model)))
                }
            }
            Ok(Resolution::NotFound) => Ok((StatusCode::NOT_FOUND, self.substitute(model))),
            Err(LanternResolverError::Containment(reason)) => {
                tracing::warn!("refusing non-contained identifier: {reason}");
                Ok((StatusCode::NOT_FOUND, self.substitute(model)))
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Resolves `identifier` for the info route; `None` means the
    /// document cannot exist.
    async fn resolve_for_info(
        &self,
        model: &Model,
        identifier: &str,
    ) -> Result<Option<ImageResource>, LanternServerError> {
        let Ok(identifier) = Identifier::from_str(identifier) else {
            return Ok(None);
        };

        match model.resolver().resolve(&identifier).await {
            Ok(Resolution::Resolved(source)) => {
                Ok(Some(ImageResource::new(identifier, source, model.pipeline())))
            }
            Ok(Resolution::NotFound) => Ok(None),
            Err(LanternResolverError::Containment(reason)) => {
                tracing::warn!("refusing non-contained identifier: {reason}");
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }

    fn substitute(&self, model: &Model) -> ImageResource {
        ImageResource::new(
            self.substitute_identifier.clone(),
            self.substitute_image.clone(),
            model.pipeline(),
        )
    }
}
