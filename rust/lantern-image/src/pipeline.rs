//! The opaque render capability.
//!
//! Everything pixel-shaped lives behind [`ImagePipeline`]. Implementations
//! receive the validated [`ParameterSet`] tokens verbatim and decide for
//! themselves how to crop, scale, rotate and encode.

use std::{path::Path, process::Stdio};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::Command;

use crate::{LanternImageError, ParameterSet};

/// Output of a successful render: encoded bytes tagged with a media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    /// The encoded image payload
    pub bytes: Bytes,
    /// The IANA media type of the payload (e.g. `image/jpeg`)
    pub media_type: String,
}

/// Pixel dimensions of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// The transformation capability an image resource delegates to.
#[async_trait]
pub trait ImagePipeline: Send + Sync {
    /// Transforms the image at `source` according to `parameters`,
    /// producing encoded bytes tagged with their media type.
    async fn render(
        &self,
        source: &Path,
        parameters: &ParameterSet,
    ) -> Result<RenderedImage, LanternImageError>;

    /// Probes the pixel dimensions of the image at `source`.
    async fn dimensions(&self, source: &Path) -> Result<Dimensions, LanternImageError>;
}

/// An [`ImagePipeline`] that delegates to an external command, the way
/// image servers conventionally shell out to an ImageMagick- or
/// vips-style toolchain.
///
/// The render template is an argv list in which `{source}`, `{region}`,
/// `{size}`, `{rotation}`, `{quality}` and `{format}` are substituted
/// verbatim before execution; encoded output is read from stdout. The
/// probe template admits only `{source}` and must print `width height`
/// to stdout.
#[derive(Debug, Clone)]
pub struct CommandPipeline {
    render_template: Vec<String>,
    probe_template: Vec<String>,
}

impl CommandPipeline {
    /// Creates a pipeline from render and probe argv templates.
    pub fn new(
        render_template: Vec<String>,
        probe_template: Vec<String>,
    ) -> Result<Self, LanternImageError> {
        if render_template.is_empty() || probe_template.is_empty() {
            return Err(LanternImageError::Pipeline(
                "Command template may not be empty".into(),
            ));
        }

        Ok(Self {
            render_template,
            probe_template,
        })
    }

    fn substitute(
        template: &[String],
        source: &Path,
        parameters: Option<&ParameterSet>,
    ) -> Vec<String> {
        template
            .iter()
            .map(|argument| {
                let mut argument = argument.replace("{source}", &source.to_string_lossy());
                if let Some(parameters) = parameters {
                    argument = argument
                        .replace("{region}", parameters.region.as_str())
                        .replace("{size}", parameters.size.as_str())
                        .replace("{rotation}", parameters.rotation.as_str())
                        .replace("{quality}", parameters.quality.as_str())
                        .replace("{format}", parameters.format.as_str());
                }
                argument
            })
            .collect()
    }

    async fn run(arguments: &[String]) -> Result<Vec<u8>, LanternImageError> {
        let (program, arguments) = arguments
            .split_first()
            .ok_or_else(|| LanternImageError::Pipeline("Command template may not be empty".into()))?;

        let output = Command::new(program)
            .args(arguments)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|error| {
                LanternImageError::Pipeline(format!("Failed to run {program:?}: {error}"))
            })?;

        if !output.status.success() {
            return Err(LanternImageError::Pipeline(format!(
                "Command {program:?} failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl ImagePipeline for CommandPipeline {
    async fn render(
        &self,
        source: &Path,
        parameters: &ParameterSet,
    ) -> Result<RenderedImage, LanternImageError> {
        let arguments = Self::substitute(&self.render_template, source, Some(parameters));
        let stdout = Self::run(&arguments).await?;

        Ok(RenderedImage {
            bytes: stdout.into(),
            media_type: parameters.format.media_type().to_string(),
        })
    }

    async fn dimensions(&self, source: &Path) -> Result<Dimensions, LanternImageError> {
        let arguments = Self::substitute(&self.probe_template, source, None);
        let stdout = Self::run(&arguments).await?;
        let text = String::from_utf8_lossy(&stdout);

        let mut fields = text.split_whitespace();
        let (Some(width), Some(height)) = (fields.next(), fields.next()) else {
            return Err(LanternImageError::Pipeline(format!(
                "Probe printed {:?}, expected \"width height\"",
                text.trim()
            )));
        };

        Ok(Dimensions {
            width: width.parse().map_err(|error| {
                LanternImageError::Pipeline(format!("Probe width {width:?}: {error}"))
            })?,
            height: height.parse().map_err(|error| {
                LanternImageError::Pipeline(format!("Probe height {height:?}: {error}"))
            })?,
        })
    }
}
