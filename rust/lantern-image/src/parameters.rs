//! The five IIIF request dimensions.
//!
//! Each dimension is a validated newtype over the raw request token. The
//! tokens are checked against the IIIF Image API 2.0 grammar and then kept
//! verbatim; no semantic interpretation (cropping math, scaling ratios)
//! happens at this layer. A [`ParameterSet`] groups the five dimensions
//! with spec-defined defaults for the ones a request omits.

use std::{collections::HashMap, fmt::Display, str::FromStr};

use ::serde::{Deserialize, Serialize};

use crate::LanternImageError;

/// One or more ASCII digits.
fn is_integer(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// A non-negative decimal number: digits with at most one interior dot.
fn is_decimal(token: &str) -> bool {
    match token.split_once('.') {
        Some((whole, fraction)) => is_integer(whole) && is_integer(fraction),
        None => is_integer(token),
    }
}

/// The requested rectangular portion of the source image.
///
/// Recognized forms: `full`, `square`, `x,y,w,h` (integers) and
/// `pct:x,y,w,h` (decimals).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Region(String);

impl TryFrom<String> for Region {
    type Error = LanternImageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let accepted = match value.as_str() {
            "full" | "square" => true,
            token => {
                if let Some(rest) = token.strip_prefix("pct:") {
                    let parts: Vec<&str> = rest.split(',').collect();
                    parts.len() == 4 && parts.iter().all(|part| is_decimal(part))
                } else {
                    let parts: Vec<&str> = token.split(',').collect();
                    parts.len() == 4 && parts.iter().all(|part| is_integer(part))
                }
            }
        };

        if accepted {
            Ok(Self(value))
        } else {
            Err(LanternImageError::InvalidAttribute(format!(
                "Region \"{value}\" does not match a recognized region pattern"
            )))
        }
    }
}

impl Default for Region {
    fn default() -> Self {
        Self("full".into())
    }
}

/// The requested output scale.
///
/// Recognized pattern classes: `full`, `max`, `w,`, `,h`, `w,h`, `pct:n`
/// and `!w,h`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Size(String);

impl TryFrom<String> for Size {
    type Error = LanternImageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let accepted = match value.as_str() {
            "full" | "max" => true,
            token => {
                if let Some(rest) = token.strip_prefix("pct:") {
                    is_decimal(rest)
                } else if let Some(rest) = token.strip_prefix('!') {
                    // The `!w,h` form requires both dimensions
                    match rest.split_once(',') {
                        Some((width, height)) => is_integer(width) && is_integer(height),
                        None => false,
                    }
                } else {
                    match token.split_once(',') {
                        Some(("", height)) => is_integer(height),
                        Some((width, "")) => is_integer(width),
                        Some((width, height)) => is_integer(width) && is_integer(height),
                        None => false,
                    }
                }
            }
        };

        if accepted {
            Ok(Self(value))
        } else {
            Err(LanternImageError::InvalidAttribute(format!(
                "Size \"{value}\" does not match a recognized size pattern"
            )))
        }
    }
}

impl Default for Size {
    fn default() -> Self {
        Self("full".into())
    }
}

/// The requested rotation in degrees, optionally mirrored.
///
/// Recognized forms: `n` and `!n` where `n` is a decimal between 0 and 360
/// inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Rotation(String);

impl TryFrom<String> for Rotation {
    type Error = LanternImageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let token = value.strip_prefix('!').unwrap_or(&value);
        let degrees = if is_decimal(token) {
            token.parse::<f64>().ok()
        } else {
            None
        };

        match degrees {
            Some(degrees) if (0.0..=360.0).contains(&degrees) => Ok(Self(value)),
            _ => Err(LanternImageError::InvalidAttribute(format!(
                "Rotation \"{value}\" is not a degree value between 0 and 360"
            ))),
        }
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self("0".into())
    }
}

/// The requested tonal treatment of the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Quality(String);

impl TryFrom<String> for Quality {
    type Error = LanternImageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "default" | "color" | "gray" | "bitonal" => Ok(Self(value)),
            _ => Err(LanternImageError::InvalidAttribute(format!(
                "Quality \"{value}\" is not one of default, color, gray, bitonal"
            ))),
        }
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self("default".into())
    }
}

/// The requested output encoding, as a short lowercase tag (e.g. `jpg`).
///
/// The grammar admits any plausible tag; whether a format can actually be
/// produced is decided by the pipeline and the server's configured output
/// formats, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Format(String);

impl Format {
    /// Returns the IANA media type conventionally paired with this format
    /// tag, falling back to `application/octet-stream` for unknown tags.
    pub fn media_type(&self) -> &'static str {
        match self.0.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "tif" | "tiff" => "image/tiff",
            "jp2" => "image/jp2",
            "pdf" => "application/pdf",
            _ => "application/octet-stream",
        }
    }
}

impl TryFrom<String> for Format {
    type Error = LanternImageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let accepted = !value.is_empty()
            && value.len() <= 8
            && value
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());

        if accepted {
            Ok(Self(value))
        } else {
            Err(LanternImageError::InvalidAttribute(format!(
                "Format \"{value}\" is not a recognized format tag"
            )))
        }
    }
}

impl Default for Format {
    fn default() -> Self {
        Self("jpg".into())
    }
}

macro_rules! impl_token_conversions {
    ($($name:ident),+) => {
        $(
            impl $name {
                /// Returns the validated raw token.
                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl FromStr for $name {
                type Err = LanternImageError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    $name::try_from(s.to_owned())
                }
            }

            impl From<$name> for String {
                fn from(value: $name) -> Self {
                    value.0
                }
            }

            impl Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )+
    };
}

impl_token_conversions!(Region, Size, Rotation, Quality, Format);

/// The validated transformation request: all five IIIF dimensions, with
/// spec-defined defaults for the ones the request omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// The requested region of the source image
    pub region: Region,
    /// The requested output scale
    pub size: Size,
    /// The requested rotation
    pub rotation: Rotation,
    /// The requested tonal quality
    pub quality: Quality,
    /// The requested output format tag
    pub format: Format,
}

impl ParameterSet {
    /// Parses a parameter mapping into a validated [`ParameterSet`].
    ///
    /// Only the five recognized keys are consulted; unrecognized keys are
    /// ignored so that future protocol revisions remain routable. A token
    /// that violates its grammar fails the whole parse with
    /// [`LanternImageError::InvalidAttribute`].
    pub fn parse(raw: &HashMap<String, String>) -> Result<Self, LanternImageError> {
        let mut parameters = ParameterSet::default();

        for (key, value) in raw {
            match key.as_str() {
                "region" => parameters.region = Region::from_str(value)?,
                "size" => parameters.size = Size::from_str(value)?,
                "rotation" => parameters.rotation = Rotation::from_str(value)?,
                "quality" => parameters.quality = Quality::from_str(value)?,
                "format" => parameters.format = Format::from_str(value)?,
                _ => (),
            }
        }

        Ok(parameters)
    }
}
