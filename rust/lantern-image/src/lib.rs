#![warn(missing_docs)]

//! Core data model for an IIIF Image API service.
//!
//! This crate contains the request-side vocabulary of the IIIF Image API:
//! validated [`Identifier`]s, the five-dimension [`ParameterSet`] grammar,
//! and the per-request [`ImageResource`] that couples an identifier with a
//! resolved source file and an opaque [`ImagePipeline`] capability.
//!
//! The pixel-level transformation work is deliberately out of scope here.
//! An [`ImagePipeline`] receives the validated parameter tokens verbatim
//! and is responsible for interpreting them; this crate only guarantees
//! that every token it forwards conforms to the IIIF grammar.

mod error;
pub use error::*;

mod identifier;
pub use identifier::*;

mod parameters;
pub use parameters::*;

mod pipeline;
pub use pipeline::*;

mod resource;
pub use resource::*;

mod info;
pub use info::*;

#[cfg(any(test, feature = "helpers"))]
mod helpers;
#[cfg(any(test, feature = "helpers"))]
pub use helpers::*;
