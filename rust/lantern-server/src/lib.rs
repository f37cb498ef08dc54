#![warn(missing_docs)]

//! An IIIF Image API server.
//!
//! This crate assembles the pieces from `lantern-image` and
//! `lantern-resolver` into an HTTP endpoint: a [`ModelRegistry`] of
//! resolver/policy/pipeline triples validated at startup, a
//! [`RequestHandler`] implementing the authorization-gated request state
//! machine, an [`ImageService`] routing the three GET routes of the
//! protocol, and an [`ImageServer`] accept loop. The `lantern` binary
//! wires them together from a JSON [`ServerConfig`].
//!
//! The handler's contract on the image route is bytes-over-errors: when
//! a source is missing or access is denied, the configured substitute
//! image is rendered and returned with a 404 or 401 status rather than
//! an empty error body. The `info.json` route conversely always answers
//! with the description document, using the status code alone to signal
//! denial.

mod authorization;
pub use authorization::*;

mod config;
pub use config::*;

mod error;
pub use error::*;

mod handler;
pub use handler::*;

mod registry;
pub use registry::*;

mod server;
pub use server::*;

mod service;
pub use service::*;

#[cfg(any(test, feature = "helpers"))]
mod helpers;
#[cfg(any(test, feature = "helpers"))]
pub use helpers::*;
