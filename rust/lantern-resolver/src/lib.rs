#![warn(missing_docs)]

//! Identifier-to-file resolution for an IIIF image service.
//!
//! A [`FileResolver`] turns an opaque [`Identifier`](lantern_image::Identifier)
//! into a readable local file, reporting absence as a first-class
//! [`Resolution::NotFound`] rather than an error. Two strategies are
//! provided:
//!
//! - [`LocalResolver`] serves files under a configured root directory,
//!   with URL-semantics containment validation so hostile identifiers
//!   cannot escape the root.
//! - [`RemoteCachingResolver`] maps identifiers to remote locators via an
//!   injected function, fetches each locator at most once through an
//!   [`ObjectStore`], and caches the bytes on disk addressed by a digest
//!   of the locator string. Cache writes go through a temporary file and
//!   an atomic rename, so a file observed at its final path is always
//!   complete.
//!
//! Object stores cover plain HTTP(S) locators ([`HttpObjectStore`]) and
//! `s3://bucket/key` locators fetched with SigV4 presigned GETs
//! ([`S3ObjectStore`]).

mod error;
pub use error::*;

mod location;
pub use location::*;

mod resolver;
pub use resolver::*;

mod store;
pub use store::*;

#[cfg(any(test, feature = "helpers"))]
mod helpers;
#[cfg(any(test, feature = "helpers"))]
pub use helpers::*;
