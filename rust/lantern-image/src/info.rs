//! IIIF information document assembly.

use serde_json::{Map, Value, json};

use crate::Format;

/// The JSON-LD context identifying IIIF Image API 2 documents.
pub const CONTEXT_URI: &str = "http://iiif.io/api/image/2/context.json";

/// The fixed IIIF protocol URI.
pub const PROTOCOL_URI: &str = "http://iiif.io/api/image";

/// The level1 compliance profile this service advertises.
pub const LEVEL1_PROFILE_URI: &str = "http://iiif.io/api/image/2/level1.json";

/// The `Link` header value advertising the compliance profile.
pub const PROFILE_LINK_HEADER: &str = "<http://iiif.io/api/image/2/level1.json>;rel=\"profile\"";

/// Assembles the `info.json` document for one resource.
///
/// The merge order follows the protocol's layering: the resource
/// description first, then the server's fixed context/protocol block, then
/// policy-contributed service keys. Later layers win on key collisions.
pub fn information_document(
    description: Map<String, Value>,
    canonical_url: &str,
    output_formats: &[Format],
    service_info: Map<String, Value>,
) -> Map<String, Value> {
    let formats: Vec<Value> = output_formats
        .iter()
        .map(|format| Value::from(format.as_str()))
        .collect();

    let mut document = description;
    document.insert("@context".into(), Value::from(CONTEXT_URI));
    document.insert("@id".into(), Value::from(canonical_url));
    document.insert("protocol".into(), Value::from(PROTOCOL_URI));
    document.insert(
        "profile".into(),
        json!([LEVEL1_PROFILE_URI, { "formats": formats }]),
    );
    document.extend(service_info);

    document
}
