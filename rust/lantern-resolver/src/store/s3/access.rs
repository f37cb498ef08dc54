//! AWS Signature Version 4 presigning for object GETs.
//!
//! Implements [query string authentication] for S3-compatible services
//! including AWS S3 and Cloudflare R2. Only the GET flavor is provided;
//! this crate never writes to remote stores.
//!
//! [query string authentication]: https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-query-string-auth.html

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt::Write as FmtWrite;
use url::Url;

use crate::ObjectStoreError;

/// Presigned URL expiration: 1 hour.
const EXPIRES: u64 = 3600;

/// How requests to an S3-compatible service are authorized.
#[derive(Clone)]
pub enum Access {
    /// The bucket allows anonymous reads; requests go out unsigned
    Public,
    /// Requests are presigned with these credentials
    Credentials {
        /// AWS Access Key ID
        access_key_id: String,
        /// AWS Secret Access Key
        secret_access_key: String,
    },
}

impl Access {
    /// Authorizes a GET of `url`, returning the URL to actually fetch.
    pub(crate) fn authorize(
        &self,
        url: Url,
        region: &str,
        time: DateTime<Utc>,
    ) -> Result<Url, ObjectStoreError> {
        match self {
            Access::Public => Ok(url),
            Access::Credentials {
                access_key_id,
                secret_access_key,
            } => presign_get(url, access_key_id, secret_access_key, region, time),
        }
    }
}

/// Builds a presigned GET URL for `url`.
///
/// The only signed header is `host`, and the payload is declared
/// `UNSIGNED-PAYLOAD`, as presigned GETs carry no body.
fn presign_get(
    url: Url,
    access_key_id: &str,
    secret_access_key: &str,
    region: &str,
    time: DateTime<Utc>,
) -> Result<Url, ObjectStoreError> {
    let timestamp = time.format("%Y%m%dT%H%M%SZ").to_string();
    let date = &timestamp[0..8];

    let key = SigningKey::derive(secret_access_key, date, region, "s3");
    let scope = format!("{date}/{region}/s3/aws4_request");

    // hostname does not include the port, so append it when present
    let hostname = url
        .host_str()
        .ok_or_else(|| ObjectStoreError::Authorization("URL missing host".into()))?;
    let host = match url.port() {
        Some(port) => format!("{hostname}:{port}"),
        None => hostname.to_string(),
    };

    let mut query_params: Vec<(String, String)> = vec![
        ("X-Amz-Algorithm".into(), "AWS4-HMAC-SHA256".into()),
        ("X-Amz-Content-Sha256".into(), "UNSIGNED-PAYLOAD".into()),
        ("X-Amz-Credential".into(), format!("{access_key_id}/{scope}")),
        ("X-Amz-Date".into(), timestamp.clone()),
        ("X-Amz-Expires".into(), EXPIRES.to_string()),
        ("X-Amz-SignedHeaders".into(), "host".into()),
    ];

    // Carry any query parameters already present on the object URL
    for (key, value) in url.query_pairs() {
        query_params.push((key.into_owned(), value.into_owned()));
    }

    // SigV4 requires the canonical query in sorted order
    query_params.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical_query: String = query_params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let canonical_request = format!(
        "GET\n{}\n{}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
        percent_encode_path(url.path()),
        canonical_query,
        host
    );

    let digest = Sha256::digest(canonical_request.as_bytes());
    let payload = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        timestamp,
        scope,
        hex_encode(&digest)
    );
    let signature = key.sign(payload.as_bytes());

    let mut signed = url;
    signed.set_query(None);
    {
        let mut query = signed.query_pairs_mut();
        for (k, v) in &query_params {
            query.append_pair(k, v);
        }
        query.append_pair("X-Amz-Signature", &signature);
    }

    Ok(signed)
}

/// AWS SigV4 signing key derived from a secret.
///
/// The key is derived through an HMAC chain:
/// `HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")`
struct SigningKey(Vec<u8>);

impl SigningKey {
    fn derive(secret: &str, date: &str, region: &str, service: &str) -> Self {
        let secret = format!("AWS4{secret}");
        let k_date = Self::hmac(secret.as_bytes(), date.as_bytes());
        let k_region = Self::hmac(&k_date, region.as_bytes());
        let k_service = Self::hmac(&k_region, service.as_bytes());
        Self(Self::hmac(&k_service, b"aws4_request"))
    }

    fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(key).expect("HMAC-SHA256 accepts keys of any size");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    /// Signs `data`, returning the lowercase hex signature.
    fn sign(&self, data: &[u8]) -> String {
        hex_encode(&Self::hmac(&self.0, data))
    }
}

/// Encode bytes as a lowercase hexadecimal string.
fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(s, "{:02x}", byte).unwrap();
    }
    s
}

/// Percent-encode a string according to RFC 3986.
///
/// Unreserved characters (A-Z, a-z, 0-9, `-`, `_`, `.`, `~`) are not
/// encoded. All other bytes become `%XX` with uppercase hex.
fn percent_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len() * 3);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                write!(result, "%{:02X}", byte).unwrap();
            }
        }
    }
    result
}

/// Percent-encode a URL path, preserving forward slashes.
fn percent_encode_path(path: &str) -> String {
    percent_encode(path).replace("%2F", "/")
}
