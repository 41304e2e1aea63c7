//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! Only the `Authorization` header is produced; the caller sends the request.
//! Multipart and JSON bodies are not part of the signature base string, only
//! query and form parameters are.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha1::Sha1;

use crate::error::PlatformError;

type HmacSha1 = Hmac<Sha1>;

/// The four secrets of an OAuth 1.0a user context
#[derive(Clone, Copy)]
pub struct OAuth1Keys<'a> {
    pub consumer_key: &'a str,
    pub consumer_secret: &'a str,
    pub token: &'a str,
    pub token_secret: &'a str,
}

/// Per-request values that must be unique (nonce) or current (timestamp)
#[derive(Debug, Clone)]
pub struct OAuth1Nonce {
    pub nonce: String,
    pub timestamp: i64,
}

impl OAuth1Nonce {
    pub fn generate() -> Self {
        let nonce = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        Self {
            nonce,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

fn encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

fn oauth_params(keys: &OAuth1Keys<'_>, nonce: &OAuth1Nonce) -> Vec<(String, String)> {
    vec![
        ("oauth_consumer_key".to_string(), keys.consumer_key.to_string()),
        ("oauth_nonce".to_string(), nonce.nonce.clone()),
        ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
        ("oauth_timestamp".to_string(), nonce.timestamp.to_string()),
        ("oauth_token".to_string(), keys.token.to_string()),
        ("oauth_version".to_string(), "1.0".to_string()),
    ]
}

/// Compute `oauth_signature` for a request
///
/// `url` must not carry a query string; pass query and form parameters in
/// `params` instead.
pub fn signature(
    keys: &OAuth1Keys<'_>,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    nonce: &OAuth1Nonce,
) -> Result<String, PlatformError> {
    let mut pairs: Vec<(String, String)> = oauth_params(keys, nonce)
        .into_iter()
        .chain(params.iter().map(|(k, v)| (k.to_string(), v.to_string())))
        .map(|(k, v)| (encode(&k), encode(&v)))
        .collect();
    pairs.sort();

    let parameter_string = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let base_string = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(url),
        encode(&parameter_string)
    );
    let signing_key = format!("{}&{}", encode(keys.consumer_secret), encode(keys.token_secret));

    let mut mac = HmacSha1::new_from_slice(signing_key.as_bytes())
        .map_err(|e| PlatformError::Validation(format!("Invalid OAuth signing key: {}", e)))?;
    mac.update(base_string.as_bytes());

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Build the `Authorization: OAuth ...` header value
pub fn authorization_header(
    keys: &OAuth1Keys<'_>,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    nonce: &OAuth1Nonce,
) -> Result<String, PlatformError> {
    let signature = signature(keys, method, url, params, nonce)?;

    let mut header_params = oauth_params(keys, nonce);
    header_params.push(("oauth_signature".to_string(), signature));
    header_params.sort();

    let fields = header_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!("OAuth {}", fields))
}
