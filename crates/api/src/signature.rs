//! HMAC-SHA256 signatures on inbound webhook bodies.
//!
//! When a webhook secret is configured, the VCS service signs each delivery
//! and sends `X-Hub-Signature: sha256=<hex>`. The raw body is verified before
//! it is parsed.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use toolz_core::error::CoreError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature";

/// Decode a `sha256=<hex>` header value. `None` if malformed.
///
/// ```
/// use toolz_api::signature::parse_signature_header;
///
/// assert!(parse_signature_header("sha256=abcd1234").is_some());
/// assert!(parse_signature_header("sha1=abcd1234").is_none());
/// assert!(parse_signature_header("sha256=xyz").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.trim().strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}

/// Header value a sender with `secret` would attach to `payload`.
pub fn sign(payload: &[u8], secret: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of `signature_header` against `payload`.
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(expected) = parse_signature_header(signature_header) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Verify a delivery if `secret` is set; a missing or wrong signature is
/// [`CoreError::Unauthorized`].
pub fn authorize(headers: &HeaderMap, body: &[u8], secret: Option<&str>) -> Result<(), CoreError> {
    let Some(secret) = secret else {
        return Ok(());
    };

    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| CoreError::Unauthorized("Missing webhook signature".into()))?;

    if !verify_signature(body, header, secret.as_bytes()) {
        tracing::warn!("Invalid webhook signature");
        return Err(CoreError::Unauthorized("Invalid webhook signature".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    #[test]
    fn signed_payload_verifies() {
        let header = sign(b"{\"changes\":[]}", b"hush");

        assert!(verify_signature(b"{\"changes\":[]}", &header, b"hush"));
        assert!(!verify_signature(b"{\"changes\":[]}", &header, b"other"));
        assert!(!verify_signature(b"{\"changes\":[1]}", &header, b"hush"));
    }

    #[test]
    fn header_uses_full_length_hex() {
        let header = sign(b"payload", b"secret");
        let hex_part = header.strip_prefix("sha256=").unwrap();
        assert_eq!(hex_part.len(), 64);
        assert_eq!(parse_signature_header(&header).unwrap().len(), 32);
    }

    #[test]
    fn no_secret_accepts_anything() {
        assert!(authorize(&HeaderMap::new(), b"anything", None).is_ok());
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let result = authorize(&HeaderMap::new(), b"body", Some("hush"));
        assert_matches!(result, Err(CoreError::Unauthorized(_)));
    }

    #[test]
    fn matching_header_is_authorized() {
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&sign(b"body", b"hush")).unwrap(),
        );

        assert!(authorize(&headers, b"body", Some("hush")).is_ok());
        assert_matches!(
            authorize(&headers, b"tampered", Some("hush")),
            Err(CoreError::Unauthorized(_))
        );
    }
}
