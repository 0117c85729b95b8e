//! HTTP message signatures for federation traffic
//!
//! A canonical signing string is built from an ordered list of logical
//! header names: the `(request-target)` pseudo-header renders as
//! `(request-target): <lowercased-method> <path>`, every other name as
//! `name: value`, joined by newlines. The string is signed with the
//! actor's Ed25519 key and carried in a `Signature` header alongside
//! `Date` and a `Digest` of the body.
//!
//! Verification never lets an error escape: any parse failure, missing
//! header, unknown key, or cryptographic mismatch collapses to `false`.

use base64::Engine;
use chrono::Utc;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use hyper::HeaderMap;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::keys::ActorKeys;

/// Logical headers covered by outgoing signatures, in signing order
pub const SIGNED_HEADER_NAMES: &str = "(request-target) host date digest";

/// Header values to attach to an outgoing signed request
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    pub date: String,
    pub digest: String,
    pub signature: String,
}

/// `Digest` header value for a request body
pub fn body_digest(body: &[u8]) -> String {
    format!(
        "SHA-256={}",
        base64::engine::general_purpose::STANDARD.encode(Sha256::digest(body))
    )
}

/// Current instant as an IMF-fixdate `Date` header value
pub fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Sign an outgoing request, producing `Date`, `Digest`, and `Signature`
/// header values.
pub fn sign_request(
    keys: &ActorKeys,
    method: &str,
    path: &str,
    host: &str,
    body: &[u8],
) -> SignedHeaders {
    let date = http_date();
    let digest = body_digest(body);

    let signing_string = format!(
        "(request-target): {} {}\nhost: {}\ndate: {}\ndigest: {}",
        method.to_lowercase(),
        path,
        host,
        date,
        digest
    );
    let signature = keys.sign(signing_string.as_bytes());

    SignedHeaders {
        date,
        digest,
        signature: format!(
            "keyId=\"{}\",algorithm=\"ed25519\",headers=\"{}\",signature=\"{}\"",
            keys.key_id, SIGNED_HEADER_NAMES, signature
        ),
    }
}

/// Extract the `keyId` parameter from a request's `Signature` header, so
/// the caller can resolve the verification key before checking.
pub fn key_id_of(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("signature")?.to_str().ok()?;
    parse_signature_params(raw).remove("keyId")
}

/// Verify an incoming signed request against a resolved public key.
/// Returns `false` on any failure; never panics or propagates errors.
pub fn verify_signature<F>(
    headers: &HeaderMap,
    method: &str,
    path: &str,
    body: &[u8],
    resolve: F,
) -> bool
where
    F: Fn(&str) -> Option<VerifyingKey>,
{
    let Some(raw) = headers.get("signature").and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let mut params = parse_signature_params(raw);

    let (Some(key_id), Some(declared), Some(signature_b64)) = (
        params.remove("keyId"),
        params.remove("headers"),
        params.remove("signature"),
    ) else {
        return false;
    };

    let Some(signing_string) = build_signing_string(headers, method, path, &declared) else {
        return false;
    };

    let Some(key) = resolve(&key_id) else {
        return false;
    };
    let Ok(signature_bytes) = base64::engine::general_purpose::STANDARD.decode(signature_b64)
    else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&signature_bytes) else {
        return false;
    };
    if key.verify(signing_string.as_bytes(), &signature).is_err() {
        return false;
    }

    // The declared body digest, when present, must match the body we read
    if let Some(declared_digest) = headers.get("digest").and_then(|v| v.to_str().ok()) {
        if declared_digest != body_digest(body) {
            return false;
        }
    }

    true
}

/// Parse the comma-separated `key="value"` parameters of a Signature header
fn parse_signature_params(raw: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for part in raw.split(',') {
        if let Some((key, value)) = part.split_once('=') {
            params.insert(
                key.trim().to_string(),
                value.trim().trim_matches('"').to_string(),
            );
        }
    }
    params
}

/// Rebuild the canonical signing string from the caller-declared header
/// list. `None` when a declared header is absent from the request.
fn build_signing_string(
    headers: &HeaderMap,
    method: &str,
    path: &str,
    declared: &str,
) -> Option<String> {
    let mut lines = Vec::new();
    for name in declared.split_whitespace() {
        if name == "(request-target)" {
            lines.push(format!(
                "(request-target): {} {}",
                method.to_lowercase(),
                path
            ));
        } else {
            let value = headers.get(name)?.to_str().ok()?;
            lines.push(format!("{}: {}", name, value));
        }
    }
    if lines.is_empty() {
        return None;
    }
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{HeaderName, HeaderValue};

    fn test_keys() -> ActorKeys {
        let dir = tempfile::tempdir().unwrap();
        ActorKeys::load_or_generate(
            &dir.path().join("key.json"),
            "https://board.example.org/board#main-key".to_string(),
        )
        .unwrap()
    }

    fn signed_header_map(signed: &SignedHeaders, host: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_str(host).unwrap());
        headers.insert("date", HeaderValue::from_str(&signed.date).unwrap());
        headers.insert("digest", HeaderValue::from_str(&signed.digest).unwrap());
        headers.insert(
            HeaderName::from_static("signature"),
            HeaderValue::from_str(&signed.signature).unwrap(),
        );
        headers
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let keys = test_keys();
        let body = br#"{"type":"Announce"}"#;
        let signed = sign_request(&keys, "POST", "/board/inbox", "board.example.org", body);
        let headers = signed_header_map(&signed, "board.example.org");

        let key = keys.verifying_key();
        assert!(verify_signature(&headers, "POST", "/board/inbox", body, |key_id| {
            (key_id == keys.key_id).then_some(key)
        }));
    }

    #[test]
    fn test_flipped_body_byte_fails() {
        let keys = test_keys();
        let body = b"payload";
        let signed = sign_request(&keys, "POST", "/board/inbox", "board.example.org", body);
        let headers = signed_header_map(&signed, "board.example.org");

        let key = keys.verifying_key();
        assert!(!verify_signature(
            &headers,
            "POST",
            "/board/inbox",
            b"paYload",
            |_| Some(key)
        ));
    }

    #[test]
    fn test_mismatched_key_fails() {
        let keys = test_keys();
        let other = test_keys();
        let body = b"payload";
        let signed = sign_request(&keys, "POST", "/board/inbox", "board.example.org", body);
        let headers = signed_header_map(&signed, "board.example.org");

        let wrong = other.verifying_key();
        assert!(!verify_signature(
            &headers,
            "POST",
            "/board/inbox",
            body,
            |_| Some(wrong)
        ));
    }

    #[test]
    fn test_missing_signature_header_is_false_not_panic() {
        let headers = HeaderMap::new();
        assert!(!verify_signature(&headers, "POST", "/board/inbox", b"", |_| None));
        assert!(key_id_of(&headers).is_none());
    }

    #[test]
    fn test_tampered_target_fails() {
        let keys = test_keys();
        let body = b"payload";
        let signed = sign_request(&keys, "POST", "/board/inbox", "board.example.org", body);
        let headers = signed_header_map(&signed, "board.example.org");

        let key = keys.verifying_key();
        assert!(!verify_signature(
            &headers,
            "POST",
            "/other/inbox",
            body,
            |_| Some(key)
        ));
    }

    #[test]
    fn test_key_id_extraction() {
        let keys = test_keys();
        let signed = sign_request(&keys, "GET", "/board", "board.example.org", b"");
        let headers = signed_header_map(&signed, "board.example.org");
        assert_eq!(key_id_of(&headers).as_deref(), Some(keys.key_id.as_str()));
    }

    #[test]
    fn test_unknown_key_resolves_to_false() {
        let keys = test_keys();
        let body = b"payload";
        let signed = sign_request(&keys, "POST", "/board/inbox", "board.example.org", body);
        let headers = signed_header_map(&signed, "board.example.org");
        assert!(!verify_signature(&headers, "POST", "/board/inbox", body, |_| None));
    }

    #[test]
    fn test_digest_format() {
        assert!(body_digest(b"hello").starts_with("SHA-256="));
    }
}
