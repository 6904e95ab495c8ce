//! Custom HS256 JWT issuance and verification.
//!
//! No JWT crate is introduced: the signing primitive is the same direct
//! `sha2`/`hmac`/`subtle` combination already used for bearer-token
//! comparison elsewhere in this crate, applied to the standard
//! `header.payload.signature` base64url layout.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const ISSUER: &str = "xactions";
const AUDIENCE: &str = "a2a";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub permissions: Vec<String>,
}

#[derive(Debug)]
pub enum TokenError {
    Malformed,
    SignatureMismatch,
    Expired,
}

fn b64(value: &impl Serialize) -> String {
    URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).expect("serializable"))
}

fn sign(secret: &[u8], signing_input: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(signing_input.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Issues a fresh HS256 token for `subject` with the given permissions
/// and time-to-live.
pub fn issue(secret: &[u8], subject: &str, permissions: Vec<String>, ttl: chrono::Duration) -> String {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: subject.to_string(),
        iss: ISSUER.to_string(),
        aud: AUDIENCE.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
        permissions,
    };
    encode(secret, &claims)
}

fn encode(secret: &[u8], claims: &Claims) -> String {
    let header_b64 = b64(&Header::default());
    let payload_b64 = b64(claims);
    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = sign(secret, &signing_input);
    let signature_b64 = URL_SAFE_NO_PAD.encode(signature);
    format!("{signing_input}.{signature_b64}")
}

/// Splits the three base64url segments, recomputes the signature, and
/// compares it in constant time; rejects on malformed structure,
/// signature mismatch, or an expired `exp`.
pub fn verify(secret: &[u8], token: &str) -> Result<Claims, TokenError> {
    let mut parts = token.split('.');
    let (header_b64, payload_b64, signature_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) => (h, p, s),
        _ => return Err(TokenError::Malformed),
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).map_err(|_| TokenError::Malformed)?;
    let _header: Header =
        serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Malformed)?;

    let payload_bytes = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| TokenError::Malformed)?;
    let claims: Claims =
        serde_json::from_slice(&payload_bytes).map_err(|_| TokenError::Malformed)?;

    let presented_signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| TokenError::Malformed)?;

    let signing_input = format!("{header_b64}.{payload_b64}");
    let expected_signature = sign(secret, &signing_input);

    let matches: bool = expected_signature.ct_eq(&presented_signature).into();
    if !matches {
        return Err(TokenError::SignatureMismatch);
    }

    if claims.exp < chrono::Utc::now().timestamp() {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}

/// Exchanges a valid token for a new one with a fresh expiry and
/// identical subject/permissions.
pub fn refresh(secret: &[u8], token: &str, ttl: chrono::Duration) -> Result<String, TokenError> {
    let claims = verify(secret, token)?;
    Ok(issue(secret, &claims.sub, claims.permissions, ttl))
}

/// `hasPermission`: true iff `admin` is present or `required` is present.
pub fn has_permission(claims: &Claims, required: &str) -> bool {
    claims.permissions.iter().any(|p| p == "admin" || p == required)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-at-least-as-long-as-a-real-one";

    #[test]
    fn issued_token_verifies() {
        let token = issue(SECRET, "agent-1", vec!["read".to_string()], chrono::Duration::hours(1));
        let claims = verify(SECRET, &token).unwrap();
        assert_eq!(claims.sub, "agent-1");
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.aud, AUDIENCE);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue(SECRET, "agent-1", vec![], chrono::Duration::seconds(-1));
        assert!(matches!(verify(SECRET, &token), Err(TokenError::Expired)));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let token = issue(SECRET, "agent-1", vec![], chrono::Duration::hours(1));
        let mut parts: Vec<&str> = token.split('.').collect();
        let tampered_sig = if parts[2].starts_with('A') { "B" } else { "A" };
        parts[2] = tampered_sig;
        let tampered = parts.join(".");
        assert!(matches!(verify(SECRET, &tampered), Err(TokenError::SignatureMismatch)));
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(matches!(verify(SECRET, "not-a-jwt"), Err(TokenError::Malformed)));
        assert!(matches!(verify(SECRET, "a.b"), Err(TokenError::Malformed)));
        assert!(matches!(verify(SECRET, "a.b.c.d"), Err(TokenError::Malformed)));
    }

    #[test]
    fn refresh_preserves_subject_and_permissions() {
        let token = issue(SECRET, "agent-1", vec!["write".to_string()], chrono::Duration::hours(1));
        let refreshed = refresh(SECRET, &token, chrono::Duration::hours(2)).unwrap();
        let claims = verify(SECRET, &refreshed).unwrap();
        assert_eq!(claims.sub, "agent-1");
        assert_eq!(claims.permissions, vec!["write".to_string()]);
    }

    #[test]
    fn admin_permission_satisfies_any_requirement() {
        let claims = Claims {
            sub: "x".to_string(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            iat: 0,
            exp: i64::MAX,
            permissions: vec!["admin".to_string()],
        };
        assert!(has_permission(&claims, "anything"));
    }
}
