// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Signed WebSocket auth tokens.
//!
//! # Format
//!
//! ```text
//! base64url(JSON claims) "." hex(HMAC_SHA256(secret, JSON claims))
//! ```
//!
//! Claims: `{agent_id, session_id?, iat, exp}` with `exp = iat + 3600`.
//!
//! # Security model
//!
//! The REST process mints tokens; the bridge verifies them by recomputing
//! the MAC over the decoded claims bytes and comparing with
//! [`subtle::ConstantTimeEq`] to prevent timing oracles. Expiry is checked
//! after the signature so an attacker cannot distinguish "bad signature"
//! from "expired" timing-wise before the MAC check.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Token lifetime in seconds.
pub const TOKEN_TTL_SECS: i64 = 3600;

/// The signed claims carried inside a token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

impl TokenClaims {
    /// Claims for `agent_id` issued at `now` with the standard TTL.
    pub fn issue(
        agent_id: impl Into<String>,
        session_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let iat = now.timestamp();
        Self {
            agent_id: agent_id.into(),
            session_id,
            iat,
            exp: iat + TOKEN_TTL_SECS,
        }
    }
}

/// Why a token was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

impl TokenError {
    /// Stable error code surfaced on the WS `error` frame.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Malformed => "AUTH_MALFORMED",
            TokenError::BadSignature => "AUTH_INVALID",
            TokenError::Expired => "AUTH_EXPIRED",
        }
    }
}

/// Sign `claims` into the wire format.
pub fn sign_token(claims: &TokenClaims, secret: &[u8]) -> String {
    // A struct of strings and integers always serializes.
    let payload = serde_json::to_vec(claims).unwrap_or_default();
    let sig = mac(secret, &payload);
    format!("{}.{}", base64url_encode(&payload), hex::encode(sig))
}

/// Verify a token string and return its claims.
///
/// The signature is recomputed over the decoded payload bytes, so the check
/// is independent of JSON field ordering in the claims.
pub fn verify_token(
    token: &str,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<TokenClaims, TokenError> {
    let (payload_b64, sig_hex) = token.split_once('.').ok_or(TokenError::Malformed)?;
    let payload = base64url_decode(payload_b64).ok_or(TokenError::Malformed)?;
    let provided = hex::decode(sig_hex).map_err(|_| TokenError::Malformed)?;

    let expected = mac(secret, &payload);
    if !bool::from(expected.ct_eq(provided.as_slice())) {
        return Err(TokenError::BadSignature);
    }

    let claims: TokenClaims =
        serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
    if claims.exp <= now.timestamp() {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn mac(secret: &[u8], payload: &[u8]) -> [u8; 32] {
    // HMAC accepts keys of any length.
    let mut m = HmacSha256::new_from_slice(secret).unwrap_or_else(|_| unreachable!());
    m.update(payload);
    m.finalize().into_bytes().into()
}

fn base64url_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn base64url_decode(s: &str) -> Option<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(s).ok()
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &[u8] = b"unit-test-secret";

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).unwrap()
    }

    #[test]
    fn sign_verify_round_trip() {
        let claims = TokenClaims::issue("orc", Some("S1".into()), at(1_000_000));
        let token = sign_token(&claims, SECRET);
        let back = verify_token(&token, SECRET, at(1_000_100)).unwrap();
        assert_eq!(back.agent_id, "orc");
        assert_eq!(back.session_id.as_deref(), Some("S1"));
        assert_eq!(back.exp, 1_000_000 + TOKEN_TTL_SECS);
    }

    #[test]
    fn expired_token_is_refused_with_expired() {
        let claims = TokenClaims::issue("orc", None, at(1_000_000));
        let token = sign_token(&claims, SECRET);
        let err = verify_token(&token, SECRET, at(1_000_000 + TOKEN_TTL_SECS)).unwrap_err();
        assert_eq!(err, TokenError::Expired);
        assert_eq!(err.code(), "AUTH_EXPIRED");
    }

    #[test]
    fn wrong_secret_is_bad_signature() {
        let claims = TokenClaims::issue("orc", None, at(1_000_000));
        let token = sign_token(&claims, SECRET);
        let err = verify_token(&token, b"other-secret", at(1_000_100)).unwrap_err();
        assert_eq!(err, TokenError::BadSignature);
    }

    #[test]
    fn tampered_payload_is_bad_signature() {
        let claims = TokenClaims::issue("orc", None, at(1_000_000));
        let token = sign_token(&claims, SECRET);
        let forged = TokenClaims::issue("admin", None, at(1_000_000));
        let forged_payload = serde_json::to_vec(&forged).unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        let tampered = format!("{}.{}", base64url_encode(&forged_payload), sig);
        assert_eq!(
            verify_token(&tampered, SECRET, at(1_000_100)).unwrap_err(),
            TokenError::BadSignature
        );
    }

    #[test]
    fn garbage_is_malformed() {
        for bad in ["", "no-dot", "a.b", "!!!.000", "YQ.zz"] {
            assert_eq!(
                verify_token(bad, SECRET, at(0)).unwrap_err(),
                TokenError::Malformed,
                "token {bad:?} must be malformed"
            );
        }
    }

    #[test]
    fn session_id_is_omitted_when_none() {
        let claims = TokenClaims::issue("orc", None, at(1));
        let json = serde_json::to_string(&claims).unwrap();
        assert!(!json.contains("session_id"), "None must not serialize");
    }
}
