//! Unverified claims decoding for U:NEAR bearer tokens.
//!
//! Tokens are JWTs in compact form. The client never checks signatures
//! (the server does that on every call); it only reads the payload to
//! schedule refreshes and to answer "is this session still usable"
//! without a network round trip.
//!
//! Every check here fails safe: a token that cannot be decoded, or that
//! carries no usable `exp` claim, is reported as expired. The worst
//! outcome of a malformed token is an unnecessary refresh, never a
//! protected call with a dead credential.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};

/// Claims read from a bearer token's payload segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// `exp` claim, when present and numeric
    pub expires_at: Option<DateTime<Utc>>,
    /// `iat` claim, when present and numeric
    pub issued_at: Option<DateTime<Utc>>,
    /// `sub` claim, when present
    pub subject: Option<String>,
}

/// Decode the claims of a compact-form token without verifying it.
///
/// Returns `None` unless the token has exactly three dot-separated
/// segments and the middle segment is base64url-encoded JSON carrying
/// an object. Individual claims that are missing or of the wrong type
/// come back as `None` fields rather than failing the whole decode.
pub fn decode(token: &str) -> Option<TokenClaims> {
    let mut segments = token.split('.');
    let (_header, payload) = match (segments.next(), segments.next(), segments.next()) {
        (Some(header), Some(payload), Some(_signature)) => (header, payload),
        _ => return None,
    };
    if segments.next().is_some() {
        return None;
    }

    // Some issuers pad the payload segment; base64url proper does not.
    let raw = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&raw).ok()?;
    let claims = value.as_object()?;

    Some(TokenClaims {
        expires_at: numeric_date(claims.get("exp")),
        issued_at: numeric_date(claims.get("iat")),
        subject: claims
            .get("sub")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    })
}

/// Whether the token is unusable right now.
///
/// True for malformed tokens and tokens without a numeric `exp` claim,
/// not just for tokens whose expiry has passed.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}

/// Whether the token is still valid but due for a proactive refresh.
///
/// Mutually exclusive with [`is_expired`]: an already-expired token is
/// not "expiring soon", it is gone.
pub fn is_expiring_soon(token: &str, threshold_secs: u64) -> bool {
    is_expiring_soon_at(token, threshold_secs, Utc::now())
}

/// Seconds of validity left. Zero when expired or undecodable.
pub fn remaining_seconds(token: &str) -> u64 {
    remaining_seconds_at(token, Utc::now())
}

pub(crate) fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    match decode(token).and_then(|claims| claims.expires_at) {
        Some(expires_at) => now >= expires_at,
        None => true,
    }
}

pub(crate) fn is_expiring_soon_at(token: &str, threshold_secs: u64, now: DateTime<Utc>) -> bool {
    if is_expired_at(token, now) {
        return false;
    }
    remaining_seconds_at(token, now) <= threshold_secs
}

pub(crate) fn remaining_seconds_at(token: &str, now: DateTime<Utc>) -> u64 {
    match decode(token).and_then(|claims| claims.expires_at) {
        Some(expires_at) if expires_at > now => (expires_at - now).num_seconds().max(0) as u64,
        _ => 0,
    }
}

/// NumericDate claims are seconds since the epoch; some issuers emit
/// them as floats. Anything else (strings included) is treated as absent.
fn numeric_date(value: Option<&serde_json::Value>) -> Option<DateTime<Utc>> {
    let value = value?;
    let secs = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))?;
    DateTime::from_timestamp(secs, 0)
}
