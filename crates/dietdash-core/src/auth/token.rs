//! Client-side inspection of bearer tokens.
//!
//! Tokens are three dot-separated base64url segments (header, payload,
//! signature). Only the payload is decoded here and the signature is never
//! checked: the backend is the sole authority on whether a token is
//! genuine. Everything in this module exists for UI convenience (display
//! name, admin affordances, expiry countdowns) and must not be used to make
//! authorization decisions.
//!
//! Every check fails closed: a token that cannot be decoded is treated
//! exactly like an expired or absent one.

use std::collections::HashMap;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds before `exp` at which a token already counts as expired.
/// Covers requests that are in flight when the token runs out.
pub const EXPIRY_BUFFER_SECS: i64 = 60;

/// Default window for `is_near_expiry`, in minutes.
pub const NEAR_EXPIRY_MINUTES: i64 = 5;

/// Number of segments in a well-formed token
const TOKEN_SEGMENTS: usize = 3;

/// base64url decoder that accepts the payload with or without `=` padding.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decoded claims segment of a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Payload {
    /// Subject (user) id
    #[serde(default)]
    pub sub: String,
    /// Expiry as Unix seconds
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_given: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Remaining profile claims, kept as-is
    #[serde(flatten)]
    #[cfg_attr(feature = "ts", ts(skip))]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Payload {
    pub fn is_admin(&self) -> bool {
        self.is_admin.unwrap_or(false)
    }

    /// Consent counts only when the claim is literally `true`.
    pub fn has_consent(&self) -> bool {
        self.consent_given == Some(true)
    }

    /// Name to show in the dashboard header
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.sub)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Why a token could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    Empty,
    SegmentCount(usize),
    Base64,
    Json,
}

/// Result of inspecting a token at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenStatus {
    Malformed(MalformedReason),
    Expired { exp: i64 },
    Valid(Payload),
}

impl TokenStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, TokenStatus::Valid(_))
    }
}

/// Decode the payload segment, distinguishing the ways it can fail.
pub fn try_decode_payload(token: &str) -> Result<Payload, MalformedReason> {
    if token.is_empty() {
        return Err(MalformedReason::Empty);
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != TOKEN_SEGMENTS {
        return Err(MalformedReason::SegmentCount(segments.len()));
    }

    let bytes = PAYLOAD_ENGINE
        .decode(segments[1])
        .map_err(|_| MalformedReason::Base64)?;

    serde_json::from_slice(&bytes).map_err(|_| MalformedReason::Json)
}

/// Decode the payload segment, or `None` if the token is malformed.
pub fn decode_payload(token: &str) -> Option<Payload> {
    try_decode_payload(token).ok()
}

pub fn inspect_at(token: &str, now: DateTime<Utc>) -> TokenStatus {
    match try_decode_payload(token) {
        Err(reason) => TokenStatus::Malformed(reason),
        Ok(payload) if payload.exp <= now.timestamp().saturating_add(EXPIRY_BUFFER_SECS) => {
            TokenStatus::Expired { exp: payload.exp }
        }
        Ok(payload) => TokenStatus::Valid(payload),
    }
}

pub fn inspect(token: &str) -> TokenStatus {
    inspect_at(token, Utc::now())
}

pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    !inspect_at(token, now).is_valid()
}

/// True if the token is undecodable or expires within the safety buffer.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}

pub fn is_near_expiry_at(token: &str, threshold_minutes: i64, now: DateTime<Utc>) -> bool {
    match decode_payload(token) {
        Some(payload) => {
            payload.exp < now.timestamp().saturating_add(threshold_minutes.saturating_mul(60))
        }
        None => true,
    }
}

/// True if the token is undecodable or expires within `threshold_minutes`.
pub fn is_near_expiry(token: &str, threshold_minutes: i64) -> bool {
    is_near_expiry_at(token, threshold_minutes, Utc::now())
}

pub fn time_remaining_at(token: &str, now: DateTime<Utc>) -> i64 {
    decode_payload(token)
        .map(|payload| payload.exp.saturating_sub(now.timestamp()).max(0))
        .unwrap_or(0)
}

/// Seconds until `exp`, clamped at zero. Undecodable tokens have none left.
pub fn time_remaining(token: &str) -> i64 {
    time_remaining_at(token, Utc::now())
}

pub fn is_valid_at(token: &str, now: DateTime<Utc>) -> bool {
    inspect_at(token, now).is_valid()
}

pub fn is_valid(token: &str) -> bool {
    is_valid_at(token, Utc::now())
}

#[cfg(test)]
pub(crate) mod test_tokens {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::Utc;
    use serde_json::Value;

    /// Build an unsigned token around the given claims.
    pub fn token_with(claims: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{}.{}.signature", header, payload)
    }

    /// Token for subject `u1` expiring `offset_secs` from now.
    pub fn token_expiring_in(offset_secs: i64, consent: bool) -> String {
        token_with(serde_json::json!({
            "sub": "u1",
            "exp": Utc::now().timestamp() + offset_secs,
            "consent_given": consent,
        }))
    }
}
