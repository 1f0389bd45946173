//! Auth-flow state record and its provenance tag.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::clock::Clock;

/// Payload field that must never be persisted or trusted on read.
const SOURCE_FIELD: &str = "source";
const STATUS_FIELD: &str = "status";
const ACTION_FIELD: &str = "action";
const ACCOUNT_FIELD: &str = "account";
const EXPIRES_AT_FIELD: &str = "expires_at";
const VERIFIED_AT_FIELD: &str = "verified_at";

/// Status of an auth flow. Only `verified` carries meaning here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthStatus {
    Verified,
    Other(String),
}

impl AuthStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AuthStatus::Verified => "verified",
            AuthStatus::Other(s) => s,
        }
    }
}

impl From<String> for AuthStatus {
    fn from(s: String) -> Self {
        if s == "verified" {
            AuthStatus::Verified
        } else {
            AuthStatus::Other(s)
        }
    }
}

impl From<AuthStatus> for String {
    fn from(status: AuthStatus) -> Self {
        match status {
            AuthStatus::Verified => "verified".to_string(),
            AuthStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expiry timestamp in milliseconds since epoch.
///
/// Query strings and older payloads carry it as text, and stored payloads may
/// hold any JSON value here, so every shape is kept as-is and only
/// interpreted when checking validity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExpiresAt {
    Millis(i64),
    Text(String),
    /// Fractional or out-of-range numbers, booleans, arrays, objects.
    Other(Value),
}

impl ExpiresAt {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(ms) => ExpiresAt::Millis(ms),
                None => ExpiresAt::Other(Value::Number(n)),
            },
            Value::String(s) => ExpiresAt::Text(s),
            other => ExpiresAt::Other(other),
        }
    }

    /// True for the falsy values that mean "no expiry": `0`, the empty
    /// string, `false` and `null`.
    pub fn is_unset(&self) -> bool {
        match self {
            ExpiresAt::Millis(ms) => *ms == 0,
            ExpiresAt::Text(s) => s.is_empty(),
            ExpiresAt::Other(Value::Null | Value::Bool(false)) => true,
            ExpiresAt::Other(Value::Number(n)) => n.as_f64() == Some(0.0),
            ExpiresAt::Other(_) => false,
        }
    }

    /// The deadline as epoch milliseconds.
    ///
    /// Text is read leniently: leading whitespace, optional sign, then leading
    /// decimal digits, or hex digits after `0x`. Other numbers are read from
    /// their shortest text form, so `1e300` gives 1. Returns `None` when there
    /// are no digits, which means the deadline has already passed.
    pub fn deadline_millis(&self) -> Option<i64> {
        match self {
            ExpiresAt::Millis(ms) => Some(*ms),
            ExpiresAt::Text(s) => parse_int_prefix(s),
            ExpiresAt::Other(Value::Number(n)) => n.as_f64().and_then(number_prefix),
            ExpiresAt::Other(_) => None,
        }
    }
}

impl From<i64> for ExpiresAt {
    fn from(ms: i64) -> Self {
        ExpiresAt::Millis(ms)
    }
}

impl fmt::Display for ExpiresAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiresAt::Millis(ms) => write!(f, "{ms}"),
            ExpiresAt::Text(s) => f.write_str(s),
            ExpiresAt::Other(value) => write!(f, "{value}"),
        }
    }
}

fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, digits) = match rest.get(..2) {
        Some("0x" | "0X") => (16, &rest[2..]),
        _ => (10, rest),
    };

    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let value = digits[..end]
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0i64, |acc, d| {
            acc.saturating_mul(i64::from(radix))
                .saturating_add(i64::from(d))
        });
    Some(if negative { -value } else { value })
}

/// Leading integer of a number's shortest text form. Magnitudes from `1e21`
/// up and below `1e-6` print in exponent notation, leaving only the digits
/// before the `e` (or the decimal point).
fn number_prefix(n: f64) -> Option<i64> {
    if !n.is_finite() {
        return None;
    }

    let magnitude = n.abs();
    if magnitude >= 1e21 || (magnitude > 0.0 && magnitude < 1e-6) {
        parse_int_prefix(&format!("{n:e}"))
    } else {
        Some(n.trunc() as i64)
    }
}

/// Which storage location produced a state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Query string of a verification callback redirect.
    UrlParams,
    /// Plain `verified=true` query string.
    Url,
    /// Persistent storage, `auth_flow`.
    LocalStorage,
    /// Session storage, `auth_flow`.
    SessionStorage,
    /// Session storage, legacy `auth_verification_data`.
    SessionStorageBackup,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::UrlParams => "url_params",
            Source::Url => "url",
            Source::LocalStorage => "localStorage",
            Source::SessionStorage => "sessionStorage",
            Source::SessionStorageBackup => "sessionStorage_backup",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one out-of-band auth flow (signup, password reset, ...).
///
/// Fields other than the known ones are carried through untouched. A known
/// field whose stored value is not a string (`expires_at`: not a non-null
/// value) stays in `extra` under its own name, so reads never reject
/// well-formed JSON and writes give it back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthFlowState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AuthStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<ExpiresAt>,
    /// ISO-8601 capture time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Set by the store on read; never serialized.
    #[serde(skip)]
    pub source: Option<Source>,
}

impl AuthFlowState {
    /// A verified state for `action`, with no expiry.
    pub fn verified(action: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            status: Some(AuthStatus::Verified),
            action: Some(action.into()),
            account: Some(account.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_expires_at(mut self, expires_at: impl Into<ExpiresAt>) -> Self {
        self.expires_at = Some(expires_at.into());
        self
    }

    /// Sets the expiry to `ttl` from the clock's current time.
    #[must_use]
    pub fn expiring_in(self, ttl: Duration, clock: &dyn Clock) -> Self {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self.with_expires_at(clock.now_millis().saturating_add(ttl_ms))
    }

    /// Stamps `verified_at` with the given instant.
    #[must_use]
    pub fn verified_on(mut self, at: DateTime<Utc>) -> Self {
        self.verified_at = Some(iso_timestamp(at));
        self
    }

    pub fn is_verified(&self) -> bool {
        self.status == Some(AuthStatus::Verified)
    }

    /// True if there is no expiry or `now_ms` is strictly before it.
    pub fn is_live_at(&self, now_ms: i64) -> bool {
        match &self.expires_at {
            None => true,
            Some(expires) if expires.is_unset() => true,
            Some(expires) => expires.deadline_millis().is_some_and(|deadline| now_ms < deadline),
        }
    }

    /// Whether this state authorizes `action` at `now_ms`.
    pub fn is_valid_for(&self, action: &str, now_ms: i64) -> bool {
        self.action.as_deref() == Some(action) && self.is_verified() && self.is_live_at(now_ms)
    }

    /// Builds a state from any JSON value. Non-object values read as an empty
    /// record. Any `source` field is dropped.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut extra) = value else {
            return Self::default();
        };
        extra.remove(SOURCE_FIELD);

        let expires_at = if extra.get(EXPIRES_AT_FIELD).is_some_and(|v| !v.is_null()) {
            extra.remove(EXPIRES_AT_FIELD).map(ExpiresAt::from_value)
        } else {
            None
        };

        Self {
            status: take_string(&mut extra, STATUS_FIELD).map(AuthStatus::from),
            action: take_string(&mut extra, ACTION_FIELD),
            account: take_string(&mut extra, ACCOUNT_FIELD),
            expires_at,
            verified_at: take_string(&mut extra, VERIFIED_AT_FIELD),
            extra,
            source: None,
        }
    }

    /// Parses a stored payload.
    ///
    /// # Errors
    /// Returns an error only if `raw` is not JSON.
    pub fn from_payload(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw).map(Self::from_value)
    }

    /// Serializes the state for storage, without provenance.
    ///
    /// # Errors
    /// Returns an error if an extra field cannot be serialized.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove(SOURCE_FIELD);
        }
        serde_json::to_string(&value)
    }
}

impl<'de> Deserialize<'de> for AuthFlowState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

/// Removes `key` from `map` if it holds a string.
fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    if !map.get(key).is_some_and(Value::is_string) {
        return None;
    }
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// RFC 3339 in UTC with millisecond precision and a `Z` suffix.
pub(crate) fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_parse_int_prefix_matches_lenient_parsing() {
        assert_eq!(parse_int_prefix("1700000000000"), Some(1_700_000_000_000));
        assert_eq!(parse_int_prefix("  42abc"), Some(42));
        assert_eq!(parse_int_prefix("-5"), Some(-5));
        assert_eq!(parse_int_prefix("+7"), Some(7));
        assert_eq!(parse_int_prefix("abc"), None);
        assert_eq!(parse_int_prefix(""), None);
        assert_eq!(parse_int_prefix("-"), None);
        assert_eq!(parse_int_prefix("0x1A"), Some(26));
        assert_eq!(parse_int_prefix("-0X1azz"), Some(-26));
        assert_eq!(parse_int_prefix("0x"), None);
        assert_eq!(parse_int_prefix("1e300"), Some(1));
    }

    #[test]
    fn test_number_prefix_reads_shortest_text_form() {
        assert_eq!(number_prefix(1000.9), Some(1000));
        assert_eq!(number_prefix(-0.5), Some(0));
        assert_eq!(number_prefix(1e300), Some(1));
        assert_eq!(number_prefix(2.5e21), Some(2));
        assert_eq!(number_prefix(5e-7), Some(5));
        assert_eq!(number_prefix(f64::NAN), None);
    }

    #[test]
    fn test_expires_at_accepts_number_float_and_string() {
        let state = AuthFlowState::from_payload(r#"{"expires_at": 1000}"#).unwrap();
        assert_eq!(state.expires_at, Some(ExpiresAt::Millis(1000)));

        let state = AuthFlowState::from_payload(r#"{"expires_at": 1000.9}"#).unwrap();
        let expires = state.expires_at.unwrap();
        assert_eq!(expires.deadline_millis(), Some(1000));
        assert_eq!(expires.to_string(), "1000.9");

        let state = AuthFlowState::from_payload(r#"{"expires_at": 1e300}"#).unwrap();
        assert_eq!(state.expires_at.unwrap().deadline_millis(), Some(1));

        let state = AuthFlowState::from_payload(r#"{"expires_at": true}"#).unwrap();
        assert_eq!(
            state.expires_at,
            Some(ExpiresAt::Other(Value::Bool(true)))
        );

        let state = AuthFlowState::from_payload(r#"{"expires_at": "1000"}"#).unwrap();
        assert_eq!(state.expires_at, Some(ExpiresAt::Text("1000".to_string())));

        let state = AuthFlowState::from_payload(r#"{"expires_at": null}"#).unwrap();
        assert_eq!(state.expires_at, None);
    }

    #[test]
    fn test_expiry_falsy_values_mean_no_expiry() {
        let mut state = AuthFlowState::verified("signup", "a@b.c");
        for unset in [
            ExpiresAt::Millis(0),
            ExpiresAt::Text(String::new()),
            ExpiresAt::Other(Value::Bool(false)),
            ExpiresAt::Other(Value::from(0.0)),
        ] {
            state.expires_at = Some(unset);
            assert!(state.is_live_at(i64::MAX));
        }
    }

    #[test]
    fn test_unparseable_expiry_is_never_live() {
        for expires in [
            ExpiresAt::Text("soon".to_string()),
            ExpiresAt::Other(Value::Bool(true)),
            ExpiresAt::Other(serde_json::json!({"at": 5})),
        ] {
            let state = AuthFlowState::verified("signup", "a@b.c").with_expires_at(expires);
            assert!(!state.is_live_at(0));
        }
    }

    #[test]
    fn test_expiry_is_strict() {
        let state = AuthFlowState::verified("signup", "a@b.c").with_expires_at(1_000);
        assert!(state.is_live_at(999));
        assert!(!state.is_live_at(1_000));
    }

    #[test]
    fn test_valid_requires_action_status_and_expiry() {
        let state = AuthFlowState::verified("signup", "a@b.c").with_expires_at(2_000);
        assert!(state.is_valid_for("signup", 1_000));
        assert!(!state.is_valid_for("reset", 1_000));
        assert!(!state.is_valid_for("signup", 2_000));

        let pending = AuthFlowState {
            status: Some(AuthStatus::Other("pending".to_string())),
            ..state
        };
        assert!(!pending.is_valid_for("signup", 1_000));
    }

    #[test]
    fn test_payload_drops_source_both_ways() {
        let state = AuthFlowState::from_payload(
            r#"{"status":"verified","action":"signup","source":"url","otp_id":"x1"}"#,
        )
        .unwrap();
        assert!(!state.extra.contains_key("source"));
        assert_eq!(state.extra.get("otp_id"), Some(&Value::from("x1")));
        assert_eq!(state.source, None);

        let mut tagged = state.clone();
        tagged.source = Some(Source::LocalStorage);
        tagged
            .extra
            .insert("source".to_string(), Value::from("sessionStorage"));
        let payload = tagged.to_payload().unwrap();
        assert!(!payload.contains("source"));
        assert!(payload.contains(r#""otp_id":"x1""#));
    }

    #[test]
    fn test_non_object_payload_reads_as_empty_record() {
        for raw in ["null", "42", r#""text""#, "[1, 2]"] {
            assert_eq!(
                AuthFlowState::from_payload(raw).unwrap(),
                AuthFlowState::default(),
                "payload {raw}"
            );
        }
        assert!(AuthFlowState::from_payload("{not json").is_err());
    }

    #[test]
    fn test_mistyped_known_fields_stay_in_extra() {
        let raw = r#"{"status":1,"action":["signup"],"account":12345,"verified_at":false,"expires_at":null}"#;
        let state = AuthFlowState::from_payload(raw).unwrap();

        assert_eq!(state.status, None);
        assert_eq!(state.action, None);
        assert_eq!(state.account, None);
        assert_eq!(state.verified_at, None);
        assert_eq!(state.expires_at, None);
        assert_eq!(state.extra.get("account"), Some(&Value::from(12345)));
        assert!(!state.is_valid_for("signup", 0));

        let written: Value = serde_json::from_str(&state.to_payload().unwrap()).unwrap();
        let original: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(written, original);
    }

    #[test]
    fn test_expiring_in_uses_clock() {
        let clock = ManualClock::at_millis(10_000);
        let state = AuthFlowState::verified("reset", "u").expiring_in(Duration::from_secs(5), &clock);
        assert_eq!(state.expires_at, Some(ExpiresAt::Millis(15_000)));
    }

    #[test]
    fn test_iso_timestamp_shape() {
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        assert_eq!(iso_timestamp(at), "2023-11-14T22:13:20.123Z");
    }
}
