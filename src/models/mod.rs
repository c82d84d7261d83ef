//! Data models for the Revyze design review platform.
//!
//! These models match the frontend TypeScript interfaces exactly for seamless interoperability.
//! Timestamps travel as RFC 3339 strings and are stored verbatim in TEXT columns.

mod activity;
mod analytics;
mod billing;
mod campaign;
mod comment;
mod document;
mod feature;
mod notification;
mod project;
mod referral;
mod user;

pub use activity::*;
pub use analytics::*;
pub use billing::*;
pub use campaign::*;
pub use comment::*;
pub use document::*;
pub use feature::*;
pub use notification::*;
pub use project::*;
pub use referral::*;
pub use user::*;

use chrono::{DateTime, Utc};

/// Parse a stored RFC 3339 timestamp. Returns `None` for malformed input so
/// callers can pick a permissive fallback instead of failing the request.
pub fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339_roundtrip() {
        let now = Utc::now();
        let parsed = parse_rfc3339(&now.to_rfc3339()).unwrap();
        assert_eq!(parsed, now);
    }

    #[test]
    fn test_parse_rfc3339_garbage() {
        assert!(parse_rfc3339("not-a-timestamp").is_none());
        assert!(parse_rfc3339("").is_none());
    }
}
