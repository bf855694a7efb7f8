//! Rate-limit detection and backoff
//!
//! GitHub signals rate limiting with 429, or with 403 plus either an
//! exhausted `x-ratelimit-remaining` header or a body mentioning the limit.
//! Other 403s are permission errors and are not retried.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use crate::config::RetryPolicy;

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Whether a response should be retried after a backoff
pub fn is_rate_limited(status: StatusCode, headers: &HeaderMap, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    if status != StatusCode::FORBIDDEN {
        return false;
    }
    if header_u64(headers, "x-ratelimit-remaining") == Some(0) {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("rate limit") || lower.contains("abuse detection")
}

/// Delay before retry `attempt` (0-based)
///
/// `Retry-After` wins, then the window reset when the quota is exhausted,
/// then exponential backoff. Every branch is capped at `max_delay`.
pub fn retry_delay(policy: &RetryPolicy, attempt: u32, headers: &HeaderMap, now_epoch: u64) -> Duration {
    if let Some(secs) = header_u64(headers, "retry-after") {
        return Duration::from_secs(secs).min(policy.max_delay);
    }
    if header_u64(headers, "x-ratelimit-remaining") == Some(0) {
        if let Some(reset) = header_u64(headers, "x-ratelimit-reset") {
            if reset > now_epoch {
                return Duration::from_secs(reset - now_epoch).min(policy.max_delay);
            }
        }
    }
    policy.backoff(attempt)
}

pub(crate) fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_429_is_rate_limited() {
        assert!(is_rate_limited(
            StatusCode::TOO_MANY_REQUESTS,
            &HeaderMap::new(),
            ""
        ));
    }

    #[test]
    fn test_403_with_exhausted_quota_is_rate_limited() {
        let h = headers(&[("x-ratelimit-remaining", "0")]);
        assert!(is_rate_limited(StatusCode::FORBIDDEN, &h, "{}"));
    }

    #[test]
    fn test_403_secondary_limit_body_is_rate_limited() {
        let body = r#"{"message":"You have exceeded a secondary rate limit."}"#;
        assert!(is_rate_limited(StatusCode::FORBIDDEN, &HeaderMap::new(), body));
    }

    #[test]
    fn test_plain_403_is_permission_error() {
        let h = headers(&[("x-ratelimit-remaining", "4999")]);
        let body = r#"{"message":"Resource not accessible by integration"}"#;
        assert!(!is_rate_limited(StatusCode::FORBIDDEN, &h, body));
    }

    #[test]
    fn test_other_statuses_are_not_rate_limited() {
        assert!(!is_rate_limited(StatusCode::NOT_FOUND, &HeaderMap::new(), "rate limit"));
        assert!(!is_rate_limited(StatusCode::BAD_GATEWAY, &HeaderMap::new(), ""));
    }

    #[test]
    fn test_retry_after_header_wins() {
        let h = headers(&[("retry-after", "7"), ("x-ratelimit-remaining", "0")]);
        assert_eq!(retry_delay(&policy(), 0, &h, 0), Duration::from_secs(7));
    }

    #[test]
    fn test_reset_header_used_when_quota_exhausted() {
        let h = headers(&[
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset", "1000012"),
        ]);
        assert_eq!(
            retry_delay(&policy(), 0, &h, 1_000_000),
            Duration::from_secs(12)
        );
    }

    #[test]
    fn test_delays_are_capped() {
        let h = headers(&[("retry-after", "3600")]);
        assert_eq!(retry_delay(&policy(), 0, &h, 0), Duration::from_secs(30));
    }

    #[test]
    fn test_exponential_fallback() {
        let h = HeaderMap::new();
        assert_eq!(retry_delay(&policy(), 0, &h, 0), Duration::from_secs(2));
        assert_eq!(retry_delay(&policy(), 2, &h, 0), Duration::from_secs(8));
    }
}
