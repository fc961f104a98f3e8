//! Request origin allow-list.

use axum::http::HeaderMap;
use axum::http::header::ORIGIN;

/// Origins permitted to request tokens and submit forms.
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    /// Create a policy from configured origins. Entries are trimmed.
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = origins
            .into_iter()
            .map(|o| o.as_ref().trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        Self { allowed }
    }

    /// Case-insensitive exact match. A missing or empty origin never matches.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        let Some(origin) = origin.filter(|o| !o.is_empty()) else {
            return false;
        };
        self.allowed.iter().any(|a| a.eq_ignore_ascii_case(origin))
    }

    /// Check the `Origin` header of a request.
    pub fn allows_request(&self, headers: &HeaderMap) -> bool {
        self.allows(headers.get(ORIGIN).and_then(|v| v.to_str().ok()))
    }

    /// Configured origins.
    pub fn origins(&self) -> &[String] {
        &self.allowed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn matches_case_insensitively() {
        let policy = OriginPolicy::new([" https://Connected.example "]);
        assert!(policy.allows(Some("https://connected.example")));
        assert!(policy.allows(Some("HTTPS://CONNECTED.EXAMPLE")));
    }

    #[test]
    fn rejects_missing_and_unlisted() {
        let policy = OriginPolicy::new(["https://connected.example"]);
        assert!(!policy.allows(None));
        assert!(!policy.allows(Some("")));
        assert!(!policy.allows(Some("https://evil.example")));
        assert!(!policy.allows(Some("https://connected.example.evil.example")));
    }

    #[test]
    fn empty_policy_allows_nothing() {
        let policy = OriginPolicy::default();
        assert!(!policy.allows(Some("https://connected.example")));
    }

    #[test]
    fn reads_origin_header() {
        let policy = OriginPolicy::new(["https://connected.example"]);
        let mut headers = HeaderMap::new();
        assert!(!policy.allows_request(&headers));
        headers.insert(ORIGIN, "https://connected.example".parse().unwrap());
        assert!(policy.allows_request(&headers));
    }
}
