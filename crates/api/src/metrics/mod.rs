//! Prometheus metrics collection.
//!
//! Provides application metrics in Prometheus format.

use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

/// Submission outcome labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: String,
}

/// Application metrics.
pub struct Metrics {
    registry: Registry,

    /// CSRF tokens handed out.
    pub csrf_tokens_issued: Counter,

    /// Contact submissions by outcome.
    pub submissions: Family<OutcomeLabels, Counter>,

    /// Rate limit rejections counter.
    pub rate_limit_rejections: Counter,
}

impl Metrics {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let csrf_tokens_issued = Counter::default();
        registry.register(
            "csrf_tokens_issued",
            "CSRF tokens issued",
            csrf_tokens_issued.clone(),
        );

        let submissions = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "contact_submissions",
            "Contact form submissions by outcome",
            submissions.clone(),
        );

        let rate_limit_rejections = Counter::default();
        registry.register(
            "rate_limit_rejections",
            "Rate limit rejections",
            rate_limit_rejections.clone(),
        );

        Self {
            registry,
            csrf_tokens_issued,
            submissions,
            rate_limit_rejections,
        }
    }

    /// Record an issued token.
    pub fn record_token_issued(&self) {
        self.csrf_tokens_issued.inc();
    }

    /// Record a submission outcome.
    pub fn record_submission(&self, outcome: &str) {
        self.submissions
            .get_or_create(&OutcomeLabels {
                outcome: outcome.to_string(),
            })
            .inc();
    }

    /// Record a rate limit rejection.
    pub fn record_rate_limit(&self) {
        self.rate_limit_rejections.inc();
    }

    /// Encode metrics in Prometheus text format.
    ///
    /// # Panics
    ///
    /// Panics if Prometheus metric encoding to a `String` buffer fails.
    /// The `fmt::Write` impl for `String` is infallible.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        #[allow(clippy::expect_used)]
        encode(&mut buffer, &self.registry).expect("encoding metrics");
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        let output = metrics.encode();
        assert!(output.contains("csrf_tokens_issued_total"));
        assert!(output.contains("rate_limit_rejections_total"));
    }

    #[test]
    fn test_record_submission() {
        let metrics = Metrics::new();
        metrics.record_submission("accepted");
        metrics.record_submission("accepted");
        metrics.record_submission("captcha_failed");

        let output = metrics.encode();
        assert!(output.contains(r#"contact_submissions_total{outcome="accepted"} 2"#));
        assert!(output.contains(r#"contact_submissions_total{outcome="captcha_failed"} 1"#));
    }
}
