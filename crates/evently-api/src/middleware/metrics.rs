//! Prometheus metrics
//!
//! A per-application [`Registry`] holding HTTP request counters and latency
//! histograms keyed by normalized endpoint, plus auth outcome and moderation
//! decision counters. Rendered in text format at `/metrics`.

use crate::state::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Instant;

/// Application metrics
pub struct Metrics {
    registry: Registry,
    http_requests: IntCounterVec,
    http_duration: HistogramVec,
    auth_outcomes: IntCounterVec,
    moderation_decisions: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("evently".to_string()), None)?;

        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by endpoint and status"),
            &["method", "endpoint", "status"],
        )?;
        let http_duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["method", "endpoint"],
        )?;
        let auth_outcomes = IntCounterVec::new(
            Opts::new("auth_outcomes_total", "Authentication outcomes by operation"),
            &["operation", "outcome"],
        )?;
        let moderation_decisions = IntCounterVec::new(
            Opts::new("moderation_decisions_total", "Moderation decisions by target status"),
            &["status"],
        )?;

        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_duration.clone()))?;
        registry.register(Box::new(auth_outcomes.clone()))?;
        registry.register(Box::new(moderation_decisions.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            http_requests,
            http_duration,
            auth_outcomes,
            moderation_decisions,
        })
    }

    pub fn record_request(&self, method: &str, endpoint: &str, status: u16, elapsed_secs: f64) {
        self.http_requests
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();
        self.http_duration
            .with_label_values(&[method, endpoint])
            .observe(elapsed_secs);
    }

    /// `operation`: register, login, refresh, bearer
    pub fn record_auth(&self, operation: &str, outcome: &str) {
        self.auth_outcomes.with_label_values(&[operation, outcome]).inc();
    }

    pub fn record_moderation(&self, status: &str) {
        self.moderation_decisions.with_label_values(&[status]).inc();
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Metrics tracking middleware
///
/// Records request count and latency per method, endpoint and status.
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    // Prefer the route template; fall back to the raw path with ids masked
    let endpoint = match request.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => normalize_endpoint(request.uri().path()),
    };

    let response = next.run(request).await;

    state.metrics.record_request(
        &method,
        &endpoint,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

/// Replace UUID and numeric segments with `:id`
fn normalize_endpoint(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            if is_uuid(seg) || is_numeric(seg) {
                ":id"
            } else {
                seg
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_uuid(s: &str) -> bool {
    s.len() == 36
        && s.chars().enumerate().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        })
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(
            normalize_endpoint("/api/events/550e8400-e29b-41d4-a716-446655440000/reviews"),
            "/api/events/:id/reviews"
        );
        assert_eq!(normalize_endpoint("/api/categories/42"), "/api/categories/:id");
        assert_eq!(normalize_endpoint("/health"), "/health");
    }

    #[test]
    fn test_is_uuid() {
        assert!(is_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_uuid("not-a-uuid"));
        assert!(!is_uuid("123"));
    }

    #[test]
    fn test_render_contains_recorded_series() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request("GET", "/api/events", 200, 0.012);
        metrics.record_auth("login", "success");
        metrics.record_moderation("approved");

        let text = metrics.render().unwrap();
        assert!(text.contains("evently_http_requests_total"));
        assert!(text.contains("endpoint=\"/api/events\""));
        assert!(text.contains("evently_auth_outcomes_total"));
        assert!(text.contains("evently_moderation_decisions_total"));
    }

    #[test]
    fn test_registries_are_independent() {
        assert!(Metrics::new().is_ok());
        assert!(Metrics::new().is_ok());
    }
}
