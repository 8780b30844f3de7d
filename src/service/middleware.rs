//! Service middleware for metrics and request tracking.
//!
//! ## Metrics Exposed
//!
//! Emitted as `tracing` events under target `kinship::metrics`, to be
//! aggregated from logs:
//! - `request_metric` - path pattern, method, status, latency
//! - `tree_metric` - people and relations per family tree, build latency

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Metrics middleware that records request counts and latency.
///
/// Records:
/// - Request count by path pattern, method, and status code
/// - Request duration
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "kinship::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Replaces every UUID path segment with `:id`.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if Uuid::parse_str(segment).is_ok() {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Record family tree metrics.
///
/// Call this after building a tree to track its size.
pub fn record_tree_metrics(people: usize, relations: usize, latency_ms: u64) {
    info!(
        target: "kinship::metrics",
        metric_type = "tree",
        people = people,
        relations = relations,
        latency_ms = latency_ms,
        "tree_metric"
    );
}
