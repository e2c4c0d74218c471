//! HTTP request metrics middleware.

use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use courier_metrics::{counter, histogram, http as http_metrics, labels};

/// Records `courier_http_requests_total` and
/// `courier_http_request_duration_seconds` by endpoint, method and status.
pub async fn http_metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let endpoint = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    counter!(
        http_metrics::REQUESTS_TOTAL,
        labels::ENDPOINT => endpoint.clone(),
        labels::METHOD => method.clone(),
        labels::STATUS => status.clone()
    )
    .increment(1);
    histogram!(
        http_metrics::REQUEST_DURATION_SECONDS,
        labels::ENDPOINT => endpoint,
        labels::METHOD => method,
        labels::STATUS => status
    )
    .record(start.elapsed().as_secs_f64());

    response
}

/// Collapse dynamic segments so unknown paths cannot blow up label
/// cardinality.
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            if is_dynamic(segment) {
                "{id}"
            } else {
                segment
            }
        })
        .collect();
    format!("/{}", segments.join("/"))
}

fn is_dynamic(segment: &str) -> bool {
    let hexish = segment.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
    segment.chars().all(|c| c.is_ascii_digit()) || (hexish && segment.len() >= 32)
}
