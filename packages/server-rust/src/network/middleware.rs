//! HTTP-level layers wrapped around the JSON-RPC and health routes.
//!
//! Outermost first: request id assignment, request tracing, body size
//! limits, CORS, the whole-request timeout, and request id propagation onto
//! the response. Per-call concerns (load shedding, call timeouts, call
//! metrics) belong to the call pipeline instead.

use axum::extract::DefaultBodyLimit;
use axum::http::header::{HeaderName, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::Span;

use super::config::NetworkConfig;

/// Header carrying the per-request id, set when the client did not send one.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Wraps `router` in the HTTP layer stack configured by `config`.
#[must_use]
pub fn apply_http_layers<S>(router: Router<S>, config: &NetworkConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    // axum's own extractor limit must not be lower than the layer's.
    router.layer(DefaultBodyLimit::max(config.max_body_bytes)).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
            .layer(TraceLayer::new_for_http().make_span_with(RequestSpan))
            .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
            .layer(build_cors_layer(&config.cors_origins))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.request_timeout,
            ))
            .layer(PropagateRequestIdLayer::new(request_id)),
    )
}

/// Opens one `http_request` span per request, tagged with its request id so
/// that call spans nested below it can be correlated with the HTTP exchange.
#[derive(Debug, Clone, Copy)]
struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id,
        )
    }
}

/// CORS for browser JSON-RPC clients: `POST` with a JSON body plus the
/// `GET` health routes. `"*"` anywhere in `origins` allows every origin;
/// entries that are not valid header values are skipped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
}
