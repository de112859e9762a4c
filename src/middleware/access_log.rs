use std::time::Duration;

use axum::http::{Request, Response};
use tower_http::trace::{DefaultOnRequest, HttpMakeClassifier, MakeSpan, OnResponse, TraceLayer};
use tracing::{error, field, info, info_span, Span};

use crate::middleware::{client_ip, request_id::request_id_of};

/// Span per request carrying the correlation fields of the access log.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessSpan;

impl<B> MakeSpan<B> for AccessSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        info_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %request_id_of(request),
            ip = %client_ip(request),
            status = field::Empty,
        )
    }
}

/// One record per completed request; 5xx are logged at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLog;

impl<B> OnResponse<B> for AccessLog {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status();
        span.record("status", field::display(status.as_u16()));
        let latency_ms = latency.as_secs_f64() * 1000.0;
        if status.is_server_error() {
            error!(status = status.as_u16(), latency_ms, "request completed");
        } else {
            info!(status = status.as_u16(), latency_ms, "request completed");
        }
    }
}

pub fn layer() -> TraceLayer<HttpMakeClassifier, AccessSpan, DefaultOnRequest, AccessLog> {
    TraceLayer::new_for_http()
        .make_span_with(AccessSpan)
        .on_response(AccessLog)
}
