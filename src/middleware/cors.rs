use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::config::CorsConfig;

const ALLOW_HEADERS: &str = "Authorization, Content-Type, X-Request-ID";
const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";

/// Origin allowlist. An empty list admits every origin.
///
/// Outside exact mode an origin also passes when it merely starts with an
/// allowed value, so `https://app.example` admits `https://app.example.evil`.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: Vec<String>,
    exact_only: bool,
}

impl CorsPolicy {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            origins: config.allowed_origins.clone(),
            exact_only: config.exact_match,
        }
    }

    fn allow_all(&self) -> bool {
        self.origins.is_empty()
    }

    pub fn allows(&self, origin: &str) -> bool {
        if self.allow_all() {
            return true;
        }
        if origin.is_empty() {
            return false;
        }
        self.origins.iter().any(|allowed| {
            origin == allowed || (!self.exact_only && origin.starts_with(allowed.as_str()))
        })
    }

    fn apply(&self, origin: &str, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(origin) {
            if !origin.is_empty() {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
                headers.insert(header::VARY, HeaderValue::from_static("Origin"));
            }
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
    }
}

/// Answers every `OPTIONS` with 204 and decorates allowed responses.
pub async fn cors(State(policy): State<CorsPolicy>, req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let allowed = policy.allows(&origin);
    if !allowed {
        debug!(%origin, "origin not allowed");
    }

    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    if allowed {
        policy.apply(&origin, response.headers_mut());
    }
    response
}
