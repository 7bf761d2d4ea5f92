//! HTTP Surface
//!
//! A single forwarding route on `/` for GET, POST, PUT, DELETE, HEAD and
//! OPTIONS, plus `/healthz`. Every response, errors and panics included,
//! carries permissive CORS headers.
//!
//! Only OPTIONS requests carrying `Access-Control-Request-Method` are CORS
//! preflights answered locally; a plain OPTIONS is forwarded like any other
//! method.

use crate::client::{Forward, HttpError, UpstreamRequest};
use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, DefaultBodyLimit, RawQuery, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, on, MethodFilter},
    Json, Router,
};
use hopgate_guard::{ErrorKind, Gatekeeper, GuardError, Resolve};
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Application state shared across handlers
pub struct AppState<R, F> {
    pub gatekeeper: Gatekeeper<R>,
    pub forwarder: F,
}

/// JSON error envelope
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
}

/// Everything a forwarding request can fail with
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Upstream(#[from] HttpError),

    #[error("Request body rejected: {0}")]
    Body(#[from] BytesRejection),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Guard(e) => e.kind(),
            Self::Upstream(e) => e.kind(),
            Self::Body(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => ErrorKind::PayloadTooLarge,
            Self::Body(_) | Self::Internal(_) => ErrorKind::InternalError,
        }
    }

    fn advice(&self) -> Option<&'static str> {
        match self {
            Self::Guard(e) => e.advice(),
            Self::Upstream(HttpError::Timeout(_)) => Some("The target was too slow to answer; try again later"),
            Self::Body(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                Some("Send a smaller request body")
            }
            Self::Upstream(_) | Self::Body(_) | Self::Internal(_) => None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error: kind,
            message: self.to_string(),
            advice: self.advice().map(str::to_string),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the router with CORS, tracing and the panic fallback applied
pub fn router<R, F>(state: Arc<AppState<R, F>>, max_request_body: usize) -> Router
where
    R: Resolve + 'static,
    F: Forward + 'static,
{
    let methods = MethodFilter::GET
        .or(MethodFilter::POST)
        .or(MethodFilter::PUT)
        .or(MethodFilter::DELETE)
        .or(MethodFilter::HEAD)
        .or(MethodFilter::OPTIONS);

    let routes = Router::new()
        .route("/", on(methods, forward_handler::<R, F>))
        .route("/healthz", get(health_handler))
        .layer(DefaultBodyLimit::max(max_request_body))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state);

    routes
        .clone()
        .layer(
            CorsLayer::new()
                .allow_origin(AnyOrigin)
                .allow_methods(AnyOrigin)
                .allow_headers(AnyOrigin),
        )
        .layer(middleware::from_fn_with_state(routes, forward_plain_options))
        .layer(TraceLayer::new_for_http())
}

/// Route OPTIONS without `Access-Control-Request-Method` around the CORS
/// layer, which would otherwise answer it as a preflight.
async fn forward_plain_options(State(routes): State<Router>, request: Request, next: Next) -> Response {
    if request.method() != Method::OPTIONS || request.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD) {
        return next.run(request).await;
    }

    let mut response = match routes.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

/// `/?url=<target>` - validate, then relay upstream status and body
pub async fn forward_handler<R, F>(
    State(state): State<Arc<AppState<R, F>>>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, GatewayError>
where
    R: Resolve,
    F: Forward,
{
    let body = body.inspect_err(|e| warn!("Inbound body rejected: {}", e))?;
    let target = query.as_deref().and_then(url_param);
    let admission = state.gatekeeper.admit(target.as_deref()).await?;

    // Only POST and PUT carry a body upstream
    let carries_body = method == Method::POST || method == Method::PUT;
    let request = UpstreamRequest {
        method: method.clone(),
        body: if carries_body { body } else { Bytes::new() },
        content_type: if carries_body {
            headers.get(header::CONTENT_TYPE).cloned()
        } else {
            None
        },
    };

    let upstream = state
        .forwarder
        .forward(&admission, request)
        .await
        .inspect_err(|e| error!("{} {} failed: {}", method, admission.target, e))?;

    info!("{} {} -> {}", method, admission.target, upstream.status);

    let mut response = Response::builder().status(upstream.status);
    if let Some(content_type) = upstream.content_type {
        response = response.header(header::CONTENT_TYPE, content_type);
    }
    response
        .body(Body::from(upstream.body))
        .map_err(|e| GatewayError::Internal(e.to_string()))
}

/// First `url` pair of a raw query string, percent-decoded
fn url_param(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Turn a handler panic into the 500 envelope
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!("Handler panicked: {}", detail);
    GatewayError::Internal("request handling failed".to_string()).into_response()
}
