//! HTTP middleware: request identity, cross-origin policy, request tracing.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Header carrying the per-request correlation token.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request-scoped identity, carried as a typed extension.
///
/// Created once at the outer edge of the middleware chain and immutable for
/// the rest of the request.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Echo-or-assign request identity.
///
/// Reads `x-request-id` from the request; absent or empty, assigns a UUID v4
/// (collision-resistant under bursts, unlike a nanosecond timestamp). The
/// identity is stored as a typed extension for downstream stages and echoed
/// on the response. Infallible; never blocks.
pub async fn request_identity(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

/// Cross-origin policy for the dispatch routes.
///
/// Reflects the request's exact `Origin` value when it appears on the
/// allow-list; a `"*"` entry allows any caller. Preflights are answered by
/// the layer itself, before any route handler runs.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_any = allowed_origins.iter().any(|origin| origin == "*");
    let allowed = allowed_origins.to_vec();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &http::request::Parts| {
                allow_any
                    || origin
                        .to_str()
                        .map(|origin| allowed.iter().any(|entry| entry == origin))
                        .unwrap_or(false)
            },
        ))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}

/// Trace layer whose per-request span carries the request identity.
///
/// The identity middleware runs outside this layer, so the typed extension is
/// already present when the span is created.
pub fn trace_layer() -> TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
    impl Fn(&http::Request<Body>) -> tracing::Span + Clone,
> {
    TraceLayer::new_for_http().make_span_with(|request: &http::Request<Body>| {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.as_str())
            .unwrap_or("");
        let method = request.method();
        let path = request.uri().path();
        tracing::info_span!("request", %request_id, %method, %path)
    })
}
