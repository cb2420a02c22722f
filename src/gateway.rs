//! Dispatch routes and router assembly.
//!
//! One handler per route: build the RPC filter verbatim from the raw query
//! string, drive the stream aggregator, and serialize either the aggregate or
//! a problem response. The list and search routes share one response
//! contract; search additionally logs each matched record server-side.

use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde::Serialize;
use tracing::{debug, error};

use crate::grpc::{BreweryDispatch, DispatchError};
use crate::health::HealthState;
use crate::middleware::{cors_layer, request_identity, trace_layer};
use crate::proto::Filter;
use crate::records::ProblemDetails;

/// Shared state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatch: BreweryDispatch,
    pub health: Arc<HealthState>,
}

/// Build the middleware-wrapped router.
///
/// Layer order, outermost first: request identity, CORS, tracing, routes.
/// Every response carries `x-request-id`, including preflights answered by
/// the CORS layer.
pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/breweries", get(list_breweries).options(preflight))
        .route("/breweries/search", get(search_breweries))
        .with_state(state)
        .layer(trace_layer())
        .layer(cors_layer(allowed_origins))
        .layer(middleware::from_fn(request_identity))
}

#[derive(Serialize)]
struct HealthBody {
    uptime: String,
}

/// 200 with uptime while ready; 503 while not ready or draining.
async fn healthz(State(state): State<AppState>) -> Response {
    match state.health.uptime() {
        Some(uptime) => Json(HealthBody {
            uptime: format!("{:?}", uptime),
        })
        .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn list_breweries(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Response {
    let filter = Filter {
        by: query.unwrap_or_default(),
    };

    match state.dispatch.list(filter).await {
        Ok(records) => Json(records).into_response(),
        Err(err) => problem_response(&err),
    }
}

async fn search_breweries(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Response {
    let filter = Filter {
        by: query.unwrap_or_default(),
    };

    match state.dispatch.search(filter).await {
        Ok(records) => {
            for record in &records {
                debug!(
                    id = record.id,
                    name = %record.name,
                    website = %record.website_url,
                    "search hit"
                );
            }
            Json(records).into_response()
        }
        Err(err) => problem_response(&err),
    }
}

/// Non-preflight OPTIONS short-circuit; the CORS layer adds the headers.
async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Map an open failure to its problem response.
fn problem_response(err: &DispatchError) -> Response {
    let status = match err {
        DispatchError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DispatchError::Backend(_) => StatusCode::BAD_GATEWAY,
        DispatchError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
    };
    error!(error = %err, status = status.as_u16(), "dispatch failed");
    ProblemDetails::new(status, err.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tonic::Status;

    #[test]
    fn test_problem_status_per_variant() {
        let unavailable = DispatchError::Unavailable(Status::unavailable("refused"));
        assert_eq!(
            problem_response(&unavailable).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let backend = DispatchError::Backend(Status::internal("boom"));
        assert_eq!(problem_response(&backend).status(), StatusCode::BAD_GATEWAY);

        let deadline = DispatchError::DeadlineExceeded(Duration::from_secs(10));
        assert_eq!(
            problem_response(&deadline).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
