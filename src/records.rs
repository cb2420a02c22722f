//! Response body types for the dispatch routes.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::proto::Brewery;

/// A brewery result as serialized to clients.
///
/// Field-by-field mapping of the streamed item; renaming and selection only,
/// no transformation. Owned by the handler for the duration of response
/// serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreweryRecord {
    pub id: i64,
    pub name: String,
    pub brewery_type: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub country_province: String,
    pub postal_code: String,
    pub country: String,
    pub longitude: f64,
    pub latitude: f64,
    pub phone: String,
    pub website_url: String,
}

impl From<Brewery> for BreweryRecord {
    fn from(brewery: Brewery) -> Self {
        Self {
            id: brewery.id,
            name: brewery.name,
            brewery_type: brewery.brewery_type,
            street: brewery.street,
            city: brewery.city,
            state: brewery.state,
            country_province: brewery.country_province,
            postal_code: brewery.postal_code,
            country: brewery.country,
            longitude: brewery.longitude,
            latitude: brewery.latitude,
            phone: brewery.phone,
            website_url: brewery.website_url,
        }
    }
}

/// RFC 7807 problem response.
///
/// `status` always mirrors the HTTP status code written to the response.
/// Emitted once per failed request, as `application/problem+json`.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
}

impl ProblemDetails {
    /// Build a problem for the given status, with the canonical reason phrase
    /// as the title and the underlying error text as the detail.
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            problem_type: "about:blank".to_string(),
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            status: status.as_u16(),
            detail: detail.into(),
            instance: String::new(),
        }
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            [(header::CONTENT_TYPE, "application/problem+json")],
            Json(self),
        )
            .into_response()
    }
}
