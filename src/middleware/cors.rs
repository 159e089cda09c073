use axum::http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;

use crate::error::{Error, Result};

/// CORS restricted to the single configured frontend origin.
pub fn restricted_cors(origin: &str) -> Result<CorsLayer> {
    let origin = origin
        .parse::<HeaderValue>()
        .map_err(|_| Error::Config(format!("Invalid CORS origin: {}", origin)))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true))
}
