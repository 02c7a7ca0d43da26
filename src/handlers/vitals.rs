use axum::{
    Json,
    body::to_bytes,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::error::VitalsError;
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::IngestAck;
use crate::state::AppState;

pub const UNKNOWN_CLIENT: &str = "unknown";

// POST handler for browser vitals reports
pub async fn ingest_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<IngestAck>, VitalsError> {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();

    let client_id = client_id(&request, state.trust_forwarded_for);
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = to_bytes(request.into_body(), state.max_body_bytes);

    let result = state
        .pipeline
        .ingest(&client_id, content_type.as_deref(), body)
        .await;

    // rejections and failures count toward latency too
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    result.map(|processed| Json(IngestAck { success: true, processed }))
}

// CORS preflight
pub async fn preflight_handler() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    (StatusCode::OK, headers)
}

/// Resolves the id the rate limiter counts against.
///
/// `X-Forwarded-For` is only honoured when the gateway sits behind a proxy
/// that sets it, otherwise any client could pick its own id.
fn client_id(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
