use std::io::Cursor;
use std::sync::Arc;

use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, StatusCode};
use tracing::warn;

use meaning_lens::ServiceContext;

use crate::handlers;

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Body of every failure response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn headers(pairs: &[(&str, &str)]) -> Vec<Header> {
    pairs
        .iter()
        .filter_map(|(k, v)| Header::from_bytes(k.as_bytes(), v.as_bytes()).ok())
        .collect()
}

/// Headers that let the browser frontend call the API cross-origin.
fn cors_headers() -> Vec<Header> {
    headers(&[
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
        ("Access-Control-Allow-Headers", "Content-Type"),
    ])
}

fn bytes_response(status: u16, bytes: Vec<u8>) -> Response<Cursor<Vec<u8>>> {
    let len = bytes.len();
    let mut hdrs = headers(&[("Content-Type", "application/json")]);
    hdrs.extend(cors_headers());
    Response::new(StatusCode(status), hdrs, Cursor::new(bytes), Some(len), None)
}

pub fn json_response<T: Serialize>(status: u16, body: &T) -> Response<Cursor<Vec<u8>>> {
    match serde_json::to_vec(body) {
        Ok(bytes) => bytes_response(status, bytes),
        Err(e) => {
            warn!(error = %e, "failed to serialize response body");
            bytes_response(500, br#"{"error":"internal serialization error"}"#.to_vec())
        }
    }
}

pub fn error_response(status: u16, message: &str) -> Response<Cursor<Vec<u8>>> {
    json_response(status, &ErrorBody { error: message.to_owned() })
}

/// Answers a CORS pre-flight request.
pub fn preflight() -> Response<Cursor<Vec<u8>>> {
    Response::new(StatusCode(204), cors_headers(), Cursor::new(Vec::new()), Some(0), None)
}

pub fn not_found() -> Response<Cursor<Vec<u8>>> {
    error_response(404, "Not found")
}

// ---------------------------------------------------------------------------
// Request dispatcher
// ---------------------------------------------------------------------------

/// Dispatches one request and sends the response. Runs on the request's own
/// thread; `ctx` is shared read-only between all of them.
pub fn dispatch(mut request: Request, ctx: Arc<ServiceContext>) {
    let method = request.method().clone();
    let url = request.url().to_owned();
    let path = url.split('?').next().unwrap_or("").to_owned();

    let response = match (method, path.as_str()) {
        (Method::Post, "/predict") => handlers::predict::handle(&mut request, &ctx),
        (Method::Options, "/predict") => preflight(),
        (Method::Get, "/health") => handlers::health::handle(&ctx),
        _ => not_found(),
    };

    if let Err(e) = request.respond(response) {
        warn!(error = %e, %url, "failed to send response");
    }
}
