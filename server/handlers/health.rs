use std::io::Cursor;

use serde::Serialize;
use tiny_http::Response;

use meaning_lens::ServiceContext;

use crate::routes::json_response;

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    labels: usize,
}

/// GET /health
pub fn handle(ctx: &ServiceContext) -> Response<Cursor<Vec<u8>>> {
    json_response(200, &Health { status: "ok", labels: ctx.taxonomy().len() })
}
