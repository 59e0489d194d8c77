//! Request-id propagation (§4.9): honors an inbound `X-Request-Id` and
//! otherwise mints one, echoing it back on the response so a caller and a
//! log line can always be correlated.

use axum::extract::Request;
use axum::http::HeaderName;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    req.headers_mut().insert(REQUEST_ID_HEADER.clone(), request_id.parse().expect("uuid is a valid header value"));

    let mut response = next.run(req).await;
    response.headers_mut().insert(REQUEST_ID_HEADER.clone(), request_id.parse().expect("uuid is a valid header value"));
    response
}
