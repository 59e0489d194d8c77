//! Optional gate on `GET /metrics` (§6.7, §6.9 `METRICS_KEY`): disabled by
//! default so a local Prometheus scraper needs no credential, but a
//! deployment can set `metrics_gated` to require `X-Metrics-Key`.

use crate::error::Error;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;

pub async fn metrics_auth_middleware(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, Error> {
    if !state.config.admin.metrics_gated {
        return Ok(next.run(req).await);
    }

    let provided = req
        .headers()
        .get("x-metrics-key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Auth("missing X-Metrics-Key header".to_string()))?;

    let expected = state.config.admin.metrics_key.expose_secret();
    let matches = expected.len() == provided.len() && expected.as_bytes().ct_eq(provided.as_bytes()).unwrap_u8() == 1;
    if !matches {
        return Err(Error::Auth("invalid metrics key".to_string()));
    }

    Ok(next.run(req).await)
}
