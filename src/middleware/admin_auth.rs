//! Admin surface guard (C11, §6.6): every `/admin/*` route requires a
//! static bearer-style token in `X-Admin-Token`, compared in constant time.

use crate::error::Error;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;

pub async fn admin_auth_middleware(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, Error> {
    let provided = req
        .headers()
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Auth("missing X-Admin-Token header".to_string()))?;

    let expected = state.config.admin.admin_token.expose_secret();
    let matches = expected.len() == provided.len() && expected.as_bytes().ct_eq(provided.as_bytes()).unwrap_u8() == 1;
    if !matches {
        return Err(Error::Auth("invalid admin token".to_string()));
    }

    Ok(next.run(req).await)
}
