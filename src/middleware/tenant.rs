//! Tenant resolution (C1): every tenant-scoped endpoint reads its workspace
//! id from the `X-Workspace-Id` header rather than a session (§6.2-§6.5).

use crate::error::{Error, Result, ValidationErrors};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

pub struct WorkspaceId(pub Uuid);

impl<S> FromRequestParts<S> for WorkspaceId
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let header = parts
            .headers
            .get("x-workspace-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Validation(ValidationErrors::Single {
                field: "X-Workspace-Id".to_string(),
                message: "missing required header".to_string(),
            }))?;

        let workspace_id = Uuid::parse_str(header).map_err(|_| Error::Validation(ValidationErrors::Single {
            field: "X-Workspace-Id".to_string(),
            message: "must be a UUID".to_string(),
        }))?;

        Ok(WorkspaceId(workspace_id))
    }
}
