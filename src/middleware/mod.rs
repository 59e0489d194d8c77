pub mod admin_auth;
pub mod metrics_auth;
pub mod request_id;
pub mod tenant;

pub use admin_auth::admin_auth_middleware;
pub use metrics_auth::metrics_auth_middleware;
pub use request_id::request_id_middleware;
pub use tenant::WorkspaceId;
