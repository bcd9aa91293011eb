pub mod audit;
pub mod auth;
pub mod observer;

pub use audit::{spawn_request_logger, AuditLayer, AuditSink, RequestEvent};
pub use auth::{session_token_middleware, TokenGate, DEFAULT_EXEMPT_PATHS};
pub use observer::StatusCapture;
