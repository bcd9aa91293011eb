// handlers/protected/mod.rs - Protected handlers (session token required)
//
// Security Level: valid X-Session-Token
// Routes: /v2/groups/*, /v2/roles/*, /v2/users/*
// Errors are returned as ApiError and mapped to status codes in one place.

pub mod groups;
pub mod roles;
pub mod users;

pub use groups::*;
pub use roles::*;
pub use users::*;
