pub mod auth;
pub mod config;
pub mod dataaccess;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod state;
pub mod telemetry;

#[cfg(test)]
pub mod testing;
