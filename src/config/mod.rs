use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::middleware::DEFAULT_EXEMPT_PATHS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Capacity of the request event ring; the oldest events are dropped
    /// when the log consumer falls this far behind.
    pub audit_queue_capacity: usize,
    pub enable_request_logging: bool,
    pub dal_init_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub exempt_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub enable_metrics: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    pub fn dal_init_timeout(&self) -> Duration {
        Duration::from_secs(self.server.dal_init_timeout_secs)
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("GORT_API_ADDR") {
            self.server.bind_addr = v;
        }
        if let Ok(v) = env::var("GORT_AUDIT_QUEUE_CAPACITY") {
            self.server.audit_queue_capacity = v.parse().unwrap_or(self.server.audit_queue_capacity);
        }
        if let Ok(v) = env::var("GORT_ENABLE_REQUEST_LOGGING") {
            self.server.enable_request_logging = v.parse().unwrap_or(self.server.enable_request_logging);
        }
        if let Ok(v) = env::var("GORT_DAL_INIT_TIMEOUT_SECS") {
            self.server.dal_init_timeout_secs = v.parse().unwrap_or(self.server.dal_init_timeout_secs);
        }

        // Security overrides
        if let Ok(v) = env::var("GORT_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("GORT_EXEMPT_PATHS") {
            self.security.exempt_paths = parse_path_list(&v);
        }

        // Telemetry overrides
        if let Ok(v) = env::var("GORT_ENABLE_METRICS") {
            self.telemetry.enable_metrics = v.parse().unwrap_or(self.telemetry.enable_metrics);
        }

        self.normalized()
    }

    /// Clamps values the server cannot run with.
    pub fn normalized(mut self) -> Self {
        self.server.audit_queue_capacity = self.server.audit_queue_capacity.max(1);
        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                bind_addr: "0.0.0.0:4000".to_string(),
                audit_queue_capacity: 1024,
                enable_request_logging: true,
                dal_init_timeout_secs: 30,
            },
            security: SecurityConfig {
                enable_cors: true,
                exempt_paths: default_exempt_paths(),
            },
            telemetry: TelemetryConfig {
                enable_metrics: true,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                bind_addr: "0.0.0.0:4000".to_string(),
                audit_queue_capacity: 4096,
                enable_request_logging: true,
                dal_init_timeout_secs: 60,
            },
            security: SecurityConfig {
                enable_cors: false,
                exempt_paths: default_exempt_paths(),
            },
            telemetry: TelemetryConfig {
                enable_metrics: true,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                bind_addr: "0.0.0.0:4000".to_string(),
                audit_queue_capacity: 8192,
                enable_request_logging: true,
                dal_init_timeout_secs: 120,
            },
            security: SecurityConfig {
                enable_cors: false,
                exempt_paths: default_exempt_paths(),
            },
            telemetry: TelemetryConfig {
                enable_metrics: true,
            },
        }
    }
}

fn default_exempt_paths() -> Vec<String> {
    DEFAULT_EXEMPT_PATHS.iter().map(|p| p.to_string()).collect()
}

fn parse_path_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
