// handlers/public/mod.rs - Public handlers (no session token required)
//
// Security Level: None
// Routes: /v2/authenticate, /v2/bootstrap, /v2/healthz, /v2/metrics
// These paths make up the default exempt set of the token gate.

pub mod authenticate;
pub mod bootstrap;
pub mod healthz;
pub mod metrics;

pub use authenticate::authenticate_post;
pub use bootstrap::bootstrap_post;
pub use healthz::healthz_get;
pub use metrics::metrics_get;
