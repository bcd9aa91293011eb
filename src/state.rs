use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::Mutex;

use crate::dataaccess::SharedDataAccess;

/// State shared by every route handler.
#[derive(Clone)]
pub struct AppState {
    pub dal: SharedDataAccess,
    /// Serializes the bootstrap check-then-act sequence.
    pub bootstrap_lock: Arc<Mutex<()>>,
    pub metrics: PrometheusHandle,
}

impl AppState {
    pub fn new(dal: SharedDataAccess, metrics: PrometheusHandle) -> Self {
        Self {
            dal,
            bootstrap_lock: Arc::new(Mutex::new(())),
            metrics,
        }
    }
}
