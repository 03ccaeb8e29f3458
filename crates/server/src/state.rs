use std::sync::Arc;

use chrono::{DateTime, Utc};

use listpilot_core::directory::DirectoryCatalog;
use listpilot_core::Config;
use listpilot_queue::consumer::{QueueConsumer, QueuePublisher};
use listpilot_store::traits::Store;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub consumer: Arc<dyn QueueConsumer>,
    pub publisher: Arc<dyn QueuePublisher>,
    pub catalog: DirectoryCatalog,
    /// True when running with in-memory store/queue (`serve --memory`).
    pub memory_mode: bool,
    pub started_at: DateTime<Utc>,
}
