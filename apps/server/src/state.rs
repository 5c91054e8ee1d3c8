use std::sync::Arc;
use std::time::Duration;

use sitewatch_service::{StatusService, Target};

/// Shared, read-only state handed to every request handler
pub struct AppState {
    pub status: StatusService,
    pub targets: Arc<[Target]>,
    pub interval: Duration,
}
