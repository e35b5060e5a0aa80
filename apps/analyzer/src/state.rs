use std::sync::Arc;

use crate::analysis::AnalysisPipeline;
use crate::client::PlatformClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<PlatformClient>,
    pub pipeline: Arc<AnalysisPipeline>,
}
