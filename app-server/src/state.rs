use std::sync::Arc;

use imgscore_scoring::{ImageScorer, ServiceDescriptor};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub scorer: Arc<ImageScorer>,

    /// Built once; the descriptor only depends on configuration.
    pub descriptor: Arc<ServiceDescriptor>,
}

impl AppState {
    pub fn new(scorer: ImageScorer) -> Self {
        let descriptor = Arc::new(scorer.descriptor());
        Self {
            scorer: Arc::new(scorer),
            descriptor,
        }
    }
}
