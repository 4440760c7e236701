use stash::DocumentOperationsService;
use std::sync::Arc;

/// Server state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    pub documents: Arc<DocumentOperationsService>,
}

impl AppState {
    pub fn new(documents: DocumentOperationsService) -> Self {
        Self {
            documents: Arc::new(documents),
        }
    }
}
