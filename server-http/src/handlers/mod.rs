pub mod documents;
pub mod health;
pub mod metrics;

pub use documents::{create_document, create_log_document, get_document, get_raw_document};
pub use health::health_check;
pub use self::metrics::metrics_endpoint;
