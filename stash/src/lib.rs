//! Domain core: the storage and key-minting ports, domain types and the
//! document operations service built on top of them.

pub mod domain;
pub mod keygen;
pub mod operations;
pub mod ports;

pub use domain::{Document, ExpiryMechanism};
pub use operations::DocumentOperationsService;
pub use ports::{DocumentStore, KeyGenerator, StorageFactory};
