//! Client for the show catalog: batched, cancellable fetches and in-place
//! synchronization of locally held shows.

pub mod catalog;
pub mod client;
pub mod config;
pub mod mapping;
pub mod orchestrator;
pub mod sync;
pub mod transport;

pub use catalog::{Catalog, Endpoint, catalog_url_for_show};
pub use client::CatalogClient;
pub use config::ClientConfig;
pub use orchestrator::{BatchKey, BatchOutcome, Orchestrator};
pub use sync::{IdsToUpdate, ShowInclude, SyncReport, SyncState, UpdateOptions};
pub use transport::{HttpTransport, Transport};
