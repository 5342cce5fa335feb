//! # pharmacy-store: Entity Store for the Pharmacy Front-End
//!
//! The client-side state container behind every pharmacy page: five entity
//! collections with CRUD actions, a backend REST transport and write-through
//! snapshot persistence.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         pharmacy-store                                  │
//! │                                                                         │
//! │  page action ──► EntityStore::create_product(draft)                     │
//! │                      │                                                  │
//! │                      ├──► Validate (pharmacy-core)                      │
//! │                      ├──► Transport::post("/products", record)          │
//! │                      ├──► collection mutated                            │
//! │                      ├──► SnapshotStore::save(PersistedState)           │
//! │                      └──► StoreEvent::Created ──► subscribers re-render │
//! │                                                                         │
//! │  startup ──► StoreConfig::load ──► EntityStore::open ──► rehydrate      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`store`] - `EntityStore`, its actions, loading flags and error slot
//! - [`transport`] - Backend REST client abstraction
//! - [`persistence`] - Snapshot save and rehydration
//! - [`config`] - Store configuration (TOML + environment)
//! - [`error`] - Store error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pharmacy_store::{EntityStore, StoreConfig};
//! use pharmacy_core::StockOperation;
//!
//! # async fn run() -> pharmacy_store::StoreResult<()> {
//! let config = StoreConfig::load_or_default(None);
//! let store = EntityStore::open(&config)?;
//!
//! store.load_products().await;
//! for product in store.low_stock_products().await {
//!     store.update_stock(&product.id, product.max_stock, StockOperation::Set).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod persistence;
pub mod store;
pub mod transport;

pub use config::StoreConfig;
pub use error::{PersistenceError, StoreError, StoreResult, TransportError, TransportResult};
pub use persistence::{JsonFileSnapshot, MemorySnapshot, PersistedState, SnapshotStore, STORAGE_KEY};
pub use store::{CustomerProfile, EntityStore, EntityStoreBuilder, StoreEvent, ViewState};
pub use transport::{HttpTransport, Transport};

/// Installs a `tracing` subscriber reading `RUST_LOG`, falling back to
/// `default_filter`.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A subscriber may already be installed (tests, embedding apps).
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
