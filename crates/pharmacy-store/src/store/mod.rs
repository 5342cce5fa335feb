//! # Entity Store
//!
//! The client-side source of truth for the five pharmacy collections.
//!
//! ## Store Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           EntityStore                                   │
//! │                                                                         │
//! │  users ─────────── RwLock<Vec<User>>          ┐                         │
//! │  products ──────── RwLock<Vec<Product>>       │ one writer per          │
//! │  customers ─────── RwLock<Vec<Customer>>      │ collection, held        │
//! │  orders ────────── RwLock<Vec<Order>>         │ across the backend      │
//! │  prescriptions ─── RwLock<Vec<Prescription>>  ┘ call                    │
//! │                                                                         │
//! │  loading[kind]    error slot    current user    search/filter views    │
//! │                                                                         │
//! │  Transport ──► backend REST (optional)                                  │
//! │  SnapshotStore ──► write-through snapshot (optional)                    │
//! │  broadcast ──► StoreEvent subscribers                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Action Flow
//! ```text
//!   action ──► loading[kind] += 1
//!          ──► lock collection (write)
//!          ──► validate draft / merged record
//!          ──► backend call ──✗──► error slot "Failed to <verb> <entity>"
//!          │                       collection untouched, loading cleared
//!          ▼
//!          mutate collection ──► unlock ──► snapshot ──► StoreEvent
//! ```
//!
//! ## Lock Ordering
//! A writer holds exactly one collection lock and releases it before
//! snapshotting. Snapshots and `reset_store` take collection locks in
//! [`EntityKind::ALL`] order.

mod actions;
mod events;
mod ui;

pub use actions::CustomerProfile;
pub use events::StoreEvent;
pub use ui::ViewState;

use chrono::Utc;
use pharmacy_core::entity::new_id;
use pharmacy_core::{
    Customer, Entity, EntityKind, Order, Prescription, Product, User, Validate,
};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::persistence::{JsonFileSnapshot, PersistedState, SnapshotStore};
use crate::transport::{unwrap_collection, HttpTransport, Transport};
use ui::UiState;

/// Default broadcast buffer for change events.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Locks a std mutex, recovering the data if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Loading Flags
// =============================================================================

// Each collection's flag is one `AtomicU64`: the high half is the reset
// generation, the low half the number of in-flight actions.
const COUNT_MASK: u64 = u32::MAX as u64;
const GENERATION_SHIFT: u32 = 32;

fn generation_of(word: u64) -> u64 {
    word >> GENERATION_SHIFT
}

/// In-flight action counters, one per collection.
#[derive(Default)]
struct LoadingFlags {
    words: [AtomicU64; 5],
}

impl LoadingFlags {
    fn raise(&self, kind: EntityKind) -> LoadingGuard<'_> {
        let word = &self.words[kind as usize];
        let previous = word.fetch_add(1, Ordering::SeqCst);
        LoadingGuard {
            word,
            generation: generation_of(previous),
        }
    }

    fn is_raised(&self, kind: EntityKind) -> bool {
        self.words[kind as usize].load(Ordering::SeqCst) & COUNT_MASK > 0
    }

    /// Zeroes every count and starts a new generation, so guards raised
    /// before the reset no longer touch the counts.
    fn reset(&self) {
        for word in &self.words {
            let _ = word.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |w| {
                Some((generation_of(w) + 1) << GENERATION_SHIFT)
            });
        }
    }
}

/// Keeps a collection's loading flag raised while alive.
struct LoadingGuard<'a> {
    word: &'a AtomicU64,
    generation: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        // Stale after `reset_store`: the count already belongs to newer actions.
        let _ = self.word.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |w| {
            (generation_of(w) == self.generation && w & COUNT_MASK > 0).then(|| w - 1)
        });
    }
}

// =============================================================================
// Entity Store
// =============================================================================

/// Shared state container for users, products, customers, orders and
/// prescriptions.
///
/// Cheap to share as `Arc<EntityStore>`; every action takes `&self`.
pub struct EntityStore {
    users: RwLock<Vec<User>>,
    products: RwLock<Vec<Product>>,
    customers: RwLock<Vec<Customer>>,
    orders: RwLock<Vec<Order>>,
    prescriptions: RwLock<Vec<Prescription>>,

    current_user: Mutex<Option<User>>,
    loading: LoadingFlags,
    error: Mutex<Option<String>>,
    ui: Mutex<UiState>,

    transport: Option<Arc<dyn Transport>>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    /// Serializes snapshot writes.
    persist_lock: tokio::sync::Mutex<()>,
    events: broadcast::Sender<StoreEvent>,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("has_transport", &self.transport.is_some())
            .field("has_snapshots", &self.snapshots.is_some())
            .field("error", &*lock(&self.error))
            .finish_non_exhaustive()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`EntityStore`].
pub struct EntityStoreBuilder {
    transport: Option<Arc<dyn Transport>>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    event_capacity: usize,
}

impl Default for EntityStoreBuilder {
    fn default() -> Self {
        EntityStoreBuilder {
            transport: None,
            snapshots: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl EntityStoreBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn snapshots(mut self, snapshots: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Builds the store, rehydrating from the snapshot store if one is set.
    ///
    /// An absent or unreadable snapshot yields an empty store.
    pub fn build(self) -> EntityStore {
        let state = self.snapshots.as_deref().map(rehydrate).unwrap_or_default();
        let (events, _) = broadcast::channel(self.event_capacity);

        EntityStore {
            users: RwLock::new(state.users),
            products: RwLock::new(state.products),
            customers: RwLock::new(state.customers),
            orders: RwLock::new(state.orders),
            prescriptions: RwLock::new(state.prescriptions),
            current_user: Mutex::new(state.current_user),
            loading: Default::default(),
            error: Mutex::new(None),
            ui: Mutex::new(UiState::default()),
            transport: self.transport,
            snapshots: self.snapshots,
            persist_lock: tokio::sync::Mutex::new(()),
            events,
        }
    }
}

fn rehydrate(snapshots: &dyn SnapshotStore) -> PersistedState {
    match snapshots.load() {
        Ok(Some(state)) => {
            info!(
                users = state.users.len(),
                products = state.products.len(),
                customers = state.customers.len(),
                orders = state.orders.len(),
                prescriptions = state.prescriptions.len(),
                "Rehydrated store from snapshot"
            );
            state
        }
        Ok(None) => {
            debug!("No snapshot found, starting empty");
            PersistedState::default()
        }
        Err(e) => {
            warn!(error = %e, "Discarding unreadable snapshot, starting empty");
            PersistedState::default()
        }
    }
}

impl EntityStore {
    /// An empty, local-only store with no snapshots.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> EntityStoreBuilder {
        EntityStoreBuilder::default()
    }

    /// Opens a store wired per `config`: HTTP transport when an API URL is
    /// set, file snapshots when persistence is enabled.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;

        let mut builder = Self::builder().event_capacity(config.events.capacity);

        if let Some(url) = config.api_url() {
            let transport = HttpTransport::new(url, config.request_timeout())?;
            info!(base_url = %transport.base_url(), "Backend transport configured");
            builder = builder.transport(Arc::new(transport));
        }

        if config.persistence_enabled() {
            match config.snapshot_path() {
                Some(path) => {
                    info!(?path, "Snapshot persistence enabled");
                    builder = builder.snapshots(Arc::new(JsonFileSnapshot::new(path)));
                }
                None => warn!("No data directory available, snapshots disabled"),
            }
        }

        Ok(builder.build())
    }

    // =========================================================================
    // Shared State
    // =========================================================================

    /// Message of the most recent failed action.
    pub fn error(&self) -> Option<String> {
        lock(&self.error).clone()
    }

    pub fn clear_error(&self) {
        *lock(&self.error) = None;
    }

    /// True while any action on `kind` is in flight.
    pub fn is_loading(&self, kind: EntityKind) -> bool {
        self.loading.is_raised(kind)
    }

    pub fn current_user(&self) -> Option<User> {
        lock(&self.current_user).clone()
    }

    pub async fn set_current_user(&self, user: Option<User>) {
        let id = user.as_ref().map(|u| u.id.clone());
        *lock(&self.current_user) = user;
        debug!(user_id = ?id, "Current user changed");

        self.persist().await;
        self.emit(StoreEvent::CurrentUserChanged { id });
    }

    /// Receiver for change events emitted after each applied mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Search & Filter State
    // =========================================================================

    pub fn set_search_query(&self, kind: EntityKind, query: impl Into<String>) {
        lock(&self.ui).set_query(kind, query.into());
    }

    pub fn set_filter(&self, kind: EntityKind, key: impl Into<String>, value: impl Into<Value>) {
        lock(&self.ui).set_filter(kind, key.into(), value.into());
    }

    pub fn clear_filters(&self, kind: EntityKind) {
        lock(&self.ui).clear_filters(kind);
    }

    pub fn search_query(&self, kind: EntityKind) -> String {
        lock(&self.ui).view(kind).query
    }

    pub fn filters(&self, kind: EntityKind) -> std::collections::BTreeMap<String, Value> {
        lock(&self.ui).view(kind).filters
    }

    pub fn view(&self, kind: EntityKind) -> ViewState {
        lock(&self.ui).view(kind)
    }

    // =========================================================================
    // Snapshot & Reset
    // =========================================================================

    /// The persistable subset of the current state.
    pub async fn snapshot(&self) -> PersistedState {
        let users = self.users.read().await.clone();
        let products = self.products.read().await.clone();
        let customers = self.customers.read().await.clone();
        let orders = self.orders.read().await.clone();
        let prescriptions = self.prescriptions.read().await.clone();

        PersistedState {
            users,
            products,
            customers,
            orders,
            prescriptions,
            current_user: self.current_user(),
        }
    }

    /// Cold reset: empties every collection and clears the current user,
    /// search/filter state, loading flags and the error slot.
    pub async fn reset_store(&self) {
        {
            let mut users = self.users.write().await;
            let mut products = self.products.write().await;
            let mut customers = self.customers.write().await;
            let mut orders = self.orders.write().await;
            let mut prescriptions = self.prescriptions.write().await;

            users.clear();
            products.clear();
            customers.clear();
            orders.clear();
            prescriptions.clear();
        }

        *lock(&self.current_user) = None;
        lock(&self.ui).clear();
        self.loading.reset();
        self.clear_error();

        info!("Store reset");
        self.persist().await;
        self.emit(StoreEvent::Reset);
    }

    /// Writes the current state to the snapshot store. Failures are logged.
    async fn persist(&self) {
        let Some(snapshots) = &self.snapshots else {
            return;
        };

        let _guard = self.persist_lock.lock().await;
        let state = self.snapshot().await;
        let snapshots = Arc::clone(snapshots);

        match tokio::task::spawn_blocking(move || snapshots.save(&state)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to write snapshot"),
            Err(e) => warn!(error = %e, "Snapshot task did not complete"),
        }
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn loading_guard(&self, kind: EntityKind) -> LoadingGuard<'_> {
        self.loading.raise(kind)
    }

    /// Records `message` in the error slot and hands the error back.
    fn fail(&self, message: String, err: StoreError) -> StoreError {
        error!(error = %err, "{}", message);
        *lock(&self.error) = Some(message);
        err
    }

    // =========================================================================
    // Generic Collection Operations
    // =========================================================================

    async fn all<E: Stored>(&self) -> Vec<E> {
        E::slot(self).read().await.clone()
    }

    async fn find<E: Stored>(&self, id: &str) -> Option<E> {
        E::slot(self)
            .read()
            .await
            .iter()
            .find(|record| record.id() == id)
            .cloned()
    }

    /// Replaces the collection with the backend's list. Errors are recorded
    /// in the error slot and swallowed.
    async fn load_records<E: Stored>(&self) {
        let _loading = self.loading_guard(E::KIND);

        let Some(transport) = self.transport.clone() else {
            debug!(kind = %E::KIND, "No transport configured, keeping local collection");
            return;
        };

        match self.fetch_records::<E>(transport.as_ref()).await {
            Ok(count) => info!(kind = %E::KIND, count, "Collection loaded"),
            Err(e) => {
                self.fail(format!("Failed to load {}", E::KIND), e);
            }
        }
    }

    async fn fetch_records<E: Stored>(&self, transport: &dyn Transport) -> StoreResult<usize> {
        let count = {
            let mut records = E::slot(self).write().await;
            let body = transport.get(&E::KIND.path()).await?;
            let fetched: Vec<E> = serde_json::from_value(unwrap_collection(body)?)?;
            let count = fetched.len();
            *records = fetched;
            count
        };

        self.persist().await;
        self.emit(StoreEvent::Loaded {
            kind: E::KIND,
            count,
        });
        Ok(count)
    }

    async fn create_record<E: Stored>(&self, draft: E::Draft) -> StoreResult<E> {
        let _loading = self.loading_guard(E::KIND);

        self.insert_record::<E>(draft)
            .await
            .map_err(|e| self.fail(format!("Failed to create {}", E::KIND.singular()), e))
    }

    async fn insert_record<E: Stored>(&self, draft: E::Draft) -> StoreResult<E> {
        draft.validate()?;
        let record = E::from_draft(new_id(), Utc::now(), draft);

        {
            let mut records = E::slot(self).write().await;
            if let Some(transport) = &self.transport {
                transport
                    .post(&E::KIND.path(), serde_json::to_value(&record)?)
                    .await?;
            }
            records.push(record.clone());
        }

        info!(kind = %E::KIND, id = %record.id(), "Record created");
        self.persist().await;
        self.emit(StoreEvent::Created {
            kind: E::KIND,
            id: record.id().to_string(),
        });
        Ok(record)
    }

    /// Shallow-merges `patch` into record `id`. A missing id is `NotFound`.
    async fn update_record<E: Stored>(&self, id: &str, patch: E::Patch) -> StoreResult<E> {
        let _loading = self.loading_guard(E::KIND);

        let result = self
            .modify_record::<E, _>(id, move |record| {
                let body = serde_json::to_value(&patch)?;
                record.apply_patch(patch);
                Ok(body)
            })
            .await
            .and_then(|updated| updated.ok_or_else(|| StoreError::not_found(E::KIND, id)));

        result.map_err(|e| self.fail(format!("Failed to update {}", E::KIND.singular()), e))
    }

    /// Applies `mutate` to a copy of record `id`, re-validates the copy, sends
    /// the body `mutate` returned as `PATCH /<kind>/<id>`, then stores the
    /// copy. `Ok(None)` when the id is absent; the collection is untouched on
    /// any error.
    async fn modify_record<E, F>(&self, id: &str, mutate: F) -> StoreResult<Option<E>>
    where
        E: Stored,
        F: FnOnce(&mut E) -> StoreResult<Value> + Send,
    {
        let updated = {
            let mut records = E::slot(self).write().await;
            let Some(index) = records.iter().position(|record| record.id() == id) else {
                debug!(kind = %E::KIND, id, "Update target not found");
                return Ok(None);
            };

            let mut updated = records[index].clone();
            let body = mutate(&mut updated)?;
            updated.validate()?;
            updated.touch(Utc::now());

            if let Some(transport) = &self.transport {
                transport.patch(&E::KIND.item_path(id), body).await?;
            }

            records[index] = updated.clone();
            updated
        };

        debug!(kind = %E::KIND, id, "Record updated");
        self.persist().await;
        self.emit(StoreEvent::Updated {
            kind: E::KIND,
            id: id.to_string(),
        });
        Ok(Some(updated))
    }

    /// Removes record `id`. A missing id is a silent no-op returning `false`.
    async fn delete_record<E: Stored>(&self, id: &str) -> StoreResult<bool> {
        let _loading = self.loading_guard(E::KIND);

        self.remove_record::<E>(id)
            .await
            .map_err(|e| self.fail(format!("Failed to delete {}", E::KIND.singular()), e))
    }

    async fn remove_record<E: Stored>(&self, id: &str) -> StoreResult<bool> {
        {
            let mut records = E::slot(self).write().await;
            let Some(index) = records.iter().position(|record| record.id() == id) else {
                debug!(kind = %E::KIND, id, "Delete target not found, nothing to do");
                return Ok(false);
            };

            if let Some(transport) = &self.transport {
                transport.delete(&E::KIND.item_path(id)).await?;
            }

            records.remove(index);
        }

        info!(kind = %E::KIND, id, "Record deleted");
        self.persist().await;
        self.emit(StoreEvent::Deleted {
            kind: E::KIND,
            id: id.to_string(),
        });
        Ok(true)
    }
}

// =============================================================================
// Collection Access
// =============================================================================

/// Maps an entity type to its collection inside the store.
trait Stored: Entity {
    fn slot(store: &EntityStore) -> &RwLock<Vec<Self>>;
}

impl Stored for User {
    fn slot(store: &EntityStore) -> &RwLock<Vec<Self>> {
        &store.users
    }
}

impl Stored for Product {
    fn slot(store: &EntityStore) -> &RwLock<Vec<Self>> {
        &store.products
    }
}

impl Stored for Customer {
    fn slot(store: &EntityStore) -> &RwLock<Vec<Self>> {
        &store.customers
    }
}

impl Stored for Order {
    fn slot(store: &EntityStore) -> &RwLock<Vec<Self>> {
        &store.orders
    }
}

impl Stored for Prescription {
    fn slot(store: &EntityStore) -> &RwLock<Vec<Self>> {
        &store.prescriptions
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
