//! # Snapshot Persistence
//!
//! Durable local snapshots of the whole store, written through on every
//! successful mutation and read once at construction.
//!
//! ## Snapshot Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  pharmacy-store.json                                                    │
//! │  {                                                                      │
//! │    "users":         [ User, ... ],                                      │
//! │    "products":      [ Product, ... ],                                   │
//! │    "customers":     [ Customer, ... ],                                  │
//! │    "orders":        [ Order, ... ],                                     │
//! │    "prescriptions": [ Prescription, ... ],                              │
//! │    "currentUser":   User | null                                         │
//! │  }                                                                      │
//! │                                                                         │
//! │  Loading flags, the error slot and search/filter state are transient    │
//! │  and never persisted.                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use pharmacy_core::{Customer, Order, Prescription, Product, User};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::error::PersistenceResult;

/// Fixed storage key; the file snapshot is named `<key>.json`.
pub const STORAGE_KEY: &str = "pharmacy-store";

/// The persisted subset of store state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
    #[serde(default)]
    pub current_user: Option<User>,
}

impl PersistedState {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.products.is_empty()
            && self.customers.is_empty()
            && self.orders.is_empty()
            && self.prescriptions.is_empty()
            && self.current_user.is_none()
    }
}

/// Durable storage for store snapshots.
///
/// `load` returns `Ok(None)` when nothing has been saved yet. A payload that
/// exists but does not parse is `PersistenceError::Corrupt`.
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> PersistenceResult<Option<PersistedState>>;

    fn save(&self, state: &PersistedState) -> PersistenceResult<()>;
}

// =============================================================================
// JSON File Snapshot
// =============================================================================

/// One JSON file, replaced atomically on each save.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshot {
    path: PathBuf,
}

impl JsonFileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileSnapshot { path: path.into() }
    }

    /// `<dir>/pharmacy-store.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(format!("{}.json", STORAGE_KEY)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| STORAGE_KEY.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonFileSnapshot {
    fn load(&self) -> PersistenceResult<Option<PersistedState>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn save(&self, state: &PersistedState) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let payload = serde_json::to_vec_pretty(state)?;
        let temp = self.temp_path();

        // Write then rename so readers never observe a half-written file.
        {
            let mut file = fs::File::create(&temp)?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;

        debug!(path = ?self.path, bytes = payload.len(), "Snapshot written");
        Ok(())
    }
}

// =============================================================================
// In-Memory Snapshot
// =============================================================================

/// Holds the serialized snapshot string in memory.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    payload: Mutex<Option<String>>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the raw payload, e.g. to simulate a corrupt snapshot.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        MemorySnapshot {
            payload: Mutex::new(Some(raw.into())),
        }
    }

    /// The last saved payload.
    pub fn raw(&self) -> Option<String> {
        self.payload
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl SnapshotStore for MemorySnapshot {
    fn load(&self) -> PersistenceResult<Option<PersistedState>> {
        match self.raw() {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, state: &PersistedState) -> PersistenceResult<()> {
        let raw = serde_json::to_string(state)?;
        *self.payload.lock().unwrap_or_else(|p| p.into_inner()) = Some(raw);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceError;
    use pharmacy_core::{Entity, ProductDraft, UserDraft, UserRole, Money};

    fn sample_state() -> PersistedState {
        let now = "2026-10-19T08:00:00Z".parse().unwrap();
        let user = User::from_draft(
            "u1".into(),
            now,
            UserDraft::new("Priya Shah", "priya@pharmacy.example", UserRole::Pharmacist),
        );
        let product = Product::from_draft(
            "p1".into(),
            now,
            ProductDraft {
                name: "Omeprazole 20mg".into(),
                category: "Gastro".into(),
                cost_price: Money::from_cents(310),
                selling_price: Money::from_cents(599),
                current_stock: 40,
                min_stock: 10,
                max_stock: 200,
                ..Default::default()
            },
        );
        PersistedState {
            users: vec![user.clone()],
            products: vec![product],
            current_user: Some(user),
            ..Default::default()
        }
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = JsonFileSnapshot::in_dir(dir.path().join("state"));
        assert!(snapshot.load().unwrap().is_none());

        let state = sample_state();
        snapshot.save(&state).unwrap();

        assert!(snapshot.path().ends_with("pharmacy-store.json"));
        assert!(!snapshot.temp_path().exists());
        assert_eq!(snapshot.load().unwrap(), Some(state));
    }

    #[test]
    fn test_file_corrupt_payload() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = JsonFileSnapshot::in_dir(dir.path());
        fs::write(snapshot.path(), "{ not json").unwrap();

        assert!(matches!(snapshot.load(), Err(PersistenceError::Corrupt(_))));
    }

    #[test]
    fn test_memory_round_trip() {
        let snapshot = MemorySnapshot::new();
        assert!(snapshot.load().unwrap().is_none());

        let state = sample_state();
        snapshot.save(&state).unwrap();
        assert!(snapshot.raw().unwrap().contains("\"currentUser\""));
        assert_eq!(snapshot.load().unwrap(), Some(state));
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let snapshot = MemorySnapshot::with_raw(r#"{"users": []}"#);
        let state = snapshot.load().unwrap().unwrap();
        assert!(state.is_empty());
    }
}
