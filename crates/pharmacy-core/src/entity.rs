//! # Entity Contract
//!
//! The shared shape of every record held by the store.
//!
//! ## Record Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Draft ──from_draft(id, now)──► Entity ──apply_patch + touch──► Entity │
//! │   (no id,                        id = v7 UUID        shallow merge      │
//! │    no timestamps)                createdAt = now     updatedAt bumped   │
//! │                                  updatedAt = now     createdAt frozen   │
//! │                                                                         │
//! │   Nothing is soft-deleted: removal drops the record from its collection │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::validation::Validate;

// =============================================================================
// Entity Kind
// =============================================================================

/// Names one of the five store collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Users,
    Products,
    Customers,
    Orders,
    Prescriptions,
}

impl EntityKind {
    /// Every kind, in snapshot order.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Users,
        EntityKind::Products,
        EntityKind::Customers,
        EntityKind::Orders,
        EntityKind::Prescriptions,
    ];

    /// Plural collection name, also used as the REST resource segment.
    pub const fn collection(&self) -> &'static str {
        match self {
            EntityKind::Users => "users",
            EntityKind::Products => "products",
            EntityKind::Customers => "customers",
            EntityKind::Orders => "orders",
            EntityKind::Prescriptions => "prescriptions",
        }
    }

    /// Singular name used in error-slot messages ("Failed to create user").
    pub const fn singular(&self) -> &'static str {
        match self {
            EntityKind::Users => "user",
            EntityKind::Products => "product",
            EntityKind::Customers => "customer",
            EntityKind::Orders => "order",
            EntityKind::Prescriptions => "prescription",
        }
    }

    /// REST path of the collection (`/users`).
    pub fn path(&self) -> String {
        format!("/{}", self.collection())
    }

    /// REST path of one record (`/users/{id}`).
    pub fn item_path(&self, id: &str) -> String {
        format!("/{}/{}", self.collection(), id)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "users" | "user" => Ok(EntityKind::Users),
            "products" | "product" => Ok(EntityKind::Products),
            "customers" | "customer" => Ok(EntityKind::Customers),
            "orders" | "order" => Ok(EntityKind::Orders),
            "prescriptions" | "prescription" => Ok(EntityKind::Prescriptions),
            other => Err(ValidationError::InvalidFormat {
                field: "entity".to_string(),
                reason: format!("unknown entity '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Entity Trait
// =============================================================================

/// A record type held in one of the store collections.
///
/// `Draft` is the creation input (no id, no timestamps, no derived fields).
/// `Patch` carries only the fields to overwrite. The record's own
/// [`Validate`] impl applies the draft's rules to a merged record.
pub trait Entity:
    Validate + Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: EntityKind;

    type Draft: Validate + Send;
    type Patch: Serialize + fmt::Debug + Send + Sync;

    fn id(&self) -> &str;

    fn created_at(&self) -> DateTime<Utc>;

    fn updated_at(&self) -> DateTime<Utc>;

    /// Builds the record, seeding derived fields from `now`.
    fn from_draft(id: String, now: DateTime<Utc>, draft: Self::Draft) -> Self;

    /// Shallow merge: overwrites exactly the fields present in `patch`.
    fn apply_patch(&mut self, patch: Self::Patch);

    fn set_updated_at(&mut self, at: DateTime<Utc>);

    /// Bumps `updatedAt` so it is strictly later than its previous value.
    fn touch(&mut self, now: DateTime<Utc>) {
        let previous = self.updated_at();
        let next = if now > previous {
            now
        } else {
            previous + Duration::microseconds(1)
        };
        self.set_updated_at(next);
    }
}

/// Generates a fresh record id: a UUID v7 (millisecond timestamp + random bits).
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("users".parse::<EntityKind>().unwrap(), EntityKind::Users);
        assert_eq!("Product".parse::<EntityKind>().unwrap(), EntityKind::Products);
        assert!("invoices".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_kind_paths() {
        assert_eq!(EntityKind::Orders.path(), "/orders");
        assert_eq!(EntityKind::Orders.item_path("o-1"), "/orders/o-1");
        assert_eq!(EntityKind::Prescriptions.singular(), "prescription");
    }

    #[test]
    fn test_ids_are_unique() {
        let ids: std::collections::HashSet<String> = (0..1000).map(|_| new_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
