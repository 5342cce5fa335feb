//! # Domain Types
//!
//! The five record types held by the store, with their drafts and patches.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌───────────────┐  ┌───────────────┐  ┌───────────────┐               │
//! │  │     User      │  │    Product    │  │   Customer    │               │
//! │  │  role, status │  │  prices       │  │  aggregates   │               │
//! │  │  permissions  │  │  stock levels │  │  allergies    │               │
//! │  │  targets      │  │  batch/expiry │  │  status       │               │
//! │  └───────────────┘  └───────────────┘  └───────┬───────┘               │
//! │                                                │ customerId (by ref)    │
//! │  ┌───────────────┐                     ┌───────▼───────┐               │
//! │  │     Order     │◄── owns ── OrderItem │ Prescription  │               │
//! │  │  supplier     │                     │  medication   │               │
//! │  │  totals       │                     │  refills      │               │
//! │  │  status       │                     │  expiry       │               │
//! │  └───────────────┘                     └───────────────┘               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Drafts and Patches
//! - `XDraft`: creation input. No id, no timestamps, no derived fields.
//! - `XPatch`: every field optional. Nullable fields use `Option<Option<T>>`
//!   so a patch can distinguish "leave alone" (absent) from "clear" (`null`).

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::entity::{Entity, EntityKind};
use crate::error::{CoreError, CoreResult};
use crate::money::{Money, TaxRate};
use crate::MAX_AMOUNT_CENTS;

/// Deserializes a present field (even `null`) as `Some(..)`, so absent and
/// `null` stay distinguishable in patches.
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Overwrites `target` when the patch carries a value.
#[inline]
fn merge<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

// =============================================================================
// User
// =============================================================================

/// Staff and partner roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperAdmin,
    Owner,
    Manager,
    Pharmacist,
    Technician,
    Cashier,
    Supplier,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Pending,
}

/// A staff member or supplier account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub branch_id: Option<String>,
    pub organization_id: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub sales_target: Option<Money>,
    pub collection_target: Option<Money>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.role == UserRole::SuperAdmin || self.permissions.iter().any(|p| p == permission)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: UserRole,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub sales_target: Option<Money>,
    #[serde(default)]
    pub collection_target: Option<Money>,
}

impl UserDraft {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: UserRole) -> Self {
        UserDraft {
            name: name.into(),
            email: email.into(),
            phone: None,
            role,
            status: UserStatus::Active,
            branch_id: None,
            organization_id: None,
            permissions: Vec::new(),
            sales_target: None,
            collection_target: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub phone: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub sales_target: Option<Option<Money>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub collection_target: Option<Option<Money>>,
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::Users;

    type Draft = UserDraft;
    type Patch = UserPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn from_draft(id: String, now: DateTime<Utc>, draft: UserDraft) -> Self {
        User {
            id,
            name: draft.name,
            email: draft.email,
            phone: draft.phone,
            role: draft.role,
            status: draft.status,
            branch_id: draft.branch_id,
            organization_id: draft.organization_id,
            permissions: draft.permissions,
            sales_target: draft.sales_target,
            collection_target: draft.collection_target,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: UserPatch) {
        merge(&mut self.name, patch.name);
        merge(&mut self.email, patch.email);
        merge(&mut self.phone, patch.phone);
        merge(&mut self.role, patch.role);
        merge(&mut self.status, patch.status);
        merge(&mut self.branch_id, patch.branch_id);
        merge(&mut self.organization_id, patch.organization_id);
        merge(&mut self.permissions, patch.permissions);
        merge(&mut self.sales_target, patch.sales_target);
        merge(&mut self.collection_target, patch.collection_target);
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog item with pricing and stock levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub generic_name: Option<String>,
    pub category: String,
    pub manufacturer: Option<String>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    /// Purchase cost per unit.
    pub cost_price: Money,
    /// Shelf price per unit.
    pub selling_price: Money,
    pub current_stock: u32,
    pub min_stock: u32,
    pub max_stock: u32,
    pub batch_number: Option<String>,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    /// Scheduled substance, tracked in the compliance register.
    pub is_controlled: bool,
    pub requires_prescription: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// At or below the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.min_stock
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry <= today)
    }

    /// Expires on or before `today + days` (already-expired items included).
    pub fn expires_within(&self, today: NaiveDate, days: u32) -> bool {
        let horizon = today + Duration::days(i64::from(days));
        self.expiry_date.is_some_and(|expiry| expiry <= horizon)
    }

    /// Selling price minus cost, per unit.
    pub fn margin(&self) -> Money {
        self.selling_price - self.cost_price
    }

    /// Value of the stock on hand at cost.
    pub fn stock_value(&self) -> Money {
        self.cost_price.multiply_quantity(self.current_stock)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub generic_name: Option<String>,
    pub category: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    pub cost_price: Money,
    pub selling_price: Money,
    #[serde(default)]
    pub current_stock: u32,
    #[serde(default)]
    pub min_stock: u32,
    #[serde(default)]
    pub max_stock: u32,
    #[serde(default)]
    pub batch_number: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_controlled: bool,
    #[serde(default)]
    pub requires_prescription: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub generic_name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub sku: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub barcode: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_price: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selling_price: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stock: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_stock: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_stock: Option<u32>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_controlled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_prescription: Option<bool>,
}

impl Entity for Product {
    const KIND: EntityKind = EntityKind::Products;

    type Draft = ProductDraft;
    type Patch = ProductPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn from_draft(id: String, now: DateTime<Utc>, draft: ProductDraft) -> Self {
        Product {
            id,
            name: draft.name,
            generic_name: draft.generic_name,
            category: draft.category,
            manufacturer: draft.manufacturer,
            sku: draft.sku,
            barcode: draft.barcode,
            cost_price: draft.cost_price,
            selling_price: draft.selling_price,
            current_stock: draft.current_stock,
            min_stock: draft.min_stock,
            max_stock: draft.max_stock,
            batch_number: draft.batch_number,
            expiry_date: draft.expiry_date,
            is_controlled: draft.is_controlled,
            requires_prescription: draft.requires_prescription,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: ProductPatch) {
        merge(&mut self.name, patch.name);
        merge(&mut self.generic_name, patch.generic_name);
        merge(&mut self.category, patch.category);
        merge(&mut self.manufacturer, patch.manufacturer);
        merge(&mut self.sku, patch.sku);
        merge(&mut self.barcode, patch.barcode);
        merge(&mut self.cost_price, patch.cost_price);
        merge(&mut self.selling_price, patch.selling_price);
        merge(&mut self.current_stock, patch.current_stock);
        merge(&mut self.min_stock, patch.min_stock);
        merge(&mut self.max_stock, patch.max_stock);
        merge(&mut self.batch_number, patch.batch_number);
        merge(&mut self.expiry_date, patch.expiry_date);
        merge(&mut self.is_controlled, patch.is_controlled);
        merge(&mut self.requires_prescription, patch.requires_prescription);
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

// =============================================================================
// Stock Operation
// =============================================================================

/// How `update_stock` changes a product's `currentStock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockOperation {
    /// Increment (saturating).
    Add,
    /// Decrement, clamped at zero.
    Subtract,
    /// Absolute assignment.
    Set,
}

impl StockOperation {
    pub fn apply(&self, current: u32, quantity: u32) -> u32 {
        match self {
            StockOperation::Add => current.saturating_add(quantity),
            StockOperation::Subtract => current.saturating_sub(quantity),
            StockOperation::Set => quantity,
        }
    }
}

impl std::str::FromStr for StockOperation {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "add" => Ok(StockOperation::Add),
            "subtract" => Ok(StockOperation::Subtract),
            "set" => Ok(StockOperation::Set),
            other => Err(crate::error::ValidationError::InvalidFormat {
                field: "operation".to_string(),
                reason: format!("expected add, subtract or set, got '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    Active,
    Inactive,
    Vip,
    #[default]
    New,
}

/// A patient/customer with loyalty and purchase aggregates.
///
/// Prescriptions are not embedded: the prescription collection is the
/// single source of truth, joined by `customerId` at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[ts(as = "Option<String>")]
    pub date_of_birth: Option<NaiveDate>,
    #[ts(as = "String")]
    pub member_since: NaiveDate,
    #[ts(as = "String")]
    pub last_visit: NaiveDate,
    pub total_purchases: u32,
    pub total_spent: Money,
    pub loyalty_points: u32,
    #[serde(default)]
    pub allergies: Vec<String>,
    pub status: CustomerStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Records a completed purchase: one more visit, spend added, one loyalty
    /// point per whole currency unit.
    ///
    /// The amount must lie in `0..=MAX_AMOUNT_CENTS` and the running spend
    /// must stay representable; on error the customer is unchanged.
    pub fn record_purchase(&mut self, amount: Money, today: NaiveDate) -> CoreResult<()> {
        let invalid = |reason: String| CoreError::InvalidPurchase { reason };

        if amount.is_negative() {
            return Err(invalid(format!("amount must not be negative, got {}", amount)));
        }
        if amount.cents() > MAX_AMOUNT_CENTS {
            return Err(invalid(format!(
                "amount {} exceeds the limit of {}",
                amount,
                Money::from_cents(MAX_AMOUNT_CENTS)
            )));
        }
        let total_spent = self
            .total_spent
            .checked_add(amount)
            .ok_or_else(|| invalid("total spent would overflow".to_string()))?;

        self.total_purchases = self.total_purchases.saturating_add(1);
        self.total_spent = total_spent;
        let points = u32::try_from(amount.whole_units()).unwrap_or(0);
        self.loyalty_points = self.loyalty_points.saturating_add(points);
        self.last_visit = today;
        Ok(())
    }

    pub fn is_allergic_to(&self, substance: &str) -> bool {
        self.allergies
            .iter()
            .any(|a| a.eq_ignore_ascii_case(substance.trim()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDraft {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub status: CustomerStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_since: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_visit: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_purchases: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_spent: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loyalty_points: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allergies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CustomerStatus>,
}

impl Entity for Customer {
    const KIND: EntityKind = EntityKind::Customers;

    type Draft = CustomerDraft;
    type Patch = CustomerPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Seeds `memberSince`/`lastVisit` with today and zeroes the aggregates.
    fn from_draft(id: String, now: DateTime<Utc>, draft: CustomerDraft) -> Self {
        let today = now.date_naive();
        Customer {
            id,
            name: draft.name,
            email: draft.email,
            phone: draft.phone,
            address: draft.address,
            date_of_birth: draft.date_of_birth,
            member_since: today,
            last_visit: today,
            total_purchases: 0,
            total_spent: Money::zero(),
            loyalty_points: 0,
            allergies: draft.allergies,
            status: draft.status,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: CustomerPatch) {
        merge(&mut self.name, patch.name);
        merge(&mut self.email, patch.email);
        merge(&mut self.phone, patch.phone);
        merge(&mut self.address, patch.address);
        merge(&mut self.date_of_birth, patch.date_of_birth);
        merge(&mut self.member_since, patch.member_since);
        merge(&mut self.last_visit, patch.last_visit);
        merge(&mut self.total_purchases, patch.total_purchases);
        merge(&mut self.total_spent, patch.total_spent);
        merge(&mut self.loyalty_points, patch.loyalty_points);
        merge(&mut self.allergies, patch.allergies);
        merge(&mut self.status, patch.status);
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

// =============================================================================
// Prescription
// =============================================================================

/// A prescription issued to one customer, referenced by `customerId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: String,
    pub customer_id: String,
    pub medication: String,
    pub dosage: String,
    pub frequency: Option<String>,
    pub prescriber: Option<String>,
    /// Refills remaining.
    pub refills: u32,
    #[ts(as = "Option<String>")]
    pub issued_date: Option<NaiveDate>,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    pub is_active: bool,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Prescription {
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date < today
    }

    pub fn is_refillable(&self, today: NaiveDate) -> bool {
        self.is_active && self.refills > 0 && !self.is_expired(today)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionDraft {
    pub customer_id: String,
    pub medication: String,
    pub dosage: String,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub prescriber: Option<String>,
    #[serde(default)]
    pub refills: u32,
    #[serde(default)]
    pub issued_date: Option<NaiveDate>,
    pub expiry_date: NaiveDate,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medication: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub prescriber: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refills: Option<u32>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub issued_date: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
}

impl Entity for Prescription {
    const KIND: EntityKind = EntityKind::Prescriptions;

    type Draft = PrescriptionDraft;
    type Patch = PrescriptionPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn from_draft(id: String, now: DateTime<Utc>, draft: PrescriptionDraft) -> Self {
        Prescription {
            id,
            customer_id: draft.customer_id,
            medication: draft.medication,
            dosage: draft.dosage,
            frequency: draft.frequency,
            prescriber: draft.prescriber,
            refills: draft.refills,
            issued_date: draft.issued_date,
            expiry_date: draft.expiry_date,
            is_active: draft.is_active,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: PrescriptionPatch) {
        merge(&mut self.customer_id, patch.customer_id);
        merge(&mut self.medication, patch.medication);
        merge(&mut self.dosage, patch.dosage);
        merge(&mut self.frequency, patch.frequency);
        merge(&mut self.prescriber, patch.prescriber);
        merge(&mut self.refills, patch.refills);
        merge(&mut self.issued_date, patch.issued_date);
        merge(&mut self.expiry_date, patch.expiry_date);
        merge(&mut self.is_active, patch.is_active);
        merge(&mut self.notes, patch.notes);
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Supplier order lifecycle.
///
/// ```text
/// pending ──► confirmed ──► processing ──► shipped ──► delivered
///    │            │              │            │
///    └────────────┴──────────────┴────────────┴──────► cancelled
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// The next step on the happy path, if any.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::Shipped),
            OrderStatus::Shipped => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        if to == OrderStatus::Cancelled {
            return !self.is_terminal();
        }
        self.next() == Some(to)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

// =============================================================================
// Order
// =============================================================================

/// A line on a supplier order. Owned by its order; no independent lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_cost: Money,
    /// `quantity × unitCost`.
    pub total_cost: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemDraft {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_cost: Money,
}

impl From<OrderItemDraft> for OrderItem {
    fn from(draft: OrderItemDraft) -> Self {
        OrderItem {
            total_cost: draft.unit_cost.multiply_quantity(draft.quantity),
            product_id: draft.product_id,
            product_name: draft.product_name,
            quantity: draft.quantity,
            unit_cost: draft.unit_cost,
        }
    }
}

/// A purchase order placed with a supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub supplier_id: String,
    /// Denormalized for list views.
    pub supplier_name: String,
    pub items: Vec<OrderItem>,
    pub tax_rate: TaxRate,
    pub shipping: Money,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub priority: OrderPriority,
    #[ts(as = "Option<String>")]
    pub expected_delivery: Option<NaiveDate>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Recomputes line totals, subtotal, tax and grand total.
    pub fn recompute_totals(&mut self) {
        for item in &mut self.items {
            item.total_cost = item.unit_cost.multiply_quantity(item.quantity);
        }
        self.subtotal = self.items.iter().map(|i| i.total_cost).sum();
        self.tax = self.subtotal.calculate_tax(self.tax_rate);
        self.total = self.subtotal + self.tax + self.shipping;
    }

    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |count, i| count.saturating_add(i.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub supplier_id: String,
    pub supplier_name: String,
    pub items: Vec<OrderItemDraft>,
    #[serde(default)]
    pub tax_rate: TaxRate,
    #[serde(default)]
    pub shipping: Money,
    #[serde(default)]
    pub priority: OrderPriority,
    #[serde(default)]
    pub expected_delivery: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItemDraft>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<TaxRate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<OrderPriority>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub expected_delivery: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
}

impl Entity for Order {
    const KIND: EntityKind = EntityKind::Orders;

    type Draft = OrderDraft;
    type Patch = OrderPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// New orders start `pending` with totals computed from the items.
    fn from_draft(id: String, now: DateTime<Utc>, draft: OrderDraft) -> Self {
        let mut order = Order {
            id,
            supplier_id: draft.supplier_id,
            supplier_name: draft.supplier_name,
            items: draft.items.into_iter().map(OrderItem::from).collect(),
            tax_rate: draft.tax_rate,
            shipping: draft.shipping,
            subtotal: Money::zero(),
            tax: Money::zero(),
            total: Money::zero(),
            status: OrderStatus::Pending,
            priority: draft.priority,
            expected_delivery: draft.expected_delivery,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        };
        order.recompute_totals();
        order
    }

    fn apply_patch(&mut self, patch: OrderPatch) {
        let reprice = patch.items.is_some() || patch.tax_rate.is_some() || patch.shipping.is_some();

        merge(&mut self.supplier_id, patch.supplier_id);
        merge(&mut self.supplier_name, patch.supplier_name);
        merge(
            &mut self.items,
            patch
                .items
                .map(|items| items.into_iter().map(OrderItem::from).collect()),
        );
        merge(&mut self.tax_rate, patch.tax_rate);
        merge(&mut self.shipping, patch.shipping);
        merge(&mut self.status, patch.status);
        merge(&mut self.priority, patch.priority);
        merge(&mut self.expected_delivery, patch.expected_delivery);
        merge(&mut self.notes, patch.notes);

        if reprice {
            self.recompute_totals();
        }
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ts: &str) -> DateTime<Utc> {
        ts.parse().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn product(stock: u32, min: u32) -> Product {
        Product::from_draft(
            "p1".into(),
            at("2026-01-01T00:00:00Z"),
            ProductDraft {
                name: "Amoxicillin 500mg".into(),
                category: "Antibiotics".into(),
                cost_price: Money::from_cents(250),
                selling_price: Money::from_cents(400),
                current_stock: stock,
                min_stock: min,
                max_stock: 500,
                expiry_date: Some(date("2026-03-01")),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_stock_operations() {
        assert_eq!(StockOperation::Add.apply(5, 10), 15);
        assert_eq!(StockOperation::Subtract.apply(5, 3), 2);
        assert_eq!(StockOperation::Subtract.apply(5, 10), 0);
        assert_eq!(StockOperation::Set.apply(5, 42), 42);
        assert_eq!(StockOperation::Add.apply(u32::MAX, 1), u32::MAX);
        assert_eq!("subtract".parse::<StockOperation>().unwrap(), StockOperation::Subtract);
    }

    #[test]
    fn test_product_helpers() {
        let p = product(10, 10);
        assert!(p.is_low_stock());
        assert_eq!(p.margin().cents(), 150);
        assert_eq!(p.stock_value().cents(), 2500);
        assert!(!p.is_expired(date("2026-02-01")));
        assert!(p.expires_within(date("2026-02-01"), 30));
        assert!(!p.expires_within(date("2026-01-01"), 30));
        assert!(p.is_expired(date("2026-03-01")));
    }

    #[test]
    fn test_patch_is_shallow_merge() {
        let mut p = product(10, 2);
        p.apply_patch(ProductPatch {
            selling_price: Some(Money::from_cents(450)),
            expiry_date: Some(None),
            ..Default::default()
        });
        assert_eq!(p.selling_price.cents(), 450);
        assert_eq!(p.expiry_date, None);
        assert_eq!(p.name, "Amoxicillin 500mg");
        assert_eq!(p.current_stock, 10);
    }

    #[test]
    fn test_patch_json_distinguishes_null_from_absent() {
        let patch: CustomerPatch =
            serde_json::from_str(r#"{"email": null, "name": "Jane Roe"}"#).unwrap();
        assert_eq!(patch.email, Some(None));
        assert_eq!(patch.phone, None);
        assert_eq!(patch.name.as_deref(), Some("Jane Roe"));
    }

    #[test]
    fn test_customer_draft_seeds_aggregates() {
        let now = at("2026-10-19T09:30:00Z");
        let c = Customer::from_draft(
            "c1".into(),
            now,
            CustomerDraft {
                name: "Jane Doe".into(),
                ..Default::default()
            },
        );
        assert_eq!(c.member_since, date("2026-10-19"));
        assert_eq!(c.last_visit, date("2026-10-19"));
        assert_eq!(c.total_purchases, 0);
        assert_eq!(c.total_spent, Money::zero());
        assert_eq!(c.loyalty_points, 0);
        assert_eq!(c.status, CustomerStatus::New);
        assert_eq!(c.created_at, c.updated_at);
    }

    #[test]
    fn test_record_purchase() {
        let mut c = Customer::from_draft(
            "c1".into(),
            at("2026-01-01T00:00:00Z"),
            CustomerDraft {
                name: "Jane Doe".into(),
                allergies: vec!["Penicillin".into()],
                ..Default::default()
            },
        );
        c.record_purchase(Money::from_cents(2599), date("2026-02-02")).unwrap();
        assert_eq!(c.total_purchases, 1);
        assert_eq!(c.total_spent.cents(), 2599);
        assert_eq!(c.loyalty_points, 25);
        assert_eq!(c.last_visit, date("2026-02-02"));
        assert!(c.is_allergic_to("penicillin"));
    }

    #[test]
    fn test_record_purchase_rejects_out_of_range_amounts() {
        let mut c = Customer::from_draft(
            "c1".into(),
            at("2026-01-01T00:00:00Z"),
            CustomerDraft {
                name: "Jane Doe".into(),
                ..Default::default()
            },
        );
        let before = c.clone();

        assert!(matches!(
            c.record_purchase(Money::from_cents(-1), date("2026-02-02")),
            Err(CoreError::InvalidPurchase { .. })
        ));
        assert!(c
            .record_purchase(Money::from_cents(MAX_AMOUNT_CENTS + 1), date("2026-02-02"))
            .is_err());

        c.total_spent = Money::from_cents(i64::MAX - 10);
        let near_limit = c.clone();
        assert!(c
            .record_purchase(Money::from_cents(100), date("2026-02-02"))
            .is_err());
        assert_eq!(c, near_limit);
        assert_ne!(c, before);
    }

    #[test]
    fn test_order_totals() {
        let order = Order::from_draft(
            "o1".into(),
            at("2026-01-01T00:00:00Z"),
            OrderDraft {
                supplier_id: "s1".into(),
                supplier_name: "MedSupply Co".into(),
                items: vec![
                    OrderItemDraft {
                        product_id: "p1".into(),
                        product_name: "Ibuprofen".into(),
                        quantity: 10,
                        unit_cost: Money::from_cents(150),
                    },
                    OrderItemDraft {
                        product_id: "p2".into(),
                        product_name: "Cetirizine".into(),
                        quantity: 4,
                        unit_cost: Money::from_cents(250),
                    },
                ],
                tax_rate: TaxRate::from_bps(1000),
                shipping: Money::from_cents(500),
                priority: OrderPriority::High,
                expected_delivery: None,
                notes: None,
            },
        );
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items[0].total_cost.cents(), 1500);
        assert_eq!(order.subtotal.cents(), 2500);
        assert_eq!(order.tax.cents(), 250);
        assert_eq!(order.total.cents(), 3250);
        assert_eq!(order.item_count(), 14);
    }

    #[test]
    fn test_order_patch_reprices() {
        let mut order = Order::from_draft(
            "o1".into(),
            at("2026-01-01T00:00:00Z"),
            OrderDraft {
                supplier_id: "s1".into(),
                supplier_name: "MedSupply Co".into(),
                items: vec![OrderItemDraft {
                    product_id: "p1".into(),
                    product_name: "Ibuprofen".into(),
                    quantity: 1,
                    unit_cost: Money::from_cents(1000),
                }],
                tax_rate: TaxRate::default(),
                shipping: Money::zero(),
                priority: OrderPriority::Normal,
                expected_delivery: None,
                notes: None,
            },
        );
        order.apply_patch(OrderPatch {
            shipping: Some(Money::from_cents(300)),
            ..Default::default()
        });
        assert_eq!(order.total.cents(), 1300);
    }

    #[test]
    fn test_order_status_machine() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Processing.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Shipped.can_transition_to(Confirmed));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn test_prescription_refillable() {
        let rx = Prescription::from_draft(
            "rx1".into(),
            at("2026-01-01T00:00:00Z"),
            PrescriptionDraft {
                customer_id: "c1".into(),
                medication: "Metformin".into(),
                dosage: "500mg".into(),
                frequency: Some("twice daily".into()),
                prescriber: None,
                refills: 2,
                issued_date: None,
                expiry_date: date("2026-06-30"),
                is_active: true,
                notes: None,
            },
        );
        assert!(rx.is_refillable(date("2026-06-30")));
        assert!(!rx.is_refillable(date("2026-07-01")));
    }

    #[test]
    fn test_touch_is_strictly_increasing() {
        let now = at("2026-01-01T00:00:00Z");
        let mut p = product(1, 0);
        p.touch(now);
        assert!(p.updated_at > now);
        assert_eq!(p.created_at, now);
    }

    #[test]
    fn test_user_json_is_camel_case() {
        let user = User::from_draft(
            "u1".into(),
            at("2026-01-01T00:00:00Z"),
            UserDraft::new("Ada", "ada@example.com", UserRole::SuperAdmin),
        );
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["role"], "super_admin");
        assert!(json.get("createdAt").is_some());
        assert!(user.has_permission("anything"));
    }
}
