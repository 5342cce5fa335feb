//! # pharmacy-core: Pure Domain Logic for the Pharmacy Store
//!
//! Entity records and the rules that govern them, with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Pharmacy Front-End Data Core                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Page Components (SPA)                        │   │
//! │  │    POS ── Inventory ── Patients ── Vendor Portal ── Staff       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ store actions                          │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               pharmacy-store (EntityStore)                      │   │
//! │  │    collections, loading flags, error slot, snapshots            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ pharmacy-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  entity   │  │ validation│  │   │
//! │  │   │  User     │  │   Money   │  │  Entity   │  │  Validate │  │   │
//! │  │   │  Product  │  │  TaxRate  │  │  Patch    │  │   rules   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO GLOBAL STATE                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entity records, drafts and patches
//! - [`entity`] - The [`Entity`] trait shared by every collection
//! - [`money`] - Integer-cent money and tax math
//! - [`validation`] - Draft validation rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use pharmacy_core::{StockOperation, Money, TaxRate};
//!
//! assert_eq!(StockOperation::Subtract.apply(5, 10), 0);
//!
//! let subtotal = Money::from_cents(10_000);
//! assert_eq!(subtotal.calculate_tax(TaxRate::from_bps(825)).cents(), 825);
//! ```

pub mod entity;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

pub use entity::{Entity, EntityKind};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, TaxRate};
pub use types::*;
pub use validation::Validate;

/// Maximum quantity of a single line on a supplier order.
pub const MAX_ITEM_QUANTITY: u32 = 100_000;

/// Maximum lines on one supplier order.
pub const MAX_ORDER_ITEMS: usize = 500;

/// Largest single money amount accepted from input: $10,000,000.00.
///
/// Keeps `MAX_ORDER_ITEMS × MAX_ITEM_QUANTITY × MAX_AMOUNT_CENTS` well
/// inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000;

/// Maximum length of free-text names (users, products, medications).
pub const MAX_NAME_LEN: usize = 200;
