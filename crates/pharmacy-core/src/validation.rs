//! # Validation Module
//!
//! Draft validation for the pharmacy store.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Page forms (SPA)                                              │
//! │  └── Immediate user feedback                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: EntityStore::create_* / update_*                              │
//! │  └── THIS MODULE: drafts before an id is minted, records after a merge  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Backend REST API                                              │
//! │  └── Authoritative constraints (out of scope here)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Records implement [`Validate`] too: the store re-validates the merged
//! record after every patch, before the backend call and the commit.

use crate::error::ValidationError;
use crate::money::{Money, TaxRate};
use crate::types::{
    Customer, CustomerDraft, Order, OrderDraft, Prescription, PrescriptionDraft, Product,
    ProductDraft, User, UserDraft,
};
use crate::{MAX_AMOUNT_CENTS, MAX_ITEM_QUANTITY, MAX_NAME_LEN, MAX_ORDER_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Implemented by every creation draft.
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a required free-text field.
///
/// ## Rules
/// - Must not be blank
/// - At most [`MAX_NAME_LEN`] characters
///
/// ## Example
/// ```rust
/// use pharmacy_core::validation::validate_required;
///
/// assert!(validate_required("name", "Paracetamol 500mg").is_ok());
/// assert!(validate_required("name", "   ").is_err());
/// ```
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates an email address.
///
/// ## Rules
/// - Exactly one `@`
/// - Non-empty local part
/// - Domain contains a dot that is neither first nor last
///
/// ## Example
/// ```rust
/// use pharmacy_core::validation::validate_email;
///
/// assert!(validate_email("rx@downtown.example").is_ok());
/// assert!(validate_email("not-an-email").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: reason.to_string(),
    };

    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    let (local, domain) = email.split_once('@').ok_or_else(|| invalid("missing '@'"))?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid("must look like name@domain"));
    }

    let dotted = domain
        .find('.')
        .is_some_and(|i| i > 0 && !domain.ends_with('.'));
    if !dotted {
        return Err(invalid("domain must contain a dot"));
    }

    Ok(())
}

/// Validates a money amount that may be zero but never negative.
pub fn validate_non_negative(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a money amount taken from input.
///
/// ## Rules
/// - Must not be negative
/// - Must not exceed [`MAX_AMOUNT_CENTS`]
///
/// ## Example
/// ```rust
/// use pharmacy_core::{validation::validate_amount, Money};
///
/// assert!(validate_amount("shipping", Money::from_cents(1_500)).is_ok());
/// assert!(validate_amount("shipping", Money::from_cents(-500)).is_err());
/// ```
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() || amount.cents() > MAX_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }

    Ok(())
}

/// Validates the number of lines on an order: at least one, at most
/// [`MAX_ORDER_ITEMS`].
pub fn validate_line_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Empty {
            field: "items".to_string(),
        });
    }

    if count > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_ITEMS as i64,
        });
    }

    Ok(())
}

/// Validates an order line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_ITEM_QUANTITY`]
pub fn validate_quantity(qty: u32) -> ValidationResult<()> {
    if qty == 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: i64::from(MAX_ITEM_QUANTITY),
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "taxRate".to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

// =============================================================================
// Shared Rules
// =============================================================================
//
// Drafts and merged records run the same rules, so a patch can never leave a
// record in a state its draft would have been refused for.

fn validate_user_fields(
    name: &str,
    email: &str,
    sales_target: Option<Money>,
    collection_target: Option<Money>,
) -> ValidationResult<()> {
    validate_required("name", name)?;
    validate_email(email)?;
    if let Some(target) = sales_target {
        validate_amount("salesTarget", target)?;
    }
    if let Some(target) = collection_target {
        validate_amount("collectionTarget", target)?;
    }
    Ok(())
}

fn validate_product_fields(
    name: &str,
    category: &str,
    cost_price: Money,
    selling_price: Money,
    min_stock: u32,
    max_stock: u32,
) -> ValidationResult<()> {
    validate_required("name", name)?;
    validate_required("category", category)?;
    validate_amount("costPrice", cost_price)?;
    validate_amount("sellingPrice", selling_price)?;

    if min_stock > max_stock {
        return Err(ValidationError::OutOfRange {
            field: "minStock".to_string(),
            min: 0,
            max: i64::from(max_stock),
        });
    }

    Ok(())
}

fn validate_customer_fields(name: &str, email: Option<&str>) -> ValidationResult<()> {
    validate_required("name", name)?;
    if let Some(email) = email {
        validate_email(email)?;
    }
    Ok(())
}

fn validate_prescription_fields(
    customer_id: &str,
    medication: &str,
    dosage: &str,
) -> ValidationResult<()> {
    validate_required("customerId", customer_id)?;
    validate_required("medication", medication)?;
    validate_required("dosage", dosage)?;
    Ok(())
}

fn validate_order_line(product_id: &str, quantity: u32, unit_cost: Money) -> ValidationResult<()> {
    validate_required("productId", product_id)?;
    validate_quantity(quantity)?;
    validate_amount("unitCost", unit_cost)
}

fn validate_order_fields(
    supplier_id: &str,
    supplier_name: &str,
    line_count: usize,
    tax_rate: TaxRate,
    shipping: Money,
) -> ValidationResult<()> {
    validate_required("supplierId", supplier_id)?;
    validate_required("supplierName", supplier_name)?;
    validate_line_count(line_count)?;
    validate_tax_rate_bps(tax_rate.bps())?;
    validate_amount("shipping", shipping)
}

// =============================================================================
// Draft Validators
// =============================================================================

impl Validate for UserDraft {
    fn validate(&self) -> ValidationResult<()> {
        validate_user_fields(
            &self.name,
            &self.email,
            self.sales_target,
            self.collection_target,
        )
    }
}

impl Validate for ProductDraft {
    fn validate(&self) -> ValidationResult<()> {
        validate_product_fields(
            &self.name,
            &self.category,
            self.cost_price,
            self.selling_price,
            self.min_stock,
            self.max_stock,
        )
    }
}

impl Validate for CustomerDraft {
    fn validate(&self) -> ValidationResult<()> {
        validate_customer_fields(&self.name, self.email.as_deref())
    }
}

impl Validate for PrescriptionDraft {
    fn validate(&self) -> ValidationResult<()> {
        validate_prescription_fields(&self.customer_id, &self.medication, &self.dosage)
    }
}

impl Validate for OrderDraft {
    fn validate(&self) -> ValidationResult<()> {
        validate_order_fields(
            &self.supplier_id,
            &self.supplier_name,
            self.items.len(),
            self.tax_rate,
            self.shipping,
        )?;
        for item in &self.items {
            validate_order_line(&item.product_id, item.quantity, item.unit_cost)?;
        }
        Ok(())
    }
}

// =============================================================================
// Record Validators
// =============================================================================

impl Validate for User {
    fn validate(&self) -> ValidationResult<()> {
        validate_user_fields(
            &self.name,
            &self.email,
            self.sales_target,
            self.collection_target,
        )
    }
}

impl Validate for Product {
    fn validate(&self) -> ValidationResult<()> {
        validate_product_fields(
            &self.name,
            &self.category,
            self.cost_price,
            self.selling_price,
            self.min_stock,
            self.max_stock,
        )
    }
}

impl Validate for Customer {
    fn validate(&self) -> ValidationResult<()> {
        validate_customer_fields(&self.name, self.email.as_deref())?;
        // Aggregates grow past MAX_AMOUNT_CENTS legitimately; only the sign is checked.
        validate_non_negative("totalSpent", self.total_spent)
    }
}

impl Validate for Prescription {
    fn validate(&self) -> ValidationResult<()> {
        validate_prescription_fields(&self.customer_id, &self.medication, &self.dosage)
    }
}

impl Validate for Order {
    fn validate(&self) -> ValidationResult<()> {
        validate_order_fields(
            &self.supplier_id,
            &self.supplier_name,
            self.items.len(),
            self.tax_rate,
            self.shipping,
        )?;
        for item in &self.items {
            validate_order_line(&item.product_id, item.quantity, item.unit_cost)?;
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderItemDraft, OrderPriority, UserRole};

    #[test]
    fn test_validate_required() {
        assert!(validate_required("name", "Aspirin").is_ok());
        assert_eq!(
            validate_required("name", ""),
            Err(ValidationError::Required {
                field: "name".to_string()
            })
        );
        assert!(validate_required("name", &"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("jane.doe@clinic.example").is_ok());
        assert!(validate_email("jane@localhost").is_err());
        assert!(validate_email("@clinic.example").is_err());
        assert!(validate_email("a@b@c.example").is_err());
        assert!(validate_email("jane@clinic.").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_user_draft() {
        let draft = UserDraft::new("Sam", "sam@pharmacy.example", UserRole::Cashier);
        assert!(draft.validate().is_ok());

        let bad = UserDraft::new("Sam", "sam", UserRole::Cashier);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_product_draft_stock_bounds() {
        let draft = ProductDraft {
            name: "Loratadine".into(),
            category: "Allergy".into(),
            min_stock: 50,
            max_stock: 10,
            ..Default::default()
        };
        let err = draft.validate().unwrap_err();
        assert_eq!(err.field(), "minStock");

        let zero_ceiling = ProductDraft {
            min_stock: 1,
            max_stock: 0,
            ..draft.clone()
        };
        assert_eq!(zero_ceiling.validate().unwrap_err().field(), "minStock");

        let empty_shelf = ProductDraft {
            min_stock: 0,
            max_stock: 0,
            ..draft
        };
        assert!(empty_shelf.validate().is_ok());
    }

    #[test]
    fn test_validate_amount_bounds() {
        assert!(validate_amount("unitCost", Money::zero()).is_ok());
        assert!(validate_amount("unitCost", Money::from_cents(MAX_AMOUNT_CENTS)).is_ok());
        assert!(validate_amount("unitCost", Money::from_cents(MAX_AMOUNT_CENTS + 1)).is_err());
        assert!(validate_amount("unitCost", Money::from_cents(-1)).is_err());
        assert!(validate_line_count(MAX_ORDER_ITEMS).is_ok());
        assert!(validate_line_count(MAX_ORDER_ITEMS + 1).is_err());
    }

    #[test]
    fn test_order_draft_requires_items() {
        let mut draft = OrderDraft {
            supplier_id: "s1".into(),
            supplier_name: "MedSupply Co".into(),
            items: Vec::new(),
            tax_rate: TaxRate::default(),
            shipping: Money::zero(),
            priority: OrderPriority::Normal,
            expected_delivery: None,
            notes: None,
        };
        assert_eq!(
            draft.validate(),
            Err(ValidationError::Empty {
                field: "items".to_string()
            })
        );

        draft.items.push(OrderItemDraft {
            product_id: "p1".into(),
            product_name: "Ibuprofen".into(),
            quantity: 0,
            unit_cost: Money::from_cents(100),
        });
        assert!(draft.validate().is_err());

        draft.items[0].quantity = 5;
        assert!(draft.validate().is_ok());

        draft.tax_rate = TaxRate::from_bps(20_000);
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_order_draft_rejects_overflowing_lines() {
        let draft = OrderDraft {
            supplier_id: "s1".into(),
            supplier_name: "MedSupply Co".into(),
            items: vec![OrderItemDraft {
                product_id: "p1".into(),
                product_name: "Ibuprofen".into(),
                quantity: MAX_ITEM_QUANTITY,
                unit_cost: Money::from_cents(i64::MAX / 1000),
            }],
            tax_rate: TaxRate::default(),
            shipping: Money::zero(),
            priority: OrderPriority::Normal,
            expected_delivery: None,
            notes: None,
        };
        assert_eq!(draft.validate().unwrap_err().field(), "unitCost");
    }

    #[test]
    fn test_merged_records_follow_draft_rules() {
        use crate::entity::Entity;
        use crate::types::{OrderPatch, ProductPatch};
        use chrono::Utc;

        let mut product = Product::from_draft(
            "p1".into(),
            Utc::now(),
            ProductDraft {
                name: "Cetirizine".into(),
                category: "Allergy".into(),
                min_stock: 5,
                max_stock: 10,
                ..Default::default()
            },
        );
        assert!(product.validate().is_ok());
        product.apply_patch(ProductPatch {
            min_stock: Some(50),
            ..Default::default()
        });
        assert_eq!(product.validate().unwrap_err().field(), "minStock");

        let mut order = Order::from_draft(
            "o1".into(),
            Utc::now(),
            OrderDraft {
                supplier_id: "s1".into(),
                supplier_name: "MedSupply Co".into(),
                items: vec![OrderItemDraft {
                    product_id: "p1".into(),
                    product_name: "Cetirizine".into(),
                    quantity: 2,
                    unit_cost: Money::from_cents(300),
                }],
                tax_rate: TaxRate::default(),
                shipping: Money::zero(),
                priority: OrderPriority::Normal,
                expected_delivery: None,
                notes: None,
            },
        );
        assert!(order.validate().is_ok());
        order.apply_patch(OrderPatch {
            items: Some(Vec::new()),
            ..Default::default()
        });
        assert_eq!(
            order.validate(),
            Err(ValidationError::Empty {
                field: "items".to_string()
            })
        );

        let mut user = User::from_draft(
            "u1".into(),
            Utc::now(),
            UserDraft::new("Sam", "sam@pharmacy.example", UserRole::Cashier),
        );
        user.email = "sam".into();
        assert_eq!(user.validate().unwrap_err().field(), "email");
    }
}
