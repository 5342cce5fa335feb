//! Per-entity store actions and the customer, order and inventory helpers
//! built on them.

use chrono::Utc;
use pharmacy_core::{
    CoreError, Customer, CustomerDraft, CustomerPatch, EntityKind, Money, Order, OrderDraft,
    OrderPatch, OrderStatus, Prescription, PrescriptionDraft, PrescriptionPatch, Product,
    ProductDraft, ProductPatch, StockOperation, User, UserDraft, UserPatch,
};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use super::EntityStore;
use crate::error::{StoreError, StoreResult};

/// A customer joined with the prescriptions that reference them.
///
/// Serializes as the customer object with an embedded `prescriptions` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    #[serde(flatten)]
    pub customer: Customer,
    pub prescriptions: Vec<Prescription>,
}

impl CustomerProfile {
    /// Active, unexpired prescriptions with refills left.
    pub fn refillable(&self, today: chrono::NaiveDate) -> impl Iterator<Item = &Prescription> {
        self.prescriptions
            .iter()
            .filter(move |rx| rx.is_refillable(today))
    }
}

// =============================================================================
// Users
// =============================================================================

impl EntityStore {
    pub async fn load_users(&self) {
        self.load_records::<User>().await
    }

    pub async fn create_user(&self, draft: UserDraft) -> StoreResult<User> {
        self.create_record::<User>(draft).await
    }

    pub async fn update_user(&self, id: &str, patch: UserPatch) -> StoreResult<User> {
        self.update_record::<User>(id, patch).await
    }

    pub async fn delete_user(&self, id: &str) -> StoreResult<bool> {
        self.delete_record::<User>(id).await
    }

    pub async fn users(&self) -> Vec<User> {
        self.all::<User>().await
    }

    pub async fn user(&self, id: &str) -> Option<User> {
        self.find::<User>(id).await
    }
}

// =============================================================================
// Products
// =============================================================================

impl EntityStore {
    pub async fn load_products(&self) {
        self.load_records::<Product>().await
    }

    pub async fn create_product(&self, draft: ProductDraft) -> StoreResult<Product> {
        self.create_record::<Product>(draft).await
    }

    pub async fn update_product(&self, id: &str, patch: ProductPatch) -> StoreResult<Product> {
        self.update_record::<Product>(id, patch).await
    }

    pub async fn delete_product(&self, id: &str) -> StoreResult<bool> {
        self.delete_record::<Product>(id).await
    }

    pub async fn products(&self) -> Vec<Product> {
        self.all::<Product>().await
    }

    pub async fn product(&self, id: &str) -> Option<Product> {
        self.find::<Product>(id).await
    }

    /// Adjusts `currentStock` only. Returns `Ok(None)` for an unknown id.
    ///
    /// ```text
    ///   add       stock + qty   (saturating)
    ///   subtract  stock - qty   (clamped at 0)
    ///   set       qty
    /// ```
    pub async fn update_stock(
        &self,
        product_id: &str,
        quantity: u32,
        operation: StockOperation,
    ) -> StoreResult<Option<Product>> {
        let _loading = self.loading_guard(EntityKind::Products);

        self.modify_record::<Product, _>(product_id, move |product| {
            let before = product.current_stock;
            product.current_stock = operation.apply(before, quantity);
            info!(
                product_id = %product.id,
                ?operation,
                quantity,
                before,
                after = product.current_stock,
                "Stock adjusted"
            );
            Ok(json!({ "currentStock": product.current_stock }))
        })
        .await
        .map_err(|e| self.fail("Failed to update stock".to_string(), e))
    }

    /// Products at or below their reorder threshold.
    pub async fn low_stock_products(&self) -> Vec<Product> {
        self.products
            .read()
            .await
            .iter()
            .filter(|p| p.is_low_stock())
            .cloned()
            .collect()
    }

    /// Products expiring within `days` from today, already-expired included,
    /// soonest first.
    pub async fn expiring_products(&self, days: u32) -> Vec<Product> {
        let today = Utc::now().date_naive();
        let mut expiring: Vec<Product> = self
            .products
            .read()
            .await
            .iter()
            .filter(|p| p.expires_within(today, days))
            .cloned()
            .collect();
        expiring.sort_by_key(|p| p.expiry_date);
        expiring
    }
}

// =============================================================================
// Customers
// =============================================================================

impl EntityStore {
    pub async fn load_customers(&self) {
        self.load_records::<Customer>().await
    }

    /// Creates a customer with `memberSince`/`lastVisit` set to today and
    /// zeroed purchase aggregates.
    pub async fn create_customer(&self, draft: CustomerDraft) -> StoreResult<Customer> {
        self.create_record::<Customer>(draft).await
    }

    pub async fn update_customer(&self, id: &str, patch: CustomerPatch) -> StoreResult<Customer> {
        self.update_record::<Customer>(id, patch).await
    }

    /// Prescriptions referencing the customer are left in place.
    pub async fn delete_customer(&self, id: &str) -> StoreResult<bool> {
        self.delete_record::<Customer>(id).await
    }

    pub async fn customers(&self) -> Vec<Customer> {
        self.all::<Customer>().await
    }

    pub async fn customer(&self, id: &str) -> Option<Customer> {
        self.find::<Customer>(id).await
    }

    pub async fn customer_prescriptions(&self, customer_id: &str) -> Vec<Prescription> {
        self.prescriptions
            .read()
            .await
            .iter()
            .filter(|rx| rx.customer_id == customer_id)
            .cloned()
            .collect()
    }

    pub async fn customer_profile(&self, customer_id: &str) -> Option<CustomerProfile> {
        let customer = self.customer(customer_id).await?;
        let prescriptions = self.customer_prescriptions(customer_id).await;

        Some(CustomerProfile {
            customer,
            prescriptions,
        })
    }

    /// Books a completed sale against the customer's aggregates: one more
    /// purchase, spend added, one loyalty point per whole currency unit,
    /// last visit set to today.
    pub async fn record_purchase(&self, customer_id: &str, amount: Money) -> StoreResult<Customer> {
        let _loading = self.loading_guard(EntityKind::Customers);

        let today = Utc::now().date_naive();
        let result = self
            .modify_record::<Customer, _>(customer_id, move |customer| {
                customer.record_purchase(amount, today)?;
                Ok(json!({
                    "totalPurchases": customer.total_purchases,
                    "totalSpent": customer.total_spent,
                    "loyaltyPoints": customer.loyalty_points,
                    "lastVisit": customer.last_visit,
                }))
            })
            .await
            .and_then(|updated| {
                updated.ok_or_else(|| StoreError::not_found(EntityKind::Customers, customer_id))
            });

        result.map_err(|e| self.fail("Failed to record purchase".to_string(), e))
    }
}

// =============================================================================
// Orders
// =============================================================================

impl EntityStore {
    pub async fn load_orders(&self) {
        self.load_records::<Order>().await
    }

    /// Creates a `pending` order with totals computed from its items.
    pub async fn create_order(&self, draft: OrderDraft) -> StoreResult<Order> {
        self.create_record::<Order>(draft).await
    }

    /// Shallow merge; totals are recomputed when items, tax rate or shipping
    /// change. Status is overwritten as given; use [`Self::transition_order`]
    /// for checked moves.
    pub async fn update_order(&self, id: &str, patch: OrderPatch) -> StoreResult<Order> {
        self.update_record::<Order>(id, patch).await
    }

    pub async fn delete_order(&self, id: &str) -> StoreResult<bool> {
        self.delete_record::<Order>(id).await
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.all::<Order>().await
    }

    pub async fn order(&self, id: &str) -> Option<Order> {
        self.find::<Order>(id).await
    }

    /// Moves an order along its lifecycle, rejecting moves the status
    /// machine does not allow.
    pub async fn transition_order(&self, id: &str, status: OrderStatus) -> StoreResult<Order> {
        let _loading = self.loading_guard(EntityKind::Orders);

        let result = self
            .modify_record::<Order, _>(id, move |order| {
                if !order.status.can_transition_to(status) {
                    return Err(CoreError::InvalidOrderTransition {
                        order_id: order.id.clone(),
                        from: order.status,
                        to: status,
                    }
                    .into());
                }
                info!(order_id = %order.id, from = %order.status, to = %status, "Order status changed");
                order.status = status;
                Ok(json!({ "status": status }))
            })
            .await
            .and_then(|updated| updated.ok_or_else(|| StoreError::not_found(EntityKind::Orders, id)));

        result.map_err(|e| self.fail("Failed to update order".to_string(), e))
    }

    /// Orders not yet delivered or cancelled.
    pub async fn open_orders(&self) -> Vec<Order> {
        self.orders
            .read()
            .await
            .iter()
            .filter(|o| !o.status.is_terminal())
            .cloned()
            .collect()
    }
}

// =============================================================================
// Prescriptions
// =============================================================================

impl EntityStore {
    pub async fn load_prescriptions(&self) {
        self.load_records::<Prescription>().await
    }

    /// The referenced customer is not required to exist.
    pub async fn create_prescription(&self, draft: PrescriptionDraft) -> StoreResult<Prescription> {
        self.create_record::<Prescription>(draft).await
    }

    pub async fn update_prescription(
        &self,
        id: &str,
        patch: PrescriptionPatch,
    ) -> StoreResult<Prescription> {
        self.update_record::<Prescription>(id, patch).await
    }

    pub async fn delete_prescription(&self, id: &str) -> StoreResult<bool> {
        self.delete_record::<Prescription>(id).await
    }

    pub async fn prescriptions(&self) -> Vec<Prescription> {
        self.all::<Prescription>().await
    }

    pub async fn prescription(&self, id: &str) -> Option<Prescription> {
        self.find::<Prescription>(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pharmacy_core::{OrderItemDraft, OrderPriority, TaxRate, UserRole};

    fn product_draft(name: &str, stock: u32, min: u32) -> ProductDraft {
        ProductDraft {
            name: name.into(),
            category: "OTC".into(),
            cost_price: Money::from_cents(120),
            selling_price: Money::from_cents(250),
            current_stock: stock,
            min_stock: min,
            max_stock: 500,
            ..Default::default()
        }
    }

    fn order_draft() -> OrderDraft {
        OrderDraft {
            supplier_id: "s1".into(),
            supplier_name: "MedSupply Co".into(),
            items: vec![OrderItemDraft {
                product_id: "p1".into(),
                product_name: "Ibuprofen 200mg".into(),
                quantity: 12,
                unit_cost: Money::from_cents(95),
            }],
            tax_rate: TaxRate::from_bps(500),
            shipping: Money::from_cents(400),
            priority: OrderPriority::Normal,
            expected_delivery: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamps() {
        let store = EntityStore::new();
        let user = store
            .create_user(UserDraft::new("Lena", "lena@pharmacy.example", UserRole::Manager))
            .await
            .unwrap();

        assert!(!user.id.is_empty());
        assert_eq!(user.created_at, user.updated_at);
        assert_eq!(store.users().await, vec![user.clone()]);
        assert_eq!(store.user(&user.id).await, Some(user));
        assert!(!store.is_loading(EntityKind::Users));
    }

    #[tokio::test]
    async fn test_invalid_draft_sets_error_slot() {
        let store = EntityStore::new();
        let err = store
            .create_user(UserDraft::new("Lena", "not-an-email", UserRole::Cashier))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.error().as_deref(), Some("Failed to create user"));
        assert!(store.users().await.is_empty());

        store.clear_error();
        assert_eq!(store.error(), None);
    }

    #[tokio::test]
    async fn test_update_stock_operations() {
        let store = EntityStore::new();
        let p = store.create_product(product_draft("Aspirin", 5, 2)).await.unwrap();

        let added = store.update_stock(&p.id, 10, StockOperation::Add).await.unwrap();
        assert_eq!(added.unwrap().current_stock, 15);

        let drained = store
            .update_stock(&p.id, 100, StockOperation::Subtract)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(drained.current_stock, 0);
        assert!(drained.updated_at > p.updated_at);
        assert_eq!(drained.name, "Aspirin");

        let set = store.update_stock(&p.id, 42, StockOperation::Set).await.unwrap();
        assert_eq!(set.unwrap().current_stock, 42);

        let missing = store.update_stock("nope", 1, StockOperation::Add).await.unwrap();
        assert!(missing.is_none());
        assert_eq!(store.error(), None);
    }

    #[tokio::test]
    async fn test_inventory_queries() {
        let store = EntityStore::new();
        store.create_product(product_draft("Low", 3, 5)).await.unwrap();
        store.create_product(product_draft("Fine", 50, 5)).await.unwrap();

        let today = Utc::now().date_naive();
        let mut soon = product_draft("Soon", 50, 5);
        soon.expiry_date = Some(today + chrono::Duration::days(10));
        let mut later = product_draft("Later", 50, 5);
        later.expiry_date = Some(today + chrono::Duration::days(400));
        let mut expired = product_draft("Expired", 50, 5);
        expired.expiry_date = Some(today - chrono::Duration::days(1));
        store.create_product(soon).await.unwrap();
        store.create_product(later).await.unwrap();
        store.create_product(expired).await.unwrap();

        let low: Vec<String> = store.low_stock_products().await.into_iter().map(|p| p.name).collect();
        assert_eq!(low, vec!["Low".to_string()]);

        let expiring: Vec<String> =
            store.expiring_products(30).await.into_iter().map(|p| p.name).collect();
        assert_eq!(expiring, vec!["Expired".to_string(), "Soon".to_string()]);
    }

    #[tokio::test]
    async fn test_customer_profile_joins_prescriptions() {
        let store = EntityStore::new();
        let jane = store
            .create_customer(CustomerDraft {
                name: "Jane Doe".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let today = Utc::now().date_naive();
        for (med, cust) in [("Metformin", jane.id.as_str()), ("Lisinopril", "someone-else")] {
            store
                .create_prescription(PrescriptionDraft {
                    customer_id: cust.into(),
                    medication: med.into(),
                    dosage: "10mg".into(),
                    frequency: None,
                    prescriber: None,
                    refills: 1,
                    issued_date: None,
                    expiry_date: today + chrono::Duration::days(90),
                    is_active: true,
                    notes: None,
                })
                .await
                .unwrap();
        }

        let profile = store.customer_profile(&jane.id).await.unwrap();
        assert_eq!(profile.customer, jane);
        assert_eq!(profile.prescriptions.len(), 1);
        assert_eq!(profile.prescriptions[0].medication, "Metformin");
        assert_eq!(profile.refillable(today).count(), 1);

        assert!(store.customer_profile("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_record_purchase() {
        let store = EntityStore::new();
        let c = store
            .create_customer(CustomerDraft {
                name: "Omar".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let updated = store.record_purchase(&c.id, Money::from_cents(4_250)).await.unwrap();
        assert_eq!(updated.total_purchases, 1);
        assert_eq!(updated.total_spent.cents(), 4_250);
        assert_eq!(updated.loyalty_points, 42);

        let err = store.record_purchase(&c.id, Money::from_cents(-1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Core(CoreError::InvalidPurchase { .. })));
        assert_eq!(store.error().as_deref(), Some("Failed to record purchase"));

        let err = store.record_purchase("ghost", Money::from_cents(100)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_transition_order() {
        let store = EntityStore::new();
        let order = store.create_order(order_draft()).await.unwrap();
        assert_eq!(order.subtotal.cents(), 1_140);
        assert_eq!(order.tax.cents(), 57);
        assert_eq!(order.total.cents(), 1_597);

        let confirmed = store
            .transition_order(&order.id, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);

        let err = store
            .transition_order(&order.id, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Core(CoreError::InvalidOrderTransition { .. })
        ));
        assert_eq!(store.order(&order.id).await.unwrap().status, OrderStatus::Confirmed);
        assert_eq!(store.open_orders().await.len(), 1);

        store
            .transition_order(&order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert!(store.open_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_id_is_not_found() {
        let store = EntityStore::new();
        store.create_product(product_draft("Aspirin", 5, 2)).await.unwrap();
        let before = store.products().await;

        let err = store
            .update_product("missing", ProductPatch::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.error().as_deref(), Some("Failed to update product"));
        assert_eq!(store.products().await, before);
    }
}
