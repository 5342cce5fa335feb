//! # Demo Snapshot Seeder
//!
//! Populates a store snapshot with demo pharmacy data for development.
//!
//! ## Usage
//! ```bash
//! # Write to the configured snapshot path (store.toml / PHARMACY_SNAPSHOT_PATH)
//! cargo run -p pharmacy-store --bin seed
//!
//! # Specify snapshot file
//! cargo run -p pharmacy-store --bin seed -- --snapshot ./data/pharmacy-store.json
//!
//! # Generate more products
//! cargo run -p pharmacy-store --bin seed -- --products 120
//! ```
//!
//! ## Generated Data
//! - Staff users for each front-office role
//! - Products across pharmacy categories, some low on stock or near expiry
//! - Customers with allergies and purchase history
//! - Prescriptions referencing those customers
//! - Supplier orders in several lifecycle states

use chrono::{Duration, Utc};
use pharmacy_core::{
    CustomerDraft, CustomerStatus, Money, OrderDraft, OrderItemDraft, OrderPriority,
    OrderStatus, PrescriptionDraft, ProductDraft, TaxRate, UserDraft, UserRole,
};
use pharmacy_store::{init_tracing, EntityStore, JsonFileSnapshot, StoreConfig};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// (category, products) for realistic catalog data.
const CATALOG: &[(&str, &[&str])] = &[
    (
        "Analgesics",
        &["Paracetamol 500mg", "Ibuprofen 200mg", "Aspirin 81mg", "Naproxen 250mg"],
    ),
    (
        "Antibiotics",
        &["Amoxicillin 500mg", "Azithromycin 250mg", "Cephalexin 500mg", "Doxycycline 100mg"],
    ),
    (
        "Allergy",
        &["Loratadine 10mg", "Cetirizine 10mg", "Fexofenadine 180mg"],
    ),
    (
        "Cardio",
        &["Lisinopril 10mg", "Atorvastatin 20mg", "Amlodipine 5mg", "Metoprolol 50mg"],
    ),
    (
        "Diabetes",
        &["Metformin 500mg", "Glipizide 5mg", "Insulin Glargine Pen"],
    ),
    (
        "Gastro",
        &["Omeprazole 20mg", "Famotidine 20mg", "Loperamide 2mg"],
    ),
];

/// Catalog entries that are prescription-only.
const RX_CATEGORIES: &[&str] = &["Antibiotics", "Cardio", "Diabetes"];

const STAFF: &[(&str, &str, UserRole)] = &[
    ("Amelia Grant", "amelia@pharmacy.example", UserRole::Owner),
    ("Ravi Patel", "ravi@pharmacy.example", UserRole::Manager),
    ("Sofia Martins", "sofia@pharmacy.example", UserRole::Pharmacist),
    ("Kwame Boateng", "kwame@pharmacy.example", UserRole::Technician),
    ("Hana Sato", "hana@pharmacy.example", UserRole::Cashier),
    ("MedSupply Co", "orders@medsupply.example", UserRole::Supplier),
];

const CUSTOMERS: &[(&str, &[&str])] = &[
    ("Jane Doe", &["Penicillin"]),
    ("Carlos Rivera", &[]),
    ("Mei Chen", &["Sulfa", "Latex"]),
    ("Tom Becker", &[]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("info,pharmacy=debug");

    let args: Vec<String> = env::args().collect();

    let mut snapshot_path: Option<PathBuf> = None;
    let mut product_count: usize = CATALOG.iter().map(|(_, items)| items.len()).sum();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--snapshot" | "-s" => {
                if i + 1 < args.len() {
                    snapshot_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--products" | "-p" => {
                if i + 1 < args.len() {
                    product_count = args[i + 1].parse().unwrap_or(product_count);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Pharmacy Store Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --snapshot <PATH>  Snapshot file (default: configured path)");
                println!("  -p, --products <N>     Number of products to generate");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let path = match snapshot_path.or_else(|| StoreConfig::load_or_default(None).snapshot_path()) {
        Some(path) => path,
        None => return Err("no snapshot path given and no data directory available".into()),
    };

    info!(?path, products = product_count, "Seeding pharmacy store");

    let store = EntityStore::builder()
        .snapshots(Arc::new(JsonFileSnapshot::new(&path)))
        .build();

    if !store.products().await.is_empty() {
        warn!(?path, "Snapshot already has data, skipping seed to avoid duplicates");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let today = Utc::now().date_naive();

    // Staff
    let mut owner = None;
    for (name, email, role) in STAFF {
        let user = store.create_user(UserDraft::new(*name, *email, *role)).await?;
        if *role == UserRole::Owner {
            owner = Some(user);
        }
    }
    store.set_current_user(owner).await;

    // Catalog
    let mut products = Vec::with_capacity(product_count);
    for seed in 0..product_count {
        let (category, names) = CATALOG[seed % CATALOG.len()];
        let name = names[(seed / CATALOG.len()) % names.len()];
        let batch = seed / CATALOG.iter().map(|(_, n)| n.len()).sum::<usize>();

        let selling = 299 + ((seed * 37) % 2_200) as i64;
        let cost = selling * (55 + (seed % 20) as i64) / 100;
        let min_stock = 10 + (seed % 4) as u32 * 5;

        let draft = ProductDraft {
            name: if batch == 0 {
                name.to_string()
            } else {
                format!("{} (lot {})", name, batch + 1)
            },
            category: category.to_string(),
            sku: Some(format!("{}-{:04}", &category[..3].to_uppercase(), seed)),
            barcode: Some(format!("300{:010}", seed)),
            cost_price: Money::from_cents(cost),
            selling_price: Money::from_cents(selling),
            current_stock: ((seed * 13) % 120) as u32,
            min_stock,
            max_stock: 200,
            batch_number: Some(format!("B{:05}", 1_000 + seed)),
            expiry_date: Some(today + Duration::days(15 + ((seed * 29) % 700) as i64)),
            requires_prescription: RX_CATEGORIES.contains(&category),
            ..Default::default()
        };
        products.push(store.create_product(draft).await?);
    }

    // Customers and their prescriptions
    for (idx, (name, allergies)) in CUSTOMERS.iter().enumerate() {
        let customer = store
            .create_customer(CustomerDraft {
                name: name.to_string(),
                email: Some(format!(
                    "{}@mail.example",
                    name.to_lowercase().replace(' ', ".")
                )),
                allergies: allergies.iter().map(|a| a.to_string()).collect(),
                status: if idx == 0 {
                    CustomerStatus::Vip
                } else {
                    CustomerStatus::Active
                },
                ..Default::default()
            })
            .await?;

        for visit in 0..=idx {
            let amount = Money::from_cents(1_250 + (visit as i64 * 875));
            store.record_purchase(&customer.id, amount).await?;
        }

        let rx_products = products.iter().filter(|p| p.requires_prescription);
        for product in rx_products.skip(idx).take(2) {
            store
                .create_prescription(PrescriptionDraft {
                    customer_id: customer.id.clone(),
                    medication: product.name.clone(),
                    dosage: "1 tablet".to_string(),
                    frequency: Some("twice daily".to_string()),
                    prescriber: Some("Dr. Alvarez".to_string()),
                    refills: (idx % 3) as u32 + 1,
                    issued_date: Some(today - Duration::days(30)),
                    expiry_date: today + Duration::days(335),
                    is_active: true,
                    notes: None,
                })
                .await?;
        }
    }

    // Supplier orders, one per lifecycle stage
    let stages = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ];
    for (idx, stage) in stages.iter().enumerate() {
        let items = products
            .iter()
            .skip(idx * 3)
            .take(3)
            .map(|p| OrderItemDraft {
                product_id: p.id.clone(),
                product_name: p.name.clone(),
                quantity: p.max_stock.saturating_sub(p.current_stock).max(10),
                unit_cost: p.cost_price,
            })
            .collect::<Vec<_>>();
        if items.is_empty() {
            break;
        }

        let order = store
            .create_order(OrderDraft {
                supplier_id: "supplier-medsupply".to_string(),
                supplier_name: "MedSupply Co".to_string(),
                items,
                tax_rate: TaxRate::from_bps(825),
                shipping: Money::from_cents(1_500),
                priority: if idx == 0 {
                    OrderPriority::Urgent
                } else {
                    OrderPriority::Normal
                },
                expected_delivery: Some(today + Duration::days(7)),
                notes: None,
            })
            .await?;

        let mut status = order.status;
        while status != *stage {
            let Some(next) = status.next() else { break };
            store.transition_order(&order.id, next).await?;
            status = next;
        }
    }

    let elapsed = start.elapsed();
    let low = store.low_stock_products().await.len();
    let expiring = store.expiring_products(90).await.len();

    info!(
        users = store.users().await.len(),
        products = products.len(),
        customers = store.customers().await.len(),
        prescriptions = store.prescriptions().await.len(),
        orders = store.orders().await.len(),
        low_stock = low,
        expiring_90d = expiring,
        ?elapsed,
        "Seed complete"
    );

    Ok(())
}
