//! Named specifications over the in-memory store
//!
//! Seeds a few customers with orders, then pages through active customers
//! from one country with their orders eager-loaded.
//!
//! Run with:
//! ```bash
//! SPEC_QUERY_REPOSITORY__LOG_QUERY_PLANS=true \
//! SPEC_QUERY_SERVICE__LOG_LEVEL=debug \
//! cargo run --example active-customers
//! ```

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use spec_query::prelude::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Customer {
    id: Option<u64>,
    name: String,
    country: String,
    active: bool,
    signed_up: NaiveDate,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    orders: Vec<Order>,
}

impl Entity for Customer {
    const COLLECTION: &'static str = "customers";

    fn id(&self) -> Option<u64> {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Order {
    id: Option<u64>,
    customer_id: u64,
    total: f64,
}

impl Entity for Order {
    const COLLECTION: &'static str = "orders";

    fn id(&self) -> Option<u64> {
        self.id
    }
}

/// Active customers in `country`, newest first, with their orders
struct ActiveCustomersIn {
    country: String,
    page: Pagination,
}

impl From<ActiveCustomersIn> for Specification<Customer> {
    fn from(named: ActiveCustomersIn) -> Self {
        let country = named.country;
        Specification::define(|b| {
            b.add_criteria(Predicate::new(|c| c.field("active").eq(true)))
                .add_criteria(Predicate::new(|c| c.field("country").eq(country)))
                .add_include("orders")
                .apply_order_by(
                    Ordering::desc(|c| c.field("signed_up")).then_asc(|c| c.field("name")),
                )
                .apply_pagination(named.page)
        })
    }
}

/// Orders above `threshold`
fn large_orders(threshold: f64) -> Specification<Order> {
    Specification::define(|b| b.add_criteria(Predicate::new(|o| o.field("total").gt(threshold))))
}

fn customer(name: &str, country: &str, active: bool, signed_up: (i32, u32, u32)) -> Customer {
    let (year, month, day) = signed_up;
    Customer {
        id: None,
        name: name.to_string(),
        country: country.to_string(),
        active,
        signed_up: NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default(),
        orders: Vec::new(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_for_service("active-customers")?;
    init_tracing(&config)?;

    let store = MemoryStore::new()
        .with_relation(Relation::has_many("customers", "orders", "orders", "customer_id"))
        .with_unique("customers", "name");
    let session = Arc::new(Session::new(Arc::new(store)));

    let customers = SpecRepository::<Customer>::new(session.clone()).with_config(&config.repository);
    let orders = SpecRepository::<Order>::new(session).with_config(&config.repository);

    let seed = [
        customer("Ada", "NO", true, (2023, 4, 2)),
        customer("Bjørn", "NO", true, (2024, 1, 15)),
        customer("Clara", "SE", true, (2022, 9, 30)),
        customer("Dag", "NO", false, (2024, 6, 1)),
        customer("Eli", "NO", true, (2024, 1, 15)),
    ];
    for (n, entry) in seed.into_iter().enumerate() {
        let saved = customers.add(entry).await?;
        let Some(customer_id) = saved.id() else { continue };
        for k in 0..=n {
            orders
                .add(Order {
                    id: None,
                    customer_id,
                    total: 25.0 * (k + 1) as f64,
                })
                .await?;
        }
    }

    // Duplicate names are rejected by the store
    if let Err(err) = customers.add(customer("Ada", "DK", true, (2024, 2, 2))).await {
        tracing::warn!(error = %err, "Rejected duplicate customer");
    }

    let mut page = Pagination::first_page(2);
    loop {
        let spec: Specification<Customer> = ActiveCustomersIn {
            country: "NO".to_string(),
            page,
        }
        .into();

        let batch = customers.list(&spec).await?;
        if batch.is_empty() {
            break;
        }
        for c in &batch {
            println!(
                "{:<6} signed up {} with {} orders",
                c.name,
                c.signed_up,
                c.orders.len()
            );
        }
        page = page.next();
    }

    let large = orders.count(&large_orders(60.0)).await?;
    println!("{large} orders above 60.00");

    Ok(())
}
