//! # Seed Data Generator
//!
//! Populates the database with a small café catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./tally_dev.db
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path and initial stock
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db --stock 50
//! ```
//!
//! ## Generated Data
//! - Categories: coffee, tea, pastry
//! - Products per category, each with size / extra options
//! - Payment methods: cash (is_cash), card, QR
//! - Promotions: 10% off orders over 50.00, 20% off pastries (capped)

use std::env;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tally_core::promotion::PromotionDefinition;
use tally_core::{
    Category, DiscountType, PaymentMethod, Product, ProductOption, Promotion, PromotionRule,
    PromotionRuleType, PromotionScope, PromotionTarget, PromotionTargetType,
};
use tally_db::{Database, DbConfig};
use uuid::Uuid;

/// (category id, category name, [(product name, price, cost)])
const CATALOG: &[(&str, &str, &[(&str, i64, i64)])] = &[
    (
        "coffee",
        "Coffee",
        &[
            ("Espresso", 2500, 900),
            ("Americano", 3000, 1000),
            ("Cappuccino", 3800, 1400),
            ("Caffe Latte", 4000, 1500),
            ("Flat White", 4200, 1600),
        ],
    ),
    (
        "tea",
        "Tea",
        &[
            ("Jasmine Tea", 2200, 600),
            ("Matcha Latte", 4500, 1800),
            ("Iced Lemon Tea", 2800, 800),
        ],
    ),
    (
        "pastry",
        "Pastry",
        &[
            ("Butter Croissant", 3200, 1300),
            ("Pain au Chocolat", 3500, 1500),
            ("Banana Bread", 3000, 1100),
        ],
    ),
];

/// Options offered on every drink: (name, surcharge)
const DRINK_OPTIONS: &[(&str, i64)] = &[("Large", 800), ("Extra Shot", 600), ("Oat Milk", 700)];

/// Options offered on every pastry.
const PASTRY_OPTIONS: &[(&str, i64)] = &[("Warmed", 0), ("Butter Side", 500)];

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tally_dev.db");
    let mut stock: i64 = 100;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--stock" | "-s" => {
                if i + 1 < args.len() {
                    stock = args[i + 1].parse().context("--stock expects an integer")?;
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>     Database file path (default: ./tally_dev.db)");
                println!("  -s, --stock <N>     Initial stock per product (default: 100)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Stock:    {}", stock);
    println!();

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .context("failed to open database")?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let mut uow = db.begin().await?;

    let existing = uow.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();
    let mut products = 0;
    let mut options = 0;

    for (category_id, category_name, items) in CATALOG {
        uow.products()
            .insert_category(&Category {
                id: category_id.to_string(),
                name: category_name.to_string(),
            })
            .await?;

        let extras = if *category_id == "pastry" {
            PASTRY_OPTIONS
        } else {
            DRINK_OPTIONS
        };

        for (name, price, cost) in items.iter() {
            let product_id = Uuid::new_v4().to_string();
            uow.products()
                .insert(&Product {
                    id: product_id.clone(),
                    name: name.to_string(),
                    category_id: Some(category_id.to_string()),
                    price: *price,
                    cost_price: *cost,
                    stock,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .with_context(|| format!("failed to insert {}", name))?;
            products += 1;

            for (option_name, surcharge) in extras {
                uow.products()
                    .insert_option(&ProductOption {
                        id: Uuid::new_v4().to_string(),
                        product_id: product_id.clone(),
                        name: option_name.to_string(),
                        additional_price: *surcharge,
                        is_active: true,
                    })
                    .await?;
                options += 1;
            }
        }
    }

    println!("✓ Inserted {} products with {} options", products, options);

    for (id, name, is_cash) in [("cash", "Cash", true), ("card", "Card", false), ("qr", "QR", false)] {
        uow.payment_methods()
            .insert(&PaymentMethod {
                id: id.to_string(),
                name: name.to_string(),
                is_cash,
                is_active: true,
            })
            .await?;
    }

    println!("✓ Inserted payment methods");

    for definition in sample_promotions() {
        uow.promotions().insert(&definition).await?;
    }

    println!("✓ Inserted sample promotions");

    uow.commit().await?;

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn sample_promotions() -> Vec<PromotionDefinition> {
    let now = Utc::now();

    let order_wide = Promotion {
        id: "promo-order-10".to_string(),
        name: "10% off orders over 50.00".to_string(),
        scope: PromotionScope::Order,
        discount_type: DiscountType::Percentage,
        discount_value: 10,
        max_discount_amount: None,
        start_date: now - Duration::days(1),
        end_date: now + Duration::days(30),
        is_active: true,
    };

    let pastry = Promotion {
        id: "promo-pastry-20".to_string(),
        name: "20% off pastries".to_string(),
        scope: PromotionScope::Item,
        discount_type: DiscountType::Percentage,
        discount_value: 20,
        max_discount_amount: Some(2000),
        start_date: now - Duration::days(1),
        end_date: now + Duration::days(30),
        is_active: true,
    };

    vec![
        PromotionDefinition {
            rules: vec![PromotionRule {
                id: Uuid::new_v4().to_string(),
                promotion_id: order_wide.id.clone(),
                rule_type: PromotionRuleType::MinimumOrderAmount,
                value: "5000".to_string(),
            }],
            targets: Vec::new(),
            promotion: order_wide,
        },
        PromotionDefinition {
            rules: Vec::new(),
            targets: vec![PromotionTarget {
                id: Uuid::new_v4().to_string(),
                promotion_id: pastry.id.clone(),
                target_type: PromotionTargetType::Category,
                target_id: "pastry".to_string(),
            }],
            promotion: pastry,
        },
    ]
}
