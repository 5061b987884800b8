//! # Seed Data Generator
//!
//! Populates a database with demo products, drives concurrent movements
//! against them through the stock ledger, then audits every product.
//!
//! ## Usage
//! ```bash
//! # 40 products, 8 concurrent clerks (defaults)
//! cargo run -p kardex-db --bin seed
//!
//! # Custom amounts and database
//! cargo run -p kardex-db --bin seed -- --count 200 --clerks 16 --db ./data/kardex.db
//!
//! # Settings from a file (env overrides still apply)
//! cargo run -p kardex-db --bin seed -- --config ./kardex.toml
//!
//! # More detail
//! RUST_LOG=kardex_db=debug cargo run -p kardex-db --bin seed
//! ```
//!
//! The audit report is printed as JSON on stdout.

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use kardex_core::{NewProduct, DEFAULT_LOW_STOCK_THRESHOLD};
use kardex_db::{Database, KardexConfig, LedgerError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Category name and product names filed under it.
const CATALOG: &[(&str, &[&str])] = &[
    (
        "Hardware",
        &["Hex Bolt M8", "Hex Nut M8", "Washer M8", "Wood Screw 4x40", "Wall Plug 6mm"],
    ),
    (
        "Electrical",
        &["Cable 2.5mm", "Wall Socket", "Switch", "LED Bulb E27", "Junction Box"],
    ),
    (
        "Plumbing",
        &["PVC Elbow 1/2", "Teflon Tape", "Ball Valve 1/2", "Hose Clamp"],
    ),
    ("Paint", &["White Latex 4L", "Primer 1L", "Roller 9in", "Masking Tape"]),
];

const UNITS: &[&str] = &["UNIT", "BOX", "METER", "ROLL"];

struct Args {
    count: usize,
    clerks: usize,
    db_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

fn parse_args() -> Option<Args> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args {
        count: 40,
        clerks: 8,
        db_path: None,
        config_path: None,
    };

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--count" | "-c", Some(v)) => {
                parsed.count = v.parse().unwrap_or(parsed.count);
                i += 1;
            }
            ("--clerks" | "-k", Some(v)) => {
                parsed.clerks = v.parse().unwrap_or(parsed.clerks).max(1);
                i += 1;
            }
            ("--db" | "-d", Some(v)) => {
                parsed.db_path = Some(PathBuf::from(v));
                i += 1;
            }
            ("--config", Some(v)) => {
                parsed.config_path = Some(PathBuf::from(v));
                i += 1;
            }
            ("--help" | "-h", _) => {
                println!("Kardex Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>      Number of products to create (default: 40)");
                println!("  -k, --clerks <N>     Concurrent clerks submitting movements (default: 8)");
                println!("  -d, --db <PATH>      Database file path (default: from config)");
                println!("      --config <PATH>  TOML config file");
                println!("  -h, --help           Show this help message");
                return None;
            }
            _ => {}
        }
        i += 1;
    }

    Some(parsed)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(args) = parse_args() else {
        return Ok(());
    };

    let mut config = KardexConfig::load(args.config_path.as_deref())?;
    if let Some(path) = args.db_path {
        config.database.path = path;
    }

    info!(path = %config.database.path.display(), products = args.count, clerks = args.clerks, "Seeding");

    let db = Database::new(config.db_config()).await?;
    let ledger = db.ledger(config.ledger.clone());

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    // Products
    let start = Instant::now();
    let mut product_ids = Vec::with_capacity(args.count);

    'catalog: for (category_name, names) in CATALOG {
        let category_id = db.products().insert_category(category_name).await?;

        for (round, name) in names.iter().cycle().enumerate() {
            if product_ids.len() >= args.count || round >= args.count.div_ceil(CATALOG.len()) {
                break;
            }

            let seed = product_ids.len();
            let product = ledger
                .create_product(NewProduct {
                    code: format!("{}-{:04}", &category_name[..3].to_uppercase(), seed),
                    name: format!("{name} #{round}"),
                    category_id: Some(category_id.clone()),
                    unit_of_measure: Some(UNITS[seed % UNITS.len()].to_string()),
                    unit_price_cents: 99 + ((seed * 37) % 2_000) as i64,
                    stock_initial: ((seed * 13) % 30) as i64,
                })
                .await?;
            product_ids.push(product.id);

            if product_ids.len() >= args.count {
                break 'catalog;
            }
        }
    }

    info!(created = product_ids.len(), elapsed = ?start.elapsed(), "Products created");

    // Concurrent movements: every clerk walks every product
    let start = Instant::now();
    let clerks: Vec<_> = (0..args.clerks)
        .map(|clerk| {
            let ledger = ledger.clone();
            let product_ids = product_ids.clone();
            tokio::spawn(async move {
                let actor = format!("clerk-{clerk:02}");
                let date = format!("2024-03-{:02}", clerk % 28 + 1);
                let (mut committed, mut rejected) = (0u32, 0u32);

                for (i, product_id) in product_ids.iter().enumerate() {
                    let quantity = ((clerk + i) % 7 + 1) as i64;
                    let result = if (clerk + i) % 3 == 0 {
                        ledger
                            .submit_inflow(product_id, &date, quantity, Some(150), "restock", &actor)
                            .await
                    } else {
                        ledger
                            .submit_outflow(product_id, &date, quantity, "counter sale", &actor)
                            .await
                    };

                    match result {
                        Ok(_) => committed += 1,
                        Err(LedgerError::InsufficientStock { .. } | LedgerError::Conflict { .. }) => {
                            rejected += 1
                        }
                        Err(e) => return Err(e),
                    }
                }

                Ok::<_, LedgerError>((committed, rejected))
            })
        })
        .collect();

    let (mut committed, mut rejected) = (0u32, 0u32);
    for clerk in clerks {
        let (c, r) = clerk.await??;
        committed += c;
        rejected += r;
    }

    info!(committed, rejected, elapsed = ?start.elapsed(), "Movements submitted");

    // Audit
    let queries = db.queries();
    let mut audits = Vec::with_capacity(product_ids.len());
    for product_id in &product_ids {
        audits.push(queries.audit(product_id).await?);
    }

    let inconsistent = audits.iter().filter(|a| !a.is_consistent()).count();
    let low_stock = queries.list_low_stock(DEFAULT_LOW_STOCK_THRESHOLD).await?;

    let report = serde_json::json!({
        "products": product_ids.len(),
        "movements_committed": committed,
        "movements_rejected": rejected,
        "inconsistent_products": inconsistent,
        "low_stock": low_stock
            .iter()
            .map(|p| serde_json::json!({ "code": p.code, "stock": p.stock_current }))
            .collect::<Vec<_>>(),
        "audits": audits,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    db.close().await;

    if inconsistent > 0 {
        return Err(format!("{inconsistent} products failed the ledger audit").into());
    }

    Ok(())
}
