//! Product subcommands for listing and stocking inventory.

use anyhow::Result;
use clap::Subcommand;
use rust_decimal::Decimal;

use crate::adapters::InventoryStore;
use crate::config::ResolvedConfig;
use crate::domain::Product;

use super::open_store;

/// Product-related subcommands
#[derive(Subcommand, Debug)]
pub enum ProductCommands {
    /// List products in stock for the configured tenant
    List,

    /// Add a product or replace its listing
    Set {
        /// Product ID
        product_id: String,

        /// Display name
        #[arg(long)]
        name: String,

        /// Unit price
        #[arg(long)]
        price: Decimal,

        /// Units in stock
        #[arg(long)]
        stock: u32,
    },
}

pub async fn execute(cfg: &ResolvedConfig, command: ProductCommands) -> Result<()> {
    match command {
        ProductCommands::List => list_products(cfg).await,
        ProductCommands::Set {
            product_id,
            name,
            price,
            stock,
        } => {
            if price.is_sign_negative() {
                anyhow::bail!("Price cannot be negative: {}", price);
            }
            let product = Product {
                id: product_id,
                name,
                unit_price: price,
                stock,
            };
            open_store(cfg)?.upsert_product(&cfg.tenant_id, &product)?;
            println!(
                "Saved {} ({}): {} in stock at {}",
                product.name, product.id, product.stock, product.unit_price
            );
            Ok(())
        }
    }
}

async fn list_products(cfg: &ResolvedConfig) -> Result<()> {
    let store = open_store(cfg)?;
    let products = store.list_available(&cfg.tenant_id).await?;

    if products.is_empty() {
        println!(
            "No products in stock for tenant '{}'. Use 'groomtrack products set' to add one.",
            cfg.tenant_id
        );
        return Ok(());
    }

    println!("{:<18} {:<30} {:>10} {:>7}", "ID", "NAME", "PRICE", "STOCK");
    println!("{}", "-".repeat(68));

    for product in &products {
        println!(
            "{:<18} {:<30} {:>10} {:>7}",
            product.id,
            product.name,
            product.unit_price.to_string(),
            product.stock
        );
    }

    println!("\nTotal: {} products", products.len());

    Ok(())
}
