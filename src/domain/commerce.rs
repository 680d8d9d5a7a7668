//! Pricing, products and payment types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Pet size tier (porte); selects the price and duration variant of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeTier {
    Small,
    Medium,
    Large,
    Giant,
}

impl fmt::Display for SizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeTier::Small => write!(f, "small"),
            SizeTier::Medium => write!(f, "medium"),
            SizeTier::Large => write!(f, "large"),
            SizeTier::Giant => write!(f, "giant"),
        }
    }
}

impl FromStr for SizeTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "small" | "p" => Ok(SizeTier::Small),
            "medium" | "m" => Ok(SizeTier::Medium),
            "large" | "g" => Ok(SizeTier::Large),
            "giant" | "gg" => Ok(SizeTier::Giant),
            other => Err(format!("unknown size tier: {}", other)),
        }
    }
}

/// How the owner paid at delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    DebitCard,
    Pix,
    Transfer,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::CreditCard => write!(f, "credit_card"),
            PaymentMethod::DebitCard => write!(f, "debit_card"),
            PaymentMethod::Pix => write!(f, "pix"),
            PaymentMethod::Transfer => write!(f, "transfer"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "credit_card" | "credit" => Ok(PaymentMethod::CreditCard),
            "debit_card" | "debit" => Ok(PaymentMethod::DebitCard),
            "pix" => Ok(PaymentMethod::Pix),
            "transfer" => Ok(PaymentMethod::Transfer),
            other => Err(format!("unknown payment method: {}", other)),
        }
    }
}

/// An inventory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub unit_price: Decimal,
    pub stock: u32,
}

/// A product consumed by a task; one entry per product id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedProduct {
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl UsedProduct {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Products consumed since the last advance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedProductDelta {
    pub product_id: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl UsedProductDelta {
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            unit_price: product.unit_price,
            quantity,
        }
    }
}

/// A merged quantity no longer fits in a `u32`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Quantity of product {product_id} overflows")]
pub struct QuantityOverflow {
    pub product_id: String,
}

/// Merge deltas into a used-products map.
///
/// Quantities for the same id are summed; the first recorded name and unit
/// price are kept. Zero-quantity deltas are ignored. On overflow the map is
/// left partially merged, so callers merge into a copy.
pub fn merge_used_products(
    used: &mut BTreeMap<String, UsedProduct>,
    deltas: &[UsedProductDelta],
) -> Result<(), QuantityOverflow> {
    for delta in deltas.iter().filter(|d| d.quantity > 0) {
        match used.get_mut(&delta.product_id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(delta.quantity)
                    .ok_or_else(|| QuantityOverflow {
                        product_id: delta.product_id.clone(),
                    })?;
            }
            None => {
                used.insert(
                    delta.product_id.clone(),
                    UsedProduct {
                        name: delta.name.clone(),
                        unit_price: delta.unit_price,
                        quantity: delta.quantity,
                    },
                );
            }
        }
    }
    Ok(())
}

/// Σ(unit price × quantity)
pub fn products_cost(used: &BTreeMap<String, UsedProduct>) -> Decimal {
    used.values().map(UsedProduct::line_total).sum()
}

/// An income entry written to the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub owner_id: String,
    pub amount: Decimal,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(id: &str, price: i64, qty: u32) -> UsedProductDelta {
        UsedProductDelta {
            product_id: id.to_string(),
            name: format!("product {}", id),
            unit_price: Decimal::from(price),
            quantity: qty,
        }
    }

    #[test]
    fn test_merge_sums_same_id() {
        let mut used = BTreeMap::new();
        merge_used_products(&mut used, &[delta("shampoo", 10, 2)]).unwrap();
        merge_used_products(&mut used, &[delta("shampoo", 10, 3)]).unwrap();

        assert_eq!(used.len(), 1);
        assert_eq!(used["shampoo"].quantity, 5);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let a = delta("shampoo", 10, 2);
        let b = delta("perfume", 7, 1);
        let c = delta("shampoo", 10, 4);

        let mut left = BTreeMap::new();
        merge_used_products(&mut left, &[a.clone(), b.clone(), c.clone()]).unwrap();

        let mut right = BTreeMap::new();
        merge_used_products(&mut right, &[c, a]).unwrap();
        merge_used_products(&mut right, &[b]).unwrap();

        assert_eq!(left, right);
        assert_eq!(left["shampoo"].quantity, 6);
    }

    #[test]
    fn test_merge_ignores_zero_quantity() {
        let mut used = BTreeMap::new();
        merge_used_products(&mut used, &[delta("bow", 3, 0)]).unwrap();
        assert!(used.is_empty());
    }

    #[test]
    fn test_merge_rejects_overflow() {
        let mut used = BTreeMap::new();
        merge_used_products(&mut used, &[delta("shampoo", 10, 1)]).unwrap();

        let err = merge_used_products(&mut used, &[delta("shampoo", 10, u32::MAX)]).unwrap_err();
        assert_eq!(err.product_id, "shampoo");
        assert_eq!(used["shampoo"].quantity, 1);
    }

    #[test]
    fn test_products_cost() {
        let mut used = BTreeMap::new();
        merge_used_products(&mut used, &[delta("shampoo", 10, 2), delta("bow", 3, 1)]).unwrap();
        assert_eq!(products_cost(&used), Decimal::from(23));
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("pix".parse::<PaymentMethod>().unwrap(), PaymentMethod::Pix);
        assert_eq!(
            "credit-card".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::CreditCard
        );
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_size_tier_parsing() {
        assert_eq!("GG".parse::<SizeTier>().unwrap(), SizeTier::Giant);
        assert_eq!("medium".parse::<SizeTier>().unwrap(), SizeTier::Medium);
    }
}
