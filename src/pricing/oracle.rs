//! Price and market collaborators
//!
//! The engine only needs two lookups from the outside world: the unit price
//! of a currency (or any priced key) and the current listings for a target
//! item. Both may fail; callers always recover locally.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::strategy::DesiredItem;

/// A price or listing lookup failed
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Price data unavailable for {key}: {reason}")]
pub struct DataUnavailable {
    pub key: String,
    pub reason: String,
}

impl DataUnavailable {
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Source of unit prices, in reference units
pub trait PriceOracle: Send + Sync {
    fn unit_price(&self, key: &str, league: &str) -> Result<f64, DataUnavailable>;
}

/// Source of market listings for finished items
pub trait MarketSource: Send + Sync {
    fn find_listings(&self, item: &DesiredItem) -> Result<Vec<Listing>, DataUnavailable>;
}

/// One market listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub price: f64,
    /// Currency the price is quoted in
    pub currency: String,
}

impl Listing {
    pub fn new(price: f64, currency: impl Into<String>) -> Self {
        Self {
            price,
            currency: currency.into(),
        }
    }
}

/// Fixed price table
#[derive(Debug, Clone, Default)]
pub struct StaticPriceOracle {
    prices: HashMap<String, f64>,
}

impl StaticPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, key: impl Into<String>, price: f64) -> Self {
        self.prices.insert(key.into(), price);
        self
    }

    pub fn from_prices(prices: HashMap<String, f64>) -> Self {
        Self { prices }
    }
}

impl PriceOracle for StaticPriceOracle {
    fn unit_price(&self, key: &str, _league: &str) -> Result<f64, DataUnavailable> {
        self.prices
            .get(key)
            .copied()
            .ok_or_else(|| DataUnavailable::new(key, "not in price table"))
    }
}

/// Market with no listings
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMarket;

impl MarketSource for NoMarket {
    fn find_listings(&self, _item: &DesiredItem) -> Result<Vec<Listing>, DataUnavailable> {
        Ok(Vec::new())
    }
}

/// Market returning the same listings for every item
#[derive(Debug, Clone, Default)]
pub struct StaticMarket {
    listings: Vec<Listing>,
}

impl StaticMarket {
    pub fn new(listings: Vec<Listing>) -> Self {
        Self { listings }
    }
}

impl MarketSource for StaticMarket {
    fn find_listings(&self, _item: &DesiredItem) -> Result<Vec<Listing>, DataUnavailable> {
        Ok(self.listings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_oracle_lookup() {
        let oracle = StaticPriceOracle::new().with_price("chaos", 0.2);
        assert_eq!(oracle.unit_price("chaos", "Standard"), Ok(0.2));

        let err = oracle.unit_price("divine", "Standard").unwrap_err();
        assert_eq!(err.key, "divine");
        assert!(err.to_string().contains("divine"));
    }

    #[test]
    fn test_markets() {
        let item = DesiredItem::new("Sapphire Ring");
        assert!(NoMarket.find_listings(&item).unwrap().is_empty());

        let market = StaticMarket::new(vec![Listing::new(30.0, "exalted")]);
        assert_eq!(market.find_listings(&item).unwrap().len(), 1);
    }
}
