//! Pricing
//!
//! Price lookups with caching and fallbacks, strategy cost aggregation,
//! and craft-vs-buy recommendations.

pub mod cache;
pub mod cost;
pub mod oracle;

pub use cache::{PriceCache, DEFAULT_PRICE_TTL};
pub use cost::{
    CostBreakdown, CostCalculator, CraftVerdict, MaterialCost, PriceService, Recommendation,
    REFERENCE_CURRENCY,
};
pub use oracle::{
    DataUnavailable, Listing, MarketSource, NoMarket, PriceOracle, StaticMarket, StaticPriceOracle,
};
