#![deny(clippy::unwrap_used)]

pub mod cache;
pub mod catalog;
pub mod config;
pub mod control;
pub mod flight;
pub mod hepsiburada;
pub mod matcher;
pub mod search;
pub mod store;
pub mod temu;
pub mod text;
pub mod trendyol;
pub mod upstream;

#[cfg(test)]
mod testing;

pub use catalog::CategoryCatalog;
pub use upstream::{MarketplaceAdapter, RateLimiter, UpstreamError};
