use crate::CategoryId;
use derive_more::{Display, Error};

/// Failures surfaced by the category catalog. Cloneable so that every caller
/// coalesced onto one refresh receives the same outcome.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error(ignore)]
    #[display("Upstream unavailable: {_0}")]
    UpstreamUnavailable(String),
    #[error(ignore)]
    #[display("Malformed upstream data: {_0}")]
    MalformedUpstreamData(String),
    #[error(ignore)]
    #[display("Category {_0} is not a leaf of the current tree")]
    InvalidLeaf(CategoryId),
    #[display("Product title is empty")]
    EmptyTitle,
}
