use crate::AttributeId;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    #[display("free text")]
    FreeText,
    #[display("enum")]
    Enum,
    #[display("numeric")]
    Numeric,
}

/// Attribute definition of a leaf category.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAttribute {
    pub attribute_id: AttributeId,
    pub name: String,
    pub mandatory: bool,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    /// Only filled for [`AttributeType::Enum`].
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub allowed_values: BTreeSet<String>,
    pub multi_value: bool,
}
