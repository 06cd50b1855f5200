use crate::config::env_string;
use crate::upstream::{read_json, MarketplaceAdapter, UpstreamError};
use async_trait::async_trait;
use catalog_types::attribute::{AttributeType, CategoryAttribute};
use catalog_types::category::{NestedCategory, UpstreamTree};
use catalog_types::{CategoryId, Marketplace};
use reqwest::header::USER_AGENT;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://apigw.trendyol.com";

#[derive(Clone, Debug)]
pub struct Credentials {
    pub supplier_id: String,
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
}

impl Credentials {
    /// `None` unless supplier id, key and secret are all set.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            supplier_id: env_string("TRENDYOL_SUPPLIER_ID")?,
            api_key: env_string("TRENDYOL_API_KEY")?,
            api_secret: env_string("TRENDYOL_API_SECRET")?,
            base_url: env_string("TRENDYOL_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

#[derive(Deserialize, Debug)]
pub struct CategoriesResponse {
    #[serde(default)]
    pub categories: Vec<TrendyolCategory>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TrendyolCategory {
    pub id: CategoryId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sub_categories: Vec<TrendyolCategory>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AttributesResponse {
    #[serde(default)]
    pub category_attributes: Vec<TrendyolCategoryAttribute>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TrendyolCategoryAttribute {
    pub attribute: AttributeRef,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub allow_custom: bool,
    #[serde(default)]
    pub attribute_values: Vec<AttributeRef>,
}

#[derive(Deserialize, Debug)]
pub struct AttributeRef {
    pub id: CategoryId,
    pub name: String,
}

pub fn normalize_node(category: TrendyolCategory) -> NestedCategory {
    NestedCategory {
        id: category.id,
        name: category.name,
        children: category
            .sub_categories
            .into_iter()
            .map(normalize_node)
            .collect(),
    }
}

/// Attributes with a closed value list are enums; allowing custom values
/// turns them back into free text.
pub fn normalize_attribute(attribute: TrendyolCategoryAttribute) -> CategoryAttribute {
    let kind = if attribute.attribute_values.is_empty() || attribute.allow_custom {
        AttributeType::FreeText
    } else {
        AttributeType::Enum
    };
    let allowed_values = match kind {
        AttributeType::Enum => attribute
            .attribute_values
            .into_iter()
            .map(|v| v.name.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect(),
        _ => Default::default(),
    };
    CategoryAttribute {
        attribute_id: attribute.attribute.id,
        name: attribute.attribute.name,
        mandatory: attribute.required,
        kind,
        allowed_values,
        multi_value: false,
    }
}

pub struct TrendyolAdapter {
    client: ClientWithMiddleware,
    credentials: Credentials,
}

impl TrendyolAdapter {
    pub fn new(client: ClientWithMiddleware, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
        }
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, UpstreamError> {
        let url = format!(
            "{}/integration/product/product-categories{path}",
            self.credentials.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(url)
            .basic_auth(&self.credentials.api_key, Some(&self.credentials.api_secret))
            .header(
                USER_AGENT,
                format!("{} - SelfIntegration", self.credentials.supplier_id),
            )
            .send()
            .await?;
        read_json(response).await
    }
}

#[async_trait]
impl MarketplaceAdapter for TrendyolAdapter {
    fn marketplace(&self) -> Marketplace {
        Marketplace::Trendyol
    }

    async fn fetch_tree(&self) -> Result<UpstreamTree, UpstreamError> {
        let response: CategoriesResponse = self.get("").await?;
        Ok(UpstreamTree::Nested(
            response.categories.into_iter().map(normalize_node).collect(),
        ))
    }

    async fn fetch_attributes(
        &self,
        leaf_id: &CategoryId,
    ) -> Result<Vec<CategoryAttribute>, UpstreamError> {
        let response: AttributesResponse = self.get(&format!("/{leaf_id}/attributes")).await?;
        Ok(response
            .category_attributes
            .into_iter()
            .map(normalize_attribute)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::decode_body;
    use catalog_types::category::CategoryTree;

    const CATEGORIES: &str = r#"{
        "categories": [
            {"id": 403, "name": "Ayakkabı", "parentId": null, "subCategories": [
                {"id": 1172, "name": "Sneaker", "parentId": 403, "subCategories": []},
                {"id": 1173, "name": "Bot", "parentId": 403, "subCategories": []}
            ]},
            {"id": 368, "name": "Elektronik", "subCategories": [
                {"id": 766, "name": "Telefon Kılıfı"}
            ]}
        ]
    }"#;

    const ATTRIBUTES: &str = r#"{
        "id": 766,
        "name": "Telefon Kılıfı",
        "categoryAttributes": [
            {
                "allowCustom": false,
                "attribute": {"id": 47, "name": "Renk"},
                "attributeValues": [{"id": 1, "name": "Siyah"}, {"id": 2, "name": "Beyaz "}],
                "categoryId": 766,
                "required": true,
                "varianter": false,
                "slicer": true
            },
            {
                "allowCustom": true,
                "attribute": {"id": 338, "name": "Uyumlu Marka"},
                "attributeValues": [{"id": 9, "name": "Apple"}],
                "required": false
            },
            {
                "attribute": {"id": 14, "name": "Materyal"},
                "attributeValues": []
            }
        ]
    }"#;

    #[test]
    fn normalizes_nested_categories() {
        let response: CategoriesResponse = decode_body(CATEGORIES).unwrap();
        let upstream = UpstreamTree::Nested(
            response.categories.into_iter().map(normalize_node).collect(),
        );
        let tree = CategoryTree::build(upstream, 1).unwrap();
        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.leaf_count(), 3);
        assert_eq!(
            tree.get(&766.into()).unwrap().display_path(),
            "Elektronik > Telefon Kılıfı"
        );
        assert_eq!(tree.get(&1173.into()).unwrap().parent_id, Some(403.into()));
    }

    #[test]
    fn normalizes_attributes() {
        let response: AttributesResponse = decode_body(ATTRIBUTES).unwrap();
        let attributes = response
            .category_attributes
            .into_iter()
            .map(normalize_attribute)
            .collect::<Vec<_>>();
        assert_eq!(attributes.len(), 3);

        let color = &attributes[0];
        assert_eq!(color.attribute_id, 47.into());
        assert!(color.mandatory);
        assert_eq!(color.kind, AttributeType::Enum);
        assert!(color.allowed_values.contains("Beyaz"));

        assert_eq!(attributes[1].kind, AttributeType::FreeText);
        assert!(attributes[1].allowed_values.is_empty());
        assert_eq!(attributes[2].kind, AttributeType::FreeText);
        assert!(!attributes[2].mandatory);
    }
}
