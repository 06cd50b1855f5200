use crate::config::env_string;
use crate::upstream::{read_json, MarketplaceAdapter, UpstreamError};
use async_trait::async_trait;
use catalog_types::attribute::{AttributeType, CategoryAttribute};
use catalog_types::category::{FlatCategory, UpstreamTree};
use catalog_types::{CategoryId, Marketplace};
use itertools::Itertools;
use reqwest::header::USER_AGENT;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://mpop.hepsiburada.com";
const PAGE_SIZE: usize = 2000;
const MAX_PAGES: u32 = 200;

#[derive(Clone, Debug)]
pub struct Credentials {
    pub merchant_id: String,
    pub username: String,
    pub password: String,
    pub base_url: String,
}

impl Credentials {
    pub fn from_env() -> Option<Self> {
        Some(Self {
            merchant_id: env_string("HEPSIBURADA_MERCHANT_ID")?,
            username: env_string("HEPSIBURADA_USERNAME")?,
            password: env_string("HEPSIBURADA_PASSWORD")?,
            base_url: env_string("HEPSIBURADA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CategoriesPage {
    #[serde(default)]
    pub data: Vec<HepsiburadaCategory>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HepsiburadaCategory {
    pub category_id: CategoryId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent_category_id: Option<CategoryId>,
}

#[derive(Deserialize, Debug)]
pub struct AttributesResponse {
    pub data: AttributeGroups,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AttributeGroups {
    #[serde(default)]
    pub base_attributes: Vec<HepsiburadaAttribute>,
    #[serde(default)]
    pub attributes: Vec<HepsiburadaAttribute>,
    #[serde(default)]
    pub variant_attributes: Vec<HepsiburadaAttribute>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HepsiburadaAttribute {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub multi_value: bool,
}

pub fn normalize_node(category: HepsiburadaCategory) -> FlatCategory {
    FlatCategory {
        id: category.category_id,
        name: category.name,
        parent_id: category.parent_category_id.filter(|id| !id.is_root_marker()),
    }
}

/// Enum value lists live behind a separate paged endpoint per attribute and
/// are left empty here.
pub fn normalize_attribute(attribute: HepsiburadaAttribute) -> CategoryAttribute {
    let kind = match attribute.kind.trim().to_lowercase().as_str() {
        "enum" => AttributeType::Enum,
        "integer" | "decimal" | "double" | "number" | "numeric" => AttributeType::Numeric,
        _ => AttributeType::FreeText,
    };
    CategoryAttribute {
        attribute_id: attribute.id,
        name: attribute.name,
        mandatory: attribute.mandatory,
        kind,
        allowed_values: Default::default(),
        multi_value: attribute.multi_value,
    }
}

pub fn merge_attribute_groups(groups: AttributeGroups) -> Vec<CategoryAttribute> {
    groups
        .base_attributes
        .into_iter()
        .chain(groups.attributes)
        .chain(groups.variant_attributes)
        .unique_by(|attribute| attribute.id.clone())
        .map(normalize_attribute)
        .collect()
}

/// Whether another page should be requested after `page` (zero-based)
/// returned `fetched` categories.
pub fn has_more(page: u32, fetched: usize, total_pages: Option<u32>) -> bool {
    if fetched == 0 || page + 1 >= MAX_PAGES {
        return false;
    }
    match total_pages {
        Some(total) => page + 1 < total,
        None => fetched >= PAGE_SIZE,
    }
}

pub struct HepsiburadaAdapter {
    client: ClientWithMiddleware,
    credentials: Credentials,
}

impl HepsiburadaAdapter {
    pub fn new(client: ClientWithMiddleware, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
        }
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let url = format!(
            "{}/product/api/categories/{path}",
            self.credentials.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(url)
            .query(query)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(USER_AGENT, self.credentials.merchant_id.as_str())
            .send()
            .await?;
        read_json(response).await
    }
}

#[async_trait]
impl MarketplaceAdapter for HepsiburadaAdapter {
    fn marketplace(&self) -> Marketplace {
        Marketplace::Hepsiburada
    }

    async fn fetch_tree(&self) -> Result<UpstreamTree, UpstreamError> {
        let mut categories = Vec::new();
        let mut page = 0;
        loop {
            let response: CategoriesPage = self
                .get(
                    "get-all-categories",
                    &[("page", page.to_string()), ("size", PAGE_SIZE.to_string())],
                )
                .await?;
            let fetched = response.data.len();
            log::debug!(
                "hepsiburada: category page {page} returned {fetched} entries (total pages {:?})",
                response.total_pages
            );
            categories.extend(response.data.into_iter().map(normalize_node));
            if !has_more(page, fetched, response.total_pages) {
                break;
            }
            page += 1;
        }
        Ok(UpstreamTree::Flat(categories))
    }

    async fn fetch_attributes(
        &self,
        leaf_id: &CategoryId,
    ) -> Result<Vec<CategoryAttribute>, UpstreamError> {
        let response: AttributesResponse = self.get(&format!("{leaf_id}/attributes"), &[]).await?;
        Ok(merge_attribute_groups(response.data))
    }
}
