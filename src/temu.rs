use crate::config::env_string;
use crate::upstream::{read_json, MarketplaceAdapter, UpstreamError};
use anyhow::anyhow;
use async_trait::async_trait;
use catalog_types::attribute::{AttributeType, CategoryAttribute};
use catalog_types::category::{FlatCategory, UpstreamTree};
use catalog_types::{CategoryId, Marketplace};
use itertools::Itertools;
use md5::{Digest, Md5};
use reqwest_middleware::ClientWithMiddleware;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::future::Future;
use time::OffsetDateTime;

pub const DEFAULT_BASE_URL: &str = "https://openapi-b-eu.temu.com";
const CATEGORIES_METHOD: &str = "bg.local.goods.cats.get";
const TEMPLATE_METHOD: &str = "bg.local.goods.template.query";

#[derive(Clone, Debug)]
pub struct Credentials {
    pub app_key: String,
    pub app_secret: String,
    pub access_token: String,
    pub base_url: String,
}

impl Credentials {
    pub fn from_env() -> Option<Self> {
        Some(Self {
            app_key: env_string("TEMU_APP_KEY")?,
            app_secret: env_string("TEMU_APP_SECRET")?,
            access_token: env_string("TEMU_ACCESS_TOKEN")?,
            base_url: env_string("TEMU_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_msg: Option<String>,
    pub result: Option<T>,
}

impl<T> Envelope<T> {
    pub fn into_result(self, method: &str) -> Result<T, UpstreamError> {
        if !self.success {
            return Err(UpstreamError::Other(anyhow!(
                "{method} failed with code {}: {}",
                self.error_code.unwrap_or_default(),
                self.error_msg.unwrap_or_default()
            )));
        }
        self.result
            .ok_or_else(|| UpstreamError::Decode(format!("{method} returned no result")))
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CategoriesResult {
    #[serde(default)]
    pub goods_cats_list: Vec<TemuCategory>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TemuCategory {
    pub cat_id: CategoryId,
    #[serde(default)]
    pub cat_name: String,
    #[serde(default)]
    pub parent_cat_id: Option<CategoryId>,
    #[serde(default)]
    pub leaf: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResult {
    #[serde(default)]
    pub goods_properties: Vec<TemuProperty>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TemuProperty {
    pub pid: CategoryId,
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub values: Vec<TemuPropertyValue>,
    #[serde(default)]
    pub choose_max_num: Option<u32>,
}

#[derive(Deserialize, Debug)]
pub struct TemuPropertyValue {
    pub value: String,
}

/// `requested_parent` fills in the parent when the listing omits it.
pub fn normalize_node(category: TemuCategory, requested_parent: &CategoryId) -> FlatCategory {
    FlatCategory {
        id: category.cat_id,
        name: category.cat_name,
        parent_id: Some(
            category
                .parent_cat_id
                .unwrap_or_else(|| requested_parent.clone()),
        )
        .filter(|id| !id.is_root_marker()),
    }
}

pub fn normalize_property(property: TemuProperty) -> CategoryAttribute {
    let allowed_values = property
        .values
        .into_iter()
        .map(|v| v.value.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>();
    CategoryAttribute {
        attribute_id: property.pid,
        name: property.name,
        mandatory: property.required,
        kind: if allowed_values.is_empty() {
            AttributeType::FreeText
        } else {
            AttributeType::Enum
        },
        allowed_values,
        multi_value: property.choose_max_num.is_some_and(|n| n > 1),
    }
}

/// Uppercase hex MD5 of `secret + key1 + value1 + ... + secret` over the
/// parameters sorted by key. String values are used verbatim, anything else
/// in its JSON form.
pub fn sign(params: &BTreeMap<String, Value>, secret: &str) -> String {
    let mut input = String::from(secret);
    for (key, value) in params {
        input.push_str(key);
        match value {
            Value::String(s) => input.push_str(s),
            other => input.push_str(&other.to_string()),
        }
    }
    input.push_str(secret);
    format!("{:X}", Md5::digest(input.as_bytes()))
}

/// Breadth-first walk from the root listing. `list` returns the children of
/// one parent. Categories listed more than once are kept once, and only
/// non-leaves are listed in turn.
pub async fn walk_categories<F, Fut>(mut list: F) -> Result<Vec<FlatCategory>, UpstreamError>
where
    F: FnMut(CategoryId) -> Fut,
    Fut: Future<Output = Result<Vec<TemuCategory>, UpstreamError>>,
{
    let mut categories = Vec::new();
    let mut queue = VecDeque::from([CategoryId::Numeric(0)]);
    let mut seen = HashSet::new();
    while let Some(parent) = queue.pop_front() {
        for category in list(parent.clone()).await? {
            if !seen.insert(category.cat_id.clone()) {
                continue;
            }
            if !category.leaf {
                queue.push_back(category.cat_id.clone());
            }
            categories.push(normalize_node(category, &parent));
        }
    }
    Ok(categories)
}

pub struct TemuAdapter {
    client: ClientWithMiddleware,
    credentials: Credentials,
}

impl TemuAdapter {
    pub fn new(client: ClientWithMiddleware, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
        }
    }

    fn signed_body(&self, method: &str, params: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
        let mut body = params;
        body.insert("type".to_string(), method.into());
        body.insert("app_key".to_string(), self.credentials.app_key.as_str().into());
        body.insert(
            "access_token".to_string(),
            self.credentials.access_token.as_str().into(),
        );
        body.insert("data_type".to_string(), "JSON".into());
        body.insert(
            "timestamp".to_string(),
            OffsetDateTime::now_utc().unix_timestamp().into(),
        );
        let signature = sign(&body, &self.credentials.app_secret);
        body.insert("sign".to_string(), signature.into());
        body
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: BTreeMap<String, Value>,
    ) -> Result<T, UpstreamError> {
        let url = format!(
            "{}/openapi/router",
            self.credentials.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(url)
            .json(&self.signed_body(method, params))
            .send()
            .await?;
        read_json::<Envelope<T>>(response).await?.into_result(method)
    }
}

#[async_trait]
impl MarketplaceAdapter for TemuAdapter {
    fn marketplace(&self) -> Marketplace {
        Marketplace::Temu
    }

    async fn fetch_tree(&self) -> Result<UpstreamTree, UpstreamError> {
        let categories = walk_categories(|parent| async move {
            let params = BTreeMap::from([("parentCatId".to_string(), serde_json::to_value(&parent)?)]);
            let result: CategoriesResult = self.call(CATEGORIES_METHOD, params).await?;
            Ok::<_, UpstreamError>(result.goods_cats_list)
        })
        .await?;
        log::debug!("temu: walked {} categories", categories.len());
        Ok(UpstreamTree::Flat(categories))
    }

    async fn fetch_attributes(
        &self,
        leaf_id: &CategoryId,
    ) -> Result<Vec<CategoryAttribute>, UpstreamError> {
        let params = BTreeMap::from([("catId".to_string(), serde_json::to_value(leaf_id)?)]);
        let result: TemplateResult = self.call(TEMPLATE_METHOD, params).await?;
        Ok(result
            .goods_properties
            .into_iter()
            .unique_by(|property| property.pid.clone())
            .map(normalize_property)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::decode_body;
    use catalog_types::category::CategoryTree;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn signs_sorted_parameters() {
        let params = BTreeMap::from([
            ("type".to_string(), json!("bg.local.goods.cats.get")),
            ("app_key".to_string(), json!("key")),
            ("access_token".to_string(), json!("tok")),
            ("data_type".to_string(), json!("JSON")),
            ("timestamp".to_string(), json!(1700000000)),
            ("parentCatId".to_string(), json!(0)),
        ]);
        assert_eq!(
            sign(&params, "testsecret"),
            "65ABC3C247C8794F2B25F96602D56277"
        );
    }

    #[test]
    fn rejects_failed_envelopes() {
        let failed: Envelope<CategoriesResult> = decode_body(
            r#"{"success": false, "errorCode": 4000004, "errorMsg": "access_token expired"}"#,
        )
        .unwrap();
        match failed.into_result(CATEGORIES_METHOD) {
            Err(UpstreamError::Other(err)) => assert!(err.to_string().contains("expired")),
            other => panic!("unexpected {other:?}"),
        }
        let empty: Envelope<CategoriesResult> = decode_body(r#"{"success": true}"#).unwrap();
        assert!(matches!(
            empty.into_result(CATEGORIES_METHOD),
            Err(UpstreamError::Decode(_))
        ));
    }

    #[test]
    fn normalizes_category_listing() {
        let envelope: Envelope<CategoriesResult> = decode_body(
            r#"{"success": true, "result": {"goodsCatsList": [
                {"catId": 24, "catName": "Home & Kitchen", "parentCatId": 0, "leaf": false},
                {"catId": 25, "catName": "Kitchen Storage", "leaf": true}
            ]}}"#,
        )
        .unwrap();
        let result = envelope.into_result(CATEGORIES_METHOD).unwrap();
        let flat = result
            .goods_cats_list
            .into_iter()
            .map(|c| normalize_node(c, &24.into()))
            .collect::<Vec<_>>();
        assert_eq!(flat[0].parent_id, None);
        assert_eq!(flat[1].parent_id, Some(24.into()));
    }

    fn category(id: u64, name: &str, parent: Option<u64>, leaf: bool) -> TemuCategory {
        TemuCategory {
            cat_id: id.into(),
            cat_name: name.to_string(),
            parent_cat_id: parent.map(CategoryId::from),
            leaf,
        }
    }

    #[tokio::test]
    async fn walks_listing_breadth_first() {
        let listings = HashMap::from([
            (0, vec![(24, "Home & Kitchen", Some(0), false), (30, "Toys", None, true)]),
            (
                24,
                vec![
                    (25, "Kitchen Storage", None, true),
                    (26, "Bedding", Some(24), false),
                    (26, "Bedding", Some(24), false),
                ],
            ),
            (26, vec![(27, "Pillowcases", None, true)]),
        ]);
        let mut requested = Vec::new();
        let flat = walk_categories(|parent| {
            requested.push(parent.to_string());
            let children = listings
                .get(&parent.to_string().parse::<u64>().unwrap())
                .into_iter()
                .flatten()
                .map(|&(id, name, parent, leaf)| category(id, name, parent, leaf))
                .collect::<Vec<_>>();
            async move { Ok::<_, UpstreamError>(children) }
        })
        .await
        .unwrap();

        assert_eq!(requested, ["0", "24", "26"]);
        let parents = flat
            .iter()
            .map(|c| (c.id.to_string(), c.parent_id.as_ref().map(ToString::to_string)))
            .collect::<Vec<_>>();
        assert_eq!(
            parents,
            [
                ("24".to_string(), None),
                ("30".to_string(), None),
                ("25".to_string(), Some("24".to_string())),
                ("26".to_string(), Some("24".to_string())),
                ("27".to_string(), Some("26".to_string())),
            ]
        );
        let tree = CategoryTree::build(UpstreamTree::Flat(flat), 1).unwrap();
        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.leaf_count(), 3);
    }

    #[tokio::test]
    async fn walk_stops_on_upstream_error() {
        let result = walk_categories(|parent| async move {
            match parent {
                CategoryId::Numeric(0) => Ok(vec![category(24, "Home & Kitchen", None, false)]),
                _ => Err(UpstreamError::Decode("truncated listing".to_string())),
            }
        })
        .await;
        assert!(matches!(result, Err(UpstreamError::Decode(_))));
    }

    #[test]
    fn normalizes_properties() {
        let result: TemplateResult = decode_body(
            r#"{"goodsProperties": [
                {"pid": 13, "name": "Color", "required": true, "chooseMaxNum": 1,
                 "values": [{"vid": 1, "value": "Black"}, {"vid": 2, "value": "White"}]},
                {"pid": 13, "name": "Color", "required": true, "values": []},
                {"pid": 1001, "name": "Material", "chooseMaxNum": 3, "values": []}
            ]}"#,
        )
        .unwrap();
        let attributes = result
            .goods_properties
            .into_iter()
            .unique_by(|p| p.pid.clone())
            .map(normalize_property)
            .collect::<Vec<_>>();
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[0].kind, AttributeType::Enum);
        assert!(attributes[0].mandatory);
        assert!(!attributes[0].multi_value);
        assert_eq!(attributes[1].kind, AttributeType::FreeText);
        assert!(attributes[1].multi_value);
    }
}
