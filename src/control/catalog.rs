use super::{CatalogServices, Response};
use crate::catalog::service::{
    GetAttributes, GetStatus, GetTree, MatchCategory, Prefetch, PrefetchAttributes, Search,
};
use crate::matcher::DEFAULT_TOP_N;
use crate::search::DEFAULT_SEARCH_LIMIT;
use actix_web::{
    get, post,
    web::{Data, Json, Path, Query},
    HttpResponse,
};
use catalog_types::category::CategoryNode;
use catalog_types::CategoryId;
use serde::{Deserialize, Serialize};

/// Search hit without its subtree.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary<'a> {
    pub id: &'a CategoryId,
    pub name: &'a str,
    pub parent_id: Option<&'a CategoryId>,
    pub is_leaf: bool,
    pub path: &'a [String],
    pub display_path: String,
}

impl<'a> From<&'a CategoryNode> for CategorySummary<'a> {
    fn from(node: &'a CategoryNode) -> Self {
        Self {
            id: &node.id,
            name: &node.name,
            parent_id: node.parent_id.as_ref(),
            is_leaf: node.is_leaf,
            path: &node.path,
            display_path: node.display_path(),
        }
    }
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

#[get("/api/marketplaces/{marketplace}/categories")]
pub async fn categories(services: Data<CatalogServices>, marketplace: Path<String>) -> Response {
    let tree = services.get(&marketplace)?.send(GetTree).await??;
    Ok(HttpResponse::Ok().json(tree.roots()))
}

#[get("/api/marketplaces/{marketplace}/categories/search")]
pub async fn search(
    services: Data<CatalogServices>,
    marketplace: Path<String>,
    query: Query<SearchQuery>,
) -> Response {
    let SearchQuery { q, limit } = query.into_inner();
    let found = services
        .get(&marketplace)?
        .send(Search { query: q, limit })
        .await??;
    let found = found
        .iter()
        .map(|node| CategorySummary::from(node.as_ref()))
        .collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(found))
}

#[post("/api/marketplaces/{marketplace}/categories/prefetch")]
pub async fn prefetch(services: Data<CatalogServices>, marketplace: Path<String>) -> Response {
    let report = services.get(&marketplace)?.send(Prefetch).await??;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "count": report.count,
        "durationMs": report.duration.as_millis() as u64,
    })))
}

#[post("/api/marketplaces/{marketplace}/categories/match")]
pub async fn match_category(
    services: Data<CatalogServices>,
    marketplace: Path<String>,
    request: Json<MatchRequest>,
) -> Response {
    let MatchRequest {
        title,
        description,
        top_n,
    } = request.into_inner();
    let results = services
        .get(&marketplace)?
        .send(MatchCategory {
            title,
            description: description.unwrap_or_default(),
            top_n,
        })
        .await??;
    Ok(HttpResponse::Ok().json(results.as_slice()))
}

#[get("/api/marketplaces/{marketplace}/categories/{id}/attributes")]
pub async fn attributes(services: Data<CatalogServices>, path: Path<(String, String)>) -> Response {
    let (marketplace, id) = path.into_inner();
    let fetched = services
        .get(&marketplace)?
        .send(GetAttributes(CategoryId::from(id)))
        .await??;
    Ok(HttpResponse::Ok().json(fetched.as_slice()))
}

#[post("/api/marketplaces/{marketplace}/categories/{id}/attributes/prefetch")]
pub async fn prefetch_attributes(
    services: Data<CatalogServices>,
    path: Path<(String, String)>,
) -> Response {
    let (marketplace, id) = path.into_inner();
    let fetched = services
        .get(&marketplace)?
        .send(PrefetchAttributes(CategoryId::from(id)))
        .await??;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "count": fetched.len() })))
}

#[get("/api/marketplaces/{marketplace}/status")]
pub async fn status(services: Data<CatalogServices>, marketplace: Path<String>) -> Response {
    let report = services.get(&marketplace)?.send(GetStatus).await?;
    Ok(HttpResponse::Ok().json(report))
}
