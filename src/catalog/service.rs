use super::{CatalogStatus, CategoryCatalog, PrefetchReport};
use actix::prelude::*;
use catalog_types::attribute::CategoryAttribute;
use catalog_types::category::{CategoryNode, CategoryTree};
use catalog_types::matching::MatchResult;
use catalog_types::{CatalogError, CategoryId};
use std::sync::Arc;

pub struct CatalogService {
    catalog: Arc<CategoryCatalog>,
}

impl CatalogService {
    pub fn new(catalog: Arc<CategoryCatalog>) -> Self {
        Self { catalog }
    }
}

impl Actor for CatalogService {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Context<Self>) {
        if !self.catalog.config().warm_on_start {
            return;
        }
        let catalog = self.catalog.clone();
        actix::spawn(async move {
            let marketplace = catalog.marketplace();
            match catalog.prefetch_categories().await {
                Ok(report) => log::info!(
                    "{marketplace}: warmed category cache with {} nodes in {:?}",
                    report.count,
                    report.duration
                ),
                Err(err) => log::error!("{marketplace}: unable to warm category cache: {err}"),
            }
        });
    }
}

#[derive(Message)]
#[rtype(result = "Result<Arc<CategoryTree>, CatalogError>")]
pub struct GetTree;

#[derive(Message)]
#[rtype(result = "Result<Vec<Arc<CategoryNode>>, CatalogError>")]
pub struct Search {
    pub query: String,
    pub limit: usize,
}

#[derive(Message)]
#[rtype(result = "Result<PrefetchReport, CatalogError>")]
pub struct Prefetch;

#[derive(Message)]
#[rtype(result = "Result<Arc<Vec<CategoryAttribute>>, CatalogError>")]
pub struct GetAttributes(pub CategoryId);

#[derive(Message)]
#[rtype(result = "Result<Arc<Vec<CategoryAttribute>>, CatalogError>")]
pub struct PrefetchAttributes(pub CategoryId);

#[derive(Message)]
#[rtype(result = "Result<Arc<Vec<MatchResult>>, CatalogError>")]
pub struct MatchCategory {
    pub title: String,
    pub description: String,
    pub top_n: usize,
}

#[derive(Message)]
#[rtype(result = "CatalogStatus")]
pub struct GetStatus;

impl Handler<GetTree> for CatalogService {
    type Result = ResponseActFuture<Self, Result<Arc<CategoryTree>, CatalogError>>;

    fn handle(&mut self, _: GetTree, _: &mut Self::Context) -> Self::Result {
        let catalog = self.catalog.clone();
        Box::pin(async move { catalog.cached_category_tree().await }.into_actor(self))
    }
}

impl Handler<Search> for CatalogService {
    type Result = ResponseActFuture<Self, Result<Vec<Arc<CategoryNode>>, CatalogError>>;

    fn handle(&mut self, Search { query, limit }: Search, _: &mut Self::Context) -> Self::Result {
        let catalog = self.catalog.clone();
        Box::pin(async move { catalog.search_categories(&query, limit).await }.into_actor(self))
    }
}

impl Handler<Prefetch> for CatalogService {
    type Result = ResponseActFuture<Self, Result<PrefetchReport, CatalogError>>;

    fn handle(&mut self, _: Prefetch, _: &mut Self::Context) -> Self::Result {
        let catalog = self.catalog.clone();
        Box::pin(
            async move {
                let report = catalog.prefetch_categories().await?;
                log::info!(
                    "{}: prefetched {} categories in {:?}",
                    catalog.marketplace(),
                    report.count,
                    report.duration
                );
                Ok(report)
            }
            .into_actor(self),
        )
    }
}

impl Handler<GetAttributes> for CatalogService {
    type Result = ResponseActFuture<Self, Result<Arc<Vec<CategoryAttribute>>, CatalogError>>;

    fn handle(&mut self, GetAttributes(id): GetAttributes, _: &mut Self::Context) -> Self::Result {
        let catalog = self.catalog.clone();
        Box::pin(async move { catalog.attributes(&id).await }.into_actor(self))
    }
}

impl Handler<PrefetchAttributes> for CatalogService {
    type Result = ResponseActFuture<Self, Result<Arc<Vec<CategoryAttribute>>, CatalogError>>;

    fn handle(
        &mut self,
        PrefetchAttributes(id): PrefetchAttributes,
        _: &mut Self::Context,
    ) -> Self::Result {
        let catalog = self.catalog.clone();
        Box::pin(async move { catalog.prefetch_attributes(&id).await }.into_actor(self))
    }
}

impl Handler<MatchCategory> for CatalogService {
    type Result = ResponseActFuture<Self, Result<Arc<Vec<MatchResult>>, CatalogError>>;

    fn handle(&mut self, msg: MatchCategory, _: &mut Self::Context) -> Self::Result {
        let catalog = self.catalog.clone();
        Box::pin(
            async move {
                catalog
                    .match_category(&msg.title, &msg.description, msg.top_n)
                    .await
            }
            .into_actor(self),
        )
    }
}

impl Handler<GetStatus> for CatalogService {
    type Result = ResponseActFuture<Self, CatalogStatus>;

    fn handle(&mut self, _: GetStatus, _: &mut Self::Context) -> Self::Result {
        let catalog = self.catalog.clone();
        Box::pin(async move { catalog.status().await }.into_actor(self))
    }
}
