use crate::cache::{MatchCacheStats, MatchKey, MatchResultCache, MATCH_CACHE_SWEEP_THRESHOLD};
use crate::config::CatalogConfig;
use crate::matcher::CategoryMatcher;
use crate::search::CategorySearchIndex;
use crate::store::{CategoryTreeStore, StoreStatus};
use crate::text::normalize;
use crate::upstream::MarketplaceAdapter;
use catalog_types::attribute::CategoryAttribute;
use catalog_types::category::{CategoryNode, CategoryTree};
use catalog_types::matching::MatchResult;
use catalog_types::{CatalogError, CategoryId, Marketplace};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

pub mod service;

#[derive(Clone, Debug)]
pub struct PrefetchReport {
    pub count: usize,
    pub duration: Duration,
    pub tree: Arc<CategoryTree>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStatus {
    pub marketplace: Marketplace,
    #[serde(flatten)]
    pub store: StoreStatus,
    pub match_cache: MatchCacheStats,
}

/// Category engine of one marketplace: cached tree, search and product
/// matching.
pub struct CategoryCatalog {
    config: CatalogConfig,
    store: CategoryTreeStore,
    search: CategorySearchIndex,
    matcher: RwLock<Option<Arc<CategoryMatcher>>>,
    match_cache: Mutex<MatchResultCache>,
}

impl CategoryCatalog {
    pub fn new(config: CatalogConfig, adapter: Arc<dyn MarketplaceAdapter>) -> Self {
        let store = CategoryTreeStore::new(adapter, config.tree_ttl, config.attribute_ttl());
        let match_cache = MatchResultCache::new(config.match_cache_ttl, MATCH_CACHE_SWEEP_THRESHOLD);
        Self {
            config,
            store,
            search: CategorySearchIndex::new(),
            matcher: RwLock::new(None),
            match_cache: Mutex::new(match_cache),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn marketplace(&self) -> Marketplace {
        self.config.marketplace
    }

    pub async fn cached_category_tree(&self) -> Result<Arc<CategoryTree>, CatalogError> {
        self.store.tree().await
    }

    pub async fn search_categories(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Arc<CategoryNode>>, CatalogError> {
        let tree = self.store.tree().await?;
        Ok(self.search.search(&tree, query, limit))
    }

    pub async fn prefetch_categories(&self) -> Result<PrefetchReport, CatalogError> {
        let started = Instant::now();
        let tree = self.store.prefetch().await?;
        Ok(PrefetchReport {
            count: tree.node_count(),
            duration: started.elapsed(),
            tree,
        })
    }

    pub async fn attributes(
        &self,
        leaf_id: &CategoryId,
    ) -> Result<Arc<Vec<CategoryAttribute>>, CatalogError> {
        self.store.attributes(leaf_id).await
    }

    pub async fn prefetch_attributes(
        &self,
        leaf_id: &CategoryId,
    ) -> Result<Arc<Vec<CategoryAttribute>>, CatalogError> {
        self.store.prefetch_attributes(leaf_id).await
    }

    /// Best leaf categories for a product, memoized for a short while.
    pub async fn match_category(
        &self,
        title: &str,
        description: &str,
        top_n: usize,
    ) -> Result<Arc<Vec<MatchResult>>, CatalogError> {
        if normalize(title).is_empty() {
            return Err(CatalogError::EmptyTitle);
        }
        let key = MatchKey::new(title, description, top_n);
        if let Some(results) = self.match_cache().get(&key, Instant::now()) {
            return Ok(results);
        }
        let tree = self.store.tree().await?;
        let results = Arc::new(self.matcher_for(&tree).rank(title, description, top_n)?);
        self.match_cache().put(key, results.clone(), Instant::now());
        Ok(results)
    }

    pub async fn status(&self) -> CatalogStatus {
        let store = self.store.status().await;
        CatalogStatus {
            marketplace: self.marketplace(),
            store,
            match_cache: self.match_cache().stats(),
        }
    }

    fn matcher_for(&self, tree: &CategoryTree) -> Arc<CategoryMatcher> {
        if let Some(matcher) = self
            .matcher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|matcher| matcher.version() == tree.version())
        {
            return matcher.clone();
        }
        let matcher = Arc::new(CategoryMatcher::new(tree));
        log::debug!(
            "{}: matcher prepared for tree v{}",
            self.marketplace(),
            tree.version()
        );
        *self.matcher.write().unwrap_or_else(PoisonError::into_inner) = Some(matcher.clone());
        matcher
    }

    fn match_cache(&self) -> MutexGuard<'_, MatchResultCache> {
        self.match_cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAdapter;
    use std::sync::atomic::Ordering;

    const HOUR: Duration = Duration::from_secs(60 * 60);

    fn catalog(adapter: &Arc<MockAdapter>) -> CategoryCatalog {
        CategoryCatalog::new(CatalogConfig::new(Marketplace::Trendyol), adapter.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn serves_equivalent_titles_from_cache() {
        let adapter = Arc::new(MockAdapter::default());
        let catalog = catalog(&adapter);
        let first = catalog.match_category("  Test  ", "desc", 5).await.unwrap();
        let second = catalog.match_category("test", "desc", 5).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let stats = catalog.status().await.match_cache;
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn recomputes_after_match_ttl() {
        let adapter = Arc::new(MockAdapter::default());
        let catalog = catalog(&adapter);
        let first = catalog
            .match_category("Siyah Deri Telefon Kılıfı", "", 5)
            .await
            .unwrap();
        assert_eq!(first[0].category_id, 5.into());

        tokio::time::advance(Duration::from_secs(31 * 60)).await;
        let second = catalog
            .match_category("Siyah Deri Telefon Kılıfı", "", 5)
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);
        let stats = catalog.status().await.match_cache;
        assert_eq!((stats.hits, stats.misses), (0, 2));
        assert_eq!(adapter.tree_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refetches_tree_after_twelve_hours() {
        let adapter = Arc::new(MockAdapter::default());
        let catalog = catalog(&adapter);
        let first = catalog.cached_category_tree().await.unwrap();
        tokio::time::advance(11 * HOUR).await;
        catalog.cached_category_tree().await.unwrap();
        assert_eq!(adapter.tree_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(HOUR + Duration::from_secs(1)).await;
        let second = catalog.cached_category_tree().await.unwrap();
        assert_eq!(adapter.tree_calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.version(), first.version() + 1);

        // The matcher follows the new snapshot.
        catalog.match_category("kılıf", "", 5).await.unwrap();
        assert_eq!(catalog.matcher_for(&second).version(), second.version());
    }

    #[tokio::test(start_paused = true)]
    async fn prefetch_reports_node_count() {
        let adapter = Arc::new(MockAdapter::default());
        let catalog = catalog(&adapter);
        let report = catalog.prefetch_categories().await.unwrap();
        assert_eq!(report.count, 13);
        assert_eq!(report.tree.version(), 1);
        let found = catalog.search_categories("kılıf", 30).await.unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(adapter.tree_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_title_skips_upstream() {
        let adapter = Arc::new(MockAdapter::default());
        let catalog = catalog(&adapter);
        assert_eq!(
            catalog.match_category(" \t ", "kılıf", 5).await,
            Err(CatalogError::EmptyTitle)
        );
        assert_eq!(adapter.tree_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn propagates_unavailable_upstream() {
        let adapter = Arc::new(MockAdapter::default());
        adapter.fail(true);
        let catalog = catalog(&adapter);
        assert!(matches!(
            catalog.match_category("kılıf", "", 5).await,
            Err(CatalogError::UpstreamUnavailable(_))
        ));
        assert!(matches!(
            catalog.search_categories("kılıf", 30).await,
            Err(CatalogError::UpstreamUnavailable(_))
        ));
        let status = catalog.status().await;
        assert!(!status.store.is_valid);
        assert_eq!(status.match_cache.entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn serializes_status() {
        let adapter = Arc::new(MockAdapter::default());
        let catalog = catalog(&adapter);
        catalog.attributes(&5.into()).await.unwrap();
        let json = serde_json::to_value(catalog.status().await).unwrap();
        assert_eq!(json["marketplace"], "trendyol");
        assert_eq!(json["isValid"], true);
        assert_eq!(json["nodeCount"], 13);
        assert_eq!(json["attributeEntries"], 1);
        assert_eq!(json["matchCache"]["hits"], 0);
        assert!(json["lastFetchedAt"].is_string());
    }
}
