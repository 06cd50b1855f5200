use crate::cache::CacheEntry;
use crate::flight::Flight;
use crate::upstream::MarketplaceAdapter;
use catalog_types::attribute::CategoryAttribute;
use catalog_types::category::CategoryTree;
use catalog_types::{CatalogError, CategoryId, Marketplace};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tokio::time::Instant;

pub const DEFAULT_TREE_TTL: Duration = Duration::from_secs(12 * 60 * 60);

type Attributes = Arc<Vec<CategoryAttribute>>;

struct State {
    adapter: Arc<dyn MarketplaceAdapter>,
    tree_ttl: Duration,
    attribute_ttl: Duration,
    snapshot: RwLock<Option<CacheEntry<Arc<CategoryTree>>>>,
    attributes: RwLock<HashMap<CategoryId, CacheEntry<Attributes>>>,
    versions: AtomicU64,
}

impl State {
    /// Unless `force` is set, a snapshot swapped in by a refresh that
    /// finished after the caller's own expiry check is returned as is.
    async fn fetch_tree(self: Arc<Self>, force: bool) -> Result<Arc<CategoryTree>, CatalogError> {
        if !force {
            if let Some(entry) = self.snapshot.read().await.as_ref() {
                if entry.is_valid(Instant::now()) {
                    return Ok(entry.value().clone());
                }
            }
        }
        let marketplace = self.adapter.marketplace();
        let started = Instant::now();
        log::info!("{marketplace}: fetching category tree");
        let upstream = self
            .adapter
            .fetch_tree()
            .await
            .map_err(|err| err.into_catalog(&format!("{marketplace} category tree")))?;
        let version = self.versions.fetch_add(1, Ordering::SeqCst) + 1;
        let tree = Arc::new(CategoryTree::build(upstream, version)?);
        *self.snapshot.write().await =
            Some(CacheEntry::new(tree.clone(), Instant::now(), self.tree_ttl));
        log::info!(
            "{marketplace}: category tree v{version} with {} nodes ({} leaves) fetched in {:?}",
            tree.node_count(),
            tree.leaf_count(),
            started.elapsed()
        );
        Ok(tree)
    }

    async fn fetch_attributes(
        self: Arc<Self>,
        leaf_id: CategoryId,
        force: bool,
    ) -> Result<Attributes, CatalogError> {
        if !force {
            if let Some(entry) = self.attributes.read().await.get(&leaf_id) {
                if entry.is_valid(Instant::now()) {
                    return Ok(entry.value().clone());
                }
            }
        }
        let marketplace = self.adapter.marketplace();
        let attributes = self
            .adapter
            .fetch_attributes(&leaf_id)
            .await
            .map(Arc::new)
            .map_err(|err| err.into_catalog(&format!("{marketplace} attributes of {leaf_id}")))?;
        log::debug!(
            "{marketplace}: fetched {} attributes of category {leaf_id}",
            attributes.len()
        );
        self.attributes.write().await.insert(
            leaf_id,
            CacheEntry::new(attributes.clone(), Instant::now(), self.attribute_ttl),
        );
        Ok(attributes)
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatus {
    pub is_valid: bool,
    pub node_count: usize,
    pub leaf_count: usize,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_fetched_at: Option<OffsetDateTime>,
    pub version: Option<u64>,
    pub attribute_entries: usize,
}

/// In-memory category tree of one marketplace with a per-leaf attribute
/// cache. Expired data is refreshed on demand and served stale when the
/// refresh fails.
pub struct CategoryTreeStore {
    state: Arc<State>,
    tree_flight: Arc<Flight<(), Arc<CategoryTree>>>,
    attribute_flight: Arc<Flight<CategoryId, Attributes>>,
}

impl CategoryTreeStore {
    pub fn new(
        adapter: Arc<dyn MarketplaceAdapter>,
        tree_ttl: Duration,
        attribute_ttl: Duration,
    ) -> Self {
        Self {
            state: Arc::new(State {
                adapter,
                tree_ttl,
                attribute_ttl,
                snapshot: RwLock::new(None),
                attributes: RwLock::new(HashMap::new()),
                versions: AtomicU64::new(0),
            }),
            tree_flight: Arc::new(Flight::new()),
            attribute_flight: Arc::new(Flight::new()),
        }
    }

    pub fn marketplace(&self) -> Marketplace {
        self.state.adapter.marketplace()
    }

    pub async fn tree(&self) -> Result<Arc<CategoryTree>, CatalogError> {
        if let Some(entry) = self.state.snapshot.read().await.as_ref() {
            if entry.is_valid(Instant::now()) {
                return Ok(entry.value().clone());
            }
        }
        match self.refresh(false).await {
            Ok(tree) => Ok(tree),
            Err(err) => match self.snapshot().await {
                Some(stale) => {
                    log::warn!(
                        "{}: serving stale category tree v{} due to error: {err}",
                        self.marketplace(),
                        stale.version()
                    );
                    Ok(stale)
                }
                None => Err(err),
            },
        }
    }

    /// Refreshes unconditionally, joining a refresh that is already running.
    pub async fn prefetch(&self) -> Result<Arc<CategoryTree>, CatalogError> {
        self.refresh(true).await
    }

    pub async fn is_valid(&self) -> bool {
        self.state
            .snapshot
            .read()
            .await
            .as_ref()
            .is_some_and(|entry| entry.is_valid(Instant::now()))
    }

    /// Current snapshot, expired or not. Never fetches.
    pub async fn snapshot(&self) -> Option<Arc<CategoryTree>> {
        self.state
            .snapshot
            .read()
            .await
            .as_ref()
            .map(|entry| entry.value().clone())
    }

    pub async fn attributes(&self, leaf_id: &CategoryId) -> Result<Attributes, CatalogError> {
        self.ensure_leaf(leaf_id).await?;
        if let Some(entry) = self.state.attributes.read().await.get(leaf_id) {
            if entry.is_valid(Instant::now()) {
                return Ok(entry.value().clone());
            }
        }
        match self.refresh_attributes(leaf_id, false).await {
            Ok(attributes) => Ok(attributes),
            Err(err) => {
                let stale = self
                    .state
                    .attributes
                    .read()
                    .await
                    .get(leaf_id)
                    .map(|entry| entry.value().clone());
                match stale {
                    Some(stale) => {
                        log::warn!(
                            "{}: serving stale attributes of category {leaf_id} due to error: {err}",
                            self.marketplace()
                        );
                        Ok(stale)
                    }
                    None => Err(err),
                }
            }
        }
    }

    pub async fn prefetch_attributes(&self, leaf_id: &CategoryId) -> Result<Attributes, CatalogError> {
        self.ensure_leaf(leaf_id).await?;
        self.refresh_attributes(leaf_id, true).await
    }

    pub async fn status(&self) -> StoreStatus {
        let now = Instant::now();
        let attribute_entries = self.state.attributes.read().await.len();
        match self.state.snapshot.read().await.as_ref() {
            Some(entry) => {
                let tree = entry.value();
                StoreStatus {
                    is_valid: entry.is_valid(now),
                    node_count: tree.node_count(),
                    leaf_count: tree.leaf_count(),
                    last_fetched_at: Some(tree.fetched_at()),
                    version: Some(tree.version()),
                    attribute_entries,
                }
            }
            None => StoreStatus {
                is_valid: false,
                node_count: 0,
                leaf_count: 0,
                last_fetched_at: None,
                version: None,
                attribute_entries,
            },
        }
    }

    async fn ensure_leaf(&self, leaf_id: &CategoryId) -> Result<(), CatalogError> {
        let tree = self.tree().await?;
        if tree.is_leaf(leaf_id) {
            Ok(())
        } else {
            Err(CatalogError::InvalidLeaf(leaf_id.clone()))
        }
    }

    async fn refresh(&self, force: bool) -> Result<Arc<CategoryTree>, CatalogError> {
        let state = self.state.clone();
        self.tree_flight
            .run((), move || state.fetch_tree(force))
            .await
    }

    async fn refresh_attributes(
        &self,
        leaf_id: &CategoryId,
        force: bool,
    ) -> Result<Attributes, CatalogError> {
        let state = self.state.clone();
        let id = leaf_id.clone();
        self.attribute_flight
            .run(leaf_id.clone(), move || state.fetch_attributes(id, force))
            .await
    }
}
