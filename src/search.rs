use crate::text::normalize;
use catalog_types::category::{CategoryNode, CategoryTree};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

pub const DEFAULT_SEARCH_LIMIT: usize = 30;

struct IndexedNode {
    node: Arc<CategoryNode>,
    name: String,
    path: Vec<String>,
}

struct Index {
    version: u64,
    nodes: Vec<IndexedNode>,
}

impl Index {
    fn build(tree: &CategoryTree) -> Self {
        let nodes = tree
            .walk()
            .map(|node| IndexedNode {
                node: node.clone(),
                name: normalize(&node.name),
                path: node.path.iter().map(|segment| normalize(segment)).collect(),
            })
            .collect();
        Self {
            version: tree.version(),
            nodes,
        }
    }
}

/// Flat, pre-normalized view of a snapshot for substring search. Rebuilt on
/// the first query after the snapshot version changes.
#[derive(Default)]
pub struct CategorySearchIndex {
    index: RwLock<Option<Arc<Index>>>,
    builds: AtomicUsize,
}

impl CategorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact name matches first, then name prefixes, then substrings of the
    /// name or any path segment. Pre-order within each tier.
    pub fn search(&self, tree: &CategoryTree, query: &str, limit: usize) -> Vec<Arc<CategoryNode>> {
        let query = normalize(query);
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }
        let index = self.index_for(tree);
        let mut exact = Vec::new();
        let mut prefix = Vec::new();
        let mut substring = Vec::new();
        for entry in &index.nodes {
            if entry.name == query {
                exact.push(entry);
            } else if entry.name.starts_with(&query) {
                prefix.push(entry);
            } else if entry.name.contains(&query)
                || entry.path.iter().any(|segment| segment.contains(&query))
            {
                substring.push(entry);
            }
        }
        exact
            .into_iter()
            .chain(prefix)
            .chain(substring)
            .take(limit)
            .map(|entry| entry.node.clone())
            .collect()
    }

    /// How many times the index has been (re)built.
    #[cfg(test)]
    pub(crate) fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    fn index_for(&self, tree: &CategoryTree) -> Arc<Index> {
        if let Some(index) = self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|index| index.version == tree.version())
        {
            return index.clone();
        }
        let mut slot = self.index.write().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(index) if index.version == tree.version() => index.clone(),
            _ => {
                let index = Arc::new(Index::build(tree));
                self.builds.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "Search index rebuilt for tree v{} ({} nodes)",
                    index.version,
                    index.nodes.len()
                );
                *slot = Some(index.clone());
                index
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_tree;

    fn ids(nodes: &[Arc<CategoryNode>]) -> Vec<String> {
        nodes.iter().map(|n| n.id.to_string()).collect()
    }

    #[test]
    fn ranks_exact_then_prefix_then_substring() {
        let tree = sample_tree(1);
        let index = CategorySearchIndex::new();
        let found = index.search(&tree, "kılıf", DEFAULT_SEARCH_LIMIT);
        assert_eq!(ids(&found), ["5", "15", "14"]);
        assert!(found.len() <= DEFAULT_SEARCH_LIMIT);
    }

    #[test]
    fn matches_path_segments() {
        let tree = sample_tree(1);
        let index = CategorySearchIndex::new();
        let found = index.search(&tree, "aksesuar", DEFAULT_SEARCH_LIMIT);
        assert_eq!(ids(&found), ["4", "5", "6", "7"]);
        let found = index.search(&tree, "tekstil", DEFAULT_SEARCH_LIMIT);
        assert_eq!(ids(&found), ["13", "14", "15"]);
    }

    #[test]
    fn folds_diacritics_and_case() {
        let tree = sample_tree(1);
        let index = CategorySearchIndex::new();
        let expected = ids(&index.search(&tree, "kılıf", DEFAULT_SEARCH_LIMIT));
        for query in ["KILIF", "kilif", "  Kılıf  ", "KİLİF"] {
            assert_eq!(ids(&index.search(&tree, query, DEFAULT_SEARCH_LIMIT)), expected);
        }
        assert_eq!(ids(&index.search(&tree, "şarj", 5)), ["6"]);
        assert_eq!(ids(&index.search(&tree, "sarj", 5)), ["6"]);
    }

    #[test]
    fn honours_limit_and_empty_query() {
        let tree = sample_tree(1);
        let index = CategorySearchIndex::new();
        assert_eq!(ids(&index.search(&tree, "kılıf", 2)), ["5", "15"]);
        assert!(index.search(&tree, "kılıf", 0).is_empty());
        assert!(index.search(&tree, "   ", 30).is_empty());
        assert!(index.search(&tree, "buzdolabı", 30).is_empty());
    }

    #[test]
    fn rebuilds_only_when_version_changes() {
        let index = CategorySearchIndex::new();
        let first = sample_tree(1);
        index.search(&first, "kılıf", 30);
        index.search(&first, "telefon", 30);
        assert_eq!(index.builds(), 1);
        let second = sample_tree(2);
        index.search(&second, "kılıf", 30);
        assert_eq!(index.builds(), 2);
    }
}
