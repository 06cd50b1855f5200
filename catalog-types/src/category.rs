use crate::{CatalogError, CategoryId};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;

pub const PATH_SEPARATOR: &str = " > ";

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
    pub id: CategoryId,
    pub name: String,
    pub parent_id: Option<CategoryId>,
    pub children: Vec<Arc<CategoryNode>>,
    pub is_leaf: bool,
    /// Names from the root down to this node, inclusive.
    pub path: Vec<String>,
}

impl CategoryNode {
    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn display_path(&self) -> String {
        self.path.join(PATH_SEPARATOR)
    }

    pub fn ancestors(&self) -> &[String] {
        &self.path[..self.depth()]
    }
}

/// Category as served by APIs that nest children inside their parent.
#[derive(Clone, Debug)]
pub struct NestedCategory {
    pub id: CategoryId,
    pub name: String,
    pub children: Vec<NestedCategory>,
}

/// Category as served by APIs that return one flat list with parent links.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlatCategory {
    pub id: CategoryId,
    pub name: String,
    pub parent_id: Option<CategoryId>,
}

#[derive(Clone, Debug)]
pub enum UpstreamTree {
    Nested(Vec<NestedCategory>),
    Flat(Vec<FlatCategory>),
}

impl UpstreamTree {
    /// Pre-order flattening; keeps the upstream sibling order.
    pub fn into_flat(self) -> Vec<FlatCategory> {
        match self {
            Self::Flat(categories) => categories,
            Self::Nested(roots) => {
                let mut flat = Vec::new();
                let mut stack: Vec<(Option<CategoryId>, NestedCategory)> =
                    roots.into_iter().rev().map(|c| (None, c)).collect();
                while let Some((parent_id, category)) = stack.pop() {
                    let NestedCategory { id, name, children } = category;
                    stack.extend(children.into_iter().rev().map(|c| (Some(id.clone()), c)));
                    flat.push(FlatCategory {
                        id,
                        name,
                        parent_id,
                    });
                }
                flat
            }
        }
    }
}

/// Validated, immutable snapshot of one marketplace's category tree.
#[derive(Debug)]
pub struct CategoryTree {
    roots: Vec<Arc<CategoryNode>>,
    by_id: HashMap<CategoryId, Arc<CategoryNode>>,
    leaf_count: usize,
    version: u64,
    fetched_at: OffsetDateTime,
}

impl CategoryTree {
    pub fn build(upstream: UpstreamTree, version: u64) -> Result<Self, CatalogError> {
        let flat = upstream.into_flat();
        if flat.is_empty() {
            return Err(CatalogError::MalformedUpstreamData(
                "upstream returned no categories".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(flat.len());
        for (i, category) in flat.iter().enumerate() {
            if category.id.is_blank() {
                return Err(CatalogError::MalformedUpstreamData(format!(
                    "category #{i} has no id"
                )));
            }
            if category.name.trim().is_empty() {
                return Err(CatalogError::MalformedUpstreamData(format!(
                    "category {} has no name",
                    category.id
                )));
            }
            if index.insert(&category.id, i).is_some() {
                return Err(CatalogError::MalformedUpstreamData(format!(
                    "duplicate category id {}",
                    category.id
                )));
            }
        }

        let mut roots = Vec::new();
        let mut children: HashMap<&CategoryId, Vec<usize>> = HashMap::new();
        for (i, category) in flat.iter().enumerate() {
            match &category.parent_id {
                None => roots.push(i),
                Some(parent_id) => {
                    if !index.contains_key(parent_id) {
                        return Err(CatalogError::MalformedUpstreamData(format!(
                            "category {} references missing parent {parent_id}",
                            category.id
                        )));
                    }
                    children.entry(parent_id).or_default().push(i);
                }
            }
        }

        let mut assembler = Assembler {
            flat: &flat,
            children: &children,
            by_id: HashMap::with_capacity(flat.len()),
            leaf_count: 0,
        };
        let roots = roots
            .into_iter()
            .map(|i| assembler.assemble(i, &[]))
            .collect::<Vec<_>>();

        if assembler.by_id.len() != flat.len() {
            let unreachable = flat
                .iter()
                .find(|c| !assembler.by_id.contains_key(&c.id))
                .map(|c| c.id.to_string())
                .unwrap_or_default();
            return Err(CatalogError::MalformedUpstreamData(format!(
                "category {unreachable} is not reachable from any root (parent cycle)"
            )));
        }

        let Assembler {
            by_id, leaf_count, ..
        } = assembler;
        log::debug!(
            "Built category tree v{version}: {} nodes, {leaf_count} leaves",
            by_id.len()
        );
        Ok(Self {
            roots,
            by_id,
            leaf_count,
            version,
            fetched_at: OffsetDateTime::now_utc(),
        })
    }

    pub fn roots(&self) -> &[Arc<CategoryNode>] {
        &self.roots
    }

    pub fn get(&self, id: &CategoryId) -> Option<&Arc<CategoryNode>> {
        self.by_id.get(id)
    }

    pub fn is_leaf(&self, id: &CategoryId) -> bool {
        self.by_id.get(id).is_some_and(|n| n.is_leaf)
    }

    pub fn node_count(&self) -> usize {
        self.by_id.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn fetched_at(&self) -> OffsetDateTime {
        self.fetched_at
    }

    /// Pre-order traversal, siblings in upstream order.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![self.roots.iter()],
        }
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Arc<CategoryNode>> {
        self.walk().filter(|n| n.is_leaf)
    }
}

struct Assembler<'a> {
    flat: &'a [FlatCategory],
    children: &'a HashMap<&'a CategoryId, Vec<usize>>,
    by_id: HashMap<CategoryId, Arc<CategoryNode>>,
    leaf_count: usize,
}

impl Assembler<'_> {
    fn assemble(&mut self, i: usize, parent_path: &[String]) -> Arc<CategoryNode> {
        let (flat, children) = (self.flat, self.children);
        let category = &flat[i];
        let name = category.name.trim().to_string();
        let mut path = parent_path.to_vec();
        path.push(name.clone());
        let children = children
            .get(&category.id)
            .map(|c| c.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|child| self.assemble(*child, &path))
            .collect::<Vec<_>>();
        let is_leaf = children.is_empty();
        if is_leaf {
            self.leaf_count += 1;
        }
        let node = Arc::new(CategoryNode {
            id: category.id.clone(),
            name,
            parent_id: category.parent_id.clone(),
            children,
            is_leaf,
            path,
        });
        self.by_id.insert(node.id.clone(), node.clone());
        node
    }
}

pub struct Walk<'a> {
    stack: Vec<std::slice::Iter<'a, Arc<CategoryNode>>>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Arc<CategoryNode>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(node) => {
                    self.stack.push(node.children.iter());
                    return Some(node);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}
