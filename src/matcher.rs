use crate::text::{keywords, match_quality, normalize, truncate_chars};
use catalog_types::category::{CategoryNode, CategoryTree};
use catalog_types::matching::{Confidence, MatchResult, SCORE_FLOOR};
use catalog_types::CatalogError;
use std::cmp::Ordering;
use std::sync::Arc;

pub const DEFAULT_TOP_N: usize = 5;
pub const NAME_WEIGHT: f64 = 0.65;
pub const PATH_WEIGHT: f64 = 0.35;
/// Leaf-name tokens shorter than this are generic ("Set", "Kap") and weigh less.
const SHORT_TOKEN_LEN: usize = 4;
const SHORT_TOKEN_PENALTY: f64 = 0.75;
const DESCRIPTION_LIMIT: usize = 800;

struct PreparedLeaf {
    node: Arc<CategoryNode>,
    name: String,
    name_tokens: Vec<String>,
    path_tokens: Vec<String>,
    display_path: String,
}

impl PreparedLeaf {
    fn new(node: &Arc<CategoryNode>) -> Self {
        Self {
            node: node.clone(),
            name: normalize(&node.name),
            name_tokens: keywords(&node.name),
            path_tokens: keywords(&node.ancestors().join(" ")),
            display_path: node.display_path(),
        }
    }

    fn score<'t>(&self, terms: &'t [String], title: &str) -> (f64, Vec<&'t str>) {
        let mut name_sum = 0.0;
        let mut path_sum = 0.0;
        let mut matched = Vec::new();
        for term in terms {
            let name_quality = best_quality(term, &self.name_tokens, true);
            if name_quality > 0.0 {
                name_sum += name_quality;
                matched.push(term.as_str());
                continue;
            }
            let path_quality = best_quality(term, &self.path_tokens, false);
            if path_quality > 0.0 {
                path_sum += path_quality;
                matched.push(term.as_str());
            }
        }
        if !self.name.is_empty() && self.name == title {
            return (1.0, matched);
        }
        let score = NAME_WEIGHT * signal(name_sum, terms.len(), self.name_tokens.len())
            + PATH_WEIGHT * signal(path_sum, terms.len(), self.path_tokens.len());
        (score.clamp(0.0, 1.0), matched)
    }
}

fn best_quality(term: &str, tokens: &[String], penalize_short: bool) -> f64 {
    tokens
        .iter()
        .map(|token| {
            let quality = match_quality(term, token);
            if penalize_short && token.chars().count() < SHORT_TOKEN_LEN {
                quality * SHORT_TOKEN_PENALTY
            } else {
                quality
            }
        })
        .fold(0.0, f64::max)
}

fn signal(sum: f64, terms: usize, tokens: usize) -> f64 {
    match terms.min(tokens) {
        0 => 0.0,
        n => (sum / n as f64).min(1.0),
    }
}

/// Keyword representation of every leaf of one snapshot, ready for scoring
/// product titles.
pub struct CategoryMatcher {
    version: u64,
    leaves: Vec<PreparedLeaf>,
}

impl CategoryMatcher {
    pub fn new(tree: &CategoryTree) -> Self {
        Self {
            version: tree.version(),
            leaves: tree.leaves().map(PreparedLeaf::new).collect(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn rank(
        &self,
        title: &str,
        description: &str,
        top_n: usize,
    ) -> Result<Vec<MatchResult>, CatalogError> {
        let normalized_title = normalize(title);
        if normalized_title.is_empty() {
            return Err(CatalogError::EmptyTitle);
        }
        if top_n == 0 {
            return Ok(Vec::new());
        }
        let terms = keywords(&format!(
            "{title} {}",
            truncate_chars(description, DESCRIPTION_LIMIT)
        ));

        let mut scored = self
            .leaves
            .iter()
            .filter_map(|leaf| {
                let (score, matched) = leaf.score(&terms, &normalized_title);
                (score >= SCORE_FLOOR).then_some((leaf, score, matched))
            })
            .collect::<Vec<_>>();
        scored.sort_by(|(a, a_score, _), (b, b_score, _)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.node.depth().cmp(&b.node.depth()))
                .then_with(|| a.node.id.cmp(&b.node.id))
        });

        Ok(scored
            .into_iter()
            .take(top_n)
            .map(|(leaf, score, matched)| MatchResult {
                category_id: leaf.node.id.clone(),
                display_path: leaf.display_path.clone(),
                score,
                confidence: Confidence::from_score(score),
                matched_keywords: matched.into_iter().map(str::to_string).collect(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_tree;
    use catalog_types::category::{FlatCategory, UpstreamTree};

    fn tree(categories: &[(u64, &str, Option<u64>)]) -> CategoryTree {
        let categories = categories
            .iter()
            .map(|(id, name, parent_id)| FlatCategory {
                id: (*id).into(),
                name: name.to_string(),
                parent_id: parent_id.map(Into::into),
            })
            .collect();
        CategoryTree::build(UpstreamTree::Flat(categories), 1).unwrap()
    }

    #[test]
    fn matches_phone_case_with_high_confidence() {
        let matcher = CategoryMatcher::new(&sample_tree(1));
        let results = matcher
            .rank("Siyah Deri Telefon Kılıfı", "", DEFAULT_TOP_N)
            .unwrap();
        let top = &results[0];
        assert_eq!(top.category_id, 5.into());
        assert_eq!(top.display_path, "Elektronik > Telefon > Aksesuar > Kılıf");
        assert!(top.score >= 0.7, "score {}", top.score);
        assert_eq!(top.confidence, Confidence::High);
        assert_eq!(top.matched_keywords, ["telefon", "kilifi"]);
        assert!(results.len() <= DEFAULT_TOP_N);
        assert!(results.iter().all(|r| r.category_id != 12.into()));
        assert!(results.iter().all(|r| r.score >= SCORE_FLOOR));
    }

    #[test]
    fn matches_without_the_root_segment() {
        let tree = tree(&[
            (1, "Telefon", None),
            (2, "Aksesuar", Some(1)),
            (3, "Kılıf", Some(2)),
            (10, "Mutfak", None),
            (11, "Tencere", Some(10)),
        ]);
        let results = CategoryMatcher::new(&tree)
            .rank("Siyah Deri Telefon Kılıfı", "", 5)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].category_id, 3.into());
        assert_eq!(results[0].confidence, Confidence::High);
    }

    #[test]
    fn orders_by_score_then_depth_then_id() {
        let matcher = CategoryMatcher::new(&sample_tree(1));
        let results = matcher.rank("Siyah Deri Telefon Kılıfı", "", 10).unwrap();
        let scores = results.iter().map(|r| r.score).collect::<Vec<_>>();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        // Cep Telefonu and Kılıf Seti tie on score and depth.
        let tied = results
            .iter()
            .filter(|r| r.category_id == 3.into() || r.category_id == 15.into())
            .map(|r| r.category_id.to_string())
            .collect::<Vec<_>>();
        assert_eq!(tied, ["3", "15"]);
    }

    #[test]
    fn prefers_shallower_leaves_on_ties() {
        let tree = tree(&[
            (1, "Aksesuar", None),
            (9, "Kılıf", Some(1)),
            (2, "Moda", None),
            (3, "Çanta", Some(2)),
            (4, "Kılıf", Some(3)),
            (5, "Outdoor", None),
            (6, "Kılıf", Some(5)),
        ]);
        let results = CategoryMatcher::new(&tree)
            .rank("koruyucu kılıf", "", 5)
            .unwrap();
        let ids = results
            .iter()
            .map(|r| r.category_id.to_string())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["6", "9", "4"]);
        assert!(results.iter().all(|r| r.score == results[0].score));
    }

    #[test]
    fn exact_name_scores_full() {
        let matcher = CategoryMatcher::new(&sample_tree(1));
        let results = matcher.rank("KILIF", "", 3).unwrap();
        assert_eq!(results[0].category_id, 5.into());
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[1].category_id, 15.into());
        assert!(results[1].score < 1.0);
    }

    #[test]
    fn uses_description_keywords() {
        let matcher = CategoryMatcher::new(&sample_tree(1));
        let results = matcher
            .rank("Yeni sezon ürün", "Paslanmaz çelik tencere seti", 5)
            .unwrap();
        assert_eq!(results[0].category_id, 12.into());
        let long_tail = format!("{} tencere", "x".repeat(900));
        assert!(matcher.rank("Yeni sezon", &long_tail, 5).unwrap().is_empty());
    }

    #[test]
    fn penalizes_short_leaf_names() {
        let tree = tree(&[(1, "Mutfak", None), (2, "Çay", Some(1)), (3, "Çaydanlık", Some(1))]);
        let results = CategoryMatcher::new(&tree).rank("çay bardağı", "", 5).unwrap();
        let short = results.iter().find(|r| r.category_id == 2.into()).unwrap();
        assert!((short.score - NAME_WEIGHT * SHORT_TOKEN_PENALTY).abs() < 1e-9);
    }

    #[test]
    fn rejects_empty_titles() {
        let matcher = CategoryMatcher::new(&sample_tree(1));
        assert_eq!(matcher.rank("   ", "kılıf", 5), Err(CatalogError::EmptyTitle));
        assert_eq!(matcher.rank("kılıf", "", 0), Ok(vec![]));
        assert!(matcher.rank("buzdolabı", "", 5).unwrap().is_empty());
        assert_eq!(matcher.version(), 1);
    }
}
