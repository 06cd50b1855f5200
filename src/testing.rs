use crate::upstream::{MarketplaceAdapter, UpstreamError};
use async_trait::async_trait;
use catalog_types::attribute::{AttributeType, CategoryAttribute};
use catalog_types::category::{CategoryTree, FlatCategory, UpstreamTree};
use catalog_types::{CategoryId, Marketplace};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

fn flat(id: u64, name: &str, parent_id: Option<u64>) -> FlatCategory {
    FlatCategory {
        id: id.into(),
        name: name.to_string(),
        parent_id: parent_id.map(Into::into),
    }
}

/// Elektronik > Telefon > {Cep Telefonu, Aksesuar > {Kılıf, Şarj Cihazı,
/// Ekran Koruyucu}} and Ev & Yaşam > {Mutfak > Tencere, Ev Tekstili >
/// {Yastık Kılıfı, Kılıf Seti}}.
pub fn sample_categories() -> Vec<FlatCategory> {
    vec![
        flat(1, "Elektronik", None),
        flat(2, "Telefon", Some(1)),
        flat(3, "Cep Telefonu", Some(2)),
        flat(4, "Aksesuar", Some(2)),
        flat(5, "Kılıf", Some(4)),
        flat(6, "Şarj Cihazı", Some(4)),
        flat(7, "Ekran Koruyucu", Some(4)),
        flat(10, "Ev & Yaşam", None),
        flat(11, "Mutfak", Some(10)),
        flat(12, "Tencere", Some(11)),
        flat(13, "Ev Tekstili", Some(10)),
        flat(14, "Yastık Kılıfı", Some(13)),
        flat(15, "Kılıf Seti", Some(13)),
    ]
}

pub fn sample_tree(version: u64) -> CategoryTree {
    CategoryTree::build(UpstreamTree::Flat(sample_categories()), version)
        .expect("sample tree is valid")
}

/// In-memory marketplace that counts calls and can be switched to fail.
pub struct MockAdapter {
    pub tree_calls: AtomicUsize,
    pub attribute_calls: AtomicUsize,
    failing: AtomicBool,
    delay: Duration,
    categories: Mutex<Vec<FlatCategory>>,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::with_delay(Duration::from_millis(10))
    }
}

impl MockAdapter {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            tree_calls: AtomicUsize::new(0),
            attribute_calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay,
            categories: Mutex::new(sample_categories()),
        }
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Next tree payload references a parent that does not exist.
    pub fn break_tree(&self) {
        self.categories
            .lock()
            .expect("categories lock")
            .push(flat(99, "Yetim", Some(404)));
    }

    fn check(&self) -> Result<(), UpstreamError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(UpstreamError::Status {
                status: 503,
                body: "maintenance".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MarketplaceAdapter for MockAdapter {
    fn marketplace(&self) -> Marketplace {
        Marketplace::Trendyol
    }

    async fn fetch_tree(&self) -> Result<UpstreamTree, UpstreamError> {
        self.tree_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.check()?;
        let categories = self.categories.lock().expect("categories lock").clone();
        Ok(UpstreamTree::Flat(categories))
    }

    async fn fetch_attributes(
        &self,
        leaf_id: &CategoryId,
    ) -> Result<Vec<CategoryAttribute>, UpstreamError> {
        self.attribute_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.check()?;
        Ok(vec![
            CategoryAttribute {
                attribute_id: 47.into(),
                name: "Renk".to_string(),
                mandatory: true,
                kind: AttributeType::Enum,
                allowed_values: ["Siyah", "Beyaz"].map(String::from).into(),
                multi_value: false,
            },
            CategoryAttribute {
                attribute_id: format!("model-{leaf_id}").into(),
                name: "Uyumlu Model".to_string(),
                mandatory: false,
                kind: AttributeType::FreeText,
                allowed_values: Default::default(),
                multi_value: true,
            },
        ])
    }
}
