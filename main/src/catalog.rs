use crate::service::Category;
use crate::service::ServiceEntry;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Currently known services, grouped by category.
///
/// Every append and every reset is its own critical section. A reader therefore
/// sees each category either before or after a given write, never half-way.
#[derive(Default)]
pub struct ServiceCatalog {
    services: RwLock<HashMap<Category, Vec<ServiceEntry>>>,
}

impl ServiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            services: self.services.read().await.clone(),
        }
    }

    pub async fn append(&self, entry: ServiceEntry) {
        self.services
            .write()
            .await
            .entry(entry.category)
            .or_default()
            .push(entry);
    }

    pub async fn reset(&self, categories: &[Category]) {
        let mut services = self.services.write().await;
        for category in categories {
            services.insert(*category, Vec::new());
        }
    }
}

/// Owned copy of the catalog taken under the read lock.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CatalogSnapshot {
    services: HashMap<Category, Vec<ServiceEntry>>,
}

impl CatalogSnapshot {
    /// Entries of a category in arrival order.
    pub fn get(&self, category: Category) -> &[ServiceEntry] {
        self.services
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl FromIterator<ServiceEntry> for CatalogSnapshot {
    fn from_iter<T: IntoIterator<Item = ServiceEntry>>(iter: T) -> Self {
        let mut services: HashMap<_, Vec<_>> = HashMap::new();
        for entry in iter {
            services.entry(entry.category).or_default().push(entry);
        }
        Self { services }
    }
}
