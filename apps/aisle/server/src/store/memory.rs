use std::path::Path;
use std::sync::Arc;

use aisle_core::{CategoryNode, Location, ProductItem};
use serde::{Deserialize, Serialize};

use super::{CatalogStore, NodeSummary, StoreError, StoreFactory};

/// One category row of a JSON fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub name: String,
    pub url: Location,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub parent: Option<Location>,
    /// Explicit child flag. When absent it is derived from the other records.
    #[serde(default)]
    pub children: Option<bool>,
}

impl CategoryRecord {
    pub fn new(name: impl Into<String>, url: impl Into<Location>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            image: None,
            parent: None,
            children: None,
        }
    }

    pub fn under(mut self, parent: impl Into<Location>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_children(mut self, children: bool) -> Self {
        self.children = Some(children);
        self
    }

    fn node(&self) -> CategoryNode {
        CategoryNode {
            name: self.name.clone(),
            location: self.url.clone(),
            image: self.image.clone(),
        }
    }
}

/// One product row of a JSON fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub url: Location,
    pub price: String,
    #[serde(default)]
    pub old_price: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    pub category: Location,
}

impl ProductRecord {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<Location>,
        price: impl Into<String>,
        category: impl Into<Location>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            price: price.into(),
            old_price: None,
            description: String::new(),
            image: None,
            category: category.into(),
        }
    }

    fn item(&self) -> ProductItem {
        ProductItem {
            name: self.name.clone(),
            location: self.url.clone(),
            price: self.price.clone(),
            old_price: self.old_price.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFixture {
    #[serde(default)]
    pub categories: Vec<CategoryRecord>,
    #[serde(default)]
    pub products: Vec<ProductRecord>,
}

/// Immutable in-memory catalog shared by every session.
#[derive(Debug, Clone)]
pub struct MemoryCatalog {
    data: Arc<CatalogFixture>,
}

impl MemoryCatalog {
    pub fn new(fixture: CatalogFixture) -> Self {
        Self {
            data: Arc::new(fixture),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, StoreError> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

impl StoreFactory for MemoryCatalog {
    type Store = MemoryStore;

    fn open(&self) -> Result<MemoryStore, StoreError> {
        Ok(MemoryStore {
            data: Arc::clone(&self.data),
        })
    }

    fn describe(&self) -> String {
        format!(
            "memory ({} categories, {} products)",
            self.data.categories.len(),
            self.data.products.len()
        )
    }
}

pub struct MemoryStore {
    data: Arc<CatalogFixture>,
}

impl MemoryStore {
    fn categories_under(&self, parent: Option<&Location>) -> Vec<CategoryNode> {
        self.data
            .categories
            .iter()
            .filter(|record| record.parent.as_ref() == parent)
            .map(CategoryRecord::node)
            .collect()
    }
}

impl CatalogStore for MemoryStore {
    fn root_categories(&mut self) -> Result<Vec<CategoryNode>, StoreError> {
        Ok(self.categories_under(None))
    }

    fn lookup(&mut self, location: &Location) -> Result<NodeSummary, StoreError> {
        let record = self
            .data
            .categories
            .iter()
            .find(|record| &record.url == location)
            .ok_or_else(|| StoreError::NotFound(location.clone()))?;
        let has_children = record.children.unwrap_or_else(|| {
            self.data
                .categories
                .iter()
                .any(|other| other.parent.as_ref() == Some(location))
        });
        Ok(NodeSummary {
            has_children,
            name: record.name.clone(),
        })
    }

    fn child_categories(&mut self, location: &Location) -> Result<Vec<CategoryNode>, StoreError> {
        Ok(self.categories_under(Some(location)))
    }

    fn products(&mut self, location: &Location) -> Result<Vec<ProductItem>, StoreError> {
        Ok(self
            .data
            .products
            .iter()
            .filter(|record| &record.category == location)
            .map(ProductRecord::item)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::from_json(
            r#"{
                "categories": [
                    {"name": "Electronics", "url": "electronics"},
                    {"name": "Phones", "url": "phones", "parent": "electronics"},
                    {"name": "Books", "url": "books", "children": false}
                ],
                "products": [
                    {"name": "Pixel", "url": "p/pixel", "price": "499", "category": "phones"}
                ]
            }"#,
        )
        .expect("fixture parses")
    }

    #[test_timeout::timeout]
    fn children_flag_is_derived_when_absent() {
        let mut store = catalog().open().unwrap();
        let summary = store.lookup(&Location::from("electronics")).unwrap();
        assert!(summary.has_children);
        assert_eq!(summary.name, "Electronics");
        assert!(!store.lookup(&Location::from("phones")).unwrap().has_children);
    }

    #[test_timeout::timeout]
    fn root_keeps_file_order() {
        let mut store = catalog().open().unwrap();
        let names: Vec<_> = store
            .root_categories()
            .unwrap()
            .into_iter()
            .map(|node| node.name)
            .collect();
        assert_eq!(names, ["Electronics", "Books"]);
    }

    #[test_timeout::timeout]
    fn unknown_location_is_not_found() {
        let mut store = catalog().open().unwrap();
        let err = store.lookup(&Location::from("missing")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(loc) if loc.as_str() == "missing"));
    }

    #[test_timeout::timeout]
    fn products_filter_by_category() {
        let mut store = catalog().open().unwrap();
        let items = store.products(&Location::from("phones")).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].price, "499");
        assert!(store.products(&Location::from("books")).unwrap().is_empty());
    }
}
