//! Catalog backends.
//!
//! The resolver only ever sees [`CatalogStore`]; each session opens its own
//! handle through a [`StoreFactory`] when its connection is accepted and drops
//! it when the connection closes.

mod memory;
mod sqlite;

use std::io;

use aisle_core::{CategoryNode, Location, ProductItem};
use thiserror::Error;

pub use memory::{CategoryRecord, CatalogFixture, MemoryCatalog, MemoryStore, ProductRecord};
pub use sqlite::{SqliteCatalog, SqliteStore, SCHEMA};

/// What the store knows about a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSummary {
    pub has_children: bool,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown catalog location: {0}")]
    NotFound(Location),
    #[error("failed to read catalog: {0}")]
    Io(#[from] io::Error),
    #[error("invalid catalog fixture: {0}")]
    Fixture(#[from] serde_json::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn metric_label(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::Io(_) => "io",
            StoreError::Fixture(_) => "fixture",
            StoreError::Sqlite(_) => "sqlite",
        }
    }
}

/// Read access to the catalog tree. All sequences keep the store's order.
pub trait CatalogStore: Send {
    /// Categories whose parent is the root.
    fn root_categories(&mut self) -> Result<Vec<CategoryNode>, StoreError>;

    /// Fails with [`StoreError::NotFound`] for unknown locations.
    fn lookup(&mut self, location: &Location) -> Result<NodeSummary, StoreError>;

    fn child_categories(&mut self, location: &Location) -> Result<Vec<CategoryNode>, StoreError>;

    fn products(&mut self, location: &Location) -> Result<Vec<ProductItem>, StoreError>;
}

/// Opens one store handle per session.
pub trait StoreFactory: Send + Sync + 'static {
    type Store: CatalogStore + 'static;

    fn open(&self) -> Result<Self::Store, StoreError>;

    /// Short human readable description used in startup logs.
    fn describe(&self) -> String;
}
