use std::path::PathBuf;

use aisle_core::{CategoryNode, Location, ProductItem};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use super::{CatalogStore, NodeSummary, StoreError, StoreFactory};

/// Tables the SQLite backend reads. Row order (`rowid`) is the listing order.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS categories (
    name        TEXT NOT NULL,
    url         TEXT NOT NULL PRIMARY KEY,
    image_src   TEXT,
    parent_url  TEXT,
    children    INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS products (
    name          TEXT NOT NULL,
    url           TEXT NOT NULL,
    price         TEXT NOT NULL,
    old_price     TEXT,
    description   TEXT,
    image_src     TEXT,
    category_url  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS categories_parent ON categories (parent_url);
CREATE INDEX IF NOT EXISTS products_category ON products (category_url);
";

const ROOT_CATEGORIES: &str =
    "SELECT name, url, image_src FROM categories WHERE parent_url IS NULL ORDER BY rowid";
const LOOKUP: &str = "SELECT children, name FROM categories WHERE url = ?1";
const CHILD_CATEGORIES: &str =
    "SELECT name, url, image_src FROM categories WHERE parent_url = ?1 ORDER BY rowid";
const PRODUCTS: &str = "SELECT name, url, price, old_price, description, image_src \
     FROM products WHERE category_url = ?1 ORDER BY rowid";

/// Opens a read-only connection to the database file for every session.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    path: PathBuf,
}

impl SqliteCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StoreFactory for SqliteCatalog {
    type Store = SqliteStore;

    fn open(&self) -> Result<SqliteStore, StoreError> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(SqliteStore { conn })
    }

    fn describe(&self) -> String {
        format!("sqlite ({})", self.path.display())
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    fn categories(
        &self,
        sql: &str,
        parent: Option<&Location>,
    ) -> Result<Vec<CategoryNode>, StoreError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<CategoryNode> {
            Ok(CategoryNode {
                name: row.get(0)?,
                location: Location::new(row.get::<_, String>(1)?),
                image: row.get(2)?,
            })
        };
        let rows = match parent {
            Some(parent) => stmt.query_map(params![parent.as_str()], map_row)?,
            None => stmt.query_map([], map_row)?,
        };
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl CatalogStore for SqliteStore {
    fn root_categories(&mut self) -> Result<Vec<CategoryNode>, StoreError> {
        self.categories(ROOT_CATEGORIES, None)
    }

    fn lookup(&mut self, location: &Location) -> Result<NodeSummary, StoreError> {
        self.conn
            .query_row(LOOKUP, params![location.as_str()], |row| {
                Ok(NodeSummary {
                    has_children: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .optional()?
            .ok_or_else(|| StoreError::NotFound(location.clone()))
    }

    fn child_categories(&mut self, location: &Location) -> Result<Vec<CategoryNode>, StoreError> {
        self.categories(CHILD_CATEGORIES, Some(location))
    }

    fn products(&mut self, location: &Location) -> Result<Vec<ProductItem>, StoreError> {
        let mut stmt = self.conn.prepare_cached(PRODUCTS)?;
        let rows = stmt.query_map(params![location.as_str()], |row| {
            Ok(ProductItem {
                name: row.get(0)?,
                location: Location::new(row.get::<_, String>(1)?),
                price: row.get(2)?,
                old_price: row.get(3)?,
                description: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                image: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded() -> (TempDir, SqliteCatalog) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(
            "INSERT INTO categories (name, url, image_src, parent_url, children) VALUES
                ('Electronics', 'electronics', 'http://img/e.png', NULL, 1),
                ('Laptops', 'laptops', NULL, 'electronics', 0),
                ('Phones', 'phones', NULL, 'electronics', 0),
                ('Promo', 'promo', NULL, NULL, 0);
             INSERT INTO products (name, url, price, old_price, description, image_src, category_url) VALUES
                ('Pixel', 'p/pixel', '499', '599', NULL, NULL, 'phones'),
                ('Galaxy', 'p/galaxy', '450', NULL, 'Android phone', NULL, 'phones');",
        )
        .unwrap();
        (dir, SqliteCatalog::new(path))
    }

    #[test_timeout::timeout]
    fn root_categories_in_row_order() {
        let (_dir, catalog) = seeded();
        let mut store = catalog.open().unwrap();
        let roots = store.root_categories().unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].name, "Electronics");
        assert_eq!(roots[0].image.as_deref(), Some("http://img/e.png"));
        assert_eq!(roots[1].location, Location::from("promo"));
    }

    #[test_timeout::timeout]
    fn lookup_reads_children_flag() {
        let (_dir, catalog) = seeded();
        let mut store = catalog.open().unwrap();
        let summary = store.lookup(&Location::from("electronics")).unwrap();
        assert_eq!(
            summary,
            NodeSummary {
                has_children: true,
                name: "Electronics".into()
            }
        );
        assert!(matches!(
            store.lookup(&Location::from("nope")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test_timeout::timeout]
    fn products_map_nullable_columns() {
        let (_dir, catalog) = seeded();
        let mut store = catalog.open().unwrap();
        let items = store.products(&Location::from("phones")).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].old_price.as_deref(), Some("599"));
        assert_eq!(items[0].description, "");
        assert_eq!(items[1].description, "Android phone");
    }

    #[test_timeout::timeout]
    fn child_categories_of_internal_node() {
        let (_dir, catalog) = seeded();
        let mut store = catalog.open().unwrap();
        let children = store.child_categories(&Location::from("electronics")).unwrap();
        let names: Vec<_> = children.iter().map(|node| node.name.as_str()).collect();
        assert_eq!(names, ["Laptops", "Phones"]);
    }
}
