use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Opaque identifier naming a catalog node.
///
/// The catalog root has no identifier; APIs that can point at the root take
/// `Option<Location>` and use `None` for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Location {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Location {
    fn from(value: String) -> Self {
        Self(value)
    }
}

type CategoryTuple = (String, Location, Option<String>);
type ProductTuple = (
    String,
    Location,
    String,
    Option<String>,
    String,
    Option<String>,
);

/// Internal or leaf catalog node. Travels as `[name, url, image]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CategoryTuple", into = "CategoryTuple")]
pub struct CategoryNode {
    pub name: String,
    pub location: Location,
    pub image: Option<String>,
}

impl CategoryNode {
    pub fn new(name: impl Into<String>, location: impl Into<Location>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

impl From<CategoryTuple> for CategoryNode {
    fn from((name, location, image): CategoryTuple) -> Self {
        Self {
            name,
            location,
            image,
        }
    }
}

impl From<CategoryNode> for CategoryTuple {
    fn from(node: CategoryNode) -> Self {
        (node.name, node.location, node.image)
    }
}

/// Purchasable leaf item. Travels as
/// `[name, url, price, old_price, description, image]`.
///
/// Prices are display strings; the service never does arithmetic on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ProductTuple", into = "ProductTuple")]
pub struct ProductItem {
    pub name: String,
    pub location: Location,
    pub price: String,
    pub old_price: Option<String>,
    pub description: String,
    pub image: Option<String>,
}

impl ProductItem {
    pub fn new(
        name: impl Into<String>,
        location: impl Into<Location>,
        price: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            price: price.into(),
            old_price: None,
            description: String::new(),
            image: None,
        }
    }

    pub fn with_old_price(mut self, old_price: impl Into<String>) -> Self {
        self.old_price = Some(old_price.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// An old price equal to the current one is not a discount.
    pub fn is_discounted(&self) -> bool {
        self.old_price
            .as_deref()
            .is_some_and(|old| old != self.price)
    }
}

impl From<ProductTuple> for ProductItem {
    fn from(
        (name, location, price, old_price, description, image): ProductTuple,
    ) -> Self {
        Self {
            name,
            location,
            price,
            old_price,
            description,
            image,
        }
    }
}

impl From<ProductItem> for ProductTuple {
    fn from(item: ProductItem) -> Self {
        (
            item.name,
            item.location,
            item.price,
            item.old_price,
            item.description,
            item.image,
        )
    }
}

/// The `result` payload of a successful response.
///
/// On the wire the two kinds are only distinguishable by tuple arity (3 for
/// categories, 6 for products). An empty array decodes as
/// `Categories(vec![])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Categories(Vec<CategoryNode>),
    Products(Vec<ProductItem>),
}

impl Listing {
    pub fn len(&self) -> usize {
        match self {
            Listing::Categories(nodes) => nodes.len(),
            Listing::Products(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_products(&self) -> bool {
        matches!(self, Listing::Products(_))
    }
}

impl Default for Listing {
    fn default() -> Self {
        Listing::Categories(Vec::new())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ListingError {
    #[error("result mixes category and product entries (first product at {0})")]
    Mixed(usize),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireEntry {
    Category(CategoryNode),
    Product(ProductItem),
}

impl TryFrom<Vec<WireEntry>> for Listing {
    type Error = ListingError;

    fn try_from(entries: Vec<WireEntry>) -> Result<Self, Self::Error> {
        let Some(first) = entries.first() else {
            return Ok(Listing::default());
        };
        match first {
            WireEntry::Category(_) => {
                let mut nodes = Vec::with_capacity(entries.len());
                for (index, entry) in entries.into_iter().enumerate() {
                    match entry {
                        WireEntry::Category(node) => nodes.push(node),
                        WireEntry::Product(_) => return Err(ListingError::Mixed(index)),
                    }
                }
                Ok(Listing::Categories(nodes))
            }
            WireEntry::Product(_) => {
                let mut items = Vec::with_capacity(entries.len());
                for (index, entry) in entries.into_iter().enumerate() {
                    match entry {
                        WireEntry::Product(item) => items.push(item),
                        WireEntry::Category(_) => return Err(ListingError::Mixed(index)),
                    }
                }
                Ok(Listing::Products(items))
            }
        }
    }
}

impl Serialize for Listing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Listing::Categories(nodes) => nodes.serialize(serializer),
            Listing::Products(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Listing {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<WireEntry>::deserialize(deserializer)?;
        Listing::try_from(entries).map_err(de::Error::custom)
    }
}

/// `(name, location)` of the node a listing belongs to; `(None, None)` for
/// the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "(Option<String>, Option<Location>)",
    into = "(Option<String>, Option<Location>)"
)]
pub struct CategoryRef {
    pub name: Option<String>,
    pub location: Option<Location>,
}

impl CategoryRef {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn node(name: impl Into<String>, location: Location) -> Self {
        Self {
            name: Some(name.into()),
            location: Some(location),
        }
    }

    pub fn is_root(&self) -> bool {
        self.location.is_none()
    }
}

impl From<(Option<String>, Option<Location>)> for CategoryRef {
    fn from((name, location): (Option<String>, Option<Location>)) -> Self {
        Self { name, location }
    }
}

impl From<CategoryRef> for (Option<String>, Option<Location>) {
    fn from(value: CategoryRef) -> Self {
        (value.name, value.location)
    }
}

/// The only client → server message: `{"url": <string> | null}`.
///
/// The `url` key is mandatory; `{}` is rejected rather than read as the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "url", deserialize_with = "Option::deserialize")]
    pub location: Option<Location>,
}

impl Request {
    pub fn root() -> Self {
        Self { location: None }
    }

    pub fn at(location: Location) -> Self {
        Self {
            location: Some(location),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Response {
    Ok {
        category: CategoryRef,
        result: Listing,
    },
    Error,
}

impl Response {
    pub fn ok(category: CategoryRef, result: Listing) -> Self {
        Response::Ok { category, result }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok { .. })
    }
}
