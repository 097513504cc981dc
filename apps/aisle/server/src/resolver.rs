use aisle_core::{CategoryRef, Listing, Location, Response};
use tracing::debug;

use crate::store::{CatalogStore, StoreError};

/// Resolves a requested location to the listing the client should show.
///
/// * root (`None`): root categories minus the last one, titled `(None, None)`.
/// * internal node: its child categories.
/// * leaf: its products.
///
/// The root listing always drops its final entry, whatever it is.
pub fn resolve<S>(store: &mut S, location: Option<&Location>) -> Result<Response, StoreError>
where
    S: CatalogStore + ?Sized,
{
    let Some(location) = location else {
        let mut roots = store.root_categories()?;
        roots.pop();
        return Ok(Response::ok(CategoryRef::root(), Listing::Categories(roots)));
    };

    let summary = store.lookup(location)?;
    let category = CategoryRef::node(summary.name, location.clone());
    let result = if summary.has_children {
        Listing::Categories(store.child_categories(location)?)
    } else {
        Listing::Products(store.products(location)?)
    };
    debug!(
        location = %location,
        has_children = summary.has_children,
        entries = result.len(),
        "resolved catalog node"
    );
    Ok(Response::ok(category, result))
}
