use aisle_core::{CategoryNode, Listing, Location, ProductItem, Request};
use thiserror::Error;
use tracing::{debug, warn};

use crate::connection::{ClientError, NavigationClient, Resolved};
use crate::history::{HistoryEntry, HistoryStack};
use crate::pagination::{self, Arrows, Pager};

/// Title shown for the catalog root, which has no name of its own.
pub const ROOT_TITLE: &str = "Catalog";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ready,
    /// The last action failed; nothing new was shown and a retry is needed.
    Unavailable,
}

#[derive(Debug, Error)]
pub enum BrowseError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("no top-level category named {0:?}")]
    UnknownCategory(String),
    #[error("no entry {0} on this page")]
    NoSuchEntry(usize),
}

/// Entries of the page currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEntries<'a> {
    Categories(&'a [CategoryNode]),
    Products(&'a [ProductItem]),
}

impl PageEntries<'_> {
    pub fn len(&self) -> usize {
        match self {
            PageEntries::Categories(nodes) => nodes.len(),
            PageEntries::Products(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The listing last received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub title: String,
    pub location: Option<Location>,
    pub listing: Listing,
    pager: Pager,
}

impl View {
    fn new(resolved: Resolved) -> Self {
        let title = resolved
            .category
            .name
            .unwrap_or_else(|| ROOT_TITLE.to_string());
        Self {
            title,
            location: resolved.category.location,
            pager: Pager::new(resolved.result.len()),
            listing: resolved.result,
        }
    }

    pub fn page(&self) -> usize {
        self.pager.page()
    }

    pub fn page_count(&self) -> usize {
        self.pager.count()
    }

    pub fn arrows(&self) -> Arrows {
        self.pager.arrows()
    }

    pub fn entries(&self) -> PageEntries<'_> {
        match &self.listing {
            Listing::Categories(nodes) => {
                PageEntries::Categories(pagination::slice(nodes, self.page()))
            }
            Listing::Products(items) => PageEntries::Products(pagination::slice(items, self.page())),
        }
    }
}

/// What picking an entry on the current page did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A category was opened and is now the current view.
    Opened,
    /// Products are not navigable; the caller gets the item to show or link.
    Product(ProductItem),
}

/// Navigation context: the connection, the visited path, and what is on
/// screen.
///
/// Every successful answer is pushed onto the history, becomes the current
/// view, and resets paging to the first page. A failed action only flips the
/// status to [`Status::Unavailable`]; the previous view stays as it was.
pub struct Browser {
    client: NavigationClient,
    history: HistoryStack,
    view: Option<View>,
    menu: Vec<CategoryNode>,
    status: Status,
}

impl Browser {
    pub fn new(client: NavigationClient) -> Self {
        Self {
            client,
            history: HistoryStack::new(),
            view: None,
            menu: Vec::new(),
            status: Status::Ready,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn view(&self) -> Option<&View> {
        self.view.as_ref()
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    /// Top-level categories, as last returned for the root.
    pub fn menu(&self) -> &[CategoryNode] {
        &self.menu
    }

    pub fn client(&self) -> &NavigationClient {
        &self.client
    }

    /// Dials the server and shows the root.
    pub async fn start(&mut self) -> Result<(), BrowseError> {
        if let Err(err) = self.client.reconnect().await {
            self.status = Status::Unavailable;
            return Err(err.into());
        }
        self.load_root().await
    }

    pub async fn load_root(&mut self) -> Result<(), BrowseError> {
        let resolved = self.fetch(None).await?;
        self.remember_menu(&resolved);
        self.apply(resolved);
        Ok(())
    }

    pub async fn open(&mut self, location: Location) -> Result<(), BrowseError> {
        let resolved = self.fetch(Some(location)).await?;
        self.apply(resolved);
        Ok(())
    }

    /// Jumps straight to a top-level category by its display name.
    /// [`ROOT_TITLE`] goes back to the root.
    pub async fn open_top_level(&mut self, name: &str) -> Result<(), BrowseError> {
        if name == ROOT_TITLE {
            return self.load_root().await;
        }
        let location = self
            .menu
            .iter()
            .find(|node| node.name == name)
            .map(|node| node.location.clone())
            .ok_or_else(|| BrowseError::UnknownCategory(name.to_string()))?;
        self.open(location).await
    }

    /// Picks the `index`th (1-based) entry of the current page.
    pub async fn select(&mut self, index: usize) -> Result<Selection, BrowseError> {
        let picked = {
            let view = self.view.as_ref().ok_or(BrowseError::NoSuchEntry(index))?;
            let position = index.checked_sub(1).ok_or(BrowseError::NoSuchEntry(index))?;
            match view.entries() {
                PageEntries::Categories(nodes) => nodes
                    .get(position)
                    .map(|node| Err(node.location.clone())),
                PageEntries::Products(items) => items.get(position).cloned().map(Ok),
            }
        };

        match picked.ok_or(BrowseError::NoSuchEntry(index))? {
            Ok(product) => Ok(Selection::Product(product)),
            Err(location) => {
                self.open(location).await?;
                Ok(Selection::Opened)
            }
        }
    }

    /// Steps back through the history and asks the server for that location
    /// again rather than reusing an old answer.
    pub async fn back(&mut self) -> Result<(), BrowseError> {
        let target = self.history.back();
        debug!(location = ?target.location, depth = self.history.len(), "navigating back");
        let resolved = self.fetch(target.location).await?;
        self.apply(resolved);
        Ok(())
    }

    pub fn next_page(&mut self) -> bool {
        self.view.as_mut().is_some_and(|view| view.pager.next())
    }

    pub fn previous_page(&mut self) -> bool {
        self.view.as_mut().is_some_and(|view| view.pager.previous())
    }

    /// Re-dials if the socket is gone, then re-requests the history head.
    pub async fn retry(&mut self) -> Result<(), BrowseError> {
        if !self.client.is_connected() {
            if let Err(err) = self.client.reconnect().await {
                self.status = Status::Unavailable;
                return Err(err.into());
            }
        }
        let head = self.history.peek();
        debug!(location = ?head.location, "retrying history head");
        let is_root = head.location.is_none();
        let resolved = self.fetch(head.location).await?;
        if is_root {
            self.remember_menu(&resolved);
        }
        self.apply(resolved);
        Ok(())
    }

    async fn fetch(&mut self, location: Option<Location>) -> Result<Resolved, ClientError> {
        let request = Request { location };
        match self.client.send(&request).await {
            Ok(resolved) => {
                self.status = Status::Ready;
                Ok(resolved)
            }
            Err(err) => {
                warn!(error = %err, "catalog unavailable");
                self.status = Status::Unavailable;
                Err(err)
            }
        }
    }

    fn remember_menu(&mut self, resolved: &Resolved) {
        if let Listing::Categories(nodes) = &resolved.result {
            self.menu = nodes.clone();
        }
    }

    fn apply(&mut self, resolved: Resolved) {
        self.history.append(HistoryEntry {
            location: resolved.category.location.clone(),
        });
        self.view = Some(View::new(resolved));
    }
}
