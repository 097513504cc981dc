//! Navigation client for the Aisle catalog service.
//!
//! [`connection::NavigationClient`] owns the TCP session and speaks the
//! framed request/response protocol. [`browser::Browser`] layers history,
//! paging and the top-level menu on top of it; the `aisle` binary is a thin
//! shell over the browser.

pub mod browser;
pub mod config;
pub mod connection;
pub mod history;
pub mod pagination;

pub use browser::{BrowseError, Browser, PageEntries, Selection, Status, View, ROOT_TITLE};
pub use config::{Cli, ClientConfig};
pub use connection::{ClientError, ConnectivityError, NavigationClient, Resolved};
pub use history::{HistoryEntry, HistoryStack, HISTORY_CAPACITY};
pub use pagination::{Arrows, Pager, PAGE_SIZE};
