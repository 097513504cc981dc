//! Aisle catalog server.
//!
//! Every accepted TCP connection becomes a [`session::Session`] that owns its
//! own catalog store handle and answers framed `{"url": ...}` requests one at
//! a time through [`resolver::resolve`].

pub mod config;
pub mod registry;
pub mod resolver;
pub mod server;
pub mod session;
pub mod store;
pub mod telemetry;

pub use config::{CatalogKind, Cli, ServerConfig};
pub use registry::SessionRegistry;
pub use server::CatalogServer;
pub use session::{Session, SessionConfig, SessionEnd, SessionError, SessionSummary};
pub use store::{
    CatalogFixture, CatalogStore, MemoryCatalog, SqliteCatalog, StoreError, StoreFactory,
};
