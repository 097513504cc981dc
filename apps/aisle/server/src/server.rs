use std::{future::Future, io, net::SocketAddr, sync::Arc, time::Duration};

use metrics::counter;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};
use uuid::Uuid;

use crate::registry::SessionRegistry;
use crate::session::{Session, SessionConfig};
use crate::store::StoreFactory;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accept loop handing every connection its own [`Session`].
pub struct CatalogServer<F> {
    factory: Arc<F>,
    session_config: SessionConfig,
    registry: SessionRegistry,
}

impl<F: StoreFactory> CatalogServer<F> {
    pub fn new(factory: F, session_config: SessionConfig) -> Self {
        Self {
            factory: Arc::new(factory),
            session_config,
            registry: SessionRegistry::new(),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Serves until `shutdown` resolves. Sessions already running are left to
    /// finish on their own.
    pub async fn serve<S>(&self, listener: TcpListener, shutdown: S) -> io::Result<()>
    where
        S: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!(
            listen_addr = %local_addr,
            store = %self.factory.describe(),
            "aisle catalog server accepting connections"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested; no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_session(stream, peer),
                    Err(err) => {
                        counter!("aisle_accept_errors_total", 1);
                        warn!(error = %err, "failed to accept connection");
                        // EMFILE and similar: pause before accepting again.
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }
        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let factory = Arc::clone(&self.factory);
        let config = self.session_config.clone();
        let registry = self.registry.clone();

        tokio::spawn(async move {
            let connection_id = Uuid::new_v4();
            counter!("aisle_connections_total", 1);
            if let Err(err) = stream.set_nodelay(true) {
                warn!(connection_id = %connection_id, error = %err, "failed to set TCP_NODELAY");
            }

            let store = match tokio::task::spawn_blocking(move || factory.open()).await {
                Ok(Ok(store)) => store,
                Ok(Err(err)) => {
                    warn!(connection_id = %connection_id, peer = %peer, error = %err, "failed to open catalog store");
                    return;
                }
                Err(err) => {
                    warn!(connection_id = %connection_id, error = %err, "store open task failed");
                    return;
                }
            };

            let active = registry.register(connection_id, peer);
            info!(
                connection_id = %connection_id,
                peer = %peer,
                active_sessions = active,
                "catalog session opened"
            );

            let session = Session::new(connection_id, store, config).with_registry(registry.clone());
            match session.run(stream).await {
                Ok(summary) => info!(
                    connection_id = %connection_id,
                    requests = summary.requests,
                    end = ?summary.end,
                    "catalog session closed"
                ),
                Err(err) => warn!(
                    connection_id = %connection_id,
                    error = %err,
                    "catalog session aborted"
                ),
            }
            registry.unregister(connection_id);
        });
    }
}
