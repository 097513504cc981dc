use std::io;
use std::time::Duration;

use aisle_core::{
    decode, recv_frame, CategoryRef, FrameCodec, FramingError, Listing, Request, Response,
};
use futures_util::SinkExt;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;

#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("not connected")]
    NotConnected,
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("timed out connecting to {addr} after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },
    #[error("no data from server within {0:?}")]
    Timeout(Duration),
    #[error("connection closed by server")]
    Closed,
    #[error("socket error: {0}")]
    Io(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("catalog server unavailable: {0}")]
    Connectivity(#[from] ConnectivityError),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ClientError::Connectivity(_))
    }
}

/// A successful answer: the node that was resolved and its listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub category: CategoryRef,
    pub result: Listing,
}

struct Transport {
    frames: Framed<TcpStream, FrameCodec>,
}

/// Outcome of a failed exchange and whether the socket is still usable.
struct ExchangeFailure {
    error: ClientError,
    keep_transport: bool,
}

impl ExchangeFailure {
    fn broken(error: impl Into<ClientError>) -> Self {
        Self {
            error: error.into(),
            keep_transport: false,
        }
    }

    fn recoverable(error: ClientError) -> Self {
        Self {
            error,
            keep_transport: true,
        }
    }
}

impl From<FramingError> for ExchangeFailure {
    fn from(err: FramingError) -> Self {
        if err.is_recoverable() {
            return Self::recoverable(ClientError::Protocol(format!("malformed response: {err}")));
        }
        match err {
            FramingError::Timeout(wait) => Self::broken(ConnectivityError::Timeout(wait)),
            FramingError::Closed | FramingError::Truncated(_) => {
                Self::broken(ConnectivityError::Closed)
            }
            FramingError::Io(err) => Self::broken(ConnectivityError::Io(err)),
            other => Self::broken(ClientError::Protocol(other.to_string())),
        }
    }
}

impl Transport {
    async fn exchange(
        &mut self,
        request: &Request,
        read_timeout: Duration,
    ) -> Result<Resolved, ExchangeFailure> {
        self.frames.send(request).await?;
        let frame = recv_frame(&mut self.frames, Some(read_timeout)).await?;
        match decode::<Response>(&frame)? {
            Response::Ok { category, result } => Ok(Resolved { category, result }),
            Response::Error => Err(ExchangeFailure::recoverable(ClientError::Protocol(
                "server answered with an error frame".into(),
            ))),
        }
    }
}

/// Persistent connection to the catalog server.
///
/// One exchange at a time: [`send`](Self::send) takes `&mut self` and does
/// not return until the response has arrived or the exchange has failed.
/// Nothing here retries on its own; a connectivity failure drops the socket
/// and leaves the client disconnected until [`reconnect`](Self::reconnect).
pub struct NavigationClient {
    config: ClientConfig,
    transport: Option<Transport>,
}

impl NavigationClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Drops any existing socket and dials a fresh one.
    pub async fn reconnect(&mut self) -> Result<(), ClientError> {
        self.transport = None;
        let addr = self.config.addr();
        let connect_timeout = self.config.connect_timeout;

        let stream = match timeout(connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                warn!(addr = %addr, error = %source, "failed to connect to catalog server");
                return Err(ConnectivityError::Connect { addr, source }.into());
            }
            Err(_) => {
                warn!(addr = %addr, "timed out connecting to catalog server");
                return Err(ConnectivityError::ConnectTimeout {
                    addr,
                    timeout: connect_timeout,
                }
                .into());
            }
        };
        if let Err(err) = stream.set_nodelay(true) {
            debug!(error = %err, "failed to set TCP_NODELAY");
        }

        self.transport = Some(Transport {
            frames: Framed::new(stream, FrameCodec::new(self.config.max_frame_bytes)),
        });
        info!(addr = %addr, "connected to catalog server");
        Ok(())
    }

    /// Sends `request` and waits for its response.
    pub async fn send(&mut self, request: &Request) -> Result<Resolved, ClientError> {
        let transport = self
            .transport
            .as_mut()
            .ok_or(ConnectivityError::NotConnected)?;

        debug!(location = ?request.location, "sending catalog request");
        match transport.exchange(request, self.config.read_timeout).await {
            Ok(resolved) => Ok(resolved),
            Err(failure) => {
                if !failure.keep_transport {
                    self.transport = None;
                }
                warn!(
                    error = %failure.error,
                    connected = self.transport.is_some(),
                    "catalog exchange failed"
                );
                Err(failure.error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aisle_core::{CategoryNode, Location};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    /// Accepts one connection and hands back its framed stream.
    async fn accept_framed(listener: &TcpListener) -> Framed<TcpStream, FrameCodec> {
        let (socket, _) = listener.accept().await.unwrap();
        Framed::new(socket, FrameCodec::default())
    }

    async fn listener() -> (TcpListener, ClientConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = ClientConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            read_timeout: Duration::from_millis(200),
            ..ClientConfig::default()
        };
        (listener, config)
    }

    #[test_timeout::tokio_timeout_test(10)]
    async fn send_without_connection_is_connectivity_error() {
        let mut client = NavigationClient::new(ClientConfig::default());
        let err = client.send(&Request::root()).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Connectivity(ConnectivityError::NotConnected)
        ));
    }

    #[test_timeout::tokio_timeout_test(10)]
    async fn silent_server_times_out() {
        let (listener, config) = listener().await;
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(socket);
        });

        let mut client = NavigationClient::new(config);
        client.reconnect().await.unwrap();
        let err = client.send(&Request::root()).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Connectivity(ConnectivityError::Timeout(_))
        ));
        assert!(!client.is_connected());
        server.abort();
    }

    #[test_timeout::tokio_timeout_test(10)]
    async fn error_frame_is_protocol_error_and_keeps_socket() {
        let (listener, config) = listener().await;
        tokio::spawn(async move {
            let mut frames = accept_framed(&listener).await;
            let _ = recv_frame(&mut frames, None).await.unwrap();
            frames.send(&Response::Error).await.unwrap();
            let _ = recv_frame(&mut frames, None).await.unwrap();
            let response = Response::ok(
                CategoryRef::root(),
                Listing::Categories(vec![CategoryNode::new("Books", "books")]),
            );
            frames.send(&response).await.unwrap();
        });

        let mut client = NavigationClient::new(config);
        client.reconnect().await.unwrap();
        let err = client
            .send(&Request::at(Location::from("x")))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
        assert!(client.is_connected());

        let resolved = client.send(&Request::root()).await.unwrap();
        assert!(resolved.category.is_root());
        assert_eq!(resolved.result.len(), 1);
    }

    #[test_timeout::tokio_timeout_test(10)]
    async fn ok_frame_without_category_is_protocol_error() {
        let (listener, config) = listener().await;
        tokio::spawn(async move {
            let mut frames = accept_framed(&listener).await;
            let _ = recv_frame(&mut frames, None).await.unwrap();
            frames
                .get_mut()
                .write_all(b"{\"type\":\"ok\",\"result\":[]}\n\n")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let mut client = NavigationClient::new(config);
        client.reconnect().await.unwrap();
        let err = client.send(&Request::root()).await.unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
        assert!(client.is_connected());
    }

    #[test_timeout::timeout]
    fn only_parse_failures_keep_the_socket() {
        let parse = decode::<Request>(b"not json").unwrap_err();
        assert!(ExchangeFailure::from(parse).keep_transport);

        let oversized = ExchangeFailure::from(FramingError::TooLarge { limit: 8 });
        assert!(!oversized.keep_transport);
        assert!(matches!(oversized.error, ClientError::Protocol(_)));

        let closed = ExchangeFailure::from(FramingError::Truncated(3));
        assert!(!closed.keep_transport);
        assert!(closed.error.is_connectivity());
    }

    #[test_timeout::tokio_timeout_test(10)]
    async fn refused_connection_is_connectivity_error() {
        let (listener, config) = listener().await;
        drop(listener);

        let mut client = NavigationClient::new(config);
        let err = client.reconnect().await.unwrap_err();
        assert!(err.is_connectivity());
        assert!(!client.is_connected());
    }
}
