use std::time::Duration;

use aisle_core::{decode, FrameCodec, FramingError, Request, Response};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, histogram};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{timeout_at, Instant};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::registry::SessionRegistry;
use crate::resolver;
use crate::store::{CatalogStore, StoreError};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Close the connection after this long without a complete request.
    pub idle_timeout: Option<Duration>,
    pub max_frame_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Some(Duration::from_secs(300)),
            max_frame_bytes: aisle_core::DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to open catalog store: {0}")]
    Store(#[from] StoreError),
    #[error("transport failed: {0}")]
    Framing(#[from] FramingError),
    #[error("resolver task failed: {0}")]
    Task(String),
}

/// Why a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    ClientClosed,
    IdleTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub requests: u64,
    pub end: SessionEnd,
}

/// One accepted connection and the store handle it owns.
///
/// Requests are handled strictly one at a time: the response to a request is
/// written and flushed before the next frame is read.
pub struct Session<S> {
    id: Uuid,
    store: Option<S>,
    config: SessionConfig,
    registry: Option<SessionRegistry>,
    requests: u64,
}

impl<S: CatalogStore + 'static> Session<S> {
    pub fn new(id: Uuid, store: S, config: SessionConfig) -> Self {
        Self {
            id,
            store: Some(store),
            config,
            registry: None,
            requests: 0,
        }
    }

    pub fn with_registry(mut self, registry: SessionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub async fn run<T>(mut self, io: T) -> Result<SessionSummary, SessionError>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut frames = Framed::new(io, FrameCodec::new(self.config.max_frame_bytes));

        let end = loop {
            // The idle clock covers the whole next request, not each read.
            let next = match self.config.idle_timeout {
                Some(idle) => match timeout_at(Instant::now() + idle, frames.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        info!(
                            connection_id = %self.id,
                            idle_ms = idle.as_millis() as u64,
                            "closing idle session"
                        );
                        break SessionEnd::IdleTimeout;
                    }
                },
                None => frames.next().await,
            };
            let frame = match next {
                Some(Ok(frame)) => frame,
                None => break SessionEnd::ClientClosed,
                Some(Err(err)) => {
                    counter!(
                        "aisle_framing_errors_total",
                        1,
                        "reason" => err.metric_label()
                    );
                    return Err(err.into());
                }
            };

            let started = Instant::now();
            let (response, outcome) = self.handle_frame(&frame).await?;
            frames.send(&response).await?;

            self.requests += 1;
            if let Some(registry) = &self.registry {
                registry.record_request(self.id);
            }
            counter!("aisle_requests_total", 1, "outcome" => outcome);
            histogram!(
                "aisle_request_duration_ms",
                started.elapsed().as_secs_f64() * 1000.0,
                "outcome" => outcome
            );
        };

        Ok(SessionSummary {
            requests: self.requests,
            end,
        })
    }

    async fn handle_frame(&mut self, frame: &[u8]) -> Result<(Response, &'static str), SessionError> {
        let request: Request = match decode(frame) {
            Ok(request) => request,
            Err(err) => {
                warn!(connection_id = %self.id, error = %err, "rejecting malformed request");
                return Ok((Response::Error, "bad_request"));
            }
        };

        debug!(
            connection_id = %self.id,
            location = ?request.location,
            "resolving request"
        );

        match self.resolve(request).await? {
            Ok(response) => Ok((response, "ok")),
            Err(err) => {
                warn!(connection_id = %self.id, error = %err, "failed to resolve request");
                Ok((Response::Error, err.metric_label()))
            }
        }
    }

    /// Runs the store calls on the blocking pool, handing the store handle to
    /// the task and taking it back afterwards.
    async fn resolve(
        &mut self,
        request: Request,
    ) -> Result<Result<Response, StoreError>, SessionError> {
        let mut store = self
            .store
            .take()
            .ok_or_else(|| SessionError::Task("store handle lost by an earlier request".into()))?;
        let (store, result) = tokio::task::spawn_blocking(move || {
            let result = resolver::resolve(&mut store, request.location.as_ref());
            (store, result)
        })
        .await
        .map_err(|err| SessionError::Task(err.to_string()))?;
        self.store = Some(store);
        Ok(result)
    }
}
