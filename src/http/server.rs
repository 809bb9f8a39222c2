//! Capture server: accept loop and connection tasks.
//!
//! # Responsibilities
//! - Accept connections within the listener's connection limit
//! - Hand each connection to the configured backend on its own task
//! - Stop accepting on shutdown and drain in-flight connections

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{Backend, ConnectionOutcome};
use crate::config::CaptureConfig;
use crate::lifecycle::ShutdownSignal;
use crate::net::{Accepted, ConnectionTracker, Listener, ListenerError};

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// HTTP capture server.
pub struct CaptureServer {
    backend: Arc<Backend>,
    config: CaptureConfig,
    tracker: ConnectionTracker,
}

impl CaptureServer {
    /// Create a new server with the given configuration.
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            backend: Arc::new(Backend::from_config(&config)),
            config,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Run the server until `shutdown` fires, then drain connections.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Accept)?;
        tracing::info!(
            address = %addr,
            backend = %self.backend.kind(),
            max_connections = listener.max_connections(),
            "Capture server starting"
        );

        loop {
            let accepted = tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = listener.accept() => accepted,
            };

            let Accepted { stream, peer, slot } = match accepted {
                Ok(accepted) => accepted,
                Err(ListenerError::Closed) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
            }

            let guard = self.tracker.track(slot);
            let backend = Arc::clone(&self.backend);
            tokio::spawn(async move {
                let id = guard.id();
                tracing::debug!(connection_id = %id, peer = %peer, "Connection accepted");

                match backend.serve(stream, id).await {
                    ConnectionOutcome::Closed => {
                        tracing::debug!(connection_id = %id, "Connection closed")
                    }
                    ConnectionOutcome::Failed(status) => tracing::info!(
                        connection_id = %id,
                        peer = %peer,
                        status = status.as_u16(),
                        "Connection closed after rejecting a request"
                    ),
                    ConnectionOutcome::Aborted => {
                        tracing::debug!(connection_id = %id, "Connection aborted")
                    }
                }
                drop(guard);
            });
        }

        drop(listener);
        self.drain().await;
        tracing::info!("Capture server stopped");
        Ok(())
    }

    async fn drain(&self) {
        let active = self.tracker.active_count();
        if active == 0 {
            return;
        }

        let deadline = Duration::from_secs(self.config.timeouts.drain_secs);
        tracing::info!(active, deadline_secs = deadline.as_secs(), "Draining connections");
        if tokio::time::timeout(deadline, self.tracker.wait_for_drain())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Drain deadline passed, abandoning connections"
            );
        }
    }
}
