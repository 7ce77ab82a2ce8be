//! Host side: bind an ephemeral port and accept exactly one peer

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use super::Transport;
use crate::transport::traits::{CloseReason, LinkHandler, ListenResult, TransportError};

impl Transport {
    /// Bind an OS-assigned port and start accepting in the background
    ///
    /// Returns as soon as the port is known. The first inbound connection is
    /// handed to `handler`; the listener is then dropped, so later connection
    /// attempts are refused by the OS.
    ///
    /// # Errors
    ///
    /// [`TransportError::Bind`] if the socket cannot be bound,
    /// [`TransportError::Stopped`] if the transport was already stopped.
    pub async fn listen(
        self: &Arc<Self>,
        handler: Arc<dyn LinkHandler>,
    ) -> Result<ListenResult, TransportError> {
        if self.is_stopped() {
            return Err(TransportError::Stopped);
        }

        let bind = SocketAddr::new(self.config.bind_address, 0);
        let listener = TcpListener::bind(bind).await.map_err(TransportError::Bind)?;
        let port = listener.local_addr().map_err(TransportError::Bind)?.port();
        let result = ListenResult::new(port).ok_or_else(|| {
            TransportError::Bind(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "OS assigned port 0",
            ))
        })?;

        tracing::info!(address = %bind.ip(), port, "Listening for peer");

        let transport = Arc::clone(self);
        let task = tokio::spawn(async move {
            transport.accept_one(listener, handler).await;
        });

        let mut slots = self.slots.lock();
        if self.is_stopped() {
            // stop() ran between bind and here; it could not see this task
            task.abort();
            return Err(TransportError::Stopped);
        }
        slots.accept_task = Some(task);
        Ok(result)
    }

    async fn accept_one(self: Arc<Self>, listener: TcpListener, handler: Arc<dyn LinkHandler>) {
        let accepted = listener.accept().await;
        // Single-peer session: stop listening as soon as one peer arrives
        drop(listener);

        match accepted {
            Ok((stream, peer)) => {
                tracing::debug!(%peer, "Accepted peer");
                if let Err(e) = self.establish(stream, handler).await {
                    tracing::debug!(error = %e, %peer, "Accepted peer was not attached");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Accept failed");
                handler.on_closed(CloseReason::AcceptFailed(e.to_string()));
            }
        }
    }
}
