//! Joiner side: dial the host

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;

use super::Transport;
use crate::transport::traits::{LinkHandler, TransportError};

impl Transport {
    /// Connect to a host and attach the connection
    ///
    /// # Errors
    ///
    /// [`TransportError::Connect`] if the host refuses or is unreachable,
    /// [`TransportError::ConnectTimeout`] if it does not answer within the
    /// configured timeout.
    pub async fn dial(
        &self,
        addr: SocketAddr,
        handler: Arc<dyn LinkHandler>,
    ) -> Result<(), TransportError> {
        if self.is_stopped() {
            return Err(TransportError::Stopped);
        }

        tracing::debug!(%addr, "Dialing host");
        let timeout = self.config.connect_timeout();
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(TransportError::Connect { addr, source }),
            Err(_) => {
                return Err(TransportError::ConnectTimeout {
                    addr,
                    timeout_ms: self.config.connect_timeout_ms,
                })
            }
        };

        self.establish(stream, handler).await
    }
}
