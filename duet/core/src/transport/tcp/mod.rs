//! TCP Transport
//!
//! Owns the listening socket (host) or the dialed socket (joiner), the single
//! peer connection, and its line reader and writer.
//!
//! # Architecture
//!
//! ```text
//!  host                                           joiner
//! ┌────────────────────┐                        ┌────────────────────┐
//! │ listen() port 0    │◄───────── TCP ─────────┤ dial(addr, port)   │
//! │ accept task (once) │                        │                    │
//! │                    │   newline-framed JSON  │                    │
//! │ read task ─► on_record         on_record ◄─ read task            │
//! │ write() ─► Mutex<writer>   Mutex<writer> ◄─ write()              │
//! └────────────────────┘                        └────────────────────┘
//! ```
//!
//! # Teardown
//!
//! [`Transport::stop`] is idempotent and never waits on the read task: it
//! aborts the pending accept and the read task at their current await and
//! drops the writer, which closes the socket. A write stuck on a full send
//! buffer is cancelled and releases the writer itself.

mod host;
mod joiner;
mod reader;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::config::TransportConfig;
use super::traits::{LinkHandler, TransportError};

/// Background tasks and addresses of the active connection
#[derive(Default)]
struct Slots {
    accept_task: Option<JoinHandle<()>>,
    read_task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
}

/// Single-peer, line-framed TCP transport
///
/// One instance serves one connection. After [`stop`](Self::stop) it refuses
/// every further operation; a new session needs a new transport.
pub struct Transport {
    config: TransportConfig,
    stopped: AtomicBool,
    slots: Mutex<Slots>,
    /// Single writer; the async mutex serializes whole records in call order
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    /// Flips to `true` on stop; cancels an in-flight write
    cancel: watch::Sender<bool>,
}

impl Transport {
    /// Create an idle transport
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            stopped: AtomicBool::new(false),
            slots: Mutex::new(Slots::default()),
            writer: tokio::sync::Mutex::new(None),
            cancel: watch::Sender::new(false),
        }
    }

    /// Transport configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Whether [`stop`](Self::stop) has run
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Local address of the peer connection, once established
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.slots.lock().local_addr
    }

    /// Remote address of the peer connection, once established
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.slots.lock().peer_addr
    }

    /// Take ownership of a connected socket and start the read loop
    ///
    /// The writer lock is held across the handshake so that a write issued
    /// as soon as the owner observes the connection queues behind it instead
    /// of finding no writer.
    pub(crate) async fn establish(
        &self,
        stream: TcpStream,
        handler: Arc<dyn LinkHandler>,
    ) -> Result<(), TransportError> {
        let peer = stream.peer_addr()?;
        let local = stream.local_addr()?;
        if let Err(e) = stream.set_nodelay(self.config.nodelay) {
            tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
        }

        let mut writer = self.writer.lock().await;
        if self.is_stopped() {
            return Err(TransportError::Stopped);
        }
        if !handler.on_connected(peer) {
            return Err(TransportError::InvalidState(
                "Owner refused the connection".to_string(),
            ));
        }

        let (read_half, write_half) = stream.into_split();
        {
            let mut slots = self.slots.lock();
            if self.is_stopped() {
                return Err(TransportError::Stopped);
            }
            slots.read_task = Some(tokio::spawn(reader::read_loop(
                read_half,
                handler,
                self.config.max_line_bytes,
            )));
            slots.local_addr = Some(local);
            slots.peer_addr = Some(peer);
        }
        *writer = Some(write_half);
        if self.is_stopped() {
            // stop() ran while this handshake held the writer lock
            writer.take();
            return Err(TransportError::Stopped);
        }

        tracing::info!(%peer, %local, "Peer connection established");
        Ok(())
    }

    /// Write one record followed by `\n`
    ///
    /// Returns `Ok(false)` without writing when no connection is attached
    /// (not yet connected, or already stopped): the record is dropped, not
    /// queued. A write blocked on backpressure returns `Ok(false)` as soon
    /// as [`stop`](Self::stop) runs.
    ///
    /// # Errors
    ///
    /// [`TransportError::EmbeddedTerminator`] if `record` contains a newline;
    /// [`TransportError::Io`] if the socket write fails.
    pub async fn write(&self, record: &str) -> Result<bool, TransportError> {
        if record.contains('\n') {
            return Err(TransportError::EmbeddedTerminator);
        }

        let mut frame = Vec::with_capacity(record.len() + 1);
        frame.extend_from_slice(record.as_bytes());
        frame.push(b'\n');

        let mut cancelled = self.cancel.subscribe();
        let mut writer = self.writer.lock().await;
        if self.is_stopped() {
            // stop() could not take the writer while a write held it
            writer.take();
            return Ok(false);
        }

        let Some(w) = writer.as_mut() else {
            return Ok(false);
        };
        tokio::select! {
            result = w.write_all(&frame) => {
                result?;
                Ok(true)
            }
            _ = cancelled.wait_for(|stopped| *stopped) => {
                tracing::debug!("Write cancelled by stop; releasing writer");
                writer.take();
                Ok(false)
            }
        }
    }

    /// Release the listener, the connection and both background tasks
    ///
    /// Returns `true` for the call that actually stopped the transport and
    /// `false` for every later call. Never blocks.
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }

        let (accept_task, read_task) = {
            let mut slots = self.slots.lock();
            (slots.accept_task.take(), slots.read_task.take())
        };
        if let Some(task) = accept_task {
            task.abort();
        }
        if let Some(task) = read_task {
            task.abort();
        }

        self.cancel.send_replace(true);
        // A write in flight holds the lock; the cancel makes it drop the writer
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }

        tracing::debug!("Transport stopped");
        true
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        let slots = self.slots.get_mut();
        if let Some(task) = slots.accept_task.take() {
            task.abort();
        }
        if let Some(task) = slots.read_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::transport::traits::CloseReason;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::sync::mpsc;

    /// Records everything the transport reports
    pub(crate) struct ChannelHandler {
        pub accept: bool,
        pub events: mpsc::UnboundedSender<HandlerEvent>,
    }

    #[derive(Debug, PartialEq, Eq)]
    pub(crate) enum HandlerEvent {
        Connected,
        Record(String),
        Closed(CloseReason),
    }

    impl LinkHandler for ChannelHandler {
        fn on_connected(&self, _peer: SocketAddr) -> bool {
            let _ = self.events.send(HandlerEvent::Connected);
            self.accept
        }

        fn on_record(&self, record: String) {
            let _ = self.events.send(HandlerEvent::Record(record));
        }

        fn on_closed(&self, reason: CloseReason) {
            let _ = self.events.send(HandlerEvent::Closed(reason));
        }
    }

    pub(crate) fn channel_handler(
        accept: bool,
    ) -> (Arc<ChannelHandler>, mpsc::UnboundedReceiver<HandlerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelHandler { accept, events }), rx)
    }

    pub(crate) async fn next_event(rx: &mut mpsc::UnboundedReceiver<HandlerEvent>) -> HandlerEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for transport event")
            .expect("handler channel closed")
    }

    #[tokio::test]
    async fn test_write_before_connect_is_dropped() {
        let transport = Transport::new(TransportConfig::loopback());
        assert!(!transport.write("{}").await.unwrap());
    }

    #[tokio::test]
    async fn test_write_rejects_embedded_newline() {
        let transport = Transport::new(TransportConfig::loopback());
        let result = transport.write("a\nb").await;
        assert!(matches!(result, Err(TransportError::EmbeddedTerminator)));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let transport = Transport::new(TransportConfig::loopback());
        assert!(transport.stop());
        assert!(!transport.stop());
        assert!(!transport.stop());
        assert!(transport.is_stopped());
    }

    #[tokio::test]
    async fn test_establish_after_stop_refuses_stream() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (stream, _) = listener.accept().await.unwrap();
        let _client = client.await.unwrap();

        let transport = Transport::new(TransportConfig::loopback());
        transport.stop();

        let (handler, mut events) = channel_handler(true);
        let result = transport.establish(stream, handler).await;
        assert!(matches!(result, Err(TransportError::Stopped)));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_refused_connection_is_not_attached() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (stream, _) = listener.accept().await.unwrap();
        let client = client.await.unwrap();

        let transport = Transport::new(TransportConfig::loopback());
        let (handler, mut events) = channel_handler(false);
        let result = transport.establish(stream, handler).await;
        assert!(matches!(result, Err(TransportError::InvalidState(_))));
        assert_eq!(next_event(&mut events).await, HandlerEvent::Connected);
        assert!(transport.peer_addr().is_none());

        // Refused socket was dropped: the client sees EOF
        let mut line = String::new();
        let n = BufReader::new(client).read_line(&mut line).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_stop_closes_socket_for_peer() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (stream, _) = listener.accept().await.unwrap();
        let client = client.await.unwrap();

        let transport = Transport::new(TransportConfig::loopback());
        let (handler, mut events) = channel_handler(true);
        transport.establish(stream, handler).await.unwrap();
        assert_eq!(next_event(&mut events).await, HandlerEvent::Connected);
        assert!(transport.write("hello").await.unwrap());

        let mut reader = BufReader::new(client);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "hello\n");

        assert!(transport.stop());
        assert!(!transport.write("late").await.unwrap());

        line.clear();
        let n = tokio::time::timeout(Duration::from_secs(2), reader.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0, "peer should see EOF after stop");
    }

    #[tokio::test]
    async fn test_stop_cancels_write_blocked_on_backpressure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (stream, _) = listener.accept().await.unwrap();
        // Never read from until the writer has been stopped
        let mut client = client.await.unwrap();

        let transport = Arc::new(Transport::new(TransportConfig::loopback()));
        let (handler, _events) = channel_handler(true);
        transport.establish(stream, handler).await.unwrap();

        let sender = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                let record = "x".repeat(256 * 1024);
                loop {
                    match transport.write(&record).await {
                        Ok(true) => continue,
                        other => return other,
                    }
                }
            })
        };

        // Long enough for both socket buffers to fill
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!sender.is_finished(), "sender should be parked on a full buffer");

        assert!(transport.stop());
        let result = tokio::time::timeout(Duration::from_secs(2), sender)
            .await
            .expect("blocked write did not return after stop")
            .unwrap();
        assert!(matches!(result, Ok(false)));

        // Writer and reader were dropped: the peer drains to EOF
        let drained = tokio::time::timeout(
            Duration::from_secs(5),
            tokio::io::copy(&mut client, &mut tokio::io::sink()),
        )
        .await
        .expect("peer never saw EOF")
        .unwrap();
        assert!(drained > 0);
    }
}
