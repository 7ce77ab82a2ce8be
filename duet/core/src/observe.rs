//! Multi-subscriber event fan-out
//!
//! Every subscriber gets its own unbounded queue, so a slow consumer never
//! blocks the publisher (the read task) and never loses events.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

/// Registered subscribers of one event kind
pub(crate) struct Observers<T> {
    senders: Vec<mpsc::UnboundedSender<T>>,
    closed: bool,
}

impl<T: Clone> Observers<T> {
    pub(crate) fn new() -> Self {
        Self {
            senders: Vec::new(),
            closed: false,
        }
    }

    /// Register a subscriber, primed with `initial` events
    ///
    /// After [`close`](Self::close) the subscription yields only `initial`
    /// and then ends.
    pub(crate) fn subscribe_with<I>(&mut self, initial: I) -> Subscription<T>
    where
        I: IntoIterator<Item = T>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        for item in initial {
            let _ = tx.send(item);
        }
        if !self.closed {
            self.senders.push(tx);
        }
        Subscription::new(rx)
    }

    /// Deliver to every live subscriber, forgetting dropped ones
    pub(crate) fn publish(&mut self, item: T) {
        if self.closed {
            return;
        }
        self.senders.retain(|tx| tx.send(item.clone()).is_ok());
    }

    /// End every subscription after the events already queued
    pub(crate) fn close(&mut self) {
        self.closed = true;
        self.senders.clear();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}

/// A lazy stream of events for one subscriber
///
/// Ends when its source shuts down. Dropping it unsubscribes.
pub struct Subscription<T> {
    inner: UnboundedReceiverStream<T>,
}

impl<T> Subscription<T> {
    fn new(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(rx),
        }
    }

    /// Next event, or `None` once the stream has ended
    pub async fn recv(&mut self) -> Option<T> {
        self.inner.next().await
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
