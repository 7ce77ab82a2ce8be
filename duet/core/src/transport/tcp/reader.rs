//! Line reader
//!
//! Splits the inbound byte stream into records on `\n`. A record longer than
//! the configured limit is discarded up to its terminator and the stream
//! stays usable.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;

use crate::transport::traits::{CloseReason, LinkHandler};

#[derive(Debug, PartialEq, Eq)]
enum ReadOutcome {
    Record(String),
    /// Line exceeded the limit; carries the number of bytes dropped
    Oversized(usize),
    Eof,
}

pub(super) async fn read_loop(
    read_half: OwnedReadHalf,
    handler: Arc<dyn LinkHandler>,
    max_line_bytes: usize,
) {
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();

    let reason = loop {
        match read_record(&mut reader, max_line_bytes, &mut buf).await {
            Ok(ReadOutcome::Record(line)) => handler.on_record(line),
            Ok(ReadOutcome::Oversized(dropped)) => {
                tracing::warn!(
                    bytes = dropped,
                    limit = max_line_bytes,
                    "Discarded oversized record"
                );
            }
            Ok(ReadOutcome::Eof) => break CloseReason::PeerClosed,
            Err(e) => break CloseReason::Io(e.to_string()),
        }
    };

    tracing::debug!(%reason, "Read loop finished");
    handler.on_closed(reason);
}

async fn read_record<R>(reader: &mut R, max: usize, buf: &mut Vec<u8>) -> io::Result<ReadOutcome>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = u64::try_from(max).unwrap_or(u64::MAX).saturating_add(1);
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(ReadOutcome::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        return Ok(ReadOutcome::Record(String::from_utf8_lossy(buf).into_owned()));
    }

    if buf.len() <= max {
        // Stream ended mid-line; hand over what arrived
        return Ok(ReadOutcome::Record(String::from_utf8_lossy(buf).into_owned()));
    }

    let mut dropped = buf.len();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            break;
        }
        match available.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                dropped += pos;
                break;
            }
            None => {
                let len = available.len();
                reader.consume(len);
                dropped += len;
            }
        }
    }
    Ok(ReadOutcome::Oversized(dropped))
}
