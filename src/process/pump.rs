//! Continuous draining of child output into a line channel.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Receiving side of one process run's combined output.
///
/// Lines arrive in the order the process wrote them. The pump reports
/// closed once the reader reached end-of-file and all buffered lines were
/// taken.
#[derive(Debug)]
pub struct OutputPump {
    lines: UnboundedReceiver<String>,
    closed: bool,
}

impl OutputPump {
    /// Creates the channel; readers are attached with [`spawn_reader`].
    #[must_use]
    pub fn channel() -> (UnboundedSender<String>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                lines: rx,
                closed: false,
            },
        )
    }

    /// Takes up to `max` buffered lines without waiting.
    pub fn drain(&mut self, max: usize) -> Vec<String> {
        let mut drained = Vec::new();
        while drained.len() < max {
            match self.lines.try_recv() {
                Ok(line) => drained.push(line),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        drained
    }

    /// Waits for the next line; `None` once the output is closed.
    pub async fn next_line(&mut self) -> Option<String> {
        let line = self.lines.recv().await;
        if line.is_none() {
            self.closed = true;
        }
        line
    }

    /// True once all readers finished and the buffer is empty.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Spawns a task that reads `stream` until end-of-file and forwards each
/// decoded line to `tx`.
///
/// Carriage returns split lines like newlines so in-place progress updates
/// arrive individually. Invalid UTF-8 is replaced rather than rejected. The
/// task keeps reading after the receiver goes away so the child never blocks
/// on a full pipe.
pub fn spawn_reader<R>(
    stream: R,
    tx: UnboundedSender<String>,
    label: &'static str,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buffer = Vec::with_capacity(256);
        let mut forwarder = LineForwarder::new(tx);

        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer).await {
                Ok(0) => break,
                Ok(_) => forwarder.push(&buffer),
                Err(error) => {
                    warn!(stream = label, %error, "output read failed");
                    break;
                }
            }
        }

        debug!(stream = label, forwarded = forwarder.forwarded, "output stream closed");
    })
}

/// Blocking counterpart of [`spawn_reader`] for pipe types tokio cannot
/// register with its reactor.
#[cfg(not(unix))]
pub fn spawn_blocking_reader<R>(
    stream: R,
    tx: UnboundedSender<String>,
    label: &'static str,
) -> JoinHandle<()>
where
    R: std::io::Read + Send + 'static,
{
    use std::io::BufRead;

    tokio::task::spawn_blocking(move || {
        let mut reader = std::io::BufReader::new(stream);
        let mut buffer = Vec::with_capacity(256);
        let mut forwarder = LineForwarder::new(tx);

        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) => break,
                Ok(_) => forwarder.push(&buffer),
                Err(error) => {
                    warn!(stream = label, %error, "output read failed");
                    break;
                }
            }
        }

        debug!(stream = label, forwarded = forwarder.forwarded, "output stream closed");
    })
}

/// Sends split lines until the receiver goes away, then discards them.
struct LineForwarder {
    tx: UnboundedSender<String>,
    forwarded: u64,
    receiver_gone: bool,
}

impl LineForwarder {
    fn new(tx: UnboundedSender<String>) -> Self {
        Self {
            tx,
            forwarded: 0,
            receiver_gone: false,
        }
    }

    fn push(&mut self, raw: &[u8]) {
        if self.receiver_gone {
            return;
        }
        for line in split_output(raw) {
            if self.tx.send(line).is_err() {
                self.receiver_gone = true;
                return;
            }
            self.forwarded += 1;
        }
    }
}

/// Splits one raw read on `\r` and `\n`, decoding lossily and dropping
/// blank pieces.
fn split_output(raw: &[u8]) -> Vec<String> {
    raw.split(|&byte| byte == b'\r' || byte == b'\n')
        .filter(|piece| !piece.is_empty())
        .map(|piece| String::from_utf8_lossy(piece).into_owned())
        .filter(|line| !line.trim().is_empty())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_split_output_handles_carriage_returns() {
        assert_eq!(
            split_output(b"[download] 10%\r[download] 20%\r\n"),
            vec!["[download] 10%".to_string(), "[download] 20%".to_string()]
        );
    }

    #[test]
    fn test_split_output_repairs_invalid_utf8() {
        let lines = split_output(b"caf\xff\n");
        assert_eq!(lines, vec!["caf\u{fffd}".to_string()]);
    }

    #[tokio::test]
    async fn test_reader_forwards_in_order_then_closes() {
        let (tx, mut pump) = OutputPump::channel();
        let input: &[u8] = b"one\ntwo\r\nthree";
        spawn_reader(input, tx, "stdout").await.unwrap();

        assert_eq!(pump.next_line().await.as_deref(), Some("one"));
        assert_eq!(pump.drain(10), vec!["two".to_string(), "three".to_string()]);
        assert!(pump.next_line().await.is_none());
        assert!(pump.is_closed());
    }

    #[tokio::test]
    async fn test_reader_survives_dropped_receiver() {
        let (tx, pump) = OutputPump::channel();
        drop(pump);
        let input: &[u8] = b"a\nb\nc\n";
        spawn_reader(input, tx, "stderr").await.unwrap();
    }

    #[tokio::test]
    async fn test_drain_respects_cap() {
        let (tx, mut pump) = OutputPump::channel();
        for n in 0..5 {
            tx.send(n.to_string()).unwrap();
        }
        assert_eq!(pump.drain(3).len(), 3);
        assert!(!pump.is_closed());
        drop(tx);
        assert_eq!(pump.drain(10).len(), 2);
        pump.drain(10);
        assert!(pump.is_closed());
    }
}
