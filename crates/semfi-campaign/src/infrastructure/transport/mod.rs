//! UART transport with a background line-framing reader.
//!
//! The transport owns the serial connection for the campaign's lifetime and
//! decouples writers from arbitrarily delayed device responses:
//!
//! - Writes (`write_bytes`, `write_line`) go straight to the OS buffer and
//!   never wait for a response.  This is what keeps the injection hot path
//!   free of round-trips: a request/response exchange costs roughly two
//!   orders of magnitude more than the write itself at campaign rates.
//! - A single spawned reader task continuously drains the receive side,
//!   frames CR/LF-terminated lines, and pushes them into a bounded
//!   [`LineQueue`].  If consumers fall behind, the oldest unread line is
//!   dropped and logged; the reader itself never stalls.
//! - `read_line(timeout)` is the one blocking primitive, used by setup and
//!   diagnostic paths only.  The injection path never calls it.
//!
//! The transport is constructed either from a real serial port
//! ([`SerialTransport::open`]) or from any async byte stream
//! ([`SerialTransport::from_stream`]), which is how tests and the debug stub
//! drive it over [`tokio::io::duplex`] without hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::domain::CampaignConfig;

pub mod line_queue;
pub mod stub;

pub use line_queue::LineQueue;

/// Opens the link the configuration describes: the in-process stub device
/// in debug mode, the real serial port otherwise.
///
/// Must be called within a tokio runtime (the background reader is spawned
/// immediately).
pub fn connect_from_config(config: &CampaignConfig) -> Result<SerialTransport, TransportError> {
    if config.debug {
        info!("debug mode: using stub SEM device instead of hardware");
        Ok(SerialTransport::from_stream(stub::spawn_stub_device()))
    } else {
        SerialTransport::open(&config.device, config.baud)
    }
}

/// Line terminator the SEM monitor expects on commands.
pub const LINE_TERMINATOR: &str = "\r";

/// Read chunk size for the background reader.
const READ_CHUNK: usize = 1024;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The serial device could not be opened.  Fatal at campaign startup.
    #[error("failed to open {device} at {baud} baud: {source}")]
    Open {
        device: String,
        baud: u32,
        #[source]
        source: tokio_serial::Error,
    },

    /// A write syscall failed.  Non-fatal in the injection path; the caller
    /// decides on retry policy (the campaign never retries, to keep timing).
    #[error("serial write failed: {0}")]
    Write(#[source] std::io::Error),

    /// No framed line arrived within the allowed window.
    #[error("no line received within {0:?}")]
    Timeout(Duration),

    /// The transport has been closed.
    #[error("transport is closed")]
    Closed,
}

/// Serial (or mock) connection with a concurrent line-framing reader.
///
/// The serial link is single-writer, continuous-reader: all campaign writes
/// funnel through this object, and the spawned reader task is the only
/// consumer of inbound bytes.
pub struct SerialTransport {
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    lines: Arc<LineQueue>,
    // Dropping the sender (or sending `true`) stops the reader task.
    stop_tx: watch::Sender<bool>,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl SerialTransport {
    /// Opens the serial device and starts the background reader.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Open`] if the device cannot be opened;
    /// campaign startup treats this as fatal.
    pub fn open(device: &str, baud: u32) -> Result<Self, TransportError> {
        let stream = tokio_serial::new(device, baud)
            .open_native_async()
            .map_err(|source| TransportError::Open {
                device: device.to_string(),
                baud,
                source,
            })?;
        debug!(device, baud, "serial port opened");
        Ok(Self::from_stream(stream))
    }

    /// Wraps any async byte stream (serial port, duplex pipe, stub device)
    /// and starts the background reader over its read half.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let lines = Arc::new(LineQueue::new(line_queue::DEFAULT_CAPACITY));
        let (stop_tx, stop_rx) = watch::channel(false);
        let reader = tokio::spawn(reader_loop(read_half, Arc::clone(&lines), stop_rx));
        Self {
            writer: Mutex::new(Box::new(write_half)),
            lines,
            stop_tx,
            reader: std::sync::Mutex::new(Some(reader)),
            closed: AtomicBool::new(false),
        }
    }

    /// Writes raw bytes without terminator or encoding changes.
    ///
    /// Used for binary commands (register injection).  Returns as soon as
    /// the bytes are handed to the OS; no acknowledgment is awaited.
    pub async fn write_bytes(&self, buf: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(TransportError::Closed);
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(buf).await.map_err(TransportError::Write)?;
        writer.flush().await.map_err(TransportError::Write)
    }

    /// Writes a command line, appending [`LINE_TERMINATOR`] unless the
    /// caller already included it.  Same non-blocking contract as
    /// [`write_bytes`](Self::write_bytes).
    pub async fn write_line(&self, line: &str) -> Result<(), TransportError> {
        if line.ends_with(LINE_TERMINATOR) {
            self.write_bytes(line.as_bytes()).await
        } else {
            let mut payload = String::with_capacity(line.len() + LINE_TERMINATOR.len());
            payload.push_str(line);
            payload.push_str(LINE_TERMINATOR);
            self.write_bytes(payload.as_bytes()).await
        }
    }

    /// Waits up to `timeout` for the next framed line.
    ///
    /// Setup and diagnostic paths only; the injection path never reads.
    pub async fn read_line(&self, timeout: Duration) -> Result<String, TransportError> {
        self.lines
            .pop(timeout)
            .await
            .ok_or(TransportError::Timeout(timeout))
    }

    /// Discards and returns every line currently buffered, without waiting.
    pub fn drain_lines(&self) -> Vec<String> {
        self.lines.drain()
    }

    /// Number of framed lines waiting to be read.
    pub fn pending_lines(&self) -> usize {
        self.lines.len()
    }

    /// Stops the background reader and releases the connection.
    ///
    /// Dropping the transport has the same effect; `close` only makes the
    /// shutdown observable (the reader task is awaited).
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        let _ = self.stop_tx.send(true);
        let handle = self.reader.lock().expect("reader handle lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

/// Single consumer of the receive side: drains available bytes, frames
/// lines, and enqueues them.  Exits on stop signal, EOF, or a read error.
async fn reader_loop<R>(mut rx: R, lines: Arc<LineQueue>, mut stop: watch::Receiver<bool>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        tokio::select! {
            // Both an explicit stop and the sender being dropped end the task.
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            result = rx.read(&mut chunk) => {
                match result {
                    Ok(0) => {
                        debug!("serial stream reached end of input");
                        break;
                    }
                    Ok(n) => {
                        pending.extend_from_slice(&chunk[..n]);
                        while let Some(line) = take_framed_line(&mut pending) {
                            if let Some(dropped) = lines.push(line) {
                                warn!(line = %dropped, "line queue full, dropping oldest unread line");
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "serial read failed, stopping reader");
                        break;
                    }
                }
            }
        }
    }
}

/// Extracts the next complete line from `pending`, if one is terminated.
///
/// Frames on CR or LF; a CRLF / LFCR pair is consumed as a single
/// terminator.  Whitespace-only lines are dropped (the monitor pads its
/// output with blank lines) and bytes are decoded as lossy ASCII.
fn take_framed_line(pending: &mut Vec<u8>) -> Option<String> {
    loop {
        let cut = pending.iter().position(|&b| b == b'\r' || b == b'\n')?;
        let mut drop = 1;
        if let Some(&next) = pending.get(cut + 1) {
            if (next == b'\r' || next == b'\n') && next != pending[cut] {
                drop = 2;
            }
        }
        let line = String::from_utf8_lossy(&pending[..cut]).into_owned();
        pending.drain(..cut + drop);
        if !line.trim().is_empty() {
            return Some(line);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_take_framed_line_splits_on_cr_and_lf() {
        let mut buf = b"SC 00\rI>\nrest".to_vec();
        assert_eq!(take_framed_line(&mut buf).as_deref(), Some("SC 00"));
        assert_eq!(take_framed_line(&mut buf).as_deref(), Some("I>"));
        assert_eq!(take_framed_line(&mut buf), None);
        assert_eq!(buf, b"rest");
    }

    #[test]
    fn test_take_framed_line_consumes_crlf_pair_once() {
        let mut buf = b"one\r\ntwo\r\n".to_vec();
        assert_eq!(take_framed_line(&mut buf).as_deref(), Some("one"));
        assert_eq!(take_framed_line(&mut buf).as_deref(), Some("two"));
        assert_eq!(take_framed_line(&mut buf), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_take_framed_line_skips_blank_lines() {
        let mut buf = b"\r\n   \rdata\r".to_vec();
        assert_eq!(take_framed_line(&mut buf).as_deref(), Some("data"));
    }

    #[test]
    fn test_take_framed_line_keeps_partial_line() {
        let mut buf = b"incomplete".to_vec();
        assert_eq!(take_framed_line(&mut buf), None);
        assert_eq!(buf, b"incomplete");
    }

    #[tokio::test]
    async fn test_write_line_appends_terminator() {
        let (host, mut device) = tokio::io::duplex(256);
        let transport = SerialTransport::from_stream(host);

        transport.write_line("S").await.unwrap();

        let mut buf = [0u8; 8];
        let n = device.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"S\r");
    }

    #[tokio::test]
    async fn test_write_line_does_not_double_terminate() {
        let (host, mut device) = tokio::io::duplex(256);
        let transport = SerialTransport::from_stream(host);

        transport.write_line("I\r").await.unwrap();

        let mut buf = [0u8; 8];
        let n = device.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"I\r");
    }

    #[tokio::test]
    async fn test_reader_frames_device_lines() {
        let (host, mut device) = tokio::io::duplex(256);
        let transport = SerialTransport::from_stream(host);

        tokio::io::AsyncWriteExt::write_all(&mut device, b"SC 01\r\nO>\r\n")
            .await
            .unwrap();

        let first = transport.read_line(Duration::from_secs(1)).await.unwrap();
        let second = transport.read_line(Duration::from_secs(1)).await.unwrap();
        assert_eq!(first, "SC 01");
        assert_eq!(second, "O>");
    }

    #[tokio::test]
    async fn test_read_line_times_out_when_device_is_silent() {
        let (host, _device) = tokio::io::duplex(256);
        let transport = SerialTransport::from_stream(host);

        let err = transport.read_line(Duration::from_millis(20)).await;
        assert!(matches!(err, Err(TransportError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_writes_fail_after_close() {
        let (host, _device) = tokio::io::duplex(256);
        let transport = SerialTransport::from_stream(host);

        transport.close().await;
        assert!(matches!(
            transport.write_bytes(b"x").await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_drain_lines_collects_pending_output() {
        let (host, mut device) = tokio::io::duplex(256);
        let transport = SerialTransport::from_stream(host);

        tokio::io::AsyncWriteExt::write_all(&mut device, b"a\rb\r")
            .await
            .unwrap();
        // Let the reader task frame both lines.
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(transport.drain_lines(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(transport.pending_lines(), 0);
    }
}
