//! SEM protocol session: the mode state machine over the transport.
//!
//! This layer owns *when* commands are sent and what confirmations are
//! awaited; the wire formats themselves live in `semfi_core::protocol`.
//! Two disciplines coexist and must never be mixed up:
//!
//! - **Blocking setup calls** (`sync_prompt`, `goto_idle`, `goto_observe`,
//!   `status`): send a command, then wait on the transport's line queue for
//!   the matching prompt sentinel, bounded by the configured timeout.
//!   Failures here are fatal to campaign startup.
//! - **Fire-and-forget injection** (`inject`): format, write, return
//!   [`Enqueued`].  No read ever happens on this path; whatever the monitor
//!   prints is drained by the transport's background reader.  A write
//!   failure is reported to the caller and counted as a failed injection,
//!   never retried.

use std::sync::Arc;
use std::time::Duration;

use semfi_core::protocol::sem::{self, SemStatus};
use semfi_core::protocol::{Enqueued, Mode, Prompt};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::CampaignConfig;
use crate::infrastructure::transport::{SerialTransport, TransportError};

/// Poll slice used while collecting lines towards a deadline.
const COLLECT_SLICE: Duration = Duration::from_millis(50);

/// Error type for SEM protocol operations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A blocking call did not observe the expected prompt in time.
    /// The session's mode is left unchanged.
    #[error("timed out after {timeout:?} waiting for {expected} prompt")]
    PromptTimeout {
        expected: &'static str,
        timeout: Duration,
    },

    /// The transport failed underneath a protocol operation.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The preflight verification failed and the configuration requires it.
    #[error("SEM preflight failed: {0}")]
    PreflightFailed(String),
}

/// Stateful session with the SEM monitor.
///
/// Tracks the last mode the monitor *confirmed* via a prompt sentinel; the
/// session never assumes a mode it has not seen proven on the wire.
pub struct SemSession {
    transport: Arc<SerialTransport>,
    mode: Mode,
    prompt_timeout: Duration,
    status_window: Duration,
}

impl SemSession {
    /// Wraps an already-open transport.  The mode starts out unknown until
    /// [`sync_prompt`](Self::sync_prompt) observes a sentinel.
    pub fn new(transport: Arc<SerialTransport>, config: &CampaignConfig) -> Self {
        Self {
            transport,
            mode: Mode::Unknown,
            prompt_timeout: config.prompt_timeout(),
            status_window: config.status_window(),
        }
    }

    /// Aligns an already-open link with the monitor's prompt and runs the
    /// preflight status probe.
    ///
    /// # Errors
    ///
    /// Any failure here prevents the campaign from starting, except a
    /// preflight failure with `preflight_required = false`, which is logged
    /// and tolerated.  The caller keeps ownership of the transport and is
    /// responsible for closing it on error.
    pub async fn connect(
        transport: Arc<SerialTransport>,
        config: &CampaignConfig,
    ) -> Result<Self, ProtocolError> {
        let mut session = SemSession::new(transport, config);
        session.sync_prompt().await?;

        match session.preflight().await {
            Ok(status) => {
                info!(fields = status.len(), "SEM preflight ok");
            }
            Err(e) if config.preflight_required => {
                return Err(e);
            }
            Err(e) => {
                warn!(error = %e, "SEM preflight failed, continuing without verification");
            }
        }
        Ok(session)
    }

    /// Last mode the monitor confirmed.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Shared handle to the underlying transport (for the register backend,
    /// which writes its binary commands over the same link).
    pub fn transport(&self) -> Arc<SerialTransport> {
        Arc::clone(&self.transport)
    }

    /// Sends a neutral probe and drains lines until any recognised prompt
    /// appears, establishing a known starting state.  Called once at
    /// connection setup.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::PromptTimeout`] if no sentinel arrives in time.
    pub async fn sync_prompt(&mut self) -> Result<Mode, ProtocolError> {
        // Stale output from before this session is meaningless here.
        self.transport.drain_lines();
        // A bare terminator makes the monitor reprint its prompt.
        self.transport.write_line("").await?;

        let prompt = self.wait_for_any_prompt().await?;
        self.mode = prompt.mode();
        debug!(mode = %self.mode, "prompt sync complete");
        Ok(self.mode)
    }

    /// Commands the monitor into Idle and waits for the `I>` sentinel.
    ///
    /// Returns every line observed during the transition (banners, status
    /// codes, the prompt itself) for diagnostic logging.
    pub async fn goto_idle(&mut self) -> Result<Vec<String>, ProtocolError> {
        self.transition(sem::CMD_IDLE, Prompt::Idle).await
    }

    /// Commands the monitor into Observation and waits for the `O>` sentinel.
    pub async fn goto_observe(&mut self) -> Result<Vec<String>, ProtocolError> {
        self.transition(sem::CMD_OBSERVE, Prompt::Observe).await
    }

    /// Queries the status report and parses the returned counter pairs.
    ///
    /// Collects a short fixed window of lines; the tolerant pair parse in
    /// [`SemStatus`] skips echoes, banners and prompts, so interleaved
    /// injection responses cannot masquerade as an answer.
    pub async fn status(&self) -> Result<SemStatus, ProtocolError> {
        self.transport.write_line(sem::CMD_STATUS).await?;
        let lines = self.collect_window(self.status_window).await;
        let status = SemStatus::from_lines(lines.iter().map(String::as_str));
        debug!(fields = status.len(), "status query complete");
        Ok(status)
    }

    /// The campaign-critical primitive: writes `N <address>` and returns
    /// immediately with [`Enqueued`].
    ///
    /// This method performs exactly one write and zero reads.  Any response
    /// correlated to this command is consumed later, and only by the
    /// transport's background reader.
    pub async fn inject(&self, address: &str) -> Result<Enqueued, ProtocolError> {
        self.transport
            .write_line(&sem::inject_command(address))
            .await?;
        Ok(Enqueued)
    }

    /// Sends an arbitrary raw command line.  Diagnostics seam for console
    /// tooling; never used by the scheduling loop.
    pub async fn passthrough(&self, raw: &str) -> Result<(), ProtocolError> {
        self.transport.write_line(raw).await?;
        Ok(())
    }

    /// One-time blocking verification that the monitor answers a status
    /// query with at least one counter pair.
    async fn preflight(&self) -> Result<SemStatus, ProtocolError> {
        let status = self.status().await?;
        if status.is_empty() {
            return Err(ProtocolError::PreflightFailed(
                "no response to status query; check the hardware connection".to_string(),
            ));
        }
        Ok(status)
    }

    async fn transition(
        &mut self,
        command: &str,
        want: Prompt,
    ) -> Result<Vec<String>, ProtocolError> {
        self.transport.write_line(command).await?;

        let deadline = Instant::now() + self.prompt_timeout;
        let mut observed = Vec::new();
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(ProtocolError::PromptTimeout {
                    expected: want.sentinel(),
                    timeout: self.prompt_timeout,
                });
            }
            let slice = COLLECT_SLICE.min(deadline - now);
            if let Ok(line) = self.transport.read_line(slice).await {
                let matched = Prompt::parse(&line) == Some(want);
                observed.push(line);
                if matched {
                    self.mode = want.mode();
                    debug!(mode = %self.mode, lines = observed.len(), "mode transition complete");
                    return Ok(observed);
                }
            }
        }
    }

    async fn wait_for_any_prompt(&self) -> Result<Prompt, ProtocolError> {
        let deadline = Instant::now() + self.prompt_timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(ProtocolError::PromptTimeout {
                    expected: "any",
                    timeout: self.prompt_timeout,
                });
            }
            let slice = COLLECT_SLICE.min(deadline - now);
            if let Ok(line) = self.transport.read_line(slice).await {
                if let Some(prompt) = Prompt::parse(&line) {
                    return Ok(prompt);
                }
            }
        }
    }

    /// Collects every line that arrives within a fixed window.  Used for
    /// self-delimited responses like the status report.
    async fn collect_window(&self, window: Duration) -> Vec<String> {
        let deadline = Instant::now() + window;
        let mut lines = Vec::new();
        loop {
            let now = Instant::now();
            if now >= deadline {
                return lines;
            }
            let slice = COLLECT_SLICE.min(deadline - now);
            if let Ok(line) = self.transport.read_line(slice).await {
                lines.push(line);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn test_config() -> CampaignConfig {
        CampaignConfig {
            prompt_timeout_s: 0.2,
            status_window_s: 0.1,
            ..CampaignConfig::default()
        }
    }

    fn session_over_duplex() -> (SemSession, tokio::io::DuplexStream) {
        let (host, device) = tokio::io::duplex(1024);
        let transport = Arc::new(SerialTransport::from_stream(host));
        (SemSession::new(transport, &test_config()), device)
    }

    #[tokio::test]
    async fn test_goto_observe_blocks_until_sentinel() {
        let (mut session, mut device) = session_over_duplex();

        let driver = tokio::spawn(async move {
            // Banner first, sentinel a little later.
            tokio::time::sleep(Duration::from_millis(20)).await;
            device.write_all(b"SC 08\r\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            device.write_all(b"O>\r\n").await.unwrap();
            device
        });

        let lines = session.goto_observe().await.unwrap();
        assert_eq!(session.mode(), Mode::Observe);
        assert_eq!(lines.last().map(String::as_str), Some("O>"));
        driver.await.unwrap();
    }

    #[tokio::test]
    async fn test_goto_observe_timeout_leaves_mode_unchanged() {
        let (mut session, _device) = session_over_duplex();
        assert_eq!(session.mode(), Mode::Unknown);

        let err = session.goto_observe().await;
        assert!(matches!(
            err,
            Err(ProtocolError::PromptTimeout { expected: "O>", .. })
        ));
        assert_eq!(session.mode(), Mode::Unknown);
    }

    #[tokio::test]
    async fn test_inject_performs_one_write_and_zero_reads() {
        let (session, mut device) = session_over_duplex();

        // Preload a response the injection path must NOT consume.
        device.write_all(b"SC 00\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = std::time::Instant::now();
        session.inject("0000001234").await.unwrap();
        // Fire-and-forget: returns without waiting on the device.
        assert!(started.elapsed() < Duration::from_millis(50));

        let mut buf = [0u8; 32];
        let n = tokio::io::AsyncReadExt::read(&mut device, &mut buf)
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"N 0000001234\r");

        // The preloaded line is still in the queue: inject read nothing.
        assert_eq!(session.transport().pending_lines(), 1);
    }

    #[tokio::test]
    async fn test_sync_prompt_sets_mode_from_sentinel() {
        let (mut session, mut device) = session_over_duplex();

        let driver = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            device.write_all(b"I>\r\n").await.unwrap();
            device
        });

        let mode = session.sync_prompt().await.unwrap();
        assert_eq!(mode, Mode::Idle);
        assert_eq!(session.mode(), Mode::Idle);
        driver.await.unwrap();
    }

    #[tokio::test]
    async fn test_sync_prompt_maps_detect_only_to_unknown() {
        let (mut session, mut device) = session_over_duplex();

        let driver = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            device.write_all(b"D>\r\n").await.unwrap();
            device
        });

        let mode = session.sync_prompt().await.unwrap();
        assert_eq!(mode, Mode::Unknown);
        driver.await.unwrap();
    }

    #[tokio::test]
    async fn test_status_parses_pairs_and_skips_echoes() {
        let (session, mut device) = session_over_duplex();

        let driver = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            device
                .write_all(b"S\r\nSC 08\r\nFC 00\r\nO>\r\n")
                .await
                .unwrap();
            device
        });

        let status = session.status().await.unwrap();
        assert_eq!(status.get("SC"), Some("08"));
        assert_eq!(status.get("FC"), Some("00"));
        assert_eq!(status.len(), 2);
        driver.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_against_stub_device_passes_preflight() {
        let config = CampaignConfig {
            debug: true,
            ..test_config()
        };
        let transport = Arc::new(crate::infrastructure::transport::connect_from_config(&config).unwrap());
        let session = SemSession::connect(transport, &config).await.unwrap();
        // The stub boots in observation, so the sync sees O>.
        assert_eq!(session.mode(), Mode::Observe);
    }

    #[tokio::test]
    async fn test_connect_fails_when_preflight_required_and_device_silent() {
        let (host, _device) = tokio::io::duplex(1024);
        let transport = Arc::new(SerialTransport::from_stream(host));
        let err = SemSession::connect(transport, &test_config()).await;
        // The silent device never prints a prompt, so the sync times out.
        assert!(matches!(err, Err(ProtocolError::PromptTimeout { .. })));
    }
}
