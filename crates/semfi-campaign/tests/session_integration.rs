//! Integration tests for the transport + SEM session stack over an
//! in-memory link.
//!
//! A scripted device task plays the SEM monitor's side of the dialogue on
//! the far end of a `tokio::io::duplex` pipe, which is exactly how the
//! campaign drives a real serial port (the transport is generic over the
//! byte stream).  The tests pin down the two disciplines that must never
//! mix:
//!
//! - blocking setup calls wait for prompt sentinels and honour timeouts;
//! - the injection path performs one write, zero reads, and returns
//!   immediately, while concurrent blocking calls still get coherent
//!   answers off the shared line queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

use semfi_campaign::domain::CampaignConfig;
use semfi_campaign::infrastructure::sem::{ProtocolError, SemSession};
use semfi_campaign::infrastructure::transport::SerialTransport;
use semfi_core::Mode;

fn test_config() -> CampaignConfig {
    CampaignConfig {
        prompt_timeout_s: 0.5,
        status_window_s: 0.15,
        ..CampaignConfig::default()
    }
}

/// Scripted monitor: echoes injection commands, answers status queries with
/// counter pairs, and confirms mode commands with the matching sentinel.
async fn scripted_monitor(device: DuplexStream) {
    let (read_half, mut write_half) = tokio::io::split(device);
    let mut commands = BufReader::new(read_half).split(b'\r');

    let mut prompt = "I>";
    while let Ok(Some(raw)) = commands.next_segment().await {
        let command = String::from_utf8_lossy(&raw).trim().to_string();
        let reply = match command.bytes().next() {
            None => format!("{prompt}\r\n"),
            Some(b'I') => {
                prompt = "I>";
                format!("{prompt}\r\n")
            }
            Some(b'O') => {
                prompt = "O>";
                format!("{prompt}\r\n")
            }
            Some(b'S') => format!("MS 08\r\nFC 00\r\n{prompt}\r\n"),
            // Injection: echo the command line only.  The campaign never
            // reads this; it must end up drained by the background reader.
            Some(b'N') => format!("{command}\r\n"),
            Some(_) => format!("{prompt}\r\n"),
        };
        if write_half.write_all(reply.as_bytes()).await.is_err() {
            break;
        }
    }
}

fn connect_scripted() -> Arc<SerialTransport> {
    let (host, device) = tokio::io::duplex(4096);
    tokio::spawn(scripted_monitor(device));
    Arc::new(SerialTransport::from_stream(host))
}

#[tokio::test]
async fn connect_syncs_prompt_and_passes_preflight() {
    let config = test_config();
    let session = SemSession::connect(connect_scripted(), &config)
        .await
        .expect("connect should succeed against a responsive monitor");
    assert_eq!(session.mode(), Mode::Idle);
}

#[tokio::test]
async fn status_interleaved_with_injections_gets_a_clean_answer() {
    let config = test_config();
    let session = Arc::new(
        SemSession::connect(connect_scripted(), &config)
            .await
            .expect("connect"),
    );

    // Hammer injections from a second task while status runs.
    let injector = Arc::clone(&session);
    let burst = tokio::spawn(async move {
        for i in 0..50u32 {
            injector
                .inject(&format!("{:010X}", i))
                .await
                .expect("inject");
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    });

    let status = session.status().await.expect("status");
    burst.await.unwrap();

    // The status answer contains the monitor's counter pairs and nothing
    // shaped like an injection echo, despite the interleaved writes.
    assert_eq!(status.get("MS"), Some("08"));
    assert_eq!(status.get("FC"), Some("00"));
    for (name, value) in status.iter() {
        assert_ne!(name, "N ");
        assert!(!value.contains("N "));
    }
}

#[tokio::test]
async fn injection_path_never_consumes_responses() {
    let config = test_config();
    let session = SemSession::connect(connect_scripted(), &config)
        .await
        .expect("connect");
    let transport = session.transport();
    transport.drain_lines();

    for i in 0..10u32 {
        session.inject(&format!("{:010X}", i)).await.expect("inject");
    }
    // Give the scripted monitor time to echo everything back.
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Every echo is still queued: the injection path read nothing.
    assert_eq!(transport.pending_lines(), 10);
}

#[tokio::test]
async fn mode_transitions_follow_commands() {
    let config = test_config();
    let mut session = SemSession::connect(connect_scripted(), &config)
        .await
        .expect("connect");

    session.goto_observe().await.expect("goto_observe");
    assert_eq!(session.mode(), Mode::Observe);

    session.goto_idle().await.expect("goto_idle");
    assert_eq!(session.mode(), Mode::Idle);
}

#[tokio::test]
async fn silent_monitor_fails_connect_with_timeout() {
    let (host, _device) = tokio::io::duplex(4096);
    let transport = Arc::new(SerialTransport::from_stream(host));

    let config = CampaignConfig {
        prompt_timeout_s: 0.05,
        ..test_config()
    };
    let err = SemSession::connect(transport, &config).await;
    assert!(matches!(err, Err(ProtocolError::PromptTimeout { .. })));
}

/// A monitor that prints prompts but never answers status queries: the
/// preflight outcome then depends on the `preflight_required` flag.
async fn prompt_only_monitor(device: DuplexStream) {
    let (read_half, mut write_half) = tokio::io::split(device);
    let mut commands = BufReader::new(read_half).split(b'\r');
    while let Ok(Some(_)) = commands.next_segment().await {
        if write_half.write_all(b"I>\r\n").await.is_err() {
            break;
        }
    }
}

#[tokio::test]
async fn failed_preflight_aborts_when_required() {
    let (host, device) = tokio::io::duplex(4096);
    tokio::spawn(prompt_only_monitor(device));
    let transport = Arc::new(SerialTransport::from_stream(host));

    let config = CampaignConfig {
        preflight_required: true,
        ..test_config()
    };
    let err = SemSession::connect(transport, &config).await;
    assert!(matches!(err, Err(ProtocolError::PreflightFailed(_))));
}

#[tokio::test]
async fn failed_preflight_tolerated_when_not_required() {
    let (host, device) = tokio::io::duplex(4096);
    tokio::spawn(prompt_only_monitor(device));
    let transport = Arc::new(SerialTransport::from_stream(host));

    let config = CampaignConfig {
        preflight_required: false,
        ..test_config()
    };
    let session = SemSession::connect(transport, &config).await;
    assert!(session.is_ok(), "preflight failure must only warn here");
}
