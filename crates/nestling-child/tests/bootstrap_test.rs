//! End-to-end tests of the child bootstrap through its public API.
//!
//! Each test publishes a stage-1 handshake on a fresh pipe under its own
//! variable name, then runs the whole sequence with host networking.

#![allow(unsafe_code, clippy::expect_used, clippy::unwrap_used)]

use std::fs::File;
use std::os::fd::IntoRawFd;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use nestling_child::ChildOptions;
use nestling_common::error::ChildError;
use nestling_common::types::{HandshakeMessage, PortConfig};
use nestling_common::wire;
use nestling_core::driver::{PortDriver, PortFuture, StopSignal};

fn publish_configured(key: &str, port: PortConfig) {
    let (read, write) = nix::unistd::pipe().unwrap();
    let mut writer = File::from(write);
    let msg = HandshakeMessage {
        stage: 1,
        state_dir: "/run/nestling".into(),
        port,
        ..HandshakeMessage::default()
    };
    wire::write_message(&mut writer, &msg).unwrap();
    // Ownership passes to the bootstrap, which closes it.
    let fd = read.into_raw_fd();
    // SAFETY: each test uses its own variable name.
    unsafe { std::env::set_var(key, fd.to_string()) };
}

/// Port driver that records when it was asked to stop and what it received.
struct TimingPort {
    stopped_at: Arc<Mutex<Option<Instant>>>,
    payload: Arc<Mutex<Option<PortConfig>>>,
}

impl PortDriver for TimingPort {
    fn run(&self, payload: PortConfig, stop: StopSignal) -> PortFuture {
        let stopped_at = Arc::clone(&self.stopped_at);
        let seen = Arc::clone(&self.payload);
        Box::pin(async move {
            *seen.lock().unwrap() = Some(payload);
            stop.stopped().await;
            *stopped_at.lock().unwrap() = Some(Instant::now());
            Ok(())
        })
    }
}

#[test]
fn true_without_drivers_succeeds() {
    let key = "NESTLING_E2E_TRUE";
    publish_configured(key, PortConfig::default());
    nestling_child::run(&ChildOptions::new(key, vec!["/bin/true".into()])).unwrap();
}

#[test]
fn false_reports_exit_code() {
    let key = "NESTLING_E2E_FALSE";
    publish_configured(key, PortConfig::default());
    let err = nestling_child::run(&ChildOptions::new(key, vec!["false".into()])).unwrap_err();
    assert!(matches!(err, ChildError::Command { .. }));
    assert_eq!(err.exit_code(), Some(1));
}

#[test]
fn port_driver_stops_after_command_exits() {
    let key = "NESTLING_E2E_PORT";
    let mut opaque = std::collections::BTreeMap::new();
    let _ = opaque.insert("socket".to_string(), "/run/nestling/port.sock".to_string());
    let port = PortConfig {
        opaque: opaque.clone(),
    };
    publish_configured(key, port);

    let stopped_at = Arc::new(Mutex::new(None));
    let payload = Arc::new(Mutex::new(None));
    let driver = TimingPort {
        stopped_at: Arc::clone(&stopped_at),
        payload: Arc::clone(&payload),
    };
    let opts = ChildOptions::new(key, vec!["sh".into(), "-c".into(), "sleep 0.1".into()])
        .with_port_driver(Arc::new(driver));

    let started = Instant::now();
    nestling_child::run(&opts).unwrap();

    let stopped = stopped_at.lock().unwrap().expect("driver was stopped");
    assert!(stopped.duration_since(started) >= Duration::from_millis(100));
    assert_eq!(payload.lock().unwrap().as_ref().map(|p| &p.opaque), Some(&opaque));
}
