//! Scripted connector/transport and a manually driven scheduler.
//!
//! The connector replays a per-attempt script: each connect either fails or
//! opens a transport that serves a fixed list of frames and then either
//! closes or stays open until the manager tears it down. The scheduler
//! records every reconnect delay and only lets the pump proceed when the test
//! has granted a permit, so reconnect timing is fully deterministic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use bancaire_console::stream::{Scheduler, StreamConnector, StreamTransport, TransportError};

/// What one connect attempt should do.
pub enum ConnectScript {
    /// Fail the transport open.
    Fail(&'static str),
    /// Open, serve these frames in order, then close (peer-initiated).
    OpenThenClose(Vec<String>),
    /// Open, serve these frames, then stay open until disconnected.
    OpenAndHold(Vec<String>),
}

struct MockTransport {
    frames: VecDeque<String>,
    hold_open: bool,
    sent: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl StreamTransport for MockTransport {
    async fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        self.sent
            .lock()
            .expect("sent log lock")
            .push(frame.to_string());
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        if let Some(frame) = self.frames.pop_front() {
            return Some(Ok(frame));
        }
        if self.hold_open {
            // Stay open; the manager's disconnect branch wins the select.
            std::future::pending::<()>().await;
        }
        None
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector replaying a script of connect attempts.
///
/// Once the script is exhausted, further connect attempts hang forever so a
/// runaway reconnect loop is visible as a stuck attempt counter rather than
/// a busy spin.
pub struct MockConnector {
    script: Mutex<VecDeque<ConnectScript>>,
    attempts: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new(script: Vec<ConnectScript>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            attempts: Arc::new(AtomicUsize::new(0)),
            sent: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of connect attempts made so far.
    pub fn attempts(&self) -> Arc<AtomicUsize> {
        self.attempts.clone()
    }

    /// Every frame sent by the manager, across all transports.
    pub fn sent(&self) -> Arc<Mutex<Vec<String>>> {
        self.sent.clone()
    }

    /// Number of explicit transport closes.
    pub fn closes(&self) -> Arc<AtomicUsize> {
        self.closes.clone()
    }
}

#[async_trait]
impl StreamConnector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn StreamTransport>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().expect("script lock").pop_front();
        match step {
            Some(ConnectScript::Fail(reason)) => Err(TransportError::Connect(reason.to_string())),
            Some(ConnectScript::OpenThenClose(frames)) => Ok(Box::new(MockTransport {
                frames: frames.into(),
                hold_open: false,
                sent: self.sent.clone(),
                closes: self.closes.clone(),
            })),
            Some(ConnectScript::OpenAndHold(frames)) => Ok(Box::new(MockTransport {
                frames: frames.into(),
                hold_open: true,
                sent: self.sent.clone(),
                closes: self.closes.clone(),
            })),
            None => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

/// Scheduler that records delays and waits for a test-granted permit.
#[derive(Clone)]
pub struct ManualScheduler {
    waits: Arc<Mutex<Vec<Duration>>>,
    permits: Arc<Semaphore>,
}

impl ManualScheduler {
    /// `allowed` reconnect waits resolve immediately; later ones block until
    /// [`release`](Self::release) is called.
    pub fn new(allowed: usize) -> Self {
        Self {
            waits: Arc::new(Mutex::new(Vec::new())),
            permits: Arc::new(Semaphore::new(allowed)),
        }
    }

    /// Delays the pump has asked to wait out so far.
    pub fn waits(&self) -> Arc<Mutex<Vec<Duration>>> {
        self.waits.clone()
    }

    /// Let one pending (or future) reconnect wait complete.
    pub fn release(&self) {
        self.permits.add_permits(1);
    }
}

#[async_trait]
impl Scheduler for ManualScheduler {
    async fn wait(&self, delay: Duration) {
        self.waits.lock().expect("waits lock").push(delay);
        match self.permits.acquire().await {
            Ok(permit) => permit.forget(),
            // Semaphore never closes; keep the pump parked if it somehow does.
            Err(_) => std::future::pending::<()>().await,
        }
    }
}
