//! In-memory transport for tests and demos.
//!
//! [`MockTransport`] records every write and lets a [`MockHandle`] inject
//! inbound data and errors as if they came from a device.
//!
//! ```
//! use motorterm::transport::MockTransport;
//!
//! let (transport, handle) = MockTransport::new();
//! handle.set_accept_limit(Some(0)); // every write is refused
//! # drop(transport);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::transport::{SerialConfig, Transport, TransportEvent, TransportFuture};

#[derive(Debug, Default)]
struct MockState {
    open: bool,
    config: Option<SerialConfig>,
    events: Option<mpsc::Sender<TransportEvent>>,
    writes: Vec<Bytes>,
    fail_next_open: Option<TransportError>,
    fail_next_write: Option<TransportError>,
    fail_next_lines: Option<TransportError>,
    accept_limit: Option<usize>,
    lines: Option<(bool, bool)>,
    open_count: usize,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    // A panicking test thread must not poison the other side.
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Transport that talks to memory instead of a device.
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// Test-side control of a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Creates a closed mock and its control handle.
    #[must_use]
    pub fn new() -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockHandle { state },
        )
    }
}

impl Transport for MockTransport {
    fn open(
        &mut self,
        config: &SerialConfig,
        events: mpsc::Sender<TransportEvent>,
    ) -> TransportFuture<'_, ()> {
        let config = config.clone();
        Box::pin(async move {
            let mut state = lock(&self.state);
            if let Some(err) = state.fail_next_open.take() {
                return Err(err);
            }
            match state.fail_next_lines.take() {
                Some(err) => {
                    let _ = events.try_send(TransportEvent::Error(err));
                }
                None => state.lines = Some((config.rts, config.dtr)),
            }
            state.config = Some(config);
            state.events = Some(events);
            state.open = true;
            state.open_count += 1;
            Ok(())
        })
    }

    fn close(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            state.open = false;
            state.events = None;
            Ok(())
        })
    }

    fn write(&mut self, data: Bytes) -> TransportFuture<'_, usize> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            if !state.open {
                return Err(TransportError::NotOpen);
            }
            if let Some(err) = state.fail_next_write.take() {
                return Err(err);
            }
            let accepted = state.accept_limit.map_or(data.len(), |l| l.min(data.len()));
            if accepted > 0 {
                state.writes.push(data.slice(..accepted));
            }
            Ok(accepted)
        })
    }

    fn set_flow_control(&mut self, rts: bool, dtr: bool) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            if !state.open {
                return Err(TransportError::NotOpen);
            }
            if let Some(err) = state.fail_next_lines.take() {
                return Err(err);
            }
            state.lines = Some((rts, dtr));
            Ok(())
        })
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }
}

impl MockHandle {
    /// Every accepted write, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<Bytes> {
        lock(&self.state).writes.clone()
    }

    /// Forgets recorded writes.
    pub fn clear_writes(&self) {
        lock(&self.state).writes.clear();
    }

    /// Returns true while the transport is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// Number of successful opens.
    #[must_use]
    pub fn open_count(&self) -> usize {
        lock(&self.state).open_count
    }

    /// Configuration of the most recent open.
    #[must_use]
    pub fn config(&self) -> Option<SerialConfig> {
        lock(&self.state).config.clone()
    }

    /// Last RTS/DTR levels applied.
    #[must_use]
    pub fn lines(&self) -> Option<(bool, bool)> {
        lock(&self.state).lines
    }

    /// Makes the next open fail with `err`.
    pub fn fail_next_open(&self, err: TransportError) {
        lock(&self.state).fail_next_open = Some(err);
    }

    /// Makes the next write fail with `err`.
    pub fn fail_next_write(&self, err: TransportError) {
        lock(&self.state).fail_next_write = Some(err);
    }

    /// Makes the next RTS/DTR change fail with `err`.
    ///
    /// At open the port still opens and the error arrives as an inbound
    /// event.
    pub fn fail_next_lines(&self, err: TransportError) {
        lock(&self.state).fail_next_lines = Some(err);
    }

    /// Caps how many bytes each write accepts; `None` accepts everything.
    pub fn set_accept_limit(&self, limit: Option<usize>) {
        lock(&self.state).accept_limit = limit;
    }

    /// Delivers bytes as if read from the device.
    ///
    /// Returns false if the transport is closed or the channel is full.
    pub fn inject_data(&self, data: impl Into<Bytes>) -> bool {
        self.inject(TransportEvent::Data(data.into()))
    }

    /// Delivers a read-side error.
    ///
    /// Returns false if the transport is closed or the channel is full.
    pub fn inject_error(&self, err: TransportError) -> bool {
        self.inject(TransportEvent::Error(err))
    }

    fn inject(&self, event: TransportEvent) -> bool {
        let state = lock(&self.state);
        state
            .events
            .as_ref()
            .is_some_and(|events| events.try_send(event).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_writes() {
        let (mut transport, handle) = MockTransport::new();
        let (tx, mut rx) = mpsc::channel(4);

        assert_eq!(
            transport.write(Bytes::from_static(b"early")).await,
            Err(TransportError::NotOpen)
        );

        let config = SerialConfig::new("mock").lines(true, false);
        transport.open(&config, tx).await.unwrap();
        assert!(handle.is_open());
        assert_eq!(handle.lines(), Some((true, false)));

        assert_eq!(transport.write(Bytes::from_static(b"abc")).await, Ok(3));
        handle.set_accept_limit(Some(1));
        assert_eq!(transport.write(Bytes::from_static(b"xyz")).await, Ok(1));
        handle.set_accept_limit(Some(0));
        assert_eq!(transport.write(Bytes::from_static(b"zzz")).await, Ok(0));
        assert_eq!(
            handle.writes(),
            vec![Bytes::from_static(b"abc"), Bytes::from_static(b"x")]
        );

        assert!(handle.inject_data(&b"hi"[..]));
        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::Data(Bytes::from_static(b"hi")))
        );

        transport.close().await.unwrap();
        assert!(!transport.is_open());
        assert!(!handle.inject_data(&b"late"[..]));
    }

    #[tokio::test]
    async fn test_mock_failures() {
        let (mut transport, handle) = MockTransport::new();
        let (tx, _rx) = mpsc::channel(4);

        handle.fail_next_open(TransportError::PermissionDenied("busy".into()));
        let err = transport
            .open(&SerialConfig::new("mock"), tx.clone())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(!transport.is_open());

        transport.open(&SerialConfig::new("mock"), tx).await.unwrap();
        handle.fail_next_write(TransportError::WriteFailed("timeout".into()));
        assert!(transport.write(Bytes::from_static(b"a")).await.is_err());
        assert_eq!(transport.write(Bytes::from_static(b"a")).await, Ok(1));
        assert_eq!(handle.open_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_lines_failure() {
        let (mut transport, handle) = MockTransport::new();
        let (tx, mut rx) = mpsc::channel(4);
        let failure = TransportError::LinesFailed("ioctl".into());

        handle.fail_next_lines(failure.clone());
        let config = SerialConfig::new("mock").lines(true, true);
        transport.open(&config, tx).await.unwrap();
        assert!(transport.is_open());
        assert_eq!(handle.lines(), None);
        assert_eq!(rx.recv().await, Some(TransportEvent::Error(failure.clone())));

        handle.fail_next_lines(failure.clone());
        assert_eq!(transport.set_flow_control(true, false).await, Err(failure));
        assert_eq!(transport.set_flow_control(true, false).await, Ok(()));
        assert_eq!(handle.lines(), Some((true, false)));
    }
}
