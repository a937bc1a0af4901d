//! The serial session.
//!
//! A [`Session`] is a cheap handle to a background task that owns the
//! transport, the byte counters, the pause flag and the scheduler slot.
//! Every method is a message to that task, so inbound bytes, timer ticks
//! and caller requests never race each other.
//!
//! ```no_run
//! use motorterm::{MotorCommand, SerialConfig, Session, WaveformKind, WaveformSpec};
//!
//! # async fn demo() -> motorterm::Result<()> {
//! let session = Session::serial();
//! session.open(SerialConfig::new("/dev/ttyUSB0")).await?;
//! session.send_motor(MotorCommand::Connect).await?;
//!
//! let spec = WaveformSpec::new(WaveformKind::Sine).range(0.0, 1.0).step(0.01);
//! session.start_point_stream(&spec, 20).await?;
//! # Ok(())
//! # }
//! ```

mod actor;

use std::marker::PhantomData;
use std::path::Path;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::codec::{SendBuffer, SendMode};
use crate::error::{Error, Result, ValidationError};
use crate::event::{EventDispatcher, EventFilter, Subscription};
use crate::protocol::MotorCommand;
use crate::scheduler::{PeriodicTask, PointStream, SchedulerStatus};
use crate::transport::{SerialConfig, SerialTransport, Transport};
use crate::types::SessionStats;
use crate::waveform::WaveformSpec;

use actor::{Actor, Command};

/// Capacity of the command channel.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Events buffered per subscriber.
const EVENT_CAPACITY: usize = 256;

/// Snapshot of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    /// True while the port is open.
    pub open: bool,
    /// True while inbound data is being dropped.
    pub paused: bool,
    /// Byte counters.
    pub stats: SessionStats,
    /// Scheduler slot.
    pub scheduler: SchedulerStatus,
}

/// Handle to a serial session.
pub struct Session<T> {
    commands: mpsc::Sender<Command>,
    dispatcher: EventDispatcher,
    task: JoinHandle<()>,
    _transport: PhantomData<fn() -> T>,
}

impl Session<SerialTransport> {
    /// Creates a closed session over a serial port.
    #[must_use]
    pub fn serial() -> Self {
        Self::new(SerialTransport::new())
    }
}

impl<T: Transport + 'static> Session<T> {
    /// Creates a closed session over `transport` and starts its task.
    ///
    /// Must be called inside a Tokio runtime.
    #[must_use]
    pub fn new(transport: T) -> Self {
        let dispatcher = EventDispatcher::new(EVENT_CAPACITY);
        let (commands, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let task = tokio::spawn(Actor::new(transport, dispatcher.clone(), rx).run());
        Self {
            commands,
            dispatcher,
            task,
            _transport: PhantomData,
        }
    }
}

impl<T> Session<T> {
    async fn call<R>(&self, build: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| Error::ChannelClosed)?;
        response.await.map_err(|_| Error::ChannelClosed)
    }

    /// Opens the port described by `config`.
    ///
    /// An open port is closed and reopened with the new settings. Refused
    /// while a scheduler runs.
    pub async fn open(&self, config: SerialConfig) -> Result<()> {
        self.call(|reply| Command::Open { config, reply }).await?
    }

    /// Closes the port and stops any running scheduler. Idempotent.
    pub async fn close(&self) -> Result<()> {
        self.call(|reply| Command::Close { reply }).await
    }

    /// Writes raw bytes, returning how many the device accepted.
    pub async fn write(&self, data: impl Into<Bytes>) -> Result<usize> {
        let data = data.into();
        self.call(|reply| Command::Write { data, reply }).await?
    }

    /// Sends the contents of a send buffer.
    pub async fn send(&self, buffer: &SendBuffer, mode: SendMode) -> Result<usize> {
        let payload = buffer.payload(mode)?;
        self.write(payload).await
    }

    /// Sends the raw contents of a file.
    pub async fn send_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        if data.is_empty() {
            return Err(ValidationError::EmptyPayload.into());
        }
        tracing::debug!("sending {} bytes from {}", data.len(), path.display());
        self.write(data).await
    }

    /// Sends a motor controller command.
    pub async fn send_motor(&self, command: MotorCommand) -> Result<usize> {
        self.write(command.encode()).await
    }

    /// Drops inbound data without counting it while `paused` is true.
    pub async fn pause(&self, paused: bool) -> Result<()> {
        self.call(|reply| Command::Pause { paused, reply }).await
    }

    /// Drives RTS and DTR. Applied at the next open when the port is closed.
    pub async fn set_flow_control(&self, rts: bool, dtr: bool) -> Result<()> {
        self.call(|reply| Command::FlowControl { rts, dtr, reply })
            .await?
    }

    /// Returns the byte counters.
    pub async fn stats(&self) -> Result<SessionStats> {
        Ok(self.state().await?.stats)
    }

    /// Zeroes the byte counters.
    pub async fn reset_stats(&self) -> Result<()> {
        self.call(|reply| Command::ResetStats { reply }).await
    }

    /// Returns a snapshot of the session.
    pub async fn state(&self) -> Result<SessionState> {
        self.call(|reply| Command::State { reply }).await
    }

    /// Sends `provider()` every `interval_ms` milliseconds.
    ///
    /// Replaces a running periodic send. Refused while a point stream runs.
    pub async fn start_periodic<F>(&self, interval_ms: u32, provider: F) -> Result<()>
    where
        F: FnMut() -> Result<Bytes> + Send + 'static,
    {
        let task = PeriodicTask::new(interval_ms, Box::new(provider))?;
        self.call(|reply| Command::StartPeriodic { task, reply })
            .await?
    }

    /// Sends a snapshot of `buffer` every `interval_ms` milliseconds.
    ///
    /// The payload is taken once; later edits to the buffer are not picked up.
    pub async fn start_periodic_buffer(
        &self,
        interval_ms: u32,
        buffer: &SendBuffer,
        mode: SendMode,
    ) -> Result<()> {
        let payload = buffer.payload(mode)?;
        self.start_periodic(interval_ms, move || Ok(payload.clone()))
            .await
    }

    /// Stops periodic sending. Idempotent.
    pub async fn stop_periodic(&self) -> Result<()> {
        self.call(|reply| Command::StopPeriodic { reply }).await
    }

    /// Streams the samples of `spec`, one per tick.
    ///
    /// Replaces a running point stream. Refused while periodic sending runs.
    pub async fn start_point_stream(&self, spec: &WaveformSpec, interval_ms: u32) -> Result<()> {
        let stream = PointStream::new(spec, interval_ms)?;
        self.call(|reply| Command::StartPointStream { stream, reply })
            .await?
    }

    /// Stops the point stream. Samples already sent stay sent.
    pub async fn cancel_point_stream(&self) -> Result<()> {
        self.call(|reply| Command::CancelPointStream { reply })
            .await
    }

    /// Subscribes to all session events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.dispatcher.subscribe(None)
    }

    /// Subscribes to the events accepted by `filter`.
    #[must_use]
    pub fn subscribe_filtered(&self, filter: EventFilter) -> Subscription {
        self.dispatcher.subscribe(Some(filter))
    }

    /// Closes the port and waits for the session task to finish.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            tracing::warn!("session task ended abnormally: {}", e);
        }
    }
}
