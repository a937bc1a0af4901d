//! # motorterm
//!
//! A serial terminal core for talking to motor controllers.
//!
//! This library provides async control of a serial link with three ways of
//! sending: manual sends from a text/hex send area, periodic repetition, and
//! streaming of generated waveform samples.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Event-driven notification of port state, inbound data and telemetry
//! - Cursor-stable text/hex editing helpers
//! - Mutually exclusive, cancelable send schedulers
//! - Decoding of `[M]:<command>,<value>` telemetry frames
//!
//! ## Quick Start
//!
//! ```no_run
//! use motorterm::{Event, MotorCommand, SerialConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), motorterm::Error> {
//!     let session = Session::serial();
//!     let mut events = session.subscribe();
//!
//!     session.open(SerialConfig::new("/dev/ttyUSB0").baud_rate(115_200)).await?;
//!     session.send_motor(MotorCommand::Connect).await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let Event::Telemetry(status) = event {
//!             println!("motor: {status:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`codec`] - Text/hex conversion, send buffer and receive rendering
//! - [`protocol`] - Telemetry frames and motor commands
//! - [`types`] - Motor status and byte counters
//! - [`waveform`] - Sample generation for point streaming
//! - [`scheduler`] - Periodic and point-stream schedulers
//! - [`transport`] - Transport implementations (serial and in-memory)
//! - [`event`] - Async event system for session notifications
//! - [`session`] - The [`Session`] handle and its state-owning task
//! - [`config`] - Settings snapshot and port selection

pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod protocol;
pub mod scheduler;
pub mod session;
pub mod transport;
pub mod types;
pub mod waveform;

// Re-exports for convenience
pub use codec::{ReceiveLog, ReceiveOptions, SendBuffer, SendMode};
pub use config::{MemoryStore, Settings, SettingsStore, choose_port};
pub use error::{
    CodecError, Error, ProtocolError, Result, TransportError, ValidationError,
};
pub use event::{Event, EventDispatcher, EventFilter, EventKind, Subscription};
pub use protocol::{MotorCommand, TelemetryFrame};
pub use scheduler::{SchedulerKind, SchedulerStatus, StreamPhase, parse_interval_ms};
pub use session::{Session, SessionState};
pub use transport::{
    MockTransport, SerialConfig, SerialTransport, Transport, TransportEvent, list_ports,
};
pub use types::{MotorDirection, SessionStats, SpeedRange, TelemetryStatus};
pub use waveform::{Sample, WaveformKind, WaveformSpec, generate};
