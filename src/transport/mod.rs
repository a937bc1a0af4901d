//! Transport layer for the serial link.
//!
//! A [`Transport`] owns the device handle. Inbound data is pushed by the
//! transport into the channel passed to [`Transport::open`], so the session
//! never polls for reads.

pub mod mock;
pub mod serial;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Boxed future returned by transport operations.
pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Something the transport observed on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Bytes arrived from the device.
    Data(Bytes),
    /// The read side failed.
    Error(TransportError),
}

/// Trait for transport implementations.
pub trait Transport: Send {
    /// Opens the device, reporting inbound traffic on `events`.
    ///
    /// Configured RTS/DTR levels are applied as part of opening.
    fn open(
        &mut self,
        config: &SerialConfig,
        events: mpsc::Sender<TransportEvent>,
    ) -> TransportFuture<'_, ()>;

    /// Releases the device. Closing a closed transport succeeds.
    fn close(&mut self) -> TransportFuture<'_, ()>;

    /// Writes `data`, returning how many bytes the device accepted.
    fn write(&mut self, data: Bytes) -> TransportFuture<'_, usize>;

    /// Drives the RTS and DTR lines.
    fn set_flow_control(&mut self, rts: bool, dtr: bool) -> TransportFuture<'_, ()>;

    /// Returns true while the device is open.
    fn is_open(&self) -> bool;
}

pub use mock::{MockHandle, MockTransport};
pub use serial::{
    DataBits, FlowControl, Parity, PortInfo, SerialConfig, SerialTransport, StopBits, list_ports,
};
