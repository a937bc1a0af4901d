//! Serial/USB transport implementation.
//!
//! Opening a port spawns one task that owns the [`SerialStream`]. The task
//! forwards everything it reads as [`TransportEvent`]s and serves write and
//! flow-control requests sent from [`SerialTransport`], so reads and writes
//! never contend for a lock.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialPortType, SerialStream};

use crate::error::{IoDirection, TransportError};
use crate::transport::{Transport, TransportEvent, TransportFuture};

/// Default baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Size of one read from the device.
const READ_BUFFER_SIZE: usize = 1024;

const REQUEST_CHANNEL_SIZE: usize = 32;

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataBits {
    /// 5 bits.
    Five,
    /// 6 bits.
    Six,
    /// 7 bits.
    Seven,
    /// 8 bits.
    #[default]
    Eight,
}

impl DataBits {
    /// Maps a bit count, `None` outside 5..=8.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            5 => Some(Self::Five),
            6 => Some(Self::Six),
            7 => Some(Self::Seven),
            8 => Some(Self::Eight),
            _ => None,
        }
    }

    /// Bit count.
    #[must_use]
    pub const fn bits(&self) -> u8 {
        match self {
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => Self::Five,
            DataBits::Six => Self::Six,
            DataBits::Seven => Self::Seven,
            DataBits::Eight => Self::Eight,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

impl Parity {
    /// Single-letter code (`N`, `O`, `E`).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::None => "N",
            Self::Odd => "O",
            Self::Even => "E",
        }
    }
}

impl FromStr for Parity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" | "none" => Ok(Self::None),
            "o" | "odd" => Ok(Self::Odd),
            "e" | "even" => Ok(Self::Even),
            other => Err(format!("unknown parity {other:?}")),
        }
    }
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => Self::None,
            Parity::Odd => Self::Odd,
            Parity::Even => Self::Even,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StopBits {
    /// One stop bit.
    #[default]
    One,
    /// One and a half stop bits. Listed in settings but not supported by
    /// the serial backend; opening with it fails.
    OneAndHalf,
    /// Two stop bits.
    Two,
}

impl StopBits {
    /// Maps a stop-bit count such as `1`, `1.5` or `2`.
    #[must_use]
    pub fn from_value(value: f64) -> Option<Self> {
        if (value - 1.0).abs() < f64::EPSILON {
            Some(Self::One)
        } else if (value - 1.5).abs() < f64::EPSILON {
            Some(Self::OneAndHalf)
        } else if (value - 2.0).abs() < f64::EPSILON {
            Some(Self::Two)
        } else {
            None
        }
    }

    /// Backend setting, `None` for [`StopBits::OneAndHalf`].
    #[must_use]
    pub const fn to_serial(self) -> Option<tokio_serial::StopBits> {
        match self {
            Self::One => Some(tokio_serial::StopBits::One),
            Self::OneAndHalf => None,
            Self::Two => Some(tokio_serial::StopBits::Two),
        }
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => f.write_str("1"),
            Self::OneAndHalf => f.write_str("1.5"),
            Self::Two => f.write_str("2"),
        }
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// XON/XOFF.
    Software,
    /// RTS/CTS.
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => Self::None,
            FlowControl::Software => Self::Software,
            FlowControl::Hardware => Self::Hardware,
        }
    }
}

/// Configuration for serial transport.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Data bits.
    pub data_bits: DataBits,
    /// Parity.
    pub parity: Parity,
    /// Stop bits.
    pub stop_bits: StopBits,
    /// Flow control.
    pub flow_control: FlowControl,
    /// RTS level applied on open.
    pub rts: bool,
    /// DTR level applied on open.
    pub dtr: bool,
}

impl SerialConfig {
    /// Creates a new serial configuration with default settings (115200 8N1).
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            flow_control: FlowControl::default(),
            rts: false,
            dtr: false,
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the data bits.
    #[must_use]
    pub const fn data_bits(mut self, bits: DataBits) -> Self {
        self.data_bits = bits;
        self
    }

    /// Sets the parity.
    #[must_use]
    pub const fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Sets the stop bits.
    #[must_use]
    pub const fn stop_bits(mut self, bits: StopBits) -> Self {
        self.stop_bits = bits;
        self
    }

    /// Sets the flow control mode.
    #[must_use]
    pub const fn flow_control(mut self, flow: FlowControl) -> Self {
        self.flow_control = flow;
        self
    }

    /// Sets the RTS and DTR levels applied on open.
    #[must_use]
    pub const fn lines(mut self, rts: bool, dtr: bool) -> Self {
        self.rts = rts;
        self.dtr = dtr;
        self
    }
}

impl fmt::Display for SerialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} baud ({}{}{})",
            self.port,
            self.baud_rate,
            self.data_bits.bits(),
            self.parity.code(),
            self.stop_bits
        )
    }
}

enum PortRequest {
    Write {
        data: Bytes,
        reply: oneshot::Sender<Result<usize, TransportError>>,
    },
    Lines {
        rts: bool,
        dtr: bool,
        reply: oneshot::Sender<Result<(), TransportError>>,
    },
}

/// Serial transport backed by `tokio-serial`.
#[derive(Default)]
pub struct SerialTransport {
    requests: Option<mpsc::Sender<PortRequest>>,
    task: Option<JoinHandle<()>>,
}

impl SerialTransport {
    /// Creates a closed transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn port_gone() -> TransportError {
        TransportError::ResourceLost("serial port task ended".into())
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, TransportError>>) -> PortRequest,
    ) -> Result<T, TransportError> {
        let requests = self.requests.as_ref().ok_or(TransportError::NotOpen)?;
        let (reply, response) = oneshot::channel();
        requests
            .send(build(reply))
            .await
            .map_err(|_| Self::port_gone())?;
        response.await.map_err(|_| Self::port_gone())?
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Transport for SerialTransport {
    fn open(
        &mut self,
        config: &SerialConfig,
        events: mpsc::Sender<TransportEvent>,
    ) -> TransportFuture<'_, ()> {
        let config = config.clone();
        Box::pin(async move {
            if self.is_open() {
                self.close().await?;
            }

            let stop_bits = config.stop_bits.to_serial().ok_or_else(|| {
                TransportError::OpenFailed(format!("{} stop bits not supported", config.stop_bits))
            })?;

            tracing::info!("opening serial port {}", config);

            let mut stream = tokio_serial::new(&config.port, config.baud_rate)
                .data_bits(config.data_bits.into())
                .parity(config.parity.into())
                .stop_bits(stop_bits)
                .flow_control(config.flow_control.into())
                .open_native_async()
                .map_err(|e| TransportError::from_serial(&e))?;

            // The port stays open; the session reports the failure.
            if let Err(e) = set_lines(&mut stream, config.rts, config.dtr) {
                tracing::warn!("{}", e);
                let _ = events.try_send(TransportEvent::Error(e));
            }

            let (tx, rx) = mpsc::channel(REQUEST_CHANNEL_SIZE);
            self.task = Some(tokio::spawn(run_port(stream, rx, events)));
            self.requests = Some(tx);

            tracing::info!("serial port {} open", config.port);
            Ok(())
        })
    }

    fn close(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.requests = None;
            if let Some(task) = self.task.take() {
                tracing::info!("closing serial port");
                task.abort();
                // Wait until the stream is dropped so the device can be reopened.
                let _ = task.await;
            }
            Ok(())
        })
    }

    fn write(&mut self, data: Bytes) -> TransportFuture<'_, usize> {
        Box::pin(async move {
            tracing::trace!("writing {} bytes", data.len());
            self.request(|reply| PortRequest::Write { data, reply })
                .await
        })
    }

    fn set_flow_control(&mut self, rts: bool, dtr: bool) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.request(|reply| PortRequest::Lines { rts, dtr, reply })
                .await
        })
    }

    fn is_open(&self) -> bool {
        self.requests.is_some()
    }
}

fn set_lines(stream: &mut SerialStream, rts: bool, dtr: bool) -> Result<(), TransportError> {
    stream
        .write_request_to_send(rts)
        .and_then(|()| stream.write_data_terminal_ready(dtr))
        .map_err(|e| TransportError::LinesFailed(e.description))
}

async fn write_payload(stream: &mut SerialStream, data: &[u8]) -> Result<usize, TransportError> {
    let classify = |e: std::io::Error| TransportError::from_io(IoDirection::Write, &e);
    stream.write_all(data).await.map_err(classify)?;
    stream.flush().await.map_err(classify)?;
    Ok(data.len())
}

/// Owns the stream until the transport closes or the device fails.
async fn run_port(
    mut stream: SerialStream,
    mut requests: mpsc::Receiver<PortRequest>,
    events: mpsc::Sender<TransportEvent>,
) {
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            request = requests.recv() => {
                let Some(request) = request else {
                    tracing::debug!("serial request channel closed");
                    break;
                };
                match request {
                    PortRequest::Write { data, reply } => {
                        let _ = reply.send(write_payload(&mut stream, &data).await);
                    }
                    PortRequest::Lines { rts, dtr, reply } => {
                        let _ = reply.send(set_lines(&mut stream, rts, dtr));
                    }
                }
            }
            read = stream.read(&mut buf) => {
                let event = match read {
                    Ok(0) => TransportEvent::Error(TransportError::ResourceLost(
                        "serial port closed".into(),
                    )),
                    Ok(n) => {
                        tracing::trace!("received {} bytes", n);
                        TransportEvent::Data(Bytes::copy_from_slice(&buf[..n]))
                    }
                    Err(e) => {
                        tracing::error!("serial read error: {}", e);
                        TransportEvent::Error(TransportError::from_io(IoDirection::Read, &e))
                    }
                };
                let fatal = matches!(&event, TransportEvent::Error(e) if e.is_fatal());
                if events.send(event).await.is_err() {
                    tracing::debug!("transport event receiver dropped");
                    break;
                }
                if fatal {
                    break;
                }
            }
        }
    }
}

/// Bus a port is attached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// USB device.
    Usb,
    /// PCI device.
    Pci,
    /// Bluetooth device.
    Bluetooth,
    /// Anything else.
    Unknown,
}

/// A serial port present on the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3").
    pub name: String,
    /// Attachment kind.
    pub kind: PortKind,
    /// Product description, when known.
    pub description: Option<String>,
    /// Manufacturer, when known.
    pub manufacturer: Option<String>,
    /// Serial number, when known.
    pub serial_number: Option<String>,
    /// USB vendor id.
    pub vid: Option<u16>,
    /// USB product id.
    pub pid: Option<u16>,
}

impl From<tokio_serial::SerialPortInfo> for PortInfo {
    fn from(info: tokio_serial::SerialPortInfo) -> Self {
        let mut port = Self {
            name: info.port_name,
            kind: PortKind::Unknown,
            description: None,
            manufacturer: None,
            serial_number: None,
            vid: None,
            pid: None,
        };
        match info.port_type {
            SerialPortType::UsbPort(usb) => {
                port.kind = PortKind::Usb;
                port.description = usb.product;
                port.manufacturer = usb.manufacturer;
                port.serial_number = usb.serial_number;
                port.vid = Some(usb.vid);
                port.pid = Some(usb.pid);
            }
            SerialPortType::PciPort => port.kind = PortKind::Pci,
            SerialPortType::BluetoothPort => port.kind = PortKind::Bluetooth,
            SerialPortType::Unknown => {}
        }
        port
    }
}

/// Lists available serial ports.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> Result<Vec<PortInfo>, TransportError> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| TransportError::Unknown(e.description))?;
    Ok(ports.into_iter().map(PortInfo::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0");
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert!(!config.rts && !config.dtr);
        assert_eq!(config.to_string(), "/dev/ttyUSB0 @ 115200 baud (8N1)");
    }

    #[test]
    fn test_serial_config_builder() {
        let config = SerialConfig::new("COM3")
            .baud_rate(9600)
            .data_bits(DataBits::Seven)
            .parity(Parity::Even)
            .stop_bits(StopBits::Two)
            .flow_control(FlowControl::Hardware)
            .lines(true, false);
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.flow_control, FlowControl::Hardware);
        assert!(config.rts);
        assert_eq!(config.to_string(), "COM3 @ 9600 baud (7E2)");
    }

    #[test]
    fn test_setting_conversions() {
        assert_eq!(DataBits::from_bits(5), Some(DataBits::Five));
        assert_eq!(DataBits::from_bits(9), None);
        assert_eq!("O".parse::<Parity>(), Ok(Parity::Odd));
        assert_eq!("even".parse::<Parity>(), Ok(Parity::Even));
        assert!("mark".parse::<Parity>().is_err());
        assert_eq!(StopBits::from_value(1.5), Some(StopBits::OneAndHalf));
        assert_eq!(StopBits::from_value(3.0), None);
        assert_eq!(StopBits::OneAndHalf.to_serial(), None);
        assert_eq!(StopBits::Two.to_serial(), Some(tokio_serial::StopBits::Two));
    }

    #[tokio::test]
    async fn test_closed_transport() {
        let mut transport = SerialTransport::new();
        assert!(!transport.is_open());
        assert_eq!(
            transport.write(Bytes::from_static(b"x")).await,
            Err(TransportError::NotOpen)
        );
        assert_eq!(
            transport.set_flow_control(true, true).await,
            Err(TransportError::NotOpen)
        );
        assert_eq!(transport.close().await, Ok(()));
    }

    #[tokio::test]
    async fn test_one_and_half_stop_bits_rejected() {
        let (tx, _rx) = mpsc::channel(1);
        let mut transport = SerialTransport::new();
        let config = SerialConfig::new("/dev/ttyUSB0").stop_bits(StopBits::OneAndHalf);
        let err = transport.open(&config, tx).await.unwrap_err();
        assert!(matches!(err, TransportError::OpenFailed(_)));
        assert!(!transport.is_open());
    }

    #[test]
    #[ignore = "Requires /sys/class/tty - not available in sandboxed builds"]
    fn test_list_ports() {
        // Just verify it doesn't panic
        let _ = list_ports();
    }
}
