//! Settings snapshot types.

use serde::{Deserialize, Serialize};

use crate::codec::display::DEFAULT_RECEIVE_LIMIT;
use crate::codec::{ReceiveLog, ReceiveOptions, SendMode};
use crate::error::ValidationError;
use crate::transport::{DataBits, Parity, SerialConfig, StopBits};

/// Value of a selectable serial option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Whole number (baud rate, data bits, stop bits).
    Int(i64),
    /// Fractional number (1.5 stop bits).
    Float(f64),
    /// Code such as a parity letter.
    Text(String),
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// One entry of an option list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialOption {
    /// Value handed to the port.
    pub value: OptionValue,
    /// Label shown to the user.
    pub text: String,
    /// True for entries added by the user.
    #[serde(default)]
    pub is_custom: bool,
}

impl SerialOption {
    fn builtin(value: impl Into<OptionValue>, text: &str) -> Self {
        Self {
            value: value.into(),
            text: text.to_owned(),
            is_custom: false,
        }
    }
}

/// Option list selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionCategory {
    /// Baud rates.
    Baudrates,
    /// Parity modes.
    Parities,
    /// Data bit counts.
    Databits,
    /// Stop bit counts.
    Stopbits,
}

/// Choices offered for each serial parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialOptions {
    /// Baud rates.
    pub baudrates: Vec<SerialOption>,
    /// Parity modes.
    pub parities: Vec<SerialOption>,
    /// Data bit counts.
    pub databits: Vec<SerialOption>,
    /// Stop bit counts.
    pub stopbits: Vec<SerialOption>,
}

impl Default for SerialOptions {
    fn default() -> Self {
        Self {
            baudrates: [9600_i64, 19200, 38400, 57600, 115_200]
                .into_iter()
                .map(|rate| SerialOption::builtin(rate, &rate.to_string()))
                .collect(),
            parities: vec![
                SerialOption::builtin("N", "None"),
                SerialOption::builtin("O", "Odd"),
                SerialOption::builtin("E", "Even"),
            ],
            databits: [8_i64, 7, 6, 5]
                .into_iter()
                .map(|bits| SerialOption::builtin(bits, &bits.to_string()))
                .collect(),
            stopbits: vec![
                SerialOption::builtin(1_i64, "1"),
                SerialOption::builtin(1.5, "1.5"),
                SerialOption::builtin(2_i64, "2"),
            ],
        }
    }
}

impl SerialOptions {
    /// Options of one category.
    #[must_use]
    pub fn options(&self, category: OptionCategory) -> &[SerialOption] {
        match category {
            OptionCategory::Baudrates => &self.baudrates,
            OptionCategory::Parities => &self.parities,
            OptionCategory::Databits => &self.databits,
            OptionCategory::Stopbits => &self.stopbits,
        }
    }

    fn options_mut(&mut self, category: OptionCategory) -> &mut Vec<SerialOption> {
        match category {
            OptionCategory::Baudrates => &mut self.baudrates,
            OptionCategory::Parities => &mut self.parities,
            OptionCategory::Databits => &mut self.databits,
            OptionCategory::Stopbits => &mut self.stopbits,
        }
    }

    /// Appends a user option. Returns false if the value is already listed.
    pub fn add_custom_option(
        &mut self,
        category: OptionCategory,
        value: impl Into<OptionValue>,
        text: impl Into<String>,
    ) -> bool {
        let value = value.into();
        let options = self.options_mut(category);
        if options.iter().any(|option| option.value == value) {
            return false;
        }
        options.push(SerialOption {
            value,
            text: text.into(),
            is_custom: true,
        });
        true
    }
}

/// Last used port parameters, stored as shown in the selectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Port name.
    pub port: String,
    /// Baud rate.
    pub baudrate: String,
    /// Parity, as a code or a name.
    pub parity: String,
    /// Data bits.
    pub databits: String,
    /// Stop bits.
    pub stopbits: String,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: String::new(),
            baudrate: "115200".into(),
            parity: "None".into(),
            databits: "8".into(),
            stopbits: "1".into(),
        }
    }
}

fn invalid(field: &'static str, value: &str) -> ValidationError {
    ValidationError::InvalidSetting {
        field,
        value: value.to_owned(),
    }
}

impl SerialSettings {
    /// Records the parameters of `config`.
    #[must_use]
    pub fn from_config(config: &SerialConfig) -> Self {
        let parity = match config.parity {
            Parity::None => "None",
            Parity::Odd => "Odd",
            Parity::Even => "Even",
        };
        Self {
            port: config.port.clone(),
            baudrate: config.baud_rate.to_string(),
            parity: parity.into(),
            databits: config.data_bits.bits().to_string(),
            stopbits: config.stop_bits.to_string(),
        }
    }

    /// Builds a port configuration for `port` from the stored parameters.
    pub fn to_config(&self, port: impl Into<String>) -> Result<SerialConfig, ValidationError> {
        let baud_rate = self
            .baudrate
            .trim()
            .parse::<u32>()
            .map_err(|_| invalid("baudrate", &self.baudrate))?;
        let parity = self
            .parity
            .parse::<Parity>()
            .map_err(|_| invalid("parity", &self.parity))?;
        let data_bits = self
            .databits
            .trim()
            .parse::<u8>()
            .ok()
            .and_then(DataBits::from_bits)
            .ok_or_else(|| invalid("databits", &self.databits))?;
        let stop_bits = self
            .stopbits
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(StopBits::from_value)
            .ok_or_else(|| invalid("stopbits", &self.stopbits))?;

        Ok(SerialConfig::new(port)
            .baud_rate(baud_rate)
            .parity(parity)
            .data_bits(data_bits)
            .stop_bits(stop_bits))
    }
}

/// Send area preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SendSettings {
    /// Send the hex field instead of the text.
    pub hex_send: bool,
    /// Keep the hex field synced to the text.
    pub send_sync: bool,
    /// Clear the send area after sending.
    pub auto_clear_send: bool,
}

impl SendSettings {
    /// Mode matching the hex checkbox.
    #[must_use]
    pub const fn mode(&self) -> SendMode {
        if self.hex_send {
            SendMode::Hex
        } else {
            SendMode::Text
        }
    }
}

/// Receive area preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiveSettings {
    /// Show inbound data as hex.
    pub hex_receive: bool,
    /// Prefix chunks with the local time.
    pub timestamp: bool,
    /// Clear the log once it grows past its limit.
    pub auto_clear_receive: bool,
}

impl ReceiveSettings {
    /// Rendering options for the receive log.
    #[must_use]
    pub const fn options(&self) -> ReceiveOptions {
        ReceiveOptions {
            hex: self.hex_receive,
            timestamp: self.timestamp,
        }
    }

    /// An empty receive log set up with these preferences.
    #[must_use]
    pub fn log(&self) -> ReceiveLog {
        let log = ReceiveLog::new(self.options());
        if self.auto_clear_receive {
            log.auto_clear(DEFAULT_RECEIVE_LIMIT)
        } else {
            log
        }
    }
}

/// Modem line levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowControlSettings {
    /// Request To Send.
    pub rts: bool,
    /// Data Terminal Ready.
    pub dtr: bool,
}

/// Remembered file locations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePaths {
    /// Where the receive log was last saved.
    pub receive_save: String,
    /// File last chosen for sending.
    pub send_file: String,
}

/// Everything the user last chose.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    /// Port parameters.
    pub serial: SerialSettings,
    /// Send preferences.
    pub send: SendSettings,
    /// Receive preferences.
    pub receive: ReceiveSettings,
    /// RTS/DTR levels.
    pub flow_control: FlowControlSettings,
    /// File locations.
    pub file_paths: FilePaths,
}
