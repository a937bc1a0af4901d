//! Settings snapshot.
//!
//! The terminal remembers its option lists and the user's last choices as
//! one JSON document. Where the document lives is up to the embedding
//! application; it plugs in through [`SettingsStore`].

mod settings;

pub use settings::{
    FilePaths, FlowControlSettings, OptionCategory, OptionValue, ReceiveSettings, SendSettings,
    SerialOption, SerialOptions, SerialSettings, UserSettings,
};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::transport::SerialConfig;

/// The full snapshot: option lists plus user choices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Choices offered per serial parameter.
    pub serial_config: SerialOptions,
    /// What the user last picked.
    pub user_settings: UserSettings,
}

impl Settings {
    /// Serializes the snapshot as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a snapshot. Missing sections take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads from `store`, falling back to defaults when nothing usable is
    /// stored.
    pub fn load_or_default(store: &impl SettingsStore) -> Self {
        match store.load() {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!("discarding stored settings: {}", e);
                Self::default()
            }
        }
    }

    /// Port configuration from the stored choices.
    ///
    /// Picks the saved port when it is present, otherwise the first
    /// available one. `None` when no port is available.
    pub fn connection_config(&self, available: &[String]) -> Result<Option<SerialConfig>> {
        let serial = &self.user_settings.serial;
        let Some(port) = choose_port(&serial.port, available) else {
            return Ok(None);
        };
        let lines = self.user_settings.flow_control;
        let config = serial.to_config(port)?.lines(lines.rts, lines.dtr);
        Ok(Some(config))
    }

    /// Remembers the parameters of a port that was just opened.
    pub fn remember_connection(&mut self, config: &SerialConfig) {
        self.user_settings.serial = SerialSettings::from_config(config);
        self.user_settings.flow_control = FlowControlSettings {
            rts: config.rts,
            dtr: config.dtr,
        };
    }
}

/// Returns `saved` if it is available, otherwise the first available port.
#[must_use]
pub fn choose_port(saved: &str, available: &[String]) -> Option<String> {
    if !saved.is_empty() && available.iter().any(|port| port == saved) {
        return Some(saved.to_owned());
    }
    available.first().cloned()
}

/// Somewhere a settings snapshot can be kept.
pub trait SettingsStore {
    /// Returns the stored snapshot, `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<Settings>>;

    /// Replaces the stored snapshot.
    fn save(&mut self, settings: &Settings) -> Result<()>;
}

/// Store that keeps the serialized snapshot in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    json: Option<String>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self { json: None }
    }

    /// Creates a store holding raw JSON.
    #[must_use]
    pub fn with_json(json: impl Into<String>) -> Self {
        Self {
            json: Some(json.into()),
        }
    }

    /// The stored JSON, if any.
    #[must_use]
    pub fn json(&self) -> Option<&str> {
        self.json.as_deref()
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Option<Settings>> {
        self.json.as_deref().map(Settings::from_json).transpose()
    }

    fn save(&mut self, settings: &Settings) -> Result<()> {
        self.json = Some(settings.to_json()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SendMode;
    use crate::error::{Error, ValidationError};
    use crate::transport::{DataBits, Parity, StopBits};

    fn ports(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    #[test]
    fn test_default_options() {
        let options = SerialOptions::default();
        assert_eq!(options.baudrates.len(), 5);
        assert_eq!(options.baudrates[4].value, OptionValue::Int(115_200));
        assert_eq!(options.parities[0].value, OptionValue::Text("N".into()));
        assert_eq!(options.stopbits[1].value, OptionValue::Float(1.5));
        assert!(
            options
                .options(OptionCategory::Databits)
                .iter()
                .all(|o| !o.is_custom)
        );
    }

    #[test]
    fn test_add_custom_option() {
        let mut options = SerialOptions::default();
        assert!(!options.add_custom_option(OptionCategory::Baudrates, 9600_i64, "9600"));
        assert!(options.add_custom_option(OptionCategory::Baudrates, 250_000_i64, "250000"));

        let added = options.options(OptionCategory::Baudrates).last().unwrap();
        assert_eq!(added.value, OptionValue::Int(250_000));
        assert!(added.is_custom);
    }

    #[test]
    fn test_json_shape() {
        let json = Settings::default().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["serial_config"]["baudrates"][0]["value"], 9600);
        assert_eq!(value["serial_config"]["stopbits"][1]["value"], 1.5);
        assert_eq!(value["serial_config"]["parities"][2]["value"], "E");
        assert_eq!(value["user_settings"]["serial"]["baudrate"], "115200");
        assert_eq!(value["user_settings"]["flow_control"]["rts"], false);
        assert_eq!(value["user_settings"]["file_paths"]["send_file"], "");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = Settings::from_json(
            r#"{"user_settings": {"serial": {"port": "COM4"}, "send": {"hex_send": true}}}"#,
        )
        .unwrap();

        assert_eq!(settings.user_settings.serial.port, "COM4");
        assert_eq!(settings.user_settings.serial.baudrate, "115200");
        assert_eq!(settings.user_settings.send.mode(), SendMode::Hex);
        assert_eq!(settings.serial_config, SerialOptions::default());
    }

    #[test]
    fn test_to_config() {
        let serial = SerialSettings {
            port: "ignored".into(),
            baudrate: "9600".into(),
            parity: "E".into(),
            databits: "7".into(),
            stopbits: "1.5".into(),
        };
        let config = serial.to_config("/dev/ttyACM0").unwrap();
        assert_eq!(config.port, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.data_bits, DataBits::Seven);
        assert_eq!(config.stop_bits, StopBits::OneAndHalf);

        let bad = SerialSettings {
            databits: "9".into(),
            ..SerialSettings::default()
        };
        assert_eq!(
            bad.to_config("COM1").unwrap_err(),
            ValidationError::InvalidSetting {
                field: "databits",
                value: "9".into()
            }
        );
    }

    #[test]
    fn test_remember_connection() {
        let config = SerialConfig::new("COM7")
            .baud_rate(57600)
            .parity(Parity::Odd)
            .stop_bits(StopBits::Two)
            .lines(true, true);
        let mut settings = Settings::default();
        settings.remember_connection(&config);

        let restored = settings
            .connection_config(&ports(&["COM1", "COM7"]))
            .unwrap()
            .unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_choose_port() {
        let available = ports(&["COM1", "COM3"]);
        assert_eq!(choose_port("COM3", &available), Some("COM3".into()));
        assert_eq!(choose_port("COM9", &available), Some("COM1".into()));
        assert_eq!(choose_port("", &available), Some("COM1".into()));
        assert_eq!(choose_port("COM3", &[]), None);

        assert_eq!(Settings::default().connection_config(&[]).unwrap(), None);
    }

    #[test]
    fn test_receive_log_from_settings() {
        let receive = ReceiveSettings {
            hex_receive: true,
            timestamp: false,
            auto_clear_receive: true,
        };
        let mut log = receive.log();
        log.append(b"AB");
        assert_eq!(log.text(), "41 42 ");
        assert!(log.append(&vec![0u8; 512 * 1024]));
        assert_eq!(log.text(), "");
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(Settings::load_or_default(&store), Settings::default());

        let mut settings = Settings::default();
        settings.user_settings.receive.timestamp = true;
        settings.user_settings.file_paths.send_file = "/tmp/wave.bin".into();
        store.save(&settings).unwrap();
        assert_eq!(Settings::load_or_default(&store), settings);

        let corrupt = MemoryStore::with_json("{not json");
        assert!(matches!(corrupt.load(), Err(Error::Settings(_))));
        assert_eq!(Settings::load_or_default(&corrupt), Settings::default());
    }
}
