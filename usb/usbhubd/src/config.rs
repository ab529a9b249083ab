use serde::Deserialize;

use crate::HubError;

/// Driver settings, usually embedded as TOML by the host stack.
///
/// ```toml
/// device_max = 4
/// output_level = "warn"
/// file_level = "debug"
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Addresses `1..=device_max` belong to plain devices; hubs are numbered after them.
    pub device_max: u8,
    pub output_level: log::LevelFilter,
    pub file_level: log::LevelFilter,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            device_max: 4,
            output_level: common::output_level(),
            file_level: common::file_level(),
        }
    }
}

impl HubConfig {
    pub fn from_toml(s: &str) -> Result<Self, HubError> {
        Ok(toml::from_str(s)?)
    }

    /// Installs the process logger for a hub driver instance named `name`.
    pub fn setup_logging(&self, name: &str) -> Result<(), log::SetLoggerError> {
        common::setup_logging("usb", "hub", name, self.output_level, self.file_level)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_full() {
        let config = HubConfig::from_toml(
            r#"
            device_max = 8
            output_level = "warn"
            file_level = "DEBUG"
            "#,
        )
        .unwrap();
        assert_eq!(config.device_max, 8);
        assert_eq!(config.output_level, log::LevelFilter::Warn);
        assert_eq!(config.file_level, log::LevelFilter::Debug);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = HubConfig::from_toml("device_max = 2").unwrap();
        assert_eq!(config.device_max, 2);
        assert_eq!(config.output_level, common::output_level());
    }

    #[test]
    fn reject_bad_values() {
        assert!(matches!(
            HubConfig::from_toml("device_max = 300"),
            Err(HubError::Config(_))
        ));
        assert!(HubConfig::from_toml("output_level = \"loud\"").is_err());
    }
}
