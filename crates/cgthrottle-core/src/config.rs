//! Throttle configuration model, parsing, and validation.
//!
//! The JSON document maps arbitrary class labels to lists of quota entries:
//!
//! ```json
//! { "Classes": { "gold": [
//!     { "Devices": ["/dev/sda"], "ThrottleReadBps": "50M", "ThrottleWriteIOPS": "800" }
//! ] } }
//! ```
//!
//! Throttle fields that are omitted, `null`, or empty default to `"max"`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use cgthrottle_common::constants::DEFAULT_THROTTLE_VALUE;
use cgthrottle_common::error::{Result, ThrottleError};

/// Root of a throttle configuration.
///
/// Classes are kept in a sorted map, so they are always applied in
/// lexicographic order of their labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Quota entries grouped by class label.
    #[serde(rename = "Classes", default)]
    pub classes: BTreeMap<String, Vec<QuotaConfig>>,
}

/// One set of throttle values shared by a list of devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Device node paths the values apply to.
    #[serde(rename = "Devices", default)]
    pub devices: Vec<PathBuf>,
    /// Read operations per second.
    #[serde(rename = "ThrottleReadIOPS", default, deserialize_with = "null_as_empty")]
    pub throttle_read_iops: String,
    /// Write operations per second.
    #[serde(rename = "ThrottleWriteIOPS", default, deserialize_with = "null_as_empty")]
    pub throttle_write_iops: String,
    /// Read bytes per second.
    #[serde(rename = "ThrottleReadBps", default, deserialize_with = "null_as_empty")]
    pub throttle_read_bps: String,
    /// Write bytes per second.
    #[serde(rename = "ThrottleWriteBps", default, deserialize_with = "null_as_empty")]
    pub throttle_write_bps: String,
}

impl QuotaConfig {
    /// Replaces every empty throttle field with `"max"`.
    fn apply_defaults(&mut self) {
        for field in [
            &mut self.throttle_read_iops,
            &mut self.throttle_write_iops,
            &mut self.throttle_read_bps,
            &mut self.throttle_write_bps,
        ] {
            if field.is_empty() {
                DEFAULT_THROTTLE_VALUE.clone_into(field);
            }
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses and defaults a configuration from raw JSON bytes.
///
/// Device paths are not checked here; see [`validate_config`].
///
/// # Errors
///
/// Returns [`ThrottleError::ConfigParse`] for malformed JSON and
/// [`ThrottleError::ConfigValidation`] if there are no classes, a class has
/// no entries, or an entry has no devices.
pub fn parse_config(json: &[u8]) -> Result<ThrottleConfig> {
    let mut config: ThrottleConfig = serde_json::from_slice(json)?;
    check_structure(&config)?;
    for quota in config.classes.values_mut().flatten() {
        quota.apply_defaults();
    }
    tracing::debug!(classes = config.classes.len(), "configuration parsed");
    Ok(config)
}

/// Parses and defaults a configuration from a JSON string.
///
/// # Errors
///
/// See [`parse_config`].
pub fn parse_config_str(json: &str) -> Result<ThrottleConfig> {
    parse_config(json.as_bytes())
}

/// Pre-flight check: structure plus existence of every device path.
///
/// # Errors
///
/// Returns [`ThrottleError::ConfigValidation`] for structurally empty
/// configurations and [`ThrottleError::DeviceNotFound`] for the first device
/// path that cannot be statted.
pub fn validate_config(config: &ThrottleConfig) -> Result<()> {
    tracing::info!("validating configuration");
    check_structure(config)?;
    for (class, quotas) in &config.classes {
        for (index, quota) in quotas.iter().enumerate() {
            for device in &quota.devices {
                check_device_exists(device).map_err(|e| e.in_entry(class, index, "Devices"))?;
            }
        }
    }
    Ok(())
}

fn check_structure(config: &ThrottleConfig) -> Result<()> {
    if config.classes.is_empty() {
        return Err(validation_err("no class configurations found".into()));
    }
    for (class, quotas) in &config.classes {
        if quotas.is_empty() {
            return Err(validation_err(format!(
                "no quota configurations found in class {class}"
            )));
        }
        if let Some(index) = quotas.iter().position(|q| q.devices.is_empty()) {
            return Err(validation_err(format!(
                "devices list cannot be empty in {class}[{index}]"
            )));
        }
    }
    Ok(())
}

fn check_device_exists(device: &Path) -> Result<()> {
    std::fs::metadata(device)
        .map(drop)
        .map_err(|source| ThrottleError::DeviceNotFound {
            path: device.to_path_buf(),
            source,
        })
}

const fn validation_err(message: String) -> ThrottleError {
    ThrottleError::ConfigValidation { message }
}
