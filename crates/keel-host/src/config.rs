//! Host configuration.

use std::path::PathBuf;

use keel_bridge::BridgeConfig;
use serde::{Deserialize, Serialize};

use crate::HostError;

/// Configuration for a [`NativeHost`](crate::NativeHost) and its
/// [`HostLoop`](crate::HostLoop).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Fixed simulation step in seconds. Must be positive and finite.
    /// Default: `1/60`.
    pub fixed_dt: f32,
    /// Directory `World.Load` / `World.Save` paths are resolved against.
    /// Default: the working directory.
    pub world_root: PathBuf,
    /// Number of script log records retained. Default: 1024.
    pub log_capacity: usize,
    /// Settings for the bridge the host binds.
    pub bridge: BridgeConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            world_root: PathBuf::from("."),
            log_capacity: 1024,
            bridge: BridgeConfig::default(),
        }
    }
}

impl HostConfig {
    /// Parse and validate a JSON configuration. Missing fields take their
    /// defaults.
    pub fn from_json_str(json: &str) -> Result<Self, HostError> {
        let config: HostConfig = serde_json::from_str(json).map_err(HostError::InvalidConfig)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HostError> {
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(HostError::InvalidFixedDt(self.fixed_dt));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let config = HostConfig::from_json_str(
            r#"{ "world_root": "saves", "bridge": { "forward_faults": false } }"#,
        )
        .unwrap();
        assert_eq!(config.world_root, PathBuf::from("saves"));
        assert_eq!(config.log_capacity, 1024);
        assert!(!config.bridge.forward_faults);
        assert!(config.bridge.check_arguments);
    }

    #[test]
    fn rejects_non_positive_step() {
        let err = HostConfig::from_json_str(r#"{ "fixed_dt": 0.0 }"#).unwrap_err();
        assert!(matches!(err, HostError::InvalidFixedDt(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            HostConfig::from_json_str("{ fixed_dt"),
            Err(HostError::InvalidConfig(_))
        ));
    }
}
