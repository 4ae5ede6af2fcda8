//! Player configuration.

use crate::model::FadeMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`BgmPlayer`](crate::player::BgmPlayer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Deadline for a single track download.
    ///
    /// Default: 30 seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout: Duration,

    /// Volume fade applied when playback starts.
    ///
    /// Default: off.
    #[serde(default = "default_fade_mode")]
    pub fade_mode: FadeMode,

    /// Whether `reload` falls back to the first playable track when the
    /// previously playing track is gone from the new collection.
    ///
    /// Default: false (reload leaves the player unselected).
    #[serde(default)]
    pub select_first_on_reload: bool,

    /// Event bus buffer capacity.
    ///
    /// Default: 128 events per subscriber.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            download_timeout: default_download_timeout(),
            fade_mode: default_fade_mode(),
            select_first_on_reload: false,
            event_capacity: default_event_capacity(),
        }
    }
}

impl PlayerConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.download_timeout.is_zero() {
            return Err("download_timeout must be greater than zero".to_string());
        }
        if self.event_capacity == 0 {
            return Err("event_capacity must be greater than zero".to_string());
        }
        Ok(())
    }
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_fade_mode() -> FadeMode {
    FadeMode::Off
}

fn default_event_capacity() -> usize {
    128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PlayerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.download_timeout, Duration::from_secs(30));
        assert_eq!(config.fade_mode, FadeMode::Off);
        assert!(!config.select_first_on_reload);
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = PlayerConfig {
            download_timeout: Duration::ZERO,
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
