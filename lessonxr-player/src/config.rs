//! Player configuration
//!
//! Tuning values live in the `[player]` table of the bootstrap TOML file.
//! Every value has a built-in default, so an empty or missing table is valid.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Player tuning settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Render loop rate (frames per second)
    pub render_fps: u32,

    /// Largest bounding-box dimension an asset may have after placement
    pub max_asset_size: f32,

    /// Distance between neighbouring assets along the layout axis
    pub asset_spacing: f32,

    /// Maximum number of asset fetches in flight
    pub asset_concurrency: usize,

    /// Radius of the environment sphere (panorama and fallback)
    pub environment_radius: f32,

    /// Uniform scale applied to model-based environments
    pub environment_model_scale: f32,

    /// Linear RGB colour of the fallback environment sphere
    pub fallback_color: [f32; 3],

    /// How long a cached "activeLesson" entry stays valid
    pub session_cache_ttl_secs: u64,

    /// Start narration automatically once loading completes
    pub narration_autoplay: bool,

    /// Speed multiplier for simulated narration playback
    pub playback_rate: f64,

    /// Control interface port
    pub server_port: u16,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            render_fps: 60,
            max_asset_size: 1.5,
            asset_spacing: 2.0,
            asset_concurrency: 4,
            environment_radius: 500.0,
            environment_model_scale: 1.0,
            fallback_color: [0.12, 0.14, 0.18],
            session_cache_ttl_secs: 900,
            narration_autoplay: false,
            playback_rate: 1.0,
            server_port: 5780,
        }
    }
}

impl PlayerSettings {
    /// Build settings from the `[player]` TOML table
    pub fn from_table(table: &toml::Table) -> Result<Self> {
        let settings: PlayerSettings = toml::Value::Table(table.clone())
            .try_into()
            .map_err(|e: toml::de::Error| Error::Config(format!("[player] table: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would stall the render loop or the asset stage
    pub fn validate(&self) -> Result<()> {
        if self.render_fps == 0 || self.render_fps > 240 {
            return Err(Error::Config(format!(
                "render_fps must be in 1..=240, got {}",
                self.render_fps
            )));
        }
        if !(self.max_asset_size > 0.0) {
            return Err(Error::Config("max_asset_size must be positive".to_string()));
        }
        if self.asset_concurrency == 0 {
            return Err(Error::Config("asset_concurrency must be at least 1".to_string()));
        }
        if !(self.environment_radius > 0.0) {
            return Err(Error::Config("environment_radius must be positive".to_string()));
        }
        if !(self.playback_rate > 0.0) {
            return Err(Error::Config("playback_rate must be positive".to_string()));
        }
        Ok(())
    }

    /// Render loop tick period
    pub fn frame_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.render_fps.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_gives_defaults() {
        let settings = PlayerSettings::from_table(&toml::Table::new()).unwrap();
        assert_eq!(settings, PlayerSettings::default());
    }

    #[test]
    fn test_partial_table_overrides() {
        let table: toml::Table = toml::from_str(
            r#"
render_fps = 30
max_asset_size = 2.5
narration_autoplay = true
"#,
        )
        .unwrap();
        let settings = PlayerSettings::from_table(&table).unwrap();
        assert_eq!(settings.render_fps, 30);
        assert_eq!(settings.max_asset_size, 2.5);
        assert!(settings.narration_autoplay);
        assert_eq!(settings.asset_spacing, 2.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let table: toml::Table = toml::from_str("render_fps = 0").unwrap();
        assert!(matches!(
            PlayerSettings::from_table(&table),
            Err(Error::Config(_))
        ));

        let table: toml::Table = toml::from_str("asset_concurrency = 0").unwrap();
        assert!(PlayerSettings::from_table(&table).is_err());
    }

    #[test]
    fn test_frame_period() {
        let settings = PlayerSettings {
            render_fps: 50,
            ..Default::default()
        };
        assert_eq!(settings.frame_period(), std::time::Duration::from_millis(20));
    }
}
