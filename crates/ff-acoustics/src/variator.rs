//! Variator Parameters
//!
//! Per entity-class thresholds that decide when a footstep fires and how
//! loud it is. Loaded once per registry generation and shared read-only.

use ff_core::{FfError, FfResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Class used when an agent's class has no variator of its own
pub const DEFAULT_VARIATOR_CLASS: &str = "default";

/// Per entity-class footstep tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariatorConfig {
    /// Horizontal distance between steps
    #[serde(default = "default_stride")]
    pub stride: f32,
    /// Distance between steps on stairs
    #[serde(default = "default_stride_stair")]
    pub stride_stair: f32,
    /// Vertical distance between rungs on ladders
    #[serde(default = "default_stride_ladder")]
    pub stride_ladder: f32,
    /// Per-tick speed above which movement counts as running
    #[serde(default = "default_speed_to_run")]
    pub speed_to_run: f32,
    /// Ticks without movement before the agent is idle
    #[serde(default = "default_immobile_duration")]
    pub immobile_duration: u32,
    /// Fall distance above which touching ground plays a landing
    #[serde(default = "default_land_hard_distance_min")]
    pub land_hard_distance_min: f32,
    /// Four-legged agents scale their stride
    #[serde(default)]
    pub quadruped: bool,
    #[serde(default = "default_quadruped_multiplier")]
    pub quadruped_multiplier: f32,
    /// Play a settling shuffle when the agent goes idle
    #[serde(default = "default_true")]
    pub play_wander: bool,
    /// Play a sound when leaving the ground
    #[serde(default = "default_true")]
    pub event_on_jump: bool,
    /// Volume multiplier applied to every cue
    #[serde(default = "default_volume_scale")]
    pub volume_scale: f32,
    /// Relative volume jitter (0.1 = ±10%)
    #[serde(default = "default_jitter")]
    pub volume_jitter: f32,
    /// Relative pitch jitter
    #[serde(default = "default_jitter")]
    pub pitch_jitter: f32,
    /// Whether emissions should leave footprints
    #[serde(default)]
    pub footprints: bool,
    #[serde(default = "default_footprint_scale")]
    pub footprint_scale: f32,
}

fn default_stride() -> f32 {
    0.75
}
fn default_stride_stair() -> f32 {
    0.65
}
fn default_stride_ladder() -> f32 {
    0.5
}
fn default_speed_to_run() -> f32 {
    0.22
}
fn default_immobile_duration() -> u32 {
    10
}
fn default_land_hard_distance_min() -> f32 {
    0.9
}
fn default_quadruped_multiplier() -> f32 {
    1.25
}
fn default_true() -> bool {
    true
}
fn default_volume_scale() -> f32 {
    1.0
}
fn default_jitter() -> f32 {
    0.1
}
fn default_footprint_scale() -> f32 {
    1.0
}

impl Default for VariatorConfig {
    fn default() -> Self {
        Self {
            stride: default_stride(),
            stride_stair: default_stride_stair(),
            stride_ladder: default_stride_ladder(),
            speed_to_run: default_speed_to_run(),
            immobile_duration: default_immobile_duration(),
            land_hard_distance_min: default_land_hard_distance_min(),
            quadruped: false,
            quadruped_multiplier: default_quadruped_multiplier(),
            play_wander: true,
            event_on_jump: true,
            volume_scale: default_volume_scale(),
            volume_jitter: default_jitter(),
            pitch_jitter: default_jitter(),
            footprints: false,
            footprint_scale: default_footprint_scale(),
        }
    }
}

impl VariatorConfig {
    /// Stride after the quadruped adjustment
    #[inline]
    pub fn effective_stride(&self, base: f32) -> f32 {
        if self.quadruped {
            base * self.quadruped_multiplier
        } else {
            base
        }
    }

    pub fn validate(&self) -> FfResult<()> {
        let strides = [
            ("stride", self.stride),
            ("stride_stair", self.stride_stair),
            ("stride_ladder", self.stride_ladder),
            ("quadruped_multiplier", self.quadruped_multiplier),
        ];
        for (name, value) in strides {
            if !(value.is_finite() && value > 0.0) {
                return Err(FfError::config(format!(
                    "Variator field '{}' must be positive, got {}",
                    name, value
                )));
            }
        }
        if !(0.0..1.0).contains(&self.volume_jitter) || !(0.0..1.0).contains(&self.pitch_jitter)
        {
            return Err(FfError::config("Variator jitter must be in [0, 1)"));
        }
        if self.speed_to_run < 0.0 || self.land_hard_distance_min < 0.0 || self.volume_scale < 0.0
        {
            return Err(FfError::config("Variator thresholds must not be negative"));
        }
        Ok(())
    }
}

/// Variators by entity class
#[derive(Debug, Clone)]
pub struct VariatorRegistry {
    classes: HashMap<String, Arc<VariatorConfig>>,
    fallback: Arc<VariatorConfig>,
}

impl Default for VariatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl VariatorRegistry {
    pub fn new() -> Self {
        Self {
            classes: HashMap::new(),
            fallback: Arc::new(VariatorConfig::default()),
        }
    }

    /// Register a class. Registering `DEFAULT_VARIATOR_CLASS` replaces the fallback.
    pub fn register(&mut self, class: &str, config: VariatorConfig) {
        let config = Arc::new(config);
        if class == DEFAULT_VARIATOR_CLASS {
            self.fallback = Arc::clone(&config);
        }
        self.classes.insert(class.to_string(), config);
    }

    /// Variator for a class, or the fallback
    pub fn get(&self, class: &str) -> &Arc<VariatorConfig> {
        self.classes.get(class).unwrap_or(&self.fallback)
    }

    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: VariatorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, VariatorConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_quadruped_stride() {
        let config = VariatorConfig {
            quadruped: true,
            quadruped_multiplier: 2.0,
            ..Default::default()
        };
        assert!((config.effective_stride(0.75) - 1.5).abs() < 1e-6);
        assert!((VariatorConfig::default().effective_stride(0.75) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_validation() {
        let bad = VariatorConfig {
            stride: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = VariatorConfig {
            volume_jitter: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_registry_fallback() {
        let mut registry = VariatorRegistry::new();
        registry.register(
            "wolf",
            VariatorConfig {
                quadruped: true,
                ..Default::default()
            },
        );

        assert!(registry.get("wolf").quadruped);
        assert!(!registry.get("zombie").quadruped);

        registry.register(
            DEFAULT_VARIATOR_CLASS,
            VariatorConfig {
                stride: 1.0,
                ..Default::default()
            },
        );
        assert!((registry.get("zombie").stride - 1.0).abs() < 1e-6);
    }
}
