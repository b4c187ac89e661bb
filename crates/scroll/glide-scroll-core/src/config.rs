//! Core configuration for glide-scroll-core.

use serde::{Deserialize, Serialize};

use crate::error::GlideError;

/// Engine configuration. Every section falls back to its defaults, so hosts
/// can pass a partial JSON object (or nothing at all).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub clock: ClockConfig,
    pub smooth_scroll: SmoothScrollConfig,
    pub drag: DragConfig,
    pub fragment: FragmentConfig,
}

impl Config {
    /// Parse a (possibly partial) JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, GlideError> {
        let cfg: Config = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would break the frame math.
    pub fn validate(&self) -> Result<(), GlideError> {
        let lerp = self.smooth_scroll.lerp;
        if !lerp.is_finite() || lerp <= 0.0 || lerp > 1.0 {
            return Err(GlideError::InvalidConfig(format!(
                "smooth_scroll.lerp must be in (0, 1], got {lerp}"
            )));
        }
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !positive(self.clock.lag_threshold) || !positive(self.clock.lag_adjusted_dt) {
            return Err(GlideError::InvalidConfig(
                "clock lag settings must be positive".into(),
            ));
        }
        if self.drag.axis_threshold < 0.0 || self.drag.min_direction_delta < 0.0 {
            return Err(GlideError::InvalidConfig(
                "drag thresholds must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Frame Clock lag smoothing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClockConfig {
    /// A frame gap larger than this (seconds) is treated as a stall.
    pub lag_threshold: f32,
    /// dt reported in place of a stalled frame gap.
    pub lag_adjusted_dt: f32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            lag_threshold: 0.5,
            lag_adjusted_dt: 1.0 / 30.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SmoothScrollConfig {
    /// Share of the remaining distance covered per 60 Hz frame.
    /// 0.1 is smooth but responsive; 1.0 disables easing.
    pub lerp: f32,
    pub wheel_multiplier: f32,
    pub touch_multiplier: f32,
    /// Ease touch input too. Off by default: touch follows native scrolling.
    pub smooth_touch: bool,
    /// Distance (px) under which the eased offset snaps to the target.
    pub settle_epsilon: f32,
}

impl Default for SmoothScrollConfig {
    fn default() -> Self {
        Self {
            lerp: 0.1,
            wheel_multiplier: 1.0,
            touch_multiplier: 1.0,
            smooth_touch: false,
            settle_epsilon: 0.5,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DragConfig {
    /// Pixels either axis must travel before the gesture is classified.
    pub axis_threshold: f32,
    /// Minimum final drag delta that re-aims a track's direction on release.
    pub min_direction_delta: f32,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            axis_threshold: 8.0,
            min_direction_delta: 4.0,
        }
    }
}

/// Initial state written to every fragmented character before first paint.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FragmentConfig {
    pub initial_opacity: f32,
    pub initial_y: f32,
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            initial_opacity: 0.0,
            initial_y: 8.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = Config::from_json(r#"{ "drag": { "axis_threshold": 12.0 } }"#).unwrap();
        assert_eq!(cfg.drag.axis_threshold, 12.0);
        assert_eq!(cfg.drag.min_direction_delta, 4.0);
        assert_eq!(cfg.smooth_scroll, SmoothScrollConfig::default());
    }

    #[test]
    fn rejects_out_of_range_lerp() {
        let err = Config::from_json(r#"{ "smooth_scroll": { "lerp": 0.0 } }"#).unwrap_err();
        assert!(matches!(err, GlideError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = Config::from_json("{ nope").unwrap_err();
        assert!(matches!(err, GlideError::Json(_)));
    }
}
