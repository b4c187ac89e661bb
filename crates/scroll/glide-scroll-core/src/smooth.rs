//! Smooth Scroll Engine: inertial easing of wheel/touch input.
//!
//! Input deltas move a target offset immediately and in arrival order; the
//! effective (eased) offset chases the target once per frame. The eased value
//! is what the observer consumes.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::config::SmoothScrollConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollSource {
    Wheel,
    Touch,
    /// Keyboard, scrollbar or programmatic; never eased.
    Native,
}

#[derive(Clone, Debug)]
pub struct SmoothScroll {
    cfg: SmoothScrollConfig,
    target: f32,
    current: f32,
    /// Largest valid scroll offset (document height minus viewport height).
    limit: f32,
    /// Last published value, so unchanged frames publish nothing.
    published: f32,
}

impl SmoothScroll {
    pub fn new(cfg: SmoothScrollConfig, limit: f32) -> Self {
        Self {
            cfg,
            target: 0.0,
            current: 0.0,
            limit: limit.max(0.0),
            published: 0.0,
        }
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn limit(&self) -> f32 {
        self.limit
    }

    pub fn is_animating(&self) -> bool {
        self.current != self.target
    }

    /// Feed one raw input delta (pixels, positive scrolls down).
    pub fn push(&mut self, delta: f32, source: ScrollSource) {
        if !delta.is_finite() {
            return;
        }
        let (scaled, eased) = match source {
            ScrollSource::Wheel => (delta * self.cfg.wheel_multiplier, true),
            ScrollSource::Touch => (delta * self.cfg.touch_multiplier, self.cfg.smooth_touch),
            ScrollSource::Native => (delta, false),
        };
        self.target = (self.target + scaled).clamp(0.0, self.limit);
        if !eased {
            self.current = self.target;
        }
        trace!("smooth: push {delta} ({source:?}) -> target {}", self.target);
    }

    /// Jump or glide to an absolute position.
    pub fn scroll_to(&mut self, position: f32, immediate: bool) {
        self.target = position.clamp(0.0, self.limit);
        if immediate {
            self.current = self.target;
        }
    }

    /// The host scrolled natively (scrollbar, keyboard, anchor jump).
    pub fn sync_native(&mut self, position: f32) {
        self.scroll_to(position, true);
    }

    /// Content height changed.
    pub fn set_limit(&mut self, limit: f32) {
        self.limit = limit.max(0.0);
        self.target = self.target.clamp(0.0, self.limit);
        self.current = self.current.clamp(0.0, self.limit);
    }

    /// Drop residual momentum, e.g. on route change.
    pub fn reset(&mut self, position: f32) {
        self.target = position.clamp(0.0, self.limit);
        self.current = self.target;
        self.published = f32::NAN;
    }

    /// Advance the eased offset by `dt` seconds. Returns the new effective
    /// position if it changed since the last publish.
    pub fn frame(&mut self, dt: f32) -> Option<f32> {
        if self.current != self.target {
            // Frame-rate independent lerp: `lerp` per 1/60 s.
            let k = 1.0 - (1.0 - self.cfg.lerp).powf(dt.max(0.0) * 60.0);
            self.current += (self.target - self.current) * k;
            if (self.target - self.current).abs() < self.cfg.settle_epsilon {
                self.current = self.target;
            }
        }
        if self.current != self.published {
            self.published = self.current;
            Some(self.current)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smooth() -> SmoothScroll {
        SmoothScroll::new(SmoothScrollConfig::default(), 10_000.0)
    }

    #[test]
    fn wheel_eases_toward_target() {
        let mut s = smooth();
        s.push(100.0, ScrollSource::Wheel);
        assert_eq!(s.target(), 100.0);
        let p = s.frame(1.0 / 60.0).unwrap();
        assert!((p - 10.0).abs() < 1e-3);
        assert!(s.is_animating());
        for _ in 0..200 {
            s.frame(1.0 / 60.0);
        }
        assert_eq!(s.current(), 100.0);
        assert_eq!(s.frame(1.0 / 60.0), None);
    }

    #[test]
    fn deltas_accumulate_in_order_and_clamp() {
        let mut s = SmoothScroll::new(SmoothScrollConfig::default(), 150.0);
        s.push(100.0, ScrollSource::Wheel);
        s.push(-30.0, ScrollSource::Wheel);
        s.push(500.0, ScrollSource::Wheel);
        assert_eq!(s.target(), 150.0);
        s.push(-1000.0, ScrollSource::Wheel);
        assert_eq!(s.target(), 0.0);
    }

    #[test]
    fn touch_is_native_unless_smoothed() {
        let mut s = smooth();
        s.push(40.0, ScrollSource::Touch);
        assert_eq!(s.current(), 40.0);

        let mut cfg = SmoothScrollConfig::default();
        cfg.smooth_touch = true;
        let mut s = SmoothScroll::new(cfg, 1000.0);
        s.push(40.0, ScrollSource::Touch);
        assert_eq!(s.current(), 0.0);
    }

    #[test]
    fn reset_flushes_momentum() {
        let mut s = smooth();
        s.push(800.0, ScrollSource::Wheel);
        s.frame(1.0 / 60.0);
        s.reset(0.0);
        assert!(!s.is_animating());
        // Published once so the observer sees the new page's origin.
        assert_eq!(s.frame(1.0 / 60.0), Some(0.0));
        assert_eq!(s.frame(1.0 / 60.0), None);
    }

    #[test]
    fn larger_dt_covers_more_distance() {
        let mut a = smooth();
        let mut b = smooth();
        a.push(100.0, ScrollSource::Wheel);
        b.push(100.0, ScrollSource::Wheel);
        let pa = a.frame(1.0 / 120.0).unwrap();
        let pb = b.frame(1.0 / 30.0).unwrap();
        assert!(pa < pb);
    }
}
