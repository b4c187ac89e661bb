//! Easing curves.
//!
//! Named curves follow the `family.variant` convention used in animation
//! tooling (`power2.out`, `sine.inOut`, `none`), plus CSS-style
//! `cubic-bezier(x1, y1, x2, y2)` timing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::GlideError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EaseVariant {
    In,
    Out,
    InOut,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Ease {
    Linear,
    /// `power{n}`: polynomial of degree `n + 1` (`power0` is linear).
    Power(u8, EaseVariant),
    Sine(EaseVariant),
    Expo(EaseVariant),
    CubicBezier([f32; 4]),
}

impl Default for Ease {
    /// The default for reveal steps.
    fn default() -> Self {
        Ease::Power(2, EaseVariant::Out)
    }
}

#[inline]
fn cubic_bezier(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}

/// Given control points (x1, y1, x2, y2) and an input t in [0,1],
/// compute the eased y by inverting the x bezier via binary search.
#[inline]
fn bezier_ease_t(t: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    if x1 == y1 && x2 == y2 {
        return t;
    }
    let mut lo = 0.0f32;
    let mut hi = 1.0f32;
    let mut mid = t;
    for _ in 0..24 {
        let x = cubic_bezier(0.0, x1, x2, 1.0, mid);
        if (x - t).abs() < 1e-6 {
            break;
        }
        if x < t {
            lo = mid;
        } else {
            hi = mid;
        }
        mid = 0.5 * (lo + hi);
    }
    cubic_bezier(0.0, y1, y2, 1.0, mid)
}

fn apply_variant(variant: EaseVariant, t: f32, ease_in: impl Fn(f32) -> f32) -> f32 {
    match variant {
        EaseVariant::In => ease_in(t),
        EaseVariant::Out => 1.0 - ease_in(1.0 - t),
        EaseVariant::InOut => {
            if t < 0.5 {
                ease_in(t * 2.0) / 2.0
            } else {
                1.0 - ease_in((1.0 - t) * 2.0) / 2.0
            }
        }
    }
}

impl Ease {
    /// Map linear progress `t` (clamped to [0,1]) to eased progress.
    /// Endpoints are exact: `apply(0) == 0`, `apply(1) == 1`.
    pub fn apply(&self, t: f32) -> f32 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        if t == 0.0 || t == 1.0 {
            return t;
        }
        match *self {
            Ease::Linear => t,
            Ease::Power(n, variant) => {
                let exp = i32::from(n) + 1;
                apply_variant(variant, t, |x| x.powi(exp))
            }
            Ease::Sine(variant) => apply_variant(variant, t, |x| {
                1.0 - (x * std::f32::consts::FRAC_PI_2).cos()
            }),
            Ease::Expo(variant) => apply_variant(variant, t, |x| {
                if x == 0.0 {
                    0.0
                } else {
                    2f32.powf(10.0 * (x - 1.0))
                }
            }),
            Ease::CubicBezier([x1, y1, x2, y2]) => bezier_ease_t(t, x1, y1, x2, y2),
        }
    }
}

/// Linear interpolation between `a` and `b`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

fn parse_variant(s: &str) -> Option<EaseVariant> {
    match s {
        "in" => Some(EaseVariant::In),
        "out" => Some(EaseVariant::Out),
        "inOut" | "inout" => Some(EaseVariant::InOut),
        _ => None,
    }
}

fn variant_name(v: EaseVariant) -> &'static str {
    match v {
        EaseVariant::In => "in",
        EaseVariant::Out => "out",
        EaseVariant::InOut => "inOut",
    }
}

impl FromStr for Ease {
    type Err = GlideError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim();
        let bad = || GlideError::InvalidEase(raw.to_string());
        if s == "none" || s == "linear" {
            return Ok(Ease::Linear);
        }
        if let Some(args) = s
            .strip_prefix("cubic-bezier(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let nums = args
                .split(',')
                .map(|p| p.trim().parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| bad())?;
            let [x1, y1, x2, y2] = <[f32; 4]>::try_from(nums).map_err(|_| bad())?;
            if !(0.0..=1.0).contains(&x1) || !(0.0..=1.0).contains(&x2) {
                return Err(bad());
            }
            return Ok(Ease::CubicBezier([x1, y1, x2, y2]));
        }
        // `power2` alone means `power2.out`.
        let (family, variant) = match s.split_once('.') {
            Some((f, v)) => (f, parse_variant(v).ok_or_else(bad)?),
            None => (s, EaseVariant::Out),
        };
        match family {
            "sine" => Ok(Ease::Sine(variant)),
            "expo" => Ok(Ease::Expo(variant)),
            "quad" => Ok(Ease::Power(1, variant)),
            "cubic" => Ok(Ease::Power(2, variant)),
            "quart" => Ok(Ease::Power(3, variant)),
            "quint" => Ok(Ease::Power(4, variant)),
            _ => {
                let n: u8 = family
                    .strip_prefix("power")
                    .and_then(|d| d.parse().ok())
                    .filter(|n| *n <= 4)
                    .ok_or_else(bad)?;
                if n == 0 {
                    Ok(Ease::Linear)
                } else {
                    Ok(Ease::Power(n, variant))
                }
            }
        }
    }
}

impl fmt::Display for Ease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ease::Linear => write!(f, "none"),
            Ease::Power(n, v) => write!(f, "power{n}.{}", variant_name(*v)),
            Ease::Sine(v) => write!(f, "sine.{}", variant_name(*v)),
            Ease::Expo(v) => write!(f, "expo.{}", variant_name(*v)),
            Ease::CubicBezier([a, b, c, d]) => write!(f, "cubic-bezier({a}, {b}, {c}, {d})"),
        }
    }
}

// Eases travel as their string form in JSON.
impl Serialize for Ease {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ease {
    fn deserialize<D>(deserializer: D) -> Result<Ease, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn parses_named_curves() {
        assert_eq!("power2.out".parse::<Ease>().unwrap(), Ease::Power(2, EaseVariant::Out));
        assert_eq!("power2.inOut".parse::<Ease>().unwrap(), Ease::Power(2, EaseVariant::InOut));
        assert_eq!("power3".parse::<Ease>().unwrap(), Ease::Power(3, EaseVariant::Out));
        assert_eq!("none".parse::<Ease>().unwrap(), Ease::Linear);
        assert_eq!("sine.in".parse::<Ease>().unwrap(), Ease::Sine(EaseVariant::In));
        assert!("bounce.out".parse::<Ease>().is_err());
        assert!("power9.out".parse::<Ease>().is_err());
    }

    #[test]
    fn parses_cubic_bezier() {
        let e: Ease = "cubic-bezier(0.25, 0.1, 0.25, 1)".parse().unwrap();
        assert_eq!(e, Ease::CubicBezier([0.25, 0.1, 0.25, 1.0]));
        assert!("cubic-bezier(1.5, 0, 0, 1)".parse::<Ease>().is_err());
        assert!("cubic-bezier(0, 0, 1)".parse::<Ease>().is_err());
    }

    #[test]
    fn endpoints_are_exact() {
        for e in [
            Ease::Linear,
            Ease::Power(2, EaseVariant::Out),
            Ease::Power(2, EaseVariant::InOut),
            Ease::Sine(EaseVariant::InOut),
            Ease::Expo(EaseVariant::Out),
            Ease::CubicBezier([0.42, 0.0, 0.58, 1.0]),
        ] {
            assert_eq!(e.apply(0.0), 0.0, "{e}");
            assert_eq!(e.apply(1.0), 1.0, "{e}");
        }
    }

    #[test]
    fn power2_out_matches_closed_form() {
        let e = Ease::Power(2, EaseVariant::Out);
        assert!(approx(e.apply(0.5), 1.0 - 0.5f32.powi(3)));
    }

    #[test]
    fn in_out_is_symmetric() {
        let e = Ease::Power(2, EaseVariant::InOut);
        assert!(approx(e.apply(0.5), 0.5));
        assert!(approx(e.apply(0.25) + e.apply(0.75), 1.0));
    }

    #[test]
    fn display_round_trips_through_parse() {
        let e = Ease::Power(4, EaseVariant::InOut);
        assert_eq!(e.to_string().parse::<Ease>().unwrap(), e);
    }

    #[test]
    fn linear_bezier_is_identity() {
        let e = Ease::CubicBezier([0.0, 0.0, 1.0, 1.0]);
        assert!(approx(e.apply(0.3), 0.3));
    }
}
