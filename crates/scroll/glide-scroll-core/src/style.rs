//! Style values written to host elements and the store that remembers them.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::ids::HeadingId;

/// Something the engine writes styles to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// One character produced by the fragmenter.
    Unit { heading: HeadingId, index: usize },
    /// A host element, addressed by an opaque key chosen by the host.
    Element(String),
}

impl Target {
    pub fn element(key: impl Into<String>) -> Self {
        Target::Element(key.into())
    }
}

/// Animatable properties. Translations and sizes are in pixels,
/// percentages in percent, opacity and scale are unitless.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleProp {
    Opacity,
    X,
    Y,
    XPercent,
    YPercent,
    Scale,
    Width,
    Height,
    BorderRadius,
}

impl StyleProp {
    /// Value assumed when nothing has been written yet.
    pub fn neutral(self) -> f32 {
        match self {
            StyleProp::Opacity | StyleProp::Scale => 1.0,
            _ => 0.0,
        }
    }
}

/// A set of property values. Ordered so outputs are deterministic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleSnapshot(BTreeMap<StyleProp, f32>);

impl StyleSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, prop: StyleProp, value: f32) -> Self {
        self.0.insert(prop, value);
        self
    }

    pub fn set(&mut self, prop: StyleProp, value: f32) {
        self.0.insert(prop, value);
    }

    pub fn get(&self, prop: StyleProp) -> Option<f32> {
        self.0.get(&prop).copied()
    }

    pub fn props(&self) -> impl Iterator<Item = StyleProp> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StyleProp, f32)> + '_ {
        self.0.iter().map(|(p, v)| (*p, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(StyleProp, f32)> for StyleSnapshot {
    fn from_iter<I: IntoIterator<Item = (StyleProp, f32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One style write for this frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StyleChange {
    pub target: Target,
    pub prop: StyleProp,
    pub value: f32,
}

/// Last-written value per (target, property).
#[derive(Debug, Default)]
pub struct StyleStore {
    values: HashMap<Target, StyleSnapshot>,
}

impl StyleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: &Target, prop: StyleProp) -> Option<f32> {
        self.values.get(target).and_then(|s| s.get(prop))
    }

    /// Current value, or the property's neutral value.
    pub fn current(&self, target: &Target, prop: StyleProp) -> f32 {
        self.get(target, prop).unwrap_or_else(|| prop.neutral())
    }

    /// Record a value. Returns false when it equals what is already stored.
    pub fn record(&mut self, target: &Target, prop: StyleProp, value: f32) -> bool {
        if let Some(snap) = self.values.get_mut(target) {
            if snap.get(prop) == Some(value) {
                return false;
            }
            snap.set(prop, value);
            return true;
        }
        self.values
            .insert(target.clone(), StyleSnapshot::new().with(prop, value));
        true
    }

    pub fn forget(&mut self, target: &Target) {
        self.values.remove(target);
    }

    /// Drop every unit entry of a heading.
    pub fn forget_heading(&mut self, heading: HeadingId) {
        self.values
            .retain(|t, _| !matches!(t, Target::Unit { heading: h, .. } if *h == heading));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
