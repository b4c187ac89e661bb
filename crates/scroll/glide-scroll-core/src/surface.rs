//! Surface: the shared outbound side of the engine.
//!
//! Every style write goes through here so the store always knows the current
//! visual state (needed for `to`-only steps) and the host receives each
//! change exactly once.

use std::cell::RefCell;
use std::rc::Rc;

use crate::outputs::{MotionEvent, Outputs};
use crate::style::{StyleChange, StyleProp, StyleSnapshot, StyleStore, Target};

#[derive(Debug, Default)]
struct SurfaceState {
    store: StyleStore,
    outputs: Outputs,
}

/// Cloneable handle; clones share the same store and output buffer.
#[derive(Clone, Debug, Default)]
pub struct Surface {
    inner: Rc<RefCell<SurfaceState>>,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one property. Identical consecutive writes are dropped.
    pub fn write(&self, target: &Target, prop: StyleProp, value: f32) {
        let mut st = self.inner.borrow_mut();
        if st.store.record(target, prop, value) {
            st.outputs.push_change(StyleChange {
                target: target.clone(),
                prop,
                value,
            });
        }
    }

    pub fn write_snapshot(&self, target: &Target, snapshot: &StyleSnapshot) {
        for (prop, value) in snapshot.iter() {
            self.write(target, prop, value);
        }
    }

    pub fn emit(&self, event: MotionEvent) {
        self.inner.borrow_mut().outputs.push_event(event);
    }

    /// Current value of a property (neutral if never written).
    pub fn current(&self, target: &Target, prop: StyleProp) -> f32 {
        self.inner.borrow().store.current(target, prop)
    }

    pub fn get(&self, target: &Target, prop: StyleProp) -> Option<f32> {
        self.inner.borrow().store.get(target, prop)
    }

    /// Move the pending outputs out, leaving an empty buffer.
    pub fn drain(&self) -> Outputs {
        std::mem::take(&mut self.inner.borrow_mut().outputs)
    }

    pub fn forget(&self, target: &Target) {
        self.inner.borrow_mut().store.forget(target);
    }

    pub fn forget_heading(&self, heading: crate::ids::HeadingId) {
        self.inner.borrow_mut().store.forget_heading(heading);
    }

    pub fn pending_changes(&self) -> usize {
        self.inner.borrow().outputs.changes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let a = Surface::new();
        let b = a.clone();
        let t = Target::element("frame");
        a.write(&t, StyleProp::Opacity, 0.0);
        assert_eq!(b.get(&t, StyleProp::Opacity), Some(0.0));
        let out = b.drain();
        assert_eq!(out.changes.len(), 1);
        assert!(a.drain().is_empty());
    }

    #[test]
    fn repeated_value_is_not_re_emitted() {
        let s = Surface::new();
        let t = Target::element("frame");
        s.write(&t, StyleProp::Y, 4.0);
        s.write(&t, StyleProp::Y, 4.0);
        assert_eq!(s.pending_changes(), 1);
    }
}
