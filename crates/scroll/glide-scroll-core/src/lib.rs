//! Glide Scroll Core (host-agnostic)
//!
//! Scroll-synchronized animation for marketing pages: per-character heading
//! reveals gated on scroll position, looping draggable marquee tracks with
//! modular wraparound, and pinned sections whose scroll progress scrubs a
//! timeline. The crate never touches a DOM; it consumes input events and
//! element geometry and produces `Outputs` (style writes plus events) that a
//! host adapter applies.

pub mod clock;
pub mod config;
pub mod drag;
pub mod ease;
pub mod engine;
pub mod error;
pub mod fragment;
pub mod geometry;
pub mod ids;
pub mod marquee;
pub mod media;
pub mod observer;
pub mod outputs;
pub mod pin;
pub mod smooth;
pub mod style;
pub mod surface;
pub mod timeline;

// Re-exports for consumers (adapters)
pub use clock::{Flow, FrameClock, FrameTick};
pub use config::{ClockConfig, Config, DragConfig, FragmentConfig, SmoothScrollConfig};
pub use drag::{DragAction, DragInterpreter, DragPhase, DragResponse, DragSession, PointerInput, PointerSource};
pub use ease::{Ease, EaseVariant};
pub use engine::{Engine, Mount};
pub use error::GlideError;
pub use fragment::{fragment, AnimatableUnit, FragmentNode, FragmentedHeading, Fragmenter, HighlightSet, WordGroup};
pub use geometry::{wrap, Axis, Rect, Viewport};
pub use ids::{HeadingId, IdAllocator, SequenceId, SubscriberId, TimelineId, TrackId, TriggerId};
pub use marquee::{CarouselTrack, DragPolarity, Marquee, TrackPhase, TrackSpec};
pub use media::{format_time, MediaController};
pub use observer::{
    BoundsProvider, OneShotState, PinEnd, PinState, RegionTrigger, ScrollObserver, TriggerEvent,
    TriggerEventKind, TriggerLine, TriggerMode,
};
pub use outputs::{MediaCommand, MotionEvent, Outputs};
pub use pin::{MediaGate, PinSequence, Pins};
pub use smooth::{ScrollSource, SmoothScroll};
pub use style::{StyleChange, StyleProp, StyleSnapshot, StyleStore, Target};
pub use surface::Surface;
pub use timeline::{AnimationStep, Position, Scheduler, Timeline, TimelineState};
