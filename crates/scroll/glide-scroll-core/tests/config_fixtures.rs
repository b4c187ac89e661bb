use glide_scroll_core::{fragment, Config, Engine, HighlightSet, PointerInput, ScrollSource, SmoothScroll};

#[test]
fn empty_config_is_the_default() {
    let json = glide_test_fixtures::config_json("default").expect("load default config");
    assert_eq!(Config::from_json(&json).unwrap(), Config::default());
}

#[test]
fn smooth_touch_config_changes_touch_handling() {
    let json = glide_test_fixtures::config_json("smooth-touch").expect("load smooth-touch config");
    let cfg = Config::from_json(&json).unwrap();
    assert!(cfg.smooth_scroll.smooth_touch);
    assert_eq!(cfg.drag.axis_threshold, 6.0);
    assert_eq!(cfg.drag.min_direction_delta, 2.0);
    // Untouched fields keep their defaults.
    assert_eq!(cfg.smooth_scroll.wheel_multiplier, 1.0);

    let mut smooth = SmoothScroll::new(cfg.smooth_scroll.clone(), 2000.0);
    smooth.push(100.0, ScrollSource::Touch);
    assert_eq!(smooth.target(), 150.0);
    assert_eq!(smooth.current(), 0.0);

    let mut engine = Engine::new(cfg);
    let r = engine.pointer_down(glide_scroll_core::TrackId(0), PointerInput::touch(0.0, 0.0));
    assert!(!r.prevent_default);
}

#[test]
fn fragmenting_the_same_heading_twice_is_byte_identical() {
    let set = HighlightSet::new(["Imagine"]).case_insensitive();
    for text in ["If You Can Imagine It", "  leading and  double  spaces ", "Punctuation, everywhere!"] {
        let a = serde_json::to_string(&fragment(text, &set)).unwrap();
        let b = serde_json::to_string(&fragment(text, &set)).unwrap();
        assert_eq!(a, b);
    }
}
