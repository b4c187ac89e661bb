#![cfg(target_arch = "wasm32")]
use glide_scroll_wasm::{abi_version, format_time, GlideScroll};
use js_sys::Function;
use serde::Serialize;
use serde_json::json;
use serde_wasm_bindgen as swb;
use wasm_bindgen::{JsError, JsValue};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn js(v: serde_json::Value) -> JsValue {
    v.serialize(&swb::Serializer::json_compatible()).unwrap()
}

fn ok<T>(r: Result<T, JsError>) -> T {
    match r {
        Ok(v) => v,
        Err(_) => panic!("wasm call returned an error"),
    }
}

fn outputs(v: JsValue) -> serde_json::Value {
    swb::from_value(v).unwrap()
}

fn engine() -> GlideScroll {
    let mut eng = ok(GlideScroll::new(JsValue::UNDEFINED));
    eng.resize(1280.0, 800.0, 6000.0);
    eng
}

#[wasm_bindgen_test]
fn abi_is_1() {
    assert_eq!(abi_version(), 1);
}

#[wasm_bindgen_test]
fn construct_with_defaults_and_partial_config() {
    assert!(GlideScroll::new(JsValue::NULL).is_ok());
    assert!(GlideScroll::new(js(json!({ "smooth_scroll": { "smooth_touch": true } }))).is_ok());
    assert!(GlideScroll::new(js(json!({ "smooth_scroll": { "lerp": 0.0 } }))).is_err());
}

#[wasm_bindgen_test]
fn formats_media_time() {
    assert_eq!(format_time(75.0), "1:15");
    assert_eq!(format_time(f32::NAN), "0:00");
}

#[wasm_bindgen_test]
fn heading_fragments_and_reports_structure() {
    let mut eng = engine();
    let m = eng.mount();
    let id = ok(eng.fragment_heading(
        m,
        "title".into(),
        "Designed To Win.".into(),
        js(json!({ "words": ["Win."] })),
    ));
    let heading: serde_json::Value = swb::from_value(ok(eng.heading(id))).unwrap();
    assert!(heading.is_object());

    let out = outputs(ok(eng.take_outputs()));
    assert!(!out["changes"].as_array().unwrap().is_empty());

    assert!(eng.unmount(m));
    assert!(eng.heading(id).is_err());
    assert!(!eng.unmount(m));
}

#[wasm_bindgen_test]
fn ungated_timeline_plays_on_frames() {
    let mut eng = engine();
    let m = eng.mount();
    let steps = js(json!([
        {
            "step": {
                "targets": [{ "element": "hero-title" }],
                "to": { "opacity": 1.0 },
                "duration": 0.5
            }
        }
    ]));
    let id = ok(eng.add_timeline(m, steps, None, None));
    assert!(id.is_some());
    ok(eng.frame(0.0));
    ok(eng.frame(1.0));
    let out = outputs(ok(eng.frame(1.1)));
    assert!(out["events"].is_array());
}

#[wasm_bindgen_test]
fn gated_timeline_without_region_is_skipped() {
    let mut eng = engine();
    let m = eng.mount();
    let steps = js(json!([
        { "step": { "targets": [{ "element": "eyebrow" }], "to": { "opacity": 1.0 }, "duration": 0.4 } }
    ]));
    let missing = Function::new_no_args("return null;");
    let id = ok(eng.add_timeline(m, steps, Some(missing), Some("top 80%".into())));
    assert_eq!(id, None);
}

#[wasm_bindgen_test]
fn track_drag_round_trip() {
    let mut eng = engine();
    let m = eng.mount();
    let track = ok(eng.add_track(
        m,
        js(json!({ "axis": "horizontal", "target": { "element": "hero" }, "auto_speed": 0.0 })),
    ));
    assert_eq!(ok(eng.measure(track, 1000.0)), 500.0);

    ok(eng.pointer_down(track, js(json!({ "x": 300.0, "y": 300.0, "source": "touch" }))));
    let r: serde_json::Value =
        swb::from_value(ok(eng.pointer_move(js(json!({ "x": 320.0, "y": 302.0, "source": "touch" })))))
            .unwrap();
    assert_eq!(r["prevent_default"], json!(true));
    ok(eng.pointer_up());

    let state: serde_json::Value = swb::from_value(ok(eng.track(track))).unwrap();
    assert_eq!(state["offset"], json!(480.0));
}

#[wasm_bindgen_test]
fn unknown_mount_is_an_error() {
    let mut eng = engine();
    assert!(eng
        .add_track(99, js(json!({ "axis": "vertical", "target": { "element": "x" }, "auto_speed": 10.0 })))
        .is_err());
}

#[wasm_bindgen_test]
fn heading_steps_need_no_targets_array() {
    let mut eng = engine();
    let m = eng.mount();
    let heading = ok(eng.fragment_heading(m, "title".into(), "Hi".into(), JsValue::UNDEFINED));
    let steps = js(json!([
        { "heading": heading, "step": { "to": { "opacity": 1.0 }, "duration": 0.3, "stagger": 0.02 } }
    ]));
    assert!(ok(eng.add_timeline(m, steps, None, None)).is_some());
}
