//! End-to-end override resolution against a small fixture document.

use kinora::document::edit::FontDescriptor;
use kinora::{
    AnimationDocument, MeasureMode, OverrideSet, ResolveOptions, WidthMeasurer, resolve,
};

/// Deterministic measurer: every glyph is `per_char * size` wide, multiline
/// text measures its widest line.
struct CharMeasurer {
    per_char: f64,
}

impl WidthMeasurer for CharMeasurer {
    fn measure_width(
        &mut self,
        _font: &FontDescriptor,
        size: f64,
        text: &str,
        _mode: MeasureMode,
    ) -> f64 {
        text.split(['\r', '\n'])
            .map(|line| line.chars().count() as f64 * size * self.per_char)
            .fold(0.0, f64::max)
    }
}

fn measurer() -> CharMeasurer {
    CharMeasurer { per_char: 0.5 }
}

fn fixture() -> &'static str {
    r#"{
        "w": 720,
        "h": 405,
        "fr": 30,
        "ip": 0,
        "op": 90,
        "fonts": {"list": [
            {"fName": "SegoeUI-Bold", "fFamily": "Segoe UI", "fStyle": "Bold"}
        ]},
        "assets": [
            {"id": "image_0", "u": "images/", "p": "img_0.png"}
        ],
        "layers": [
            {
                "nm": "title",
                "ty": 5,
                "t": {
                    "d": {"k": [{"s": {"t": "OLD", "f": "SegoeUI-Bold", "s": 40.0, "sz": [300.0, 100.0]}}]},
                    "a": [{
                        "a": {"p": {"a": 1, "k": [
                            {"s": [-500.0, 0.0]},
                            {"s": [20.0, 0.0]}
                        ]}}
                    }]
                }
            }
        ]
    }"#
}

fn doc() -> AnimationDocument {
    AnimationDocument::from_str(fixture()).unwrap()
}

fn text_style(doc: &AnimationDocument) -> &serde_json::Value {
    &doc.root()["layers"][0]["t"]["d"]["k"][0]["s"]
}

fn keyframe_x(doc: &AnimationDocument, i: usize) -> f64 {
    doc.root()["layers"][0]["t"]["a"][0]["a"]["p"]["k"][i]["s"][0]
        .as_f64()
        .unwrap()
}

#[test]
fn empty_override_set_round_trips_byte_identical() {
    let set = OverrideSet::from_str("{}", ".").unwrap();
    let out = resolve(doc(), &set, &ResolveOptions::default(), &mut measurer()).unwrap();
    assert_eq!(out.as_str(), fixture());
}

#[test]
fn requested_value_is_fitted_within_bounds() {
    // "HELLO" measures 2.5 * size; the 300px box (padded to 291) would allow
    // size ~116, so the search must stop at max_size.
    let set = OverrideSet::from_str(
        r#"{"textLayers": {"title": {"minSize": 20, "maxSize": 80, "value": "HELLO"}}}"#,
        ".",
    )
    .unwrap();
    let out = resolve(doc(), &set, &ResolveOptions::default(), &mut measurer()).unwrap();

    let style = text_style(&out);
    assert_eq!(style["t"].as_str().unwrap(), "HELLO");
    let size = style["s"].as_f64().unwrap();
    assert!((20.0..=80.0).contains(&size));
    assert!(size > 79.0, "expected near-max size, got {size}");
    assert!(5.0 * 0.5 * size <= 300.0 * 0.97);
}

#[test]
fn resolution_is_deterministic() {
    let set = OverrideSet::from_str(
        r#"{"textLayers": {"title": {"minSize": 20, "maxSize": 80, "value": "HELLO"}}}"#,
        ".",
    )
    .unwrap();
    let a = resolve(doc(), &set, &ResolveOptions::default(), &mut measurer()).unwrap();
    let b = resolve(doc(), &set, &ResolveOptions::default(), &mut measurer()).unwrap();
    assert_eq!(a.as_str(), b.as_str());
}

#[test]
fn fallback_text_is_substituted_when_value_cannot_fit() {
    // 31 glyphs at min size 20 measure 310px against a 291px budget, so the
    // requested value cannot fit and the fallback is re-fitted instead.
    let set = OverrideSet::from_str(
        r#"{"textLayers": {"title": {
            "minSize": 20, "maxSize": 40,
            "value": "A VERY LONG STRING FOR THIS BOX",
            "fallbackText": "SHORT"
        }}}"#,
        ".",
    )
    .unwrap();
    let out = resolve(doc(), &set, &ResolveOptions::default(), &mut measurer()).unwrap();

    let style = text_style(&out);
    assert_eq!(style["t"].as_str().unwrap(), "SHORT");
    let size = style["s"].as_f64().unwrap();
    assert!((20.0..=40.0).contains(&size));
    assert!(size > 39.0, "fallback should grow toward max, got {size}");
}

#[test]
fn fallback_overflow_accepts_min_size() {
    let set = OverrideSet::from_str(
        r#"{"textLayers": {"title": {
            "minSize": 20, "maxSize": 40,
            "value": "A VERY LONG STRING FOR THIS BOX",
            "fallbackText": "THE FALLBACK IS ALSO FAR TOO LONG"
        }}}"#,
        ".",
    )
    .unwrap();
    let out = resolve(doc(), &set, &ResolveOptions::default(), &mut measurer()).unwrap();

    let style = text_style(&out);
    assert_eq!(
        style["t"].as_str().unwrap(),
        "THE FALLBACK IS ALSO FAR TOO LONG"
    );
    assert_eq!(style["s"].as_f64().unwrap(), 20.0);
}

#[test]
fn wider_text_shifts_only_offscreen_keyframes() {
    // "HELLO" fitted to ~80pt is ~200px wide; at the authored 40pt it is
    // 100px. The off-screen keyframe must move left by that delta, the
    // on-screen one must not move at all.
    let set = OverrideSet::from_str(
        r#"{"textLayers": {"title": {"minSize": 20, "maxSize": 80, "value": "HELLO"}}}"#,
        ".",
    )
    .unwrap();
    let out = resolve(doc(), &set, &ResolveOptions::default(), &mut measurer()).unwrap();

    let offscreen = keyframe_x(&out, 0);
    assert!(
        offscreen < -590.0 && offscreen > -610.0,
        "expected ~-600, got {offscreen}"
    );
    assert_eq!(keyframe_x(&out, 1), 20.0);
}

#[test]
fn narrower_text_leaves_keyframes_untouched() {
    // A 100px box override forces a shrink below the authored size, so the
    // new width is smaller and compensation is deliberately skipped.
    let set = OverrideSet::from_str(
        r#"{"textLayers": {"title": {
            "minSize": 10, "maxSize": 80, "value": "HELLO", "textBoxWidth": 100
        }}}"#,
        ".",
    )
    .unwrap();
    let out = resolve(doc(), &set, &ResolveOptions::default(), &mut measurer()).unwrap();

    let size = text_style(&out)["s"].as_f64().unwrap();
    assert!(size < 40.0, "expected a shrink, got {size}");
    assert_eq!(keyframe_x(&out, 0), -500.0);
    assert_eq!(keyframe_x(&out, 1), 20.0);
}

#[test]
fn no_auto_fit_without_both_bounds() {
    let set = OverrideSet::from_str(
        r#"{"textLayers": {"title": {"value": "REPLACED"}}}"#,
        ".",
    )
    .unwrap();
    let out = resolve(doc(), &set, &ResolveOptions::default(), &mut measurer()).unwrap();

    let style = text_style(&out);
    assert_eq!(style["t"].as_str().unwrap(), "REPLACED");
    assert_eq!(style["s"].as_f64().unwrap(), 40.0);
}

#[test]
fn unknown_layer_is_a_warning_not_a_failure() {
    let set = OverrideSet::from_str(
        r#"{"textLayers": {"nope": {"value": "X"}}}"#,
        ".",
    )
    .unwrap();
    let out = resolve(doc(), &set, &ResolveOptions::default(), &mut measurer()).unwrap();
    assert_eq!(out.as_str(), fixture());
}

#[test]
fn image_override_with_directory_only_keeps_existing_file_name() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("img_0.png"), b"png bytes").unwrap();
    let dir_str = dir.path().to_str().unwrap();

    let set = OverrideSet::from_str(
        &format!(r#"{{"imageLayers": {{"image_0": {{"filePath": "{dir_str}"}}}}}}"#),
        ".",
    )
    .unwrap();
    let out = resolve(doc(), &set, &ResolveOptions::default(), &mut measurer()).unwrap();

    let asset = &out.root()["assets"][0];
    assert_eq!(asset["p"].as_str().unwrap(), "img_0.png");
    assert_eq!(asset["u"].as_str().unwrap(), format!("{dir_str}/"));
}

#[test]
fn image_override_with_relative_path_resolves_against_base_dir() {
    let base = tempfile::tempdir().unwrap();
    std::fs::create_dir(base.path().join("pics")).unwrap();
    std::fs::write(base.path().join("pics/new.png"), b"png bytes").unwrap();

    let set = OverrideSet::from_str(
        r#"{"imageLayers": {"image_0": {"filePath": "pics", "fileName": "new.png"}}}"#,
        base.path(),
    )
    .unwrap();
    let out = resolve(doc(), &set, &ResolveOptions::default(), &mut measurer()).unwrap();

    let asset = &out.root()["assets"][0];
    assert_eq!(asset["u"].as_str().unwrap(), "pics/");
    assert_eq!(asset["p"].as_str().unwrap(), "new.png");
}

#[test]
fn missing_image_file_keeps_original_reference() {
    let set = OverrideSet::from_str(
        r#"{"imageLayers": {"image_0": {"filePath": "/does/not/exist", "fileName": "x.png"}}}"#,
        ".",
    )
    .unwrap();
    let out = resolve(doc(), &set, &ResolveOptions::default(), &mut measurer()).unwrap();
    assert_eq!(out.as_str(), fixture());
}

#[test]
fn url_image_paths_are_rejected() {
    let set = OverrideSet::from_str(
        r#"{"imageLayers": {"image_0": {"filePath": "https://cdn.example.com/", "fileName": "x.png"}}}"#,
        ".",
    )
    .unwrap();
    let out = resolve(doc(), &set, &ResolveOptions::default(), &mut measurer()).unwrap();
    assert_eq!(out.as_str(), fixture());
}

#[test]
fn out_of_range_padding_is_fatal() {
    let set = OverrideSet::from_str(
        r#"{"textLayers": {"title": {"value": "X"}}}"#,
        ".",
    )
    .unwrap();
    let opts = ResolveOptions {
        text_padding: 1.5,
        ..ResolveOptions::default()
    };
    assert!(resolve(doc(), &set, &opts, &mut measurer()).is_err());
}
