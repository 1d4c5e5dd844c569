//! Tree editing operations for animation documents.
//!
//! The document is parsed once; overrides are applied as tree mutations and
//! serialized back in a single pass, so edits never invalidate each other's
//! positions. Layers are located by their `nm` name, the text style block
//! lives at `layers[].t.d.k[0].s`, and text animators at `layers[].t.a[]`.

use serde_json::Value;

/// Layer type tag for text layers.
pub const TEXT_LAYER_TYPE: i64 = 5;

/// Soft line-break marker some document producers emit inside text values
/// (ETX). The engine expects `\r` as the line-break convention.
pub const SOFT_BREAK_MARKER: char = '\u{0003}';

/// Canonical line-break representation inside text values.
pub const CANONICAL_BREAK: char = '\r';

/// Typeface reference extracted from a text layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FontDescriptor {
    /// Full font name as referenced by the layer style (e.g. `SegoeUI-Bold`).
    pub name: String,
    /// Family name resolved through the document's font list.
    pub family: String,
    /// Style string resolved through the document's font list (e.g. `Bold`).
    pub style: String,
    /// Authored font size.
    pub size: f64,
}

/// Everything the resolver needs to know about one text layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextLayerInfo {
    pub font: FontDescriptor,
    /// Current text content, with line breaks canonicalized.
    pub text: String,
    /// Declared text box width (`sz[0]`), when present and positive.
    pub box_width: Option<f64>,
}

/// Normalize every line-break representation in `text` to [`CANONICAL_BREAK`].
///
/// Handles the soft-break marker, `\r\n` pairs, and bare `\n`.
pub fn normalize_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            SOFT_BREAK_MARKER | '\n' => out.push(CANONICAL_BREAK),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push(CANONICAL_BREAK);
            }
            other => out.push(other),
        }
    }
    out
}

fn layers_mut(root: &mut Value) -> Option<&mut Vec<Value>> {
    root.get_mut("layers")?.as_array_mut()
}

fn is_text_layer(layer: &Value) -> bool {
    layer.get("ty").and_then(Value::as_i64) == Some(TEXT_LAYER_TYPE)
}

fn layer_name(layer: &Value) -> Option<&str> {
    layer.get("nm").and_then(Value::as_str)
}

/// Locate a text layer by name.
pub fn find_text_layer<'a>(root: &'a Value, name: &str) -> Option<&'a Value> {
    root.get("layers")?
        .as_array()?
        .iter()
        .find(|layer| layer_name(layer) == Some(name) && is_text_layer(layer))
}

/// Locate a text layer by name for mutation.
pub fn find_text_layer_mut<'a>(root: &'a mut Value, name: &str) -> Option<&'a mut Value> {
    layers_mut(root)?
        .iter_mut()
        .find(|layer| layer_name(layer) == Some(name) && is_text_layer(layer))
}

/// The style object of a text layer: `t.d.k[0].s`.
pub fn text_style(layer: &Value) -> Option<&Value> {
    layer.get("t")?.get("d")?.get("k")?.get(0)?.get("s")
}

/// Mutable access to a text layer's style object.
pub fn text_style_mut(layer: &mut Value) -> Option<&mut Value> {
    layer
        .get_mut("t")?
        .get_mut("d")?
        .get_mut("k")?
        .get_mut(0)?
        .get_mut("s")
}

/// Extract font, text, and box width for a named text layer.
///
/// The font family and style are resolved through `fonts.list` by matching
/// the style's font name against `fName`; when the document carries no such
/// entry the full name stands alone and lookup falls back on it.
pub fn extract_text_layer_info(root: &Value, name: &str) -> Option<TextLayerInfo> {
    let layer = find_text_layer(root, name)?;
    let style = text_style(layer)?;

    let mut info = TextLayerInfo {
        font: FontDescriptor {
            name: style
                .get("f")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            size: style.get("s").and_then(Value::as_f64).unwrap_or(0.0),
            ..FontDescriptor::default()
        },
        text: style
            .get("t")
            .and_then(Value::as_str)
            .map(normalize_breaks)
            .unwrap_or_default(),
        box_width: style
            .get("sz")
            .and_then(|sz| sz.get(0))
            .and_then(Value::as_f64)
            .filter(|w| *w > 0.0),
    };

    if let Some(list) = root
        .get("fonts")
        .and_then(|f| f.get("list"))
        .and_then(Value::as_array)
    {
        for font in list {
            if font.get("fName").and_then(Value::as_str) == Some(info.font.name.as_str()) {
                if let Some(family) = font.get("fFamily").and_then(Value::as_str) {
                    info.font.family = family.to_owned();
                }
                if let Some(style) = font.get("fStyle").and_then(Value::as_str) {
                    info.font.style = style.to_owned();
                }
                break;
            }
        }
    }

    if info.font.name.is_empty() {
        return None;
    }
    Some(info)
}

/// Replace a text layer's content and font size.
///
/// Returns `false` when the layer or its style object cannot be located.
pub fn set_text_layer_value(root: &mut Value, name: &str, text: &str, size: f64) -> bool {
    let Some(layer) = find_text_layer_mut(root, name) else {
        return false;
    };
    let Some(style) = text_style_mut(layer) else {
        return false;
    };
    style["t"] = Value::from(text);
    style["s"] = Value::from(size);
    true
}

/// Shift the off-screen keyframes of a layer's animated position track.
///
/// Only keyframes whose x coordinate is already negative are moved, further
/// away from the canvas by `delta` pixels. On-screen keyframes are left
/// untouched, as is the whole track when the layer has none. Returns the
/// number of keyframes adjusted.
pub fn shift_offscreen_position_keyframes(root: &mut Value, name: &str, delta: f64) -> usize {
    let Some(layer) = find_text_layer_mut(root, name) else {
        return 0;
    };
    let Some(animators) = layer
        .get_mut("t")
        .and_then(|t| t.get_mut("a"))
        .and_then(Value::as_array_mut)
    else {
        return 0;
    };

    for animator in animators.iter_mut() {
        let Some(position) = animator.get_mut("a").and_then(|a| a.get_mut("p")) else {
            continue;
        };
        if position.get("a").and_then(Value::as_i64) != Some(1) {
            continue;
        }
        let Some(keyframes) = position.get_mut("k").and_then(Value::as_array_mut) else {
            continue;
        };

        let mut adjusted = 0;
        for keyframe in keyframes.iter_mut() {
            let Some(x) = keyframe
                .get("s")
                .and_then(|s| s.get(0))
                .and_then(Value::as_f64)
            else {
                continue;
            };
            if x < 0.0 {
                keyframe["s"][0] = Value::from(x - delta);
                adjusted += 1;
            }
        }
        // One position track per layer; the first animated one wins.
        return adjusted;
    }
    0
}

/// Canonicalize soft line breaks inside every text layer's style text.
///
/// Returns the number of layers whose text changed.
pub fn normalize_text_soft_breaks(root: &mut Value) -> usize {
    let Some(layers) = layers_mut(root) else {
        return 0;
    };
    let mut changed = 0;
    for layer in layers.iter_mut() {
        if !is_text_layer(layer) {
            continue;
        }
        let Some(style) = text_style_mut(layer) else {
            continue;
        };
        let Some(text) = style.get("t").and_then(Value::as_str) else {
            continue;
        };
        let normalized = normalize_breaks(text);
        if normalized != text {
            style["t"] = Value::from(normalized);
            changed += 1;
        }
    }
    changed
}

/// Locate an asset by id in the document's `assets` array.
pub fn find_asset_mut<'a>(root: &'a mut Value, asset_id: &str) -> Option<&'a mut Value> {
    root.get_mut("assets")?
        .as_array_mut()?
        .iter_mut()
        .find(|asset| asset.get("id").and_then(Value::as_str) == Some(asset_id))
}

/// The file name (`p`) an asset currently references.
pub fn asset_file_name(asset: &Value) -> Option<&str> {
    asset.get("p").and_then(Value::as_str)
}

/// Rewrite an asset's directory (`u`) and file name (`p`) references.
pub fn set_asset_reference(asset: &mut Value, directory: &str, file_name: &str) {
    asset["u"] = Value::from(directory);
    asset["p"] = Value::from(file_name);
}
