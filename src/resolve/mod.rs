//! Layer override resolution.
//!
//! Rewrites an [`AnimationDocument`] before it reaches the rendering engine:
//! image asset references are redirected, requested text is substituted with
//! an auto-fitted font size, and off-screen position keyframes are
//! compensated for text-width changes.
//!
//! Resolution is two-pass: a read-only measurement pass produces one
//! [`LayerModificationPlan`] per override layer, then an apply pass mutates
//! the document tree and re-serializes it once.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::document::{AnimationDocument, edit};
use crate::foundation::error::{KinoraError, KinoraResult};
use crate::overrides::{ImageOverride, OverrideSet, TextOverride};
use crate::text::fit::{FitOutcome, fit_font_size};
use crate::text::measure::{MeasureMode, WidthMeasurer};

/// Width change below which keyframe compensation is skipped.
const WIDTH_CHANGE_EPS: f64 = 0.1;

/// Options for a resolution run.
#[derive(Clone, Copy, Debug)]
pub struct ResolveOptions {
    /// Fraction of the target width actually budgeted for text, leaving a
    /// visual margin. `0.97` budgets 97% (1.5% padding per side).
    pub text_padding: f64,
    /// Measurement accuracy mode used for all width queries.
    pub measure_mode: MeasureMode,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            text_padding: 0.97,
            measure_mode: MeasureMode::default(),
        }
    }
}

impl ResolveOptions {
    fn validate(&self) -> KinoraResult<()> {
        if !self.text_padding.is_finite() || self.text_padding <= 0.0 || self.text_padding > 1.0 {
            return Err(KinoraError::validation(
                "text_padding must be within (0.0, 1.0]",
            ));
        }
        Ok(())
    }
}

/// Planned modification for one text layer, computed in the read-only pass.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerModificationPlan {
    /// Target layer name.
    pub layer_name: String,
    /// Resolved text content (requested value or fallback, never a blend).
    pub text: String,
    /// Resolved font size.
    pub size: f64,
    /// Measured width of the resolved text at the authored size.
    pub original_width: f64,
    /// Measured width of the resolved text at the resolved size.
    pub new_width: f64,
}

/// Apply every override in `overrides` to `doc` and return the processed
/// document.
///
/// A document resolved against an empty override set is returned unchanged,
/// byte for byte. Layer-level problems (unknown layer, missing image file,
/// URL paths) are diagnostics, not failures; the affected override is
/// skipped and the original document content retained.
pub fn resolve(
    mut doc: AnimationDocument,
    overrides: &OverrideSet,
    opts: &ResolveOptions,
    measurer: &mut dyn WidthMeasurer,
) -> KinoraResult<AnimationDocument> {
    opts.validate()?;
    if overrides.is_empty() {
        return Ok(doc);
    }

    debug!(
        text_overrides = overrides.text.len(),
        image_overrides = overrides.images.len(),
        mode = ?opts.measure_mode,
        padding = opts.text_padding,
        "resolving layer overrides"
    );

    let mut edited = false;

    for (asset_id, spec) in &overrides.images {
        if apply_image_override(doc.root_mut(), asset_id, spec, &overrides.base_dir) {
            edited = true;
        }
    }

    let canvas_width = doc.meta().width;
    let mut plans = Vec::with_capacity(overrides.text.len());
    for (name, spec) in &overrides.text {
        if let Some(plan) = plan_text_layer(doc.root(), name, spec, canvas_width, opts, measurer) {
            plans.push(plan);
        }
    }

    for plan in &plans {
        if !edit::set_text_layer_value(doc.root_mut(), &plan.layer_name, &plan.text, plan.size) {
            warn!(layer = %plan.layer_name, "text style block disappeared between passes");
            continue;
        }
        edited = true;
        debug!(
            layer = %plan.layer_name,
            size = plan.size,
            width = plan.new_width,
            "applied text override"
        );

        // Wider text pushes off-screen entry/exit keyframes further out so
        // they stay fully off-screen. Narrower text is deliberately left
        // alone.
        let width_diff = plan.new_width - plan.original_width;
        if width_diff > WIDTH_CHANGE_EPS {
            let shifted = edit::shift_offscreen_position_keyframes(
                doc.root_mut(),
                &plan.layer_name,
                width_diff,
            );
            if shifted > 0 {
                debug!(
                    layer = %plan.layer_name,
                    shifted,
                    delta = width_diff,
                    "compensated off-screen position keyframes"
                );
            }
        }
    }

    if edited {
        doc.rebuild()?;
    }
    Ok(doc)
}

fn plan_text_layer(
    root: &Value,
    name: &str,
    spec: &TextOverride,
    canvas_width: f64,
    opts: &ResolveOptions,
    measurer: &mut dyn WidthMeasurer,
) -> Option<LayerModificationPlan> {
    let Some(info) = edit::extract_text_layer_info(root, name) else {
        warn!(layer = name, "text layer not found or missing font info; skipping override");
        return None;
    };

    let mut text = if spec.value.is_empty() {
        info.text.clone()
    } else {
        spec.value.clone()
    };
    if text.is_empty() {
        warn!(layer = name, "no text value to apply; skipping override");
        return None;
    }

    // Target width priority: override > layer's declared box > canvas.
    let target_width = if spec.text_box_width > 0.0 {
        spec.text_box_width
    } else {
        info.box_width.unwrap_or(canvas_width)
    };

    let mode = opts.measure_mode;
    let authored_size = info.font.size;
    let original_width = measurer.measure_width(&info.font, authored_size, &text, mode);

    let auto_fit = spec.min_size > 0.0 && spec.max_size > 0.0;
    let (size, new_width) = if auto_fit {
        let padded_target = target_width * opts.text_padding;
        let outcome = {
            let mut measure = |s: f64| measurer.measure_width(&info.font, s, &text, mode);
            fit_font_size(&mut measure, authored_size, spec.min_size, spec.max_size, padded_target)
        };

        match outcome {
            FitOutcome::Size(size) => {
                (size, measurer.measure_width(&info.font, size, &text, mode))
            }
            FitOutcome::NoFit => {
                warn!(
                    layer = name,
                    min_size = spec.min_size,
                    target = padded_target,
                    "text does not fit at minimum size; substituting fallback text"
                );
                text = spec.fallback_text.clone();

                let outcome = {
                    let mut measure = |s: f64| measurer.measure_width(&info.font, s, &text, mode);
                    fit_font_size(
                        &mut measure,
                        spec.min_size,
                        spec.min_size,
                        spec.max_size,
                        padded_target,
                    )
                };
                match outcome {
                    FitOutcome::Size(size) => {
                        (size, measurer.measure_width(&info.font, size, &text, mode))
                    }
                    FitOutcome::NoFit => {
                        // Fallback overflows too: accept the minimum size.
                        warn!(
                            layer = name,
                            "fallback text overflows at minimum size; accepting overflow"
                        );
                        (
                            spec.min_size,
                            measurer.measure_width(&info.font, spec.min_size, &text, mode),
                        )
                    }
                }
            }
        }
    } else {
        (authored_size, original_width)
    };

    Some(LayerModificationPlan {
        layer_name: name.to_owned(),
        text,
        size,
        original_width,
        new_width,
    })
}

fn is_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

fn ends_with_separator(path: &str) -> bool {
    path.ends_with('/') || path.ends_with('\\')
}

/// Normalize a directory reference: non-empty directories carry a trailing
/// separator, a bare root collapses to the empty directory.
fn normalize_dir(mut dir: String) -> String {
    if !dir.is_empty() && !ends_with_separator(&dir) {
        dir.push('/');
    }
    if dir == "/" || dir == "\\" {
        dir.clear();
    }
    dir
}

/// Resolve the `(directory, file name)` pair an image override requests.
///
/// `existing_file_name` is the asset's current reference, used when only a
/// directory change is requested.
fn resolve_image_reference(
    spec: &ImageOverride,
    existing_file_name: Option<&str>,
) -> Result<(String, String), String> {
    match (spec.file_path.is_empty(), spec.file_name.is_empty()) {
        (true, true) => Err("both filePath and fileName are empty".to_owned()),
        // fileName carries a full path.
        (true, false) => {
            let full = Path::new(&spec.file_name);
            if full.is_absolute() {
                let dir = full
                    .parent()
                    .map(|d| d.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let name = full
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| format!("fileName '{}' has no file component", spec.file_name))?;
                Ok((normalize_dir(dir), name))
            } else {
                // Relative: keep it relative, split at the last separator.
                match spec.file_name.rfind(['/', '\\']) {
                    Some(i) => Ok((
                        normalize_dir(spec.file_name[..=i].to_owned()),
                        spec.file_name[i + 1..].to_owned(),
                    )),
                    None => Ok((String::new(), spec.file_name.clone())),
                }
            }
        }
        // Directory and file name both requested. Relative directories stay
        // relative; the engine's resource provider resolves them against the
        // document's own directory.
        (false, false) => Ok((
            normalize_dir(spec.file_path.clone()),
            spec.file_name.clone(),
        )),
        // Directory change only: the file name is taken from the asset's
        // existing reference.
        (false, true) => {
            let name = existing_file_name
                .filter(|n| !n.is_empty())
                .ok_or_else(|| "asset has no existing file reference".to_owned())?;
            Ok((normalize_dir(spec.file_path.clone()), name.to_owned()))
        }
    }
}

/// Filesystem location to check the rewritten reference against. Relative
/// directories resolve against the overrides file's own directory.
fn reference_check_path(dir: &str, file_name: &str, base_dir: &Path) -> PathBuf {
    let dir_path = Path::new(dir);
    if dir.is_empty() {
        base_dir.join(file_name)
    } else if dir_path.is_absolute() {
        dir_path.join(file_name)
    } else {
        base_dir.join(dir_path).join(file_name)
    }
}

fn apply_image_override(
    root: &mut Value,
    asset_id: &str,
    spec: &ImageOverride,
    base_dir: &Path,
) -> bool {
    if is_url(&spec.file_path) || is_url(&spec.file_name) {
        warn!(asset = asset_id, "URL paths are not supported; keeping original asset reference");
        return false;
    }

    let Some(asset) = edit::find_asset_mut(root, asset_id) else {
        warn!(asset = asset_id, "asset id not found in assets array");
        return false;
    };

    let existing = edit::asset_file_name(asset).map(str::to_owned);
    let (dir, file_name) = match resolve_image_reference(spec, existing.as_deref()) {
        Ok(resolved) => resolved,
        Err(msg) => {
            warn!(asset = asset_id, %msg, "invalid image override; skipping");
            return false;
        }
    };

    let check = reference_check_path(&dir, &file_name, base_dir);
    if !check.is_file() {
        warn!(
            asset = asset_id,
            path = %check.display(),
            "image file not found; keeping original asset reference"
        );
        return false;
    }

    edit::set_asset_reference(asset, &dir, &file_name);
    debug!(asset = asset_id, dir = %dir, file = %file_name, "applied image override");
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(path: &str, name: &str) -> ImageOverride {
        ImageOverride {
            file_path: path.to_owned(),
            file_name: name.to_owned(),
        }
    }

    #[test]
    fn both_parts_present_combine_with_trailing_separator() {
        let (dir, name) = resolve_image_reference(&spec("assets", "logo.png"), None).unwrap();
        assert_eq!(dir, "assets/");
        assert_eq!(name, "logo.png");

        let (dir, _) = resolve_image_reference(&spec("assets/", "logo.png"), None).unwrap();
        assert_eq!(dir, "assets/");
    }

    #[test]
    fn file_name_only_carries_a_full_path() {
        let (dir, name) =
            resolve_image_reference(&spec("", "/opt/media/logo.png"), None).unwrap();
        assert_eq!(dir, "/opt/media/");
        assert_eq!(name, "logo.png");

        let (dir, name) = resolve_image_reference(&spec("", "media/logo.png"), None).unwrap();
        assert_eq!(dir, "media/");
        assert_eq!(name, "logo.png");

        let (dir, name) = resolve_image_reference(&spec("", "logo.png"), None).unwrap();
        assert_eq!(dir, "");
        assert_eq!(name, "logo.png");
    }

    #[test]
    fn directory_only_keeps_existing_file_name() {
        let (dir, name) =
            resolve_image_reference(&spec("elsewhere", ""), Some("img_0.png")).unwrap();
        assert_eq!(dir, "elsewhere/");
        assert_eq!(name, "img_0.png");

        assert!(resolve_image_reference(&spec("elsewhere", ""), None).is_err());
    }

    #[test]
    fn empty_override_is_rejected() {
        assert!(resolve_image_reference(&spec("", ""), None).is_err());
    }

    #[test]
    fn bare_root_directory_collapses_to_empty() {
        assert_eq!(normalize_dir("/".to_owned()), "");
        assert_eq!(normalize_dir(String::new()), "");
        assert_eq!(normalize_dir("a".to_owned()), "a/");
    }

    #[test]
    fn url_detection() {
        assert!(is_url("http://example.com/a.png"));
        assert!(is_url("https://example.com/a.png"));
        assert!(!is_url("httpserver/a.png"));
    }

    #[test]
    fn check_path_resolves_relative_dirs_against_base() {
        let base = Path::new("/base");
        assert_eq!(
            reference_check_path("assets/", "a.png", base),
            PathBuf::from("/base/assets/a.png")
        );
        assert_eq!(
            reference_check_path("", "a.png", base),
            PathBuf::from("/base/a.png")
        );
        assert_eq!(
            reference_check_path("/abs/", "a.png", base),
            PathBuf::from("/abs/a.png")
        );
    }
}
