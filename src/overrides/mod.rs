//! Layer override specifications.
//!
//! Overrides arrive as a JSON file with two sections: `textLayers`, keyed by
//! layer name, and `imageLayers`, keyed by asset id. The file's own parent
//! directory is captured so relative image paths can be resolved against it
//! later.
//!
//! ```json
//! {
//!   "textLayers": {
//!     "title": {"minSize": 20, "maxSize": 80, "value": "HELLO", "fallbackText": "HI"}
//!   },
//!   "imageLayers": {
//!     "image_0": {"filePath": "assets/", "fileName": "logo.png"}
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::document::edit::normalize_breaks;
use crate::foundation::error::{KinoraError, KinoraResult};

/// Text substitution and auto-fit request for one named layer.
///
/// Sizes and widths use `0.0` for "not specified"; auto-fit only runs when
/// both `min_size` and `max_size` are positive.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextOverride {
    /// Lower bound of the font-size search.
    pub min_size: f64,
    /// Upper bound of the font-size search.
    pub max_size: f64,
    /// Substitute content when the requested value cannot fit at `min_size`.
    pub fallback_text: String,
    /// Target box width override; falls back to the layer's declared box
    /// width, then the canvas width.
    pub text_box_width: f64,
    /// Requested text content. Empty keeps the layer's existing text.
    pub value: String,
}

/// Image asset substitution for one asset id.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageOverride {
    /// New directory for the asset. Relative paths stay relative for the
    /// engine's resource provider to resolve.
    pub file_path: String,
    /// New file name, or a full path when `file_path` is empty.
    pub file_name: String,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct OverrideFile {
    text_layers: BTreeMap<String, TextOverride>,
    image_layers: BTreeMap<String, ImageOverride>,
}

/// Parsed and validated set of layer overrides.
#[derive(Clone, Debug, Default)]
pub struct OverrideSet {
    /// Text overrides keyed by layer name.
    pub text: BTreeMap<String, TextOverride>,
    /// Image overrides keyed by asset id.
    pub images: BTreeMap<String, ImageOverride>,
    /// Directory relative image paths are checked against (the overrides
    /// file's parent directory).
    pub base_dir: PathBuf,
}

impl OverrideSet {
    /// Read and parse an overrides file, capturing its parent directory.
    pub fn from_path(path: impl AsRef<Path>) -> KinoraResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read overrides file '{}'", path.display()))?;
        let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let base_dir = std::fs::canonicalize(&base_dir).unwrap_or(base_dir);
        Self::from_str(&json, base_dir)
    }

    /// Parse an overrides document with an explicit base directory.
    pub fn from_str(json: &str, base_dir: impl Into<PathBuf>) -> KinoraResult<Self> {
        let file: OverrideFile = serde_json::from_str(json)
            .map_err(|e| KinoraError::validation(format!("failed to parse overrides: {e}")))?;

        let mut set = Self {
            text: file.text_layers,
            images: file.image_layers,
            base_dir: base_dir.into(),
        };
        for (name, spec) in &mut set.text {
            validate_text_override(name, spec)?;
            spec.value = normalize_breaks(&spec.value);
            spec.fallback_text = normalize_breaks(&spec.fallback_text);
        }
        Ok(set)
    }

    /// `true` when no override of either kind is present.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.images.is_empty()
    }
}

fn validate_text_override(name: &str, spec: &TextOverride) -> KinoraResult<()> {
    if spec.min_size < 0.0 {
        return Err(KinoraError::validation(format!(
            "minSize cannot be negative for layer '{name}'"
        )));
    }
    if spec.max_size < 0.0 {
        return Err(KinoraError::validation(format!(
            "maxSize cannot be negative for layer '{name}'"
        )));
    }
    if spec.text_box_width < 0.0 {
        return Err(KinoraError::validation(format!(
            "textBoxWidth cannot be negative for layer '{name}'"
        )));
    }
    if spec.min_size > 0.0 && spec.max_size > 0.0 && spec.max_size <= spec.min_size {
        return Err(KinoraError::validation(format!(
            "maxSize ({}) must be greater than minSize ({}) for layer '{name}'",
            spec.max_size, spec.min_size
        )));
    }
    Ok(())
}
