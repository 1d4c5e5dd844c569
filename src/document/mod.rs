//! Animation document model.
//!
//! An [`AnimationDocument`] holds the serialized document text alongside a
//! parsed tree and metadata derived from it. The tree is the editing surface
//! used by the override resolver; the text is what the rendering engine is
//! eventually built from. Edits go through [`edit`] operations and become
//! visible in the text after a single [`AnimationDocument::rebuild`].

pub mod edit;

use std::path::Path;

use anyhow::Context as _;
use serde_json::Value;

use crate::foundation::error::{KinoraError, KinoraResult};

/// Metadata derived from the document at parse time.
///
/// The rendering engine remains the authority for timing at render time;
/// these values serve document-side consumers such as target-width
/// resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DocumentMeta {
    /// Canvas width in pixels.
    pub width: f64,
    /// Canvas height in pixels.
    pub height: f64,
    /// Duration in seconds, `(op - ip) / fr`.
    pub duration_secs: f64,
    /// Native frame rate declared by the document.
    pub frame_rate: f64,
}

/// Canvas width assumed when the document declares none.
pub(crate) const DEFAULT_CANVAS_WIDTH: f64 = 720.0;

/// A parsed animation document plus its serialized form.
#[derive(Clone, Debug)]
pub struct AnimationDocument {
    raw: String,
    root: Value,
    meta: DocumentMeta,
}

impl AnimationDocument {
    /// Parse a document from its serialized JSON text.
    pub fn from_str(raw: impl Into<String>) -> KinoraResult<Self> {
        let raw = raw.into();
        let root: Value = serde_json::from_str(&raw)
            .map_err(|e| KinoraError::document(format!("failed to parse document JSON: {e}")))?;
        if !root.is_object() {
            return Err(KinoraError::document(
                "document root must be a JSON object",
            ));
        }
        let meta = derive_meta(&root);
        Ok(Self { raw, root, meta })
    }

    /// Read and parse a document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> KinoraResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read document '{}'", path.display()))?;
        Self::from_str(raw)
    }

    /// The serialized document text.
    ///
    /// Tree edits are reflected here only after [`rebuild`](Self::rebuild).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Derived document metadata.
    pub fn meta(&self) -> DocumentMeta {
        self.meta
    }

    /// Borrow the parsed tree.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Mutably borrow the parsed tree for editing.
    pub fn root_mut(&mut self) -> &mut Value {
        &mut self.root
    }

    /// Re-serialize the tree into the document text.
    ///
    /// String values inserted into the tree are escaped here by the
    /// serializer; untouched object keys keep their original order.
    pub fn rebuild(&mut self) -> KinoraResult<()> {
        self.raw = serde_json::to_string_pretty(&self.root)
            .map_err(|e| KinoraError::document(format!("failed to serialize document: {e}")))?;
        self.meta = derive_meta(&self.root);
        Ok(())
    }
}

fn derive_meta(root: &Value) -> DocumentMeta {
    let num = |key: &str| root.get(key).and_then(Value::as_f64);
    let frame_rate = num("fr").filter(|fr| *fr > 0.0).unwrap_or(30.0);
    let in_point = num("ip").unwrap_or(0.0);
    let out_point = num("op").unwrap_or(in_point);
    DocumentMeta {
        width: num("w").filter(|w| *w > 0.0).unwrap_or(DEFAULT_CANVAS_WIDTH),
        height: num("h").unwrap_or(0.0),
        duration_secs: ((out_point - in_point) / frame_rate).max(0.0),
        frame_rate,
    }
}
