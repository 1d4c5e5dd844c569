//! Text width measurement.
//!
//! Wraps the Parley shaping stack (and, for [`MeasureMode::PixelPerfect`],
//! the `vello_cpu` rasterizer) behind the [`WidthMeasurer`] seam so sizing
//! logic can be driven by a deterministic fake in tests.

use std::borrow::Cow;

use crate::document::edit::{CANONICAL_BREAK, FontDescriptor};

/// Accuracy/cost trade-off for width measurement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MeasureMode {
    /// Glyph-advance query only. Fastest.
    Fast,
    /// Positioned glyph-run extent; accounts for kerning and bearings.
    #[default]
    Accurate,
    /// Rasterizes the glyph run offscreen and scans for the rightmost
    /// non-transparent column, floored at the [`Accurate`](Self::Accurate)
    /// extent so anti-aliasing can never underestimate.
    PixelPerfect,
}

/// Measures the rendered width of text at a given font size.
///
/// Implementations must return a finite, non-negative value for any input.
pub trait WidthMeasurer {
    fn measure_width(
        &mut self,
        font: &FontDescriptor,
        size: f64,
        text: &str,
        mode: MeasureMode,
    ) -> f64;
}

/// Extra rows/columns around the offscreen raster so anti-aliased edges are
/// never clipped.
const RASTER_PADDING: f32 = 20.0;

/// Production measurer backed by Parley font lookup and shaping.
///
/// Fonts are resolved by family with the layer's full font name and a
/// generic family as fallbacks, so an unresolvable font degrades to a
/// default typeface instead of failing.
pub struct TextMeasurer {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<()>,
}

impl Default for TextMeasurer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextMeasurer {
    /// Construct a measurer over the system font collection.
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    /// Register extra font bytes (e.g. document-bundled fonts) with the
    /// underlying collection.
    pub fn register_font_bytes(&mut self, bytes: Vec<u8>) {
        let _ = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes), None);
    }

    fn layout_line(&mut self, font: &FontDescriptor, size: f64, line: &str) -> parley::Layout<()> {
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, line, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(font_stack(font))),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size as f32));
        if font.style.contains("Bold") {
            builder.push_default(parley::style::StyleProperty::FontWeight(
                parley::style::FontWeight::BOLD,
            ));
        }
        if font.style.contains("Italic") {
            builder.push_default(parley::style::StyleProperty::FontStyle(
                parley::style::FontStyle::Italic,
            ));
        }

        let mut layout: parley::Layout<()> = builder.build(line);
        layout.break_all_lines(None);
        layout
    }

    fn measure_line(&mut self, font: &FontDescriptor, size: f64, line: &str, mode: MeasureMode) -> f64 {
        let layout = self.layout_line(font, size, line);

        let advance = f64::from(layout.width());
        if mode == MeasureMode::Fast {
            return sanitize(advance);
        }

        let Some((min_x, max_x)) = glyph_extent(&layout) else {
            return sanitize(advance);
        };
        let extent = f64::from(max_x - min_x);

        if mode == MeasureMode::Accurate {
            return sanitize(extent);
        }

        match rasterized_width(&layout, min_x, max_x) {
            Some(rendered) => sanitize(rendered.max(extent)),
            None => sanitize(extent),
        }
    }
}

impl WidthMeasurer for TextMeasurer {
    /// Measure the width of `text` at `size`.
    ///
    /// Multi-line text is split on the canonical break marker; the result is
    /// the widest line.
    fn measure_width(
        &mut self,
        font: &FontDescriptor,
        size: f64,
        text: &str,
        mode: MeasureMode,
    ) -> f64 {
        if !size.is_finite() || size <= 0.0 {
            return 0.0;
        }

        let mut max_width = 0.0f64;
        for line in text.split([CANONICAL_BREAK, '\n']) {
            if line.is_empty() {
                continue;
            }
            max_width = max_width.max(self.measure_line(font, size, line, mode));
        }
        max_width
    }
}

fn sanitize(width: f64) -> f64 {
    if width.is_finite() { width.max(0.0) } else { 0.0 }
}

/// Comma-separated lookup stack: family first, the full font name as a
/// legacy fallback, then a generic family so resolution can never fail.
fn font_stack(font: &FontDescriptor) -> String {
    let mut stack = String::new();
    for name in [font.family.as_str(), font.name.as_str()] {
        if name.is_empty() {
            continue;
        }
        if !stack.is_empty() {
            stack.push_str(", ");
        }
        stack.push_str(name);
    }
    if !stack.is_empty() {
        stack.push_str(", ");
    }
    stack.push_str("sans-serif");
    stack
}

/// Horizontal extent `[min_x, max_x]` over all positioned glyphs, including
/// each glyph's advance. `None` when the layout produced no glyphs.
fn glyph_extent(layout: &parley::Layout<()>) -> Option<(f32, f32)> {
    let mut min_x = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            for glyph in run.glyphs() {
                min_x = min_x.min(glyph.x);
                max_x = max_x.max(glyph.x + glyph.advance);
            }
        }
    }
    (min_x.is_finite() && max_x.is_finite() && max_x > min_x).then_some((min_x, max_x))
}

/// Render the layout into an offscreen pixmap and measure from the text's
/// logical start to the rightmost non-transparent column.
fn rasterized_width(layout: &parley::Layout<()>, min_x: f32, max_x: f32) -> Option<f64> {
    let surface_w = ((max_x - min_x) + RASTER_PADDING * 2.0).ceil();
    let surface_h = (layout.height() + RASTER_PADDING * 2.0).ceil();
    if !surface_w.is_finite() || !surface_h.is_finite() || surface_w <= 0.0 || surface_h <= 0.0 {
        return None;
    }
    let width = surface_w as u32;
    let height = surface_h as u32;
    if width == 0 || height == 0 || width > u16::MAX as u32 || height > u16::MAX as u32 {
        return None;
    }

    let mut ctx = vello_cpu::RenderContext::new(width as u16, height as u16);
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(0, 0, 0, 255));

    // Place the run at a known start column, compensating for a negative
    // left side bearing so the scan measures from the logical text start.
    let x0 = RASTER_PADDING - min_x;
    let y0 = RASTER_PADDING;

    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let font = run.run().font();
            let font_data = vello_cpu::peniko::FontData::new(
                vello_cpu::peniko::Blob::from(font.data.as_ref().to_vec()),
                font.index,
            );
            let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x + x0,
                y: g.y + y0,
            });
            ctx.glyph_run(&font_data)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
    ctx.flush();

    let mut pixmap = vello_cpu::Pixmap::new(width as u16, height as u16);
    ctx.render_to_pixmap(&mut pixmap);

    let start_x = RASTER_PADDING as usize;
    let data = pixmap.data_as_u8_slice();
    let mut rightmost: Option<usize> = None;
    for y in 0..height as usize {
        let row = y * width as usize;
        for x in start_x..width as usize {
            let alpha = data[(row + x) * 4 + 3];
            if alpha > 0 {
                rightmost = Some(rightmost.map_or(x, |r| r.max(x)));
            }
        }
    }

    // +1 converts a column index to a width; another +1 of safety margin
    // against anti-aliased edges the alpha threshold missed.
    rightmost.map(|r| (r - start_x + 1) as f64 + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn font() -> FontDescriptor {
        FontDescriptor {
            name: "SegoeUI-Bold".to_owned(),
            family: "Segoe UI".to_owned(),
            style: "Bold".to_owned(),
            size: 42.0,
        }
    }

    #[test]
    fn font_stack_orders_family_name_generic() {
        assert_eq!(font_stack(&font()), "Segoe UI, SegoeUI-Bold, sans-serif");
        let nameless = FontDescriptor::default();
        assert_eq!(font_stack(&nameless), "sans-serif");
    }

    #[test]
    fn widths_are_finite_and_non_negative() {
        let mut m = TextMeasurer::new();
        for mode in [MeasureMode::Fast, MeasureMode::Accurate, MeasureMode::PixelPerfect] {
            let w = m.measure_width(&font(), 24.0, "HELLO WORLD", mode);
            assert!(w.is_finite());
            assert!(w >= 0.0);
        }
    }

    #[test]
    fn invalid_size_measures_zero() {
        let mut m = TextMeasurer::new();
        assert_eq!(m.measure_width(&font(), 0.0, "X", MeasureMode::Fast), 0.0);
        assert_eq!(
            m.measure_width(&font(), f64::NAN, "X", MeasureMode::Fast),
            0.0
        );
    }

    #[test]
    fn empty_text_measures_zero() {
        let mut m = TextMeasurer::new();
        assert_eq!(m.measure_width(&font(), 24.0, "", MeasureMode::Accurate), 0.0);
    }

    #[test]
    fn multiline_width_is_the_widest_line() {
        let mut m = TextMeasurer::new();
        let longest = m.measure_width(&font(), 24.0, "LONGEST LINE HERE", MeasureMode::Fast);
        let multi = m.measure_width(
            &font(),
            24.0,
            "A\rLONGEST LINE HERE\rMID",
            MeasureMode::Fast,
        );
        assert_eq!(multi, longest);
    }
}
