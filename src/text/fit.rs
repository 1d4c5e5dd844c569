//! Font-size search against a width budget.

/// Result of a fit search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FitOutcome {
    /// A size in range whose measured width stays within the target.
    Size(f64),
    /// The text exceeds the target width even at the minimum size; the
    /// caller must substitute fallback content and retry.
    NoFit,
}

/// Iterations for growing toward `max_size` when the text already fits.
/// Sub-pixel precision is not needed here.
const GROW_STEPS: u32 = 10;

/// Iterations for shrinking toward `min_size` when the text overflows.
const SHRINK_STEPS: u32 = 15;

/// Bracket width below which the shrink search stops early.
const SHRINK_BRACKET_EPS: f64 = 0.1;

/// Find the largest font size in `[min_size, max_size]` whose measured width
/// does not exceed `target_width`.
///
/// `measure` maps a candidate size to the measured width of the text at that
/// size and is assumed monotonic in size. A non-positive `target_width`
/// means unconstrained; the authored size is returned unchanged.
pub fn fit_font_size(
    measure: &mut dyn FnMut(f64) -> f64,
    authored_size: f64,
    min_size: f64,
    max_size: f64,
    target_width: f64,
) -> FitOutcome {
    if target_width <= 0.0 {
        return FitOutcome::Size(authored_size);
    }

    let authored_width = measure(authored_size);

    if authored_width <= target_width {
        // Fits already: grow toward max_size.
        let mut lo = authored_size;
        let mut hi = max_size;
        let mut best = authored_size;

        for _ in 0..GROW_STEPS {
            let mid = (lo + hi) / 2.0;
            if measure(mid) <= target_width {
                best = mid;
                lo = mid;
            } else {
                hi = mid;
            }
        }

        return FitOutcome::Size(best.min(max_size));
    }

    if measure(min_size) > target_width {
        return FitOutcome::NoFit;
    }

    // Overflows at the authored size but fits at min_size: shrink.
    let mut lo = min_size;
    let mut hi = authored_size;
    let mut best = min_size;

    for _ in 0..SHRINK_STEPS {
        let mid = (lo + hi) / 2.0;
        if measure(mid) <= target_width {
            best = mid;
            lo = mid;
        } else {
            hi = mid;
        }
        if (hi - lo) < SHRINK_BRACKET_EPS {
            break;
        }
    }

    FitOutcome::Size(best)
}
