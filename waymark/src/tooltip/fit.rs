//! Text fitting for the tooltip box.
//!
//! The box holds at most `max_lines` lines. Text that measures taller is cut
//! to the longest char prefix that still fits with the ellipsis appended,
//! found by binary search so the measurement count stays logarithmic in the
//! text length.

use unicode_width::UnicodeWidthChar;

use crate::config::TooltipConfig;

/// Monospace cell width used when the host does not supply one.
pub const CHAR_WIDTH: f32 = 8.4;

/// Measures wrapped text.
pub trait TextMeasure {
    /// Total box height of `text` laid out at `width`, including padding and
    /// border.
    fn measure(&self, text: &str, width: f32) -> f32;
}

/// Greedy word-wrapping measurer over fixed-width cells.
///
/// Wide (CJK) characters take two cells and combining marks none, as
/// reported by `unicode-width`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMeasure {
    pub char_width: f32,
    pub line_height: f32,
    pub padding: f32,
    pub border: f32,
}

impl MonospaceMeasure {
    pub fn from_config(config: &TooltipConfig) -> Self {
        Self {
            char_width: CHAR_WIDTH,
            line_height: config.line_height,
            padding: config.padding,
            border: config.border,
        }
    }

    pub fn with_char_width(mut self, char_width: f32) -> Self {
        self.char_width = char_width;
        self
    }

    /// Columns available inside the box at `width`.
    pub fn columns(&self, width: f32) -> usize {
        let inner = width - 2.0 * self.padding - 2.0 * self.border;
        if inner <= 0.0 || self.char_width <= 0.0 {
            return 1;
        }
        ((inner / self.char_width).floor() as usize).max(1)
    }
}

impl TextMeasure for MonospaceMeasure {
    fn measure(&self, text: &str, width: f32) -> f32 {
        let lines = wrapped_line_count(text, self.columns(width));
        lines as f32 * self.line_height + 2.0 * self.padding + 2.0 * self.border
    }
}

/// Number of visual lines for `text` greedily wrapped at `max_cols`.
///
/// Words break at whitespace; a word wider than a line breaks per character.
/// Empty text still occupies one line.
pub fn wrapped_line_count(text: &str, max_cols: usize) -> usize {
    let max_cols = max_cols.max(1);
    let mut lines = 1;
    let mut used = 0usize;

    for word in text.split_whitespace() {
        let width: usize = word.chars().map(|c| c.width().unwrap_or(0)).sum();
        let needed = if used == 0 { width } else { used + 1 + width };
        if needed <= max_cols {
            used = needed;
            continue;
        }

        if used > 0 {
            lines += 1;
            used = 0;
        }
        if width <= max_cols {
            used = width;
            continue;
        }
        for ch in word.chars() {
            let cw = ch.width().unwrap_or(0);
            if used + cw > max_cols && used > 0 {
                lines += 1;
                used = 0;
            }
            used += cw;
        }
    }
    lines
}

/// Outcome of fitting text into the tooltip box.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub text: String,
    pub height: f32,
    pub truncated: bool,
    /// Calls made to the measurer.
    pub measurements: usize,
}

/// Fit `text` into a box of `max_height` at `width`.
pub fn fit_text(
    text: &str,
    width: f32,
    max_height: f32,
    ellipsis: &str,
    measure: &dyn TextMeasure,
) -> FitResult {
    let full_height = measure.measure(text, width);
    if full_height <= max_height {
        return FitResult {
            text: text.to_string(),
            height: full_height,
            truncated: false,
            measurements: 1,
        };
    }

    let chars: Vec<char> = text.chars().collect();
    let candidate = |len: usize| -> String {
        let prefix: String = chars[..len].iter().collect();
        format!("{}{}", prefix.trim_end(), ellipsis)
    };

    let mut measurements = 1;
    let mut lo = 0usize;
    let mut hi = chars.len();
    let mut best: Option<(String, f32)> = None;

    // Largest `len` whose candidate fits; invariant: every len < lo fits.
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        let attempt = candidate(mid);
        let height = measure.measure(&attempt, width);
        measurements += 1;
        if height <= max_height {
            lo = mid;
            best = Some((attempt, height));
        } else {
            hi = mid - 1;
        }
    }

    let (text, height) = match best {
        Some(found) => found,
        None => {
            let bare = candidate(0);
            measurements += 1;
            let height = measure.measure(&bare, width);
            (bare, height)
        }
    };

    FitResult {
        text,
        height,
        truncated: true,
        measurements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counting<'a> {
        inner: &'a MonospaceMeasure,
        calls: Cell<usize>,
    }

    impl TextMeasure for Counting<'_> {
        fn measure(&self, text: &str, width: f32) -> f32 {
            self.calls.set(self.calls.get() + 1);
            self.inner.measure(text, width)
        }
    }

    fn measurer() -> MonospaceMeasure {
        MonospaceMeasure::from_config(&TooltipConfig::default())
    }

    fn long_text(chars: usize) -> String {
        let words = ["minimap", "anchor", "scroll", "marker", "tooltip", "identity", "gap"];
        let mut text = String::new();
        let mut i = 0;
        while text.chars().count() < chars {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(words[i % words.len()]);
            i += 1;
        }
        text.chars().take(chars).collect()
    }

    #[test]
    fn wraps_on_words_and_breaks_long_words() {
        assert_eq!(wrapped_line_count("", 10), 1);
        assert_eq!(wrapped_line_count("hello world", 11), 1);
        assert_eq!(wrapped_line_count("hello world", 10), 2);
        assert_eq!(wrapped_line_count("abcdefghij", 4), 3);
        // CJK is two cells wide.
        assert_eq!(wrapped_line_count("\u{4f60}\u{597d}\u{4f60}\u{597d}", 4), 2);
    }

    #[test]
    fn short_text_is_returned_unmodified() {
        let m = measurer();
        let result = fit_text("A short note", 160.0, 76.0, "\u{2026}", &m);
        assert!(!result.truncated);
        assert_eq!(result.text, "A short note");
        assert_eq!(result.height, 18.0 + 22.0);
        assert_eq!(result.measurements, 1);
    }

    #[test]
    fn long_text_fits_three_line_box_with_ellipsis() {
        let config = TooltipConfig::default();
        let m = measurer();
        let text = long_text(500);
        let result = fit_text(&text, 160.0, config.box_height(), &config.ellipsis, &m);

        assert!(result.truncated);
        assert!(result.height <= 76.0);
        assert!(result.text.ends_with('\u{2026}'));
        let body = result.text.trim_end_matches('\u{2026}');
        assert!(text.starts_with(body));
        assert!(body.chars().count() > 20);
    }

    #[test]
    fn prefix_is_the_longest_that_fits() {
        let config = TooltipConfig::default();
        let m = measurer();
        let text = long_text(300);
        let result = fit_text(&text, 160.0, config.box_height(), "\u{2026}", &m);

        // One more char of the original no longer fits.
        let kept = result.text.trim_end_matches('\u{2026}').chars().count();
        let mut longer: String = text.chars().take(kept + 1).collect();
        if longer.trim_end().chars().count() == kept {
            return;
        }
        longer = format!("{}\u{2026}", longer.trim_end());
        assert!(m.measure(&longer, 160.0) > 76.0);
    }

    #[test]
    fn measurement_count_is_logarithmic() {
        let config = TooltipConfig::default();
        let inner = measurer();
        let counting = Counting {
            inner: &inner,
            calls: Cell::new(0),
        };
        let text = long_text(4000);
        let result = fit_text(&text, 160.0, config.box_height(), "\u{2026}", &counting);

        assert_eq!(result.measurements, counting.calls.get());
        // fast path + ceil(log2(4001)) + slack
        assert!(result.measurements <= 15, "{} measurements", result.measurements);
    }

    #[test]
    fn fitting_is_deterministic() {
        let config = TooltipConfig::default();
        let m = measurer();
        let text = long_text(500);
        let a = fit_text(&text, 200.0, config.box_height(), "\u{2026}", &m);
        let b = fit_text(&text, 200.0, config.box_height(), "\u{2026}", &m);
        assert_eq!(a, b);
    }
}
