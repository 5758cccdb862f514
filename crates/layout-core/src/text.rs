//! Text measurement and the sizing rules built on it.

use crate::style::MAX_TITLE_LINES;

/// Measures rendered text. Implemented by the renderer's typefaces.
pub trait TextMeasure {
    /// Advance width of `text` set at `px` pixels.
    fn text_width(&self, text: &str, px: f32) -> f32;

    /// Distance from the top of a line box to the baseline.
    fn ascent(&self, px: f32) -> f32 {
        px * 0.8
    }
}

impl<T: TextMeasure + ?Sized> TextMeasure for &T {
    fn text_width(&self, text: &str, px: f32) -> f32 {
        (**self).text_width(text, px)
    }

    fn ascent(&self, px: f32) -> f32 {
        (**self).ascent(px)
    }
}

/// Every character advances by the same fraction of the font size.
///
/// Deterministic, font-free metrics for headless previews and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMeasure {
    /// Advance per character as a multiple of the font size.
    pub advance_em: f32,
}

impl Default for MonospaceMeasure {
    fn default() -> Self {
        Self { advance_em: 0.6 }
    }
}

impl TextMeasure for MonospaceMeasure {
    fn text_width(&self, text: &str, px: f32) -> f32 {
        text.chars().count() as f32 * px * self.advance_em
    }
}

/// Uppercase `title` and wrap it greedily into at most two lines no wider
/// than `max_width`.
///
/// Words that do not fit on the second line are dropped. A single word wider
/// than `max_width` is cut to the longest prefix that fits.
pub fn wrap_title(title: &str, max_width: f32, px: f32, measure: &dyn TextMeasure) -> Vec<String> {
    let upper = title.to_uppercase();
    let mut lines: Vec<String> = Vec::with_capacity(MAX_TITLE_LINES);
    let mut current = String::new();

    for word in upper.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if measure.text_width(&candidate, px) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            if lines.len() == MAX_TITLE_LINES {
                return lines;
            }
        }

        if measure.text_width(word, px) <= max_width {
            current = word.to_string();
        } else {
            let prefix = longest_fitting_prefix(word, max_width, px, measure);
            if !prefix.is_empty() {
                lines.push(prefix);
                if lines.len() == MAX_TITLE_LINES {
                    return lines;
                }
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn longest_fitting_prefix(word: &str, max_width: f32, px: f32, measure: &dyn TextMeasure) -> String {
    let mut prefix = String::new();
    for ch in word.chars() {
        prefix.push(ch);
        if measure.text_width(&prefix, px) > max_width {
            prefix.pop();
            break;
        }
    }
    prefix
}

/// Largest font size, stepping down from `nominal` by `step`, at which `text`
/// fits in `max_width`; never below `floor`.
pub fn fit_font_size(
    text: &str,
    max_width: f32,
    nominal: f32,
    floor: f32,
    step: f32,
    measure: &dyn TextMeasure,
) -> f32 {
    let step = if step > 0.0 { step } else { 1.0 };
    let mut size = nominal.max(floor);
    while size > floor && measure.text_width(text, size) > max_width {
        size -= step;
    }
    size.max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MONO: MonospaceMeasure = MonospaceMeasure { advance_em: 0.5 };

    #[test]
    fn test_short_title_single_line_uppercased() {
        let lines = wrap_title("treino de peito", 900.0, 20.0, &MONO);
        assert_eq!(lines, vec!["TREINO DE PEITO"]);
    }

    #[test]
    fn test_wrap_drops_overflow_words() {
        // 10px per char, 100px per line: ten characters.
        let lines = wrap_title("aaaa bbbb cccc dddd eeee", 100.0, 20.0, &MONO);
        assert_eq!(lines, vec!["AAAA BBBB", "CCCC DDDD"]);
    }

    #[test]
    fn test_long_word_is_cut_to_fit() {
        let lines = wrap_title("supercalifragilistic x", 100.0, 20.0, &MONO);
        assert_eq!(lines, vec!["SUPERCALIF", "X"]);
    }

    #[test]
    fn test_blank_title_has_no_lines() {
        assert!(wrap_title("   ", 100.0, 20.0, &MONO).is_empty());
    }

    #[test]
    fn test_fit_font_size_steps_by_two() {
        // "12345" at 0.5em: 2.5 * px. Fits 100px at 40px.
        assert_eq!(fit_font_size("12345", 100.0, 52.0, 24.0, 2.0, &MONO), 40.0);
        assert_eq!(fit_font_size("1", 100.0, 52.0, 24.0, 2.0, &MONO), 52.0);
    }

    #[test]
    fn test_fit_font_size_respects_floor() {
        let long = "9".repeat(200);
        assert_eq!(fit_font_size(&long, 100.0, 52.0, 24.0, 2.0, &MONO), 24.0);
    }

    proptest! {
        #[test]
        fn prop_wrap_never_exceeds_two_lines_or_width(
            title in "[a-zA-Z ]{0,200}",
            max_width in 40.0f32..1200.0,
        ) {
            let lines = wrap_title(&title, max_width, 72.0, &MonospaceMeasure::default());
            prop_assert!(lines.len() <= MAX_TITLE_LINES);
            for line in &lines {
                prop_assert!(MonospaceMeasure::default().text_width(line, 72.0) <= max_width);
            }
        }
    }
}
