//! Approximate advance widths, used for alignment and caption leaders.
//!
//! Every font is measured as Helvetica. Bold faces run a little wider.

/// Half the cap height as a fraction of the font size.
pub const HALF_CAP_HEIGHT: f64 = 0.35;
pub const ASCENT: f64 = 0.8;

const BOLD_FACTOR: f64 = 1.06;
const DEFAULT_WIDTH: u16 = 556;

/// Helvetica widths for ' '..='~' in thousandths of an em.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // digits
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667,
    611, 722, 667, 944, 667, 667, 611, // 'A'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333, 500,
    278, 556, 500, 722, 500, 500, 500, // 'a'..'z'
    334, 260, 334, 584, // '{'..'~'
];

fn char_width(c: char) -> u16 {
    let code = c as u32;
    if (32..=126).contains(&code) {
        HELVETICA[(code - 32) as usize]
    } else {
        DEFAULT_WIDTH
    }
}

fn is_bold(font: &str) -> bool {
    let font = font.to_ascii_lowercase();
    font.contains("bold") || font.ends_with("-b")
}

pub fn text_width(text: &str, font: &str, size: f64) -> f64 {
    let units: u32 = text.chars().map(|c| u32::from(char_width(c))).sum();
    let width = f64::from(units) * size / 1000.0;
    if is_bold(font) {
        width * BOLD_FACTOR
    } else {
        width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_widths() {
        assert_eq!(text_width("", "Helvetica", 10.0), 0.0);
        assert!((text_width("0", "Helvetica", 10.0) - 5.56).abs() < 1e-9);
        assert!((text_width("Wi", "Helvetica", 1000.0) - 1166.0).abs() < 1e-9);
        assert!(text_width("Wi", "SourceSansPro-Bold", 10.0) > text_width("Wi", "Helvetica", 10.0));
    }

    #[test]
    fn test_non_ascii_uses_default_width() {
        assert!((text_width("…", "Helvetica", 1.0) - 0.556).abs() < 1e-9);
    }
}
