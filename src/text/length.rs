//! Mixed-script document length.
//!
//! Length is measured in "units": every CJK unified ideograph counts as one
//! unit, and every maximal run of word characters counts as one unit. CJK
//! ideographs are removed before word runs are found, so they never split a
//! word: `abc中def` measures 1 ideograph + 1 word = 2 units.

/// Returns true for characters in the CJK Unified Ideographs block.
fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Measure `text` in length units.
pub fn length_units(text: &str) -> usize {
    let mut ideographs = 0;
    let mut words = 0;
    let mut in_word = false;

    for c in text.chars() {
        if is_cjk_ideograph(c) {
            ideographs += 1;
        } else if is_word_char(c) {
            if !in_word {
                words += 1;
                in_word = true;
            }
        } else {
            in_word = false;
        }
    }

    ideographs + words
}
