//! Ordering for mixed Japanese/ASCII labels.
//!
//! Lot numbers, actor names and places are typed on scanners and keyboards
//! in either width and either kana script. The key folds those variants
//! together so they sort side by side; the raw text breaks ties so the order
//! stays total.

use std::cmp::Ordering;

const FULLWIDTH_ASCII: std::ops::RangeInclusive<u32> = 0xFF01..=0xFF5E;
const FULLWIDTH_OFFSET: u32 = 0xFEE0;
const IDEOGRAPHIC_SPACE: char = '\u{3000}';
const KATAKANA: std::ops::RangeInclusive<u32> = 0x30A1..=0x30F6;
const KANA_OFFSET: u32 = 0x60;

fn fold(c: char) -> char {
    let code = c as u32;
    if c == IDEOGRAPHIC_SPACE {
        ' '
    } else if FULLWIDTH_ASCII.contains(&code) {
        char::from_u32(code - FULLWIDTH_OFFSET).unwrap_or(c)
    } else if KATAKANA.contains(&code) {
        char::from_u32(code - KANA_OFFSET).unwrap_or(c)
    } else {
        c
    }
}

pub fn collation_key(s: &str) -> String {
    s.chars().map(fold).flat_map(char::to_lowercase).collect()
}

pub fn compare(a: &str, b: &str) -> Ordering {
    collation_key(a).cmp(&collation_key(b)).then_with(|| a.cmp(b))
}
