//! WinAnsi text encoding and Helvetica advance widths

use std::collections::HashMap;

/// Code points of bytes 0x80-0x9F; zero marks an unassigned byte.
const HIGH_CONTROL_RANGE: [u16; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039, 0x0152, 0,
    0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC, 0x2122, 0x0161, 0x203A,
    0x0153, 0, 0x017E, 0x0178,
];

/// Helvetica widths for 0x20-0x7E in 1/1000 text space units
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556, 556, 556,
    556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722, 722, 667, 611, 778, 722, 278,
    500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469,
    556, 333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333, 500,
    278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

const HELVETICA_DEFAULT_WIDTH: u16 = 556;

lazy_static::lazy_static! {
    static ref WIN_ANSI: HashMap<char, u8> = {
        let mut table = HashMap::new();
        for (offset, &code) in HIGH_CONTROL_RANGE.iter().enumerate() {
            if let Some(ch) = char::from_u32(u32::from(code)).filter(|_| code != 0) {
                table.insert(ch, 0x80 + offset as u8);
            }
        }
        table
    };

    static ref HELVETICA_WIDTHS: HashMap<u8, u16> = (0x20u8..=0x7E)
        .zip(HELVETICA_ASCII)
        .collect();
}

/// Encodes `text` as WinAnsi; characters without a code become `?`.
pub fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match u32::from(ch) {
            code @ (0x00..=0x7F | 0xA0..=0xFF) => code as u8,
            _ => WIN_ANSI.get(&ch).copied().unwrap_or(b'?'),
        })
        .collect()
}

/// Width of WinAnsi-encoded `bytes` set in Helvetica at `font_size`.
pub fn helvetica_width(bytes: &[u8], font_size: f64) -> f64 {
    let units: u32 = bytes
        .iter()
        .map(|b| u32::from(HELVETICA_WIDTHS.get(b).copied().unwrap_or(HELVETICA_DEFAULT_WIDTH)))
        .sum();
    f64::from(units) * font_size / 1000.0
}
