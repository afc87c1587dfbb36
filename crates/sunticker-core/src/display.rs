// ── Display driver contracts ──
//
// The scheduler talks to two devices: a dot-matrix that shows a label
// and unit caption, and a seven-segment row that shows the number.
// Rendering primitives live in the drivers; this module only fixes the
// interface and the numeric text layout shared by all segment drivers.

use std::io;

use thiserror::Error;

use crate::reading::Measurement;

/// Text shown on the segment display when a source has no value.
pub const NO_DATA: &str = "no data";

/// Digits per cascaded seven-segment module.
pub const DIGITS_PER_MODULE: usize = 8;

/// Brightness step, clamped to the device range 0..=15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Brightness(u8);

impl Brightness {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(15);

    /// Clamp any level into the valid range.
    pub fn new(level: i64) -> Self {
        let clamped = level.clamp(0, i64::from(Self::MAX.0));
        Self(u8::try_from(clamped).unwrap_or(Self::MAX.0))
    }

    pub fn level(self) -> u8 {
        self.0
    }

    /// 8-bit contrast register value (level × 16).
    pub fn contrast(self) -> u8 {
        self.0 * 16
    }
}

/// What the segment display should show.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentValue {
    Number(Measurement),
    NoData,
    Blank,
}

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("display I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("display rejected frame: {0}")]
    Rejected(String),
}

/// Scrolling dot-matrix with a static caption.
pub trait MatrixDisplay: Send {
    /// Scroll `label`, then hold `caption` (alias and unit).
    fn render(&mut self, label: &str, caption: &str) -> Result<(), DisplayError>;

    fn set_brightness(&mut self, level: Brightness) -> Result<(), DisplayError>;
}

/// Numeric seven-segment row.
pub trait SegmentDisplay: Send {
    /// Number of digit positions.
    fn digits(&self) -> usize;

    /// Show `value` right-aligned, truncated to [`digits`](Self::digits).
    fn render(&mut self, value: &SegmentValue) -> Result<(), DisplayError>;

    fn set_brightness(&mut self, level: Brightness) -> Result<(), DisplayError>;
}

/// Lay out `value` for a row of `digits` positions.
///
/// Decimal points share a position with the digit before them, so they
/// do not count toward the width. Text longer than the row keeps its
/// leading digits.
pub fn format_segment(value: &SegmentValue, digits: usize) -> String {
    let text = match value {
        SegmentValue::Number(m) => m.to_string(),
        SegmentValue::NoData => NO_DATA.to_owned(),
        SegmentValue::Blank => String::new(),
    };

    let width = text.chars().filter(|c| *c != '.').count();
    if width <= digits {
        return format!("{}{text}", " ".repeat(digits - width));
    }

    let mut out = String::with_capacity(digits + 2);
    let mut used = 0;
    for c in text.chars() {
        if c == '.' {
            if used > 0 {
                out.push(c);
            }
            continue;
        }
        if used == digits {
            break;
        }
        out.push(c);
        used += 1;
    }
    out
}
