// ── Console display drivers ──
//
// Text stand-ins for the MAX7219 matrix and seven-segment chains. Each
// frame is written as one line so a bench run (or a pipe into another
// program) shows exactly what the hardware would.

use std::fmt;
use std::io::{self, Write};

use sunticker_config::MatrixSection;
use sunticker_core::{
    Brightness, DIGITS_PER_MODULE, DisplayError, MatrixDisplay, SegmentDisplay, SegmentValue,
    format_segment,
};
use tracing::debug;

/// Pixels per side of one matrix module.
const MODULE_PIXELS: usize = 8;

type Sink = Box<dyn Write + Send>;

// ── MatrixGeometry ───────────────────────────────────────────────────

/// Physical layout of a chain of 8x8 matrix modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixGeometry {
    pub cascaded: u8,
    /// Per-module correction in degrees (0, 90, -90).
    pub block_orientation: i16,
    /// Whole-display rotation in quarter turns.
    pub rotate: u8,
    pub reverse_blocks: bool,
}

impl MatrixGeometry {
    /// Visible width in pixels after rotation.
    pub fn width(&self) -> usize {
        if self.rotate % 2 == 0 {
            self.chain_pixels()
        } else {
            MODULE_PIXELS
        }
    }

    /// Visible height in pixels after rotation.
    pub fn height(&self) -> usize {
        if self.rotate % 2 == 0 {
            MODULE_PIXELS
        } else {
            self.chain_pixels()
        }
    }

    fn chain_pixels(&self) -> usize {
        usize::from(self.cascaded) * MODULE_PIXELS
    }
}

impl From<&MatrixSection> for MatrixGeometry {
    fn from(section: &MatrixSection) -> Self {
        Self {
            cascaded: section.cascaded,
            block_orientation: section.block_orientation,
            rotate: section.rotate,
            reverse_blocks: section.reverse_blocks,
        }
    }
}

impl fmt::Display for MatrixGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} px ({} modules, rotated {} deg",
            self.width(),
            self.height(),
            self.cascaded,
            u16::from(self.rotate) * 90
        )?;
        if self.block_orientation != 0 {
            write!(f, ", blocks {} deg", self.block_orientation)?;
        }
        if self.reverse_blocks {
            f.write_str(", reversed")?;
        }
        f.write_str(")")
    }
}

/// Celsius captions (`T C`) are shown with a degree sign.
fn caption_text(caption: &str) -> String {
    match caption.strip_suffix('C') {
        Some(head) if !head.ends_with('°') => format!("{head}°C"),
        _ => caption.to_owned(),
    }
}

// ── ConsoleMatrix ────────────────────────────────────────────────────

pub struct ConsoleMatrix {
    geometry: MatrixGeometry,
    out: Sink,
}

impl ConsoleMatrix {
    pub fn new(geometry: MatrixGeometry, out: Sink) -> Self {
        Self { geometry, out }
    }

    pub fn stdout(geometry: MatrixGeometry) -> Self {
        Self::new(geometry, Box::new(io::stdout()))
    }
}

impl MatrixDisplay for ConsoleMatrix {
    fn render(&mut self, label: &str, caption: &str) -> Result<(), DisplayError> {
        debug!(label, caption, geometry = %self.geometry, "matrix frame");
        writeln!(self.out, "[matrix]  {label} > {}", caption_text(caption))?;
        self.out.flush()?;
        Ok(())
    }

    fn set_brightness(&mut self, level: Brightness) -> Result<(), DisplayError> {
        writeln!(
            self.out,
            "[matrix]  brightness {} (contrast {})",
            level.level(),
            level.contrast()
        )?;
        Ok(())
    }
}

// ── ConsoleSegment ───────────────────────────────────────────────────

pub struct ConsoleSegment {
    digits: usize,
    out: Sink,
}

impl ConsoleSegment {
    /// `cascaded` 8-digit modules, at least one.
    pub fn new(cascaded: u8, out: Sink) -> Self {
        Self {
            digits: usize::from(cascaded.max(1)) * DIGITS_PER_MODULE,
            out,
        }
    }

    pub fn stdout(cascaded: u8) -> Self {
        Self::new(cascaded, Box::new(io::stdout()))
    }
}

impl SegmentDisplay for ConsoleSegment {
    fn digits(&self) -> usize {
        self.digits
    }

    fn render(&mut self, value: &SegmentValue) -> Result<(), DisplayError> {
        let text = format_segment(value, self.digits);
        writeln!(self.out, "[segment] |{text}|")?;
        self.out.flush()?;
        Ok(())
    }

    fn set_brightness(&mut self, level: Brightness) -> Result<(), DisplayError> {
        writeln!(
            self.out,
            "[segment] brightness {} (contrast {})",
            level.level(),
            level.contrast()
        )?;
        Ok(())
    }
}
