use lcdcast_core::Rgb;

use crate::framebuffer::Framebuffer;

/// One terminal cell covering two vertically stacked pixels.
/// Drawn as a lower half block: background = top pixel, foreground = bottom.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub top: Rgb,
    pub bottom: Rgb,
}

/// Terminal rows needed for `height` pixels. An odd last row gets a black bottom half.
pub fn cell_rows(height: u16) -> u16 {
    height.div_ceil(2)
}

pub fn cell_at(fb: &Framebuffer, col: u16, row: u16) -> Cell {
    Cell {
        top: fb.pixel(col, row * 2),
        bottom: fb.pixel(col, row * 2 + 1),
    }
}
