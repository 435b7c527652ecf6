use lcdcast_core::Rgb;

use crate::framebuffer::Framebuffer;
use crate::halfblock::{cell_at, cell_rows};

const HALF_BLOCK: &str = "▄";

/// Paint the whole framebuffer from the top-left corner.
/// Colour escapes are skipped when a cell repeats the previous cell's colours.
pub fn render_full(fb: &Framebuffer, buf: &mut Vec<u8>) {
    buf.clear();
    buf.extend_from_slice(b"\x1b[H");

    let width = fb.geometry().width;
    let mut prev = None;
    for row in 0..cell_rows(fb.geometry().height) {
        if row > 0 {
            buf.extend_from_slice(b"\r\n");
        }
        for col in 0..width {
            let cell = cell_at(fb, col, row);
            if prev != Some(cell) {
                write_color(buf, 48, cell.top);
                write_color(buf, 38, cell.bottom);
                prev = Some(cell);
            }
            buf.extend_from_slice(HALF_BLOCK.as_bytes());
        }
    }

    buf.extend_from_slice(b"\x1b[0m");
}

/// Repaint only the listed (col, row) cells.
pub fn render_cells(fb: &Framebuffer, cells: &[(u16, u16)], buf: &mut Vec<u8>) {
    buf.clear();
    for &(col, row) in cells {
        let cell = cell_at(fb, col, row);
        // cursor positions are 1-based
        write_cursor_pos(buf, row + 1, col + 1);
        write_color(buf, 48, cell.top);
        write_color(buf, 38, cell.bottom);
        buf.extend_from_slice(HALF_BLOCK.as_bytes());
    }
    if !cells.is_empty() {
        buf.extend_from_slice(b"\x1b[0m");
    }
}

/// Status line below the picture.
pub fn render_status(row: u16, text: &str, buf: &mut Vec<u8>) {
    write_cursor_pos(buf, row + 1, 1);
    buf.extend_from_slice(b"\x1b[0m\x1b[2K");
    buf.extend_from_slice(text.as_bytes());
}

/// `layer` is 48 for background, 38 for foreground.
fn write_color(buf: &mut Vec<u8>, layer: u16, c: Rgb) {
    buf.extend_from_slice(b"\x1b[");
    push_decimal(buf, layer);
    buf.extend_from_slice(b";2;");
    push_decimal(buf, c.r as u16);
    buf.push(b';');
    push_decimal(buf, c.g as u16);
    buf.push(b';');
    push_decimal(buf, c.b as u16);
    buf.push(b'm');
}

fn write_cursor_pos(buf: &mut Vec<u8>, row: u16, col: u16) {
    buf.extend_from_slice(b"\x1b[");
    push_decimal(buf, row);
    buf.push(b';');
    push_decimal(buf, col);
    buf.push(b'H');
}

/// Integer-to-ASCII without going through `fmt`.
fn push_decimal(buf: &mut Vec<u8>, mut v: u16) {
    let mut digits = [0u8; 5];
    let mut n = 0;
    loop {
        digits[n] = b'0' + (v % 10) as u8;
        n += 1;
        v /= 10;
        if v == 0 {
            break;
        }
    }
    buf.extend(digits[..n].iter().rev());
}
