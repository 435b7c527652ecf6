use std::fmt;

use thiserror::Error;

/// Default display width in pixels.
pub const WIDTH: u16 = 160;
/// Default display height in pixels.
pub const HEIGHT: u16 = 80;

/// Display dimensions shared by every stage of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub width: u16,
    pub height: u16,
}

impl Geometry {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Number of pixels in one frame (row-major, index = y * width + x).
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Position of a pixel index. Caller guarantees `index < pixel_count()`.
    pub fn position(&self, index: usize) -> (u16, u16) {
        let w = self.width as usize;
        ((index % w) as u16, (index / w) as u16)
    }

    pub fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new(WIDTH, HEIGHT)
    }
}

/// One 24-bit pixel. Alpha, when the source has it, is dropped on the way in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_rgba(px: [u8; 4]) -> Self {
        Self::new(px[0], px[1], px[2])
    }
}

/// Packed 5/6/5 colour code as sent to the display.
///
/// Formats as lower-case hex with no prefix and no padding, which is the
/// representation used on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb565(pub u16);

impl Rgb565 {
    /// Truncating quantization: each channel is shifted right by (3, 2, 3).
    pub fn quantize(px: Rgb) -> Self {
        let r = (px.r >> 3) as u16;
        let g = (px.g >> 2) as u16;
        let b = (px.b >> 3) as u16;
        Self(r << 11 | g << 5 | b)
    }

    /// Expand back to 8 bits per channel by replicating the high bits into
    /// the vacated low bits, so full-scale codes map to 255.
    pub fn to_rgb(self) -> Rgb {
        let r5 = (self.0 >> 11) as u8 & 0x1f;
        let g6 = (self.0 >> 5) as u8 & 0x3f;
        let b5 = self.0 as u8 & 0x1f;
        Rgb::new(r5 << 3 | r5 >> 2, g6 << 2 | g6 >> 4, b5 << 3 | b5 >> 2)
    }
}

impl fmt::LowerHex for Rgb565 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::Display for Rgb565 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame has {found} pixels, display expects {expected}")]
    WrongPixelCount { expected: usize, found: usize },

    #[error("raw buffer of {len} bytes is not a whole number of {channels}-channel pixels")]
    RaggedBuffer { len: usize, channels: usize },
}

/// A fully composed frame: row-major pixels for the whole display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pixels: Vec<Rgb>,
}

impl Frame {
    pub fn new(pixels: Vec<Rgb>) -> Self {
        Self { pixels }
    }

    /// A frame of `geometry` with every pixel set to `color`.
    pub fn filled(geometry: Geometry, color: Rgb) -> Self {
        Self::new(vec![color; geometry.pixel_count()])
    }

    /// Build from packed RGB24 bytes.
    pub fn from_rgb24(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() % 3 != 0 {
            return Err(FrameError::RaggedBuffer { len: data.len(), channels: 3 });
        }
        Ok(Self::new(
            data.chunks_exact(3)
                .map(|c| Rgb::new(c[0], c[1], c[2]))
                .collect(),
        ))
    }

    /// Build from packed RGBA32 bytes; alpha is ignored.
    pub fn from_rgba32(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() % 4 != 0 {
            return Err(FrameError::RaggedBuffer { len: data.len(), channels: 4 });
        }
        Ok(Self::new(
            data.chunks_exact(4)
                .map(|c| Rgb::from_rgba([c[0], c[1], c[2], c[3]]))
                .collect(),
        ))
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Set one pixel. Out-of-bounds writes are ignored.
    pub fn set(&mut self, geometry: Geometry, x: u16, y: u16, color: Rgb) {
        if let Some(px) = geometry.index(x, y).and_then(|i| self.pixels.get_mut(i)) {
            *px = color;
        }
    }
}

/// A changed pixel: position + new colour code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeRecord {
    pub x: u16,
    pub y: u16,
    pub color: Rgb565,
}

impl ChangeRecord {
    pub fn new(x: u16, y: u16, color: Rgb565) -> Self {
        Self { x, y, color }
    }

    /// Row-major index of this record, or `None` when it falls outside `geometry`.
    pub fn index(&self, geometry: Geometry) -> Option<usize> {
        geometry.index(self.x, self.y)
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}.{:x}.{:x}", self.x, self.y, self.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn quantize_extremes() {
        assert_eq!(Rgb565::quantize(Rgb::BLACK), Rgb565(0));
        assert_eq!(Rgb565::quantize(Rgb::WHITE), Rgb565(0xffff));
        assert_eq!(Rgb565::quantize(Rgb::new(255, 0, 0)), Rgb565(0xf800));
        assert_eq!(Rgb565::quantize(Rgb::new(0, 255, 0)), Rgb565(0x07e0));
        assert_eq!(Rgb565::quantize(Rgb::new(0, 0, 255)), Rgb565(0x001f));
    }

    #[test]
    fn quantize_truncates_rather_than_rounds() {
        // 7 >> 3 == 0 even though 7/255*31 rounds to 1
        assert_eq!(Rgb565::quantize(Rgb::new(7, 3, 7)), Rgb565(0));
        assert_eq!(Rgb565::quantize(Rgb::new(8, 4, 8)), Rgb565(0x0821));
    }

    #[test]
    fn color_code_formats_as_bare_lower_hex() {
        assert_eq!(Rgb565(0).to_string(), "0");
        assert_eq!(Rgb565(0xffff).to_string(), "ffff");
        assert_eq!(Rgb565(0x1f).to_string(), "1f");
        assert_eq!(ChangeRecord::new(159, 79, Rgb565(0xabc)).to_string(), "9f.4f.abc");
    }

    #[test]
    fn expansion_hits_full_scale() {
        assert_eq!(Rgb565(0xffff).to_rgb(), Rgb::WHITE);
        assert_eq!(Rgb565(0).to_rgb(), Rgb::BLACK);
    }

    #[test]
    fn rgba_alpha_is_dropped() {
        let frame = Frame::from_rgba32(&[1, 2, 3, 0, 4, 5, 6, 255]).unwrap();
        assert_eq!(frame.pixels(), &[Rgb::new(1, 2, 3), Rgb::new(4, 5, 6)]);
        assert!(matches!(
            Frame::from_rgb24(&[1, 2]),
            Err(FrameError::RaggedBuffer { len: 2, channels: 3 })
        ));
    }

    #[test]
    fn geometry_positions_are_row_major() {
        let g = Geometry::default();
        assert_eq!(g.pixel_count(), 12800);
        assert_eq!(g.position(0), (0, 0));
        assert_eq!(g.position(161), (1, 1));
        assert_eq!(g.index(159, 79), Some(12799));
        assert_eq!(g.index(160, 0), None);
    }

    proptest! {
        #[test]
        fn quantize_keeps_channel_high_bits(r: u8, g: u8, b: u8) {
            let code = Rgb565::quantize(Rgb::new(r, g, b)).0;
            prop_assert_eq!((code >> 11) as u8, r >> 3);
            prop_assert_eq!(((code >> 5) & 0x3f) as u8, g >> 2);
            prop_assert_eq!((code & 0x1f) as u8, b >> 3);
        }

        #[test]
        fn expansion_requantizes_to_same_code(code: u16) {
            prop_assert_eq!(Rgb565::quantize(Rgb565(code).to_rgb()), Rgb565(code));
        }
    }
}
