use anyhow::Context;
use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use lcdcast_core::Geometry;

/// Downscales RGB24 pictures to the display geometry with a box filter.
pub struct FrameResizer {
    target_width: u32,
    target_height: u32,
    resizer: Resizer,
    options: ResizeOptions,
}

impl FrameResizer {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            target_width: geometry.width as u32,
            target_height: geometry.height as u32,
            resizer: Resizer::new(),
            options: ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Box)),
        }
    }

    /// Returns RGB24 bytes at the display geometry.
    pub fn resize(&mut self, src: &[u8], src_width: u32, src_height: u32) -> anyhow::Result<Vec<u8>> {
        if src_width == self.target_width && src_height == self.target_height {
            return Ok(src.to_vec());
        }

        let src_image = Image::from_vec_u8(src_width, src_height, src.to_vec(), PixelType::U8x3)
            .context("source picture does not match its reported size")?;
        let mut dst_image = Image::new(self.target_width, self.target_height, PixelType::U8x3);
        self.resizer
            .resize(&src_image, &mut dst_image, &self.options)
            .context("resize failed")?;

        Ok(dst_image.into_vec())
    }
}
