/// Image data flowing between the loader, the render pipeline and the saver
///
/// Pixels are packed RGBA8, row 0 at the top of the picture.

use std::sync::Arc;

use crate::error::{FilterError, Result};

/// A decoded image ready to be uploaded as the source texture
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    width: u32,
    height: u32,
    /// Shared so the UI can hand the same pixels to several tasks cheaply
    pixels: Arc<Vec<u8>>,
}

impl SourceImage {
    /// Wrap a packed RGBA8 buffer, checking its length against the dimensions
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(FilterError::invalid(format!(
                "image dimensions must be non-zero, got {width}x{height}"
            )));
        }
        let expected = rgba_len(width, height)?;
        if pixels.len() != expected {
            return Err(FilterError::invalid(format!(
                "expected {expected} RGBA bytes for {width}x{height}, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels: Arc::new(pixels),
        })
    }

    /// Every pixel set to the same RGBA value
    pub fn uniform(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let texels = rgba_len(width, height)? / 4;
        Self::new(width, height, rgba.repeat(texels))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn texel_offset(&self) -> TexelOffset {
        TexelOffset::for_dimensions(self.width, self.height)
    }
}

/// Byte length of a packed RGBA8 buffer, checked against overflow
fn rgba_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|texels| texels.checked_mul(4))
        .ok_or_else(|| FilterError::invalid(format!("{width}x{height} RGBA buffer does not fit in memory")))
}

/// Step between neighbouring texels in normalized texture coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TexelOffset {
    pub x: f32,
    pub y: f32,
}

impl TexelOffset {
    pub fn for_dimensions(width: u32, height: u32) -> Self {
        Self {
            x: 1.0 / width as f32,
            y: 1.0 / height as f32,
        }
    }

    pub fn as_array(&self) -> [f32; 2] {
        [self.x, self.y]
    }
}

/// Contents of the screen framebuffer after a render
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels
            .get(i..i + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_mismatched_buffer() {
        assert!(SourceImage::new(2, 2, vec![0; 15]).is_err());
        assert!(SourceImage::new(0, 2, vec![]).is_err());
        assert!(SourceImage::new(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn test_huge_dimensions_are_rejected() {
        let err = SourceImage::new(u32::MAX, u32::MAX, vec![]).unwrap_err();
        assert!(matches!(err, FilterError::InvalidConfiguration(_)));

        let err = SourceImage::uniform(u32::MAX, u32::MAX, [0, 0, 0, 255]).unwrap_err();
        assert!(matches!(err, FilterError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_texel_offset() {
        let image = SourceImage::uniform(4, 8, [1, 2, 3, 4]).unwrap();
        let offset = image.texel_offset();
        assert_eq!(offset.x, 0.25);
        assert_eq!(offset.y, 0.125);
    }

    #[test]
    fn test_frame_pixel_lookup() {
        let frame = Frame {
            width: 2,
            height: 1,
            pixels: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        assert_eq!(frame.pixel(1, 0), Some([5, 6, 7, 8]));
        assert_eq!(frame.pixel(2, 0), None);
    }
}
