//! Background image and compositing
//!
//! The background still is decoded and resized once per publish; the
//! compositor then substitutes it into every frame wherever the matte is
//! not fully opaque. Transparency selects the background pixel outright,
//! it does not blend.

use crate::error::MediaError;
use crate::frames::VideoFrame;
use crate::matting::MatteOutput;
use std::path::Path;
use tracing::info;

/// A background still, held as RGBA8 at the processing resolution
#[derive(Debug, Clone)]
pub struct Background {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Background {
    /// Decode an image file and resize it to the processing resolution
    pub fn from_image_path(path: &Path, width: u32, height: u32) -> Result<Self, MediaError> {
        let img = image::open(path).map_err(|e| MediaError::Background {
            reason: format!("failed to open {}: {}", path.display(), e),
        })?;
        let resized = img
            .resize_exact(width, height, image::imageops::FilterType::Triangle)
            .to_rgba8();
        info!(
            "Background ready: {} scaled to {}x{}",
            path.display(),
            width,
            height
        );
        Ok(Self {
            width,
            height,
            data: resized.into_raw(),
        })
    }

    /// Build a background from raw RGBA8 pixels
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, MediaError> {
        let expected = (width * height * 4) as usize;
        if data.len() != expected {
            return Err(MediaError::InvalidFrameData {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Solid-color background
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Background width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Background height
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 pixels
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }
}

/// Composites matte output against a background still
#[derive(Debug, Clone, Default)]
pub struct Compositor;

impl Compositor {
    /// Create a compositor
    pub fn new() -> Self {
        Self
    }

    /// Composite one matte result over the background
    ///
    /// Foreground and alpha planes are converted to 8-bit; every pixel
    /// whose alpha byte is not 255 takes the background's RGBA outright.
    pub fn composite(
        &self,
        matte: &MatteOutput,
        background: &Background,
        timestamp_ms: u64,
    ) -> Result<VideoFrame, MediaError> {
        if matte.width != background.width || matte.height != background.height {
            return Err(MediaError::DimensionMismatch {
                expected_width: background.width,
                expected_height: background.height,
                actual_width: matte.width,
                actual_height: matte.height,
            });
        }

        let (w, h) = (matte.width as usize, matte.height as usize);
        let plane = w * h;
        if matte.fgr.len() < plane * 3 || matte.pha.len() < plane {
            return Err(MediaError::InvalidFrameData {
                expected: plane * 3,
                actual: matte.fgr.len(),
            });
        }

        let bg = background.pixels();
        let mut out = vec![0u8; plane * 4];
        for i in 0..plane {
            let a = to_u8(matte.pha[i]);
            let o = i * 4;
            if a != 255 {
                out[o] = bg[o];
                out[o + 1] = bg[o + 1];
                out[o + 2] = bg[o + 2];
                out[o + 3] = bg[o + 3];
            } else {
                out[o] = to_u8(matte.fgr[i]);
                out[o + 1] = to_u8(matte.fgr[plane + i]);
                out[o + 2] = to_u8(matte.fgr[2 * plane + i]);
                out[o + 3] = a;
            }
        }

        VideoFrame::new(matte.width, matte.height, out, timestamp_ms)
    }
}

// Truncating, not rounding: only pha == 1.0 maps to an opaque 255 byte,
// anything below stays a background selector
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matte_2x1(pha: [f32; 2]) -> MatteOutput {
        MatteOutput {
            // red foreground on both pixels
            fgr: vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            pha: pha.to_vec(),
            width: 2,
            height: 1,
        }
    }

    #[test]
    fn opaque_pixels_keep_foreground() {
        let bg = Background::solid(2, 1, [0, 0, 255, 255]);
        let frame = Compositor::new()
            .composite(&matte_2x1([1.0, 1.0]), &bg, 0)
            .unwrap();
        assert_eq!(&frame.data[0..4], &[255, 0, 0, 255]);
        assert_eq!(&frame.data[4..8], &[255, 0, 0, 255]);
    }

    #[test]
    fn transparent_pixels_take_background_wholesale() {
        let bg = Background::solid(2, 1, [0, 0, 255, 255]);
        // second pixel only 50% opaque: still fully background per the
        // selector rule
        let frame = Compositor::new()
            .composite(&matte_2x1([1.0, 0.5]), &bg, 0)
            .unwrap();
        assert_eq!(&frame.data[0..4], &[255, 0, 0, 255]);
        assert_eq!(&frame.data[4..8], &[0, 0, 255, 255]);
    }

    #[test]
    fn near_opaque_pixels_still_take_background() {
        let bg = Background::solid(2, 1, [0, 0, 255, 255]);
        // 0.999 * 255 truncates to 254, not 255: still background
        let frame = Compositor::new()
            .composite(&matte_2x1([1.0, 0.999]), &bg, 0)
            .unwrap();
        assert_eq!(&frame.data[0..4], &[255, 0, 0, 255]);
        assert_eq!(&frame.data[4..8], &[0, 0, 255, 255]);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let bg = Background::solid(4, 4, [0, 0, 0, 255]);
        let err = Compositor::new()
            .composite(&matte_2x1([1.0, 1.0]), &bg, 0)
            .unwrap_err();
        match err {
            MediaError::DimensionMismatch { .. } => (),
            other => panic!("expected DimensionMismatch, got {:?}", other),
        }
    }
}
