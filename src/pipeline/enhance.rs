//! Pixel enhancement: greyscale + contrast stretch, or binarisation.
//!
//! Scanned and low-contrast PDFs OCR noticeably better once the page is
//! flattened to grey and pushed away from mid-tones. The transform is a pure
//! per-pixel function over an RGBA8 buffer; no pixel depends on another.
//!
//! Per pixel:
//!
//! ```text
//! Y   = 0.299·R + 0.587·G + 0.114·B
//! adj = clamp(0, 255, (Y − 128) × contrast + 128)
//! contrast → R = G = B = adj            (truncated to u8)
//! binarize → R = G = B = adj > threshold ? 255 : 0
//! other    → pixel untouched
//! ```
//!
//! Alpha is never written.

use crate::config::{EnhanceConfig, EnhanceMode};
use image::RgbaImage;

/// Enhance an RGBA8 pixel buffer in place.
///
/// Trailing bytes that do not form a whole pixel are left alone.
pub fn enhance_pixels(buf: &mut [u8], config: &EnhanceConfig) {
    for chunk in buf.chunks_exact_mut(4) {
        if let Ok(px) = <&mut [u8; 4]>::try_from(chunk) {
            enhance_pixel(px, config);
        }
    }
}

/// Enhance a rendered page in place.
pub fn enhance_image(img: &mut RgbaImage, config: &EnhanceConfig) {
    enhance_pixels(img, config);
}

/// Enhance a single `[R, G, B, A]` pixel.
///
/// The mode is matched on every call, so an unrecognised mode is a no-op
/// pixel by pixel rather than an up-front error.
pub fn enhance_pixel(px: &mut [u8; 4], config: &EnhanceConfig) {
    let adjusted = adjusted_luminance(px[0], px[1], px[2], config.contrast);
    let value = match config.mode {
        EnhanceMode::Binarize => {
            if adjusted > f64::from(config.threshold) {
                255
            } else {
                0
            }
        }
        EnhanceMode::Contrast => adjusted as u8,
        EnhanceMode::Other(_) => return,
    };
    px[0] = value;
    px[1] = value;
    px[2] = value;
}

/// Luminance with contrast applied around 128, clamped to `[0, 255]`.
pub fn adjusted_luminance(r: u8, g: u8, b: u8, contrast: f64) -> f64 {
    let grey = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    ((grey - 128.0) * contrast + 128.0).clamp(0.0, 255.0)
}
