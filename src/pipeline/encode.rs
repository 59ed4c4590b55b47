//! Image encoding: rendered page → PNG bytes, plus base64 / `data:` views.
//!
//! PNG is chosen over JPEG because it is lossless: after contrast or
//! binarisation the page is mostly hard edges, exactly what JPEG smears.

use crate::output::EncodedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG.
pub fn encode_png(img: RgbaImage) -> Result<EncodedImage, image::ImageError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img).write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded page → {} bytes PNG", buf.len());
    Ok(EncodedImage::new("image/png", buf))
}

/// Standard base64 of `bytes`.
pub fn base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Convert binary data to a `data:` URL.
pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, base64(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn encode_small_image() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let data = encode_png(img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        assert_eq!(&data.bytes[..4], b"\x89PNG");

        let decoded = image::load_from_memory(&data.bytes).expect("valid PNG");
        assert_eq!((decoded.width(), decoded.height()), (10, 10));
        assert_eq!(decoded.to_rgba8().get_pixel(3, 3).0, [255, 0, 0, 255]);
    }

    #[test]
    fn data_url_prefix() {
        let url = data_url("image/jpeg", b"abc");
        assert_eq!(url, "data:image/jpeg;base64,YWJj");
        let b64 = base64(b"abc");
        assert_eq!(STANDARD.decode(b64).unwrap(), b"abc");
    }
}
