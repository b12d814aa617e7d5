//! Image encoding: `DynamicImage` → PNG bytes, data URLs and VLM `ImageData`.
//!
//! PNG is lossless, so there is no quality knob to carry over from a canvas
//! encoder; text on the rendered page stays crisp for both the preview and the
//! model.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

pub const PNG_MIME: &str = "image/png";

/// Encode a rendered page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} image → {} PNG bytes",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// `data:` URL addressing the given bytes.
pub fn data_url(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// Split a base64 `data:` URL into its MIME type and payload.
pub fn parse_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    Some((mime, payload))
}

/// Sniff PNG or JPEG from magic bytes.
pub fn image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some(PNG_MIME)
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else {
        None
    }
}

/// Wrap image bytes for a vision request.
///
/// `detail: "high"` keeps fine print readable for GPT-4-class models.
pub fn image_data(bytes: &[u8], mime_type: &str) -> ImageData {
    ImageData::new(STANDARD.encode(bytes), mime_type).with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn red_square() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn encode_small_image() {
        let png = encode_png(&red_square()).expect("encode should succeed");
        assert_eq!(image_mime(&png), Some(PNG_MIME));
        let decoded = image::load_from_memory(&png).expect("valid PNG");
        assert_eq!(decoded.width(), 10);
    }

    #[test]
    fn data_url_round_trip() {
        let url = data_url(b"abc", PNG_MIME);
        assert_eq!(url, "data:image/png;base64,YWJj");
        assert_eq!(parse_data_url(&url), Some((PNG_MIME, "YWJj")));
        assert_eq!(parse_data_url("https://example.com/a.png"), None);
    }

    #[test]
    fn image_data_is_base64_png() {
        let png = encode_png(&red_square()).unwrap();
        let data = image_data(&png, PNG_MIME);
        assert_eq!(data.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&data.data).unwrap(), png);
    }
}
