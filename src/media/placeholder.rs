//! Thumbnail scaling and the compact placeholder sent with published media

use image::imageops::FilterType;
use image::DynamicImage;

pub const PLACEHOLDER_COLUMNS: u32 = 4;
pub const PLACEHOLDER_ROWS: u32 = 3;

/// Longest edge of a stored thumbnail
pub const THUMBNAIL_MAX_EDGE: u32 = 480;

/// Encode the image as a grid of average colours.
///
/// The result is `PLACEHOLDER_COLUMNS * PLACEHOLDER_ROWS` RGB triples in
/// row-major order, hex encoded (72 characters), prefixed with the grid size.
pub fn placeholder(image: &DynamicImage) -> String {
    let grid = image
        .resize_exact(PLACEHOLDER_COLUMNS, PLACEHOLDER_ROWS, FilterType::Triangle)
        .to_rgb8();
    format!(
        "{}x{}:{}",
        PLACEHOLDER_COLUMNS,
        PLACEHOLDER_ROWS,
        hex::encode(grid.as_raw())
    )
}

/// Downscale so the longest edge is at most [`THUMBNAIL_MAX_EDGE`]
pub fn thumbnail(image: &DynamicImage) -> DynamicImage {
    if image.width().max(image.height()) <= THUMBNAIL_MAX_EDGE {
        image.clone()
    } else {
        image.thumbnail(THUMBNAIL_MAX_EDGE, THUMBNAIL_MAX_EDGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_placeholder_of_solid_image() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, Rgb([255, 0, 128])));
        let value = placeholder(&image);
        assert_eq!(value, format!("4x3:{}", "ff0080".repeat(12)));
    }

    #[test]
    fn test_placeholder_distinguishes_halves() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(40, 30, |x, _| {
            if x < 20 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }));
        let value = placeholder(&image);
        let body = value.strip_prefix("4x3:").unwrap();
        assert_eq!(body.len(), 72);
        assert!(body.starts_with("000000"));
        assert!(body[18..24].eq("ffffff"));
    }

    #[test]
    fn test_thumbnail_bounds() {
        let large = DynamicImage::ImageRgb8(RgbImage::new(1080, 1920));
        let thumb = thumbnail(&large);
        assert_eq!(thumb.height(), THUMBNAIL_MAX_EDGE);
        assert!(thumb.width() <= THUMBNAIL_MAX_EDGE);

        let small = DynamicImage::ImageRgb8(RgbImage::new(100, 50));
        assert_eq!(thumbnail(&small).width(), 100);
    }
}
