//! Transparent padding up to the next multiple of 4

use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

#[derive(Debug, Clone)]
pub struct Padded {
    /// PNG when `changed`, otherwise the input bytes untouched.
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub changed: bool,
}

pub fn next_multiple_of_four(n: u32) -> u32 {
    n.div_ceil(4) * 4
}

/// Pads `bytes` so both dimensions are multiples of 4.
///
/// The original pixels stay anchored at the top-left; the added columns and rows
/// are fully transparent. Conforming images are returned as-is.
pub fn pad_to_multiple_of_four(bytes: &[u8]) -> image::ImageResult<Padded> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = (img.width(), img.height());
    let (padded_width, padded_height) = (next_multiple_of_four(width), next_multiple_of_four(height));

    if padded_width == width && padded_height == height {
        return Ok(Padded {
            bytes: bytes.to_vec(),
            width,
            height,
            changed: false,
        });
    }

    let mut canvas = RgbaImage::new(padded_width, padded_height);
    image::imageops::replace(&mut canvas, &img.to_rgba8(), 0, 0);

    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(canvas).write_to(&mut out, ImageFormat::Png)?;

    Ok(Padded {
        bytes: out.into_inner(),
        width: padded_width,
        height: padded_height,
        changed: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 200, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn rounds_up() {
        assert_eq!(next_multiple_of_four(0), 0);
        assert_eq!(next_multiple_of_four(1), 4);
        assert_eq!(next_multiple_of_four(4), 4);
        assert_eq!(next_multiple_of_four(10), 12);
        assert_eq!(next_multiple_of_four(13), 16);
    }

    #[test]
    fn conforming_images_are_untouched() {
        let original = png(8, 12);
        let padded = pad_to_multiple_of_four(&original).unwrap();
        assert!(!padded.changed);
        assert_eq!((padded.width, padded.height), (8, 12));
        assert_eq!(padded.bytes, original);
    }

    #[test]
    fn pads_ten_by_ten_to_twelve() {
        let padded = pad_to_multiple_of_four(&png(10, 10)).unwrap();
        assert!(padded.changed);
        assert_eq!((padded.width, padded.height), (12, 12));

        let decoded = image::load_from_memory(&padded.bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (12, 12));
        for y in 0..12 {
            for x in 0..12 {
                let pixel = decoded.get_pixel(x, y);
                if x < 10 && y < 10 {
                    assert_eq!(*pixel, Rgba([x as u8, y as u8, 200, 255]));
                } else {
                    assert_eq!(pixel[3], 0, "padding at {x},{y} must be transparent");
                }
            }
        }
    }

    #[test]
    fn translucent_pixels_are_copied_exactly() {
        let source = RgbaImage::from_fn(6, 3, |x, y| Rgba([255, 10 * x as u8, 7 * y as u8, 1 + 40 * x as u8]));
        let mut encoded = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(source.clone())
            .write_to(&mut encoded, ImageFormat::Png)
            .unwrap();

        let padded = pad_to_multiple_of_four(&encoded.into_inner()).unwrap();
        let decoded = image::load_from_memory(&padded.bytes).unwrap().to_rgba8();

        assert_eq!(decoded.dimensions(), (8, 4));
        for (x, y, pixel) in source.enumerate_pixels() {
            assert_eq!(decoded.get_pixel(x, y), pixel, "pixel {x},{y} changed");
        }
        assert_eq!(decoded.get_pixel(7, 3)[3], 0);
    }

    #[test]
    fn pads_each_axis_independently() {
        let padded = pad_to_multiple_of_four(&png(8, 5)).unwrap();
        assert!(padded.changed);
        assert_eq!((padded.width, padded.height), (8, 8));
    }

    #[test]
    fn undecodable_input_is_an_error() {
        assert!(pad_to_multiple_of_four(b"definitely not an image").is_err());
    }
}
