// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edge map builder: intensity conversion, Gaussian smoothing and Canny
// hysteresis thresholding.

use flatscan_core::config::RectifyConfig;
use flatscan_core::error::RectifyError;
use image::{DynamicImage, GrayImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use tracing::{debug, instrument};

/// Build a binary edge map (0 = background, 255 = edge) with the same
/// dimensions as `image`.
///
/// ## Pipeline
///
/// 1. Convert to single-channel luma
/// 2. Gaussian blur (`blur_sigma`) to suppress sensor noise
/// 3. Canny edge detection with `canny_low`/`canny_high` hysteresis
#[instrument(skip(image, config), fields(width = image.width(), height = image.height()))]
pub fn build_edge_map(
    image: &DynamicImage,
    config: &RectifyConfig,
) -> Result<GrayImage, RectifyError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(RectifyError::Decode(format!(
            "image has zero dimension ({width}x{height})"
        )));
    }

    let gray = image.to_luma8();
    let blurred = gaussian_blur_f32(&gray, config.blur_sigma);
    let edges = canny(&blurred, config.canny_low, config.canny_high);

    debug!(
        sigma = config.blur_sigma,
        low = config.canny_low,
        high = config.canny_high,
        edge_pixels = edges.pixels().filter(|p| p.0[0] > 0).count(),
        "Edge map built"
    );
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, RgbImage, Rgb};

    #[test]
    fn empty_image_is_a_decode_error() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(0, 10));
        let err = build_edge_map(&img, &RectifyConfig::default()).unwrap_err();
        assert!(matches!(err, RectifyError::Decode(_)));
    }

    #[test]
    fn uniform_image_has_no_edges() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, Rgb([180, 170, 160])));
        let edges = build_edge_map(&img, &RectifyConfig::default()).unwrap();
        assert_eq!(edges.dimensions(), (64, 48));
        assert!(edges.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn sharp_rectangle_produces_edges() {
        let mut img = GrayImage::from_pixel(120, 100, Luma([20u8]));
        for y in 20..80 {
            for x in 30..90 {
                img.put_pixel(x, y, Luma([235u8]));
            }
        }
        let edges = build_edge_map(&DynamicImage::ImageLuma8(img), &RectifyConfig::default())
            .unwrap();

        // Edges hug the rectangle border, never the flat interior.
        assert!(edges.pixels().any(|p| p.0[0] == 255));
        assert_eq!(edges.get_pixel(60, 50).0[0], 0);
        assert_eq!(edges.get_pixel(5, 5).0[0], 0);
    }
}
