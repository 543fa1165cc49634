// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contour extraction from a binary edge map.

use image::GrayImage;
use imageproc::contours::find_contours;

use super::geometry::{Contour, Point2D};

/// Contours shorter than this cannot enclose an area.
const MIN_CONTOUR_POINTS: usize = 3;

/// Trace every border in `edges` (nonzero pixels are foreground).
///
/// Uses Suzuki–Abe border following. Outer borders and hole borders are
/// both yielded and the nesting hierarchy is ignored, so a page outline
/// surrounded by other edge noise is still reported. The returned iterator
/// is consumed once; contours with fewer than three points are skipped.
pub fn extract_contours(edges: &GrayImage) -> impl Iterator<Item = Contour> + use<> {
    find_contours::<u32>(edges)
        .into_iter()
        .filter(|c| c.points.len() >= MIN_CONTOUR_POINTS)
        .map(|c| {
            Contour::new(
                c.points
                    .into_iter()
                    .map(|p| Point2D::new(f64::from(p.x), f64::from(p.y)))
                    .collect(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn draw_outline(img: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for x in x0..=x1 {
            img.put_pixel(x, y0, Luma([255]));
            img.put_pixel(x, y1, Luma([255]));
        }
        for y in y0..=y1 {
            img.put_pixel(x0, y, Luma([255]));
            img.put_pixel(x1, y, Luma([255]));
        }
    }

    #[test]
    fn empty_image_produces_no_contours() {
        let img = GrayImage::new(10, 10);
        assert_eq!(extract_contours(&img).count(), 0);
    }

    #[test]
    fn single_pixel_is_discarded() {
        let mut img = GrayImage::new(10, 10);
        img.put_pixel(5, 5, Luma([255]));
        assert!(extract_contours(&img).all(|c| c.len() >= MIN_CONTOUR_POINTS));
    }

    #[test]
    fn nested_outlines_are_all_reported() {
        let mut img = GrayImage::new(60, 60);
        draw_outline(&mut img, 5, 5, 54, 54);
        draw_outline(&mut img, 20, 20, 39, 39);

        let contours: Vec<Contour> = extract_contours(&img).collect();
        // Each one-pixel outline has an outer and a hole border.
        assert!(contours.len() >= 3, "got {} contours", contours.len());
        assert!(contours.iter().all(|c| c.len() >= MIN_CONTOUR_POINTS));

        let inner_found = contours
            .iter()
            .any(|c| c.points().iter().all(|p| p.x >= 19.0 && p.x <= 40.0));
        assert!(inner_found, "inner outline was not traced");
    }
}
