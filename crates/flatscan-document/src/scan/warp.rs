// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inverse-mapped bilinear resampling through a projective transform.
//
// Output keeps the input's pixel representation (channel layout and sample
// depth). Source positions up to half a pixel outside the raster are clamped
// to the edge; anything farther out takes the background colour.

use flatscan_core::error::RectifyError;
use image::{DynamicImage, ImageBuffer, Pixel, Rgba, RgbaImage};
use tracing::{debug, instrument};

use super::geometry::Point2D;
use super::homography::TransformMatrix;

/// Subpixel types the resampler can interpolate.
pub trait Sample: Copy {
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

impl Sample for u8 {
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
    fn from_f64(value: f64) -> Self {
        value.round().clamp(0.0, f64::from(u8::MAX)) as u8
    }
}

impl Sample for u16 {
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
    fn from_f64(value: f64) -> Self {
        value.round().clamp(0.0, f64::from(u16::MAX)) as u16
    }
}

impl Sample for f32 {
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

/// Warp `image` so that `transform` (source → destination) lands it in a
/// `width` x `height` raster.
#[instrument(skip(image, transform, background), fields(src_w = image.width(), src_h = image.height()))]
pub fn warp_perspective(
    image: &DynamicImage,
    transform: &TransformMatrix,
    width: u32,
    height: u32,
    background: [u8; 4],
) -> Result<DynamicImage, RectifyError> {
    let inverse = transform.inverse()?;
    let bg = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba(background)));

    let warped = match image {
        DynamicImage::ImageLuma8(buf) => {
            let bg_px = *bg.to_luma8().get_pixel(0, 0);
            DynamicImage::ImageLuma8(warp_buffer(buf, &inverse, width, height, bg_px))
        }
        DynamicImage::ImageLumaA8(buf) => {
            let bg_px = *bg.to_luma_alpha8().get_pixel(0, 0);
            DynamicImage::ImageLumaA8(warp_buffer(buf, &inverse, width, height, bg_px))
        }
        DynamicImage::ImageRgb8(buf) => {
            let bg_px = *bg.to_rgb8().get_pixel(0, 0);
            DynamicImage::ImageRgb8(warp_buffer(buf, &inverse, width, height, bg_px))
        }
        DynamicImage::ImageRgba8(buf) => {
            DynamicImage::ImageRgba8(warp_buffer(buf, &inverse, width, height, Rgba(background)))
        }
        DynamicImage::ImageLuma16(buf) => {
            let bg_px = *bg.to_luma16().get_pixel(0, 0);
            DynamicImage::ImageLuma16(warp_buffer(buf, &inverse, width, height, bg_px))
        }
        DynamicImage::ImageLumaA16(buf) => {
            let bg_px = *bg.to_luma_alpha16().get_pixel(0, 0);
            DynamicImage::ImageLumaA16(warp_buffer(buf, &inverse, width, height, bg_px))
        }
        DynamicImage::ImageRgb16(buf) => {
            let bg_px = *bg.to_rgb16().get_pixel(0, 0);
            DynamicImage::ImageRgb16(warp_buffer(buf, &inverse, width, height, bg_px))
        }
        DynamicImage::ImageRgba16(buf) => {
            let bg_px = *bg.to_rgba16().get_pixel(0, 0);
            DynamicImage::ImageRgba16(warp_buffer(buf, &inverse, width, height, bg_px))
        }
        DynamicImage::ImageRgb32F(buf) => {
            let bg_px = *bg.to_rgb32f().get_pixel(0, 0);
            DynamicImage::ImageRgb32F(warp_buffer(buf, &inverse, width, height, bg_px))
        }
        DynamicImage::ImageRgba32F(buf) => {
            let bg_px = *bg.to_rgba32f().get_pixel(0, 0);
            DynamicImage::ImageRgba32F(warp_buffer(buf, &inverse, width, height, bg_px))
        }
        // Formats added to `image` later are resampled as 8-bit RGBA.
        other => {
            let rgba = other.to_rgba8();
            DynamicImage::ImageRgba8(warp_buffer(&rgba, &inverse, width, height, Rgba(background)))
        }
    };

    debug!(width, height, "Perspective warp complete");
    Ok(warped)
}

/// Resample one typed buffer. `inverse` maps destination to source.
fn warp_buffer<P>(
    src: &ImageBuffer<P, Vec<P::Subpixel>>,
    inverse: &TransformMatrix,
    width: u32,
    height: u32,
    background: P,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel,
    P::Subpixel: Sample,
{
    ImageBuffer::from_fn(width, height, |x, y| {
        inverse
            .project(Point2D::new(f64::from(x), f64::from(y)))
            .and_then(|p| sample_bilinear(src, p))
            .unwrap_or(background)
    })
}

/// Bilinear sample at `p`, or `None` when `p` is more than half a pixel
/// outside the raster.
fn sample_bilinear<P>(src: &ImageBuffer<P, Vec<P::Subpixel>>, p: Point2D) -> Option<P>
where
    P: Pixel,
    P::Subpixel: Sample,
{
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let (wf, hf) = (f64::from(w), f64::from(h));
    if p.x < -0.5 || p.y < -0.5 || p.x > wf - 0.5 || p.y > hf - 0.5 {
        return None;
    }

    let x = p.x.clamp(0.0, wf - 1.0);
    let y = p.y.clamp(0.0, hf - 1.0);
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (fx, fy) = (x - f64::from(x0), y - f64::from(y0));

    let p00 = src.get_pixel(x0, y0);
    let p10 = src.get_pixel(x1, y0);
    let p01 = src.get_pixel(x0, y1);
    let p11 = src.get_pixel(x1, y1);

    let mut out = *p00;
    for (c, slot) in out.channels_mut().iter_mut().enumerate() {
        let top = p00.channels()[c].to_f64() * (1.0 - fx) + p10.channels()[c].to_f64() * fx;
        let bottom = p01.channels()[c].to_f64() * (1.0 - fx) + p11.channels()[c].to_f64() * fx;
        *slot = Sample::from_f64(top * (1.0 - fy) + bottom * fy);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::homography::target_corners;
    use image::{GrayImage, Luma, Rgb, Rgb32FImage, RgbImage};

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 7) as u8, (y * 11) as u8, ((x + y) * 3) as u8]))
    }

    #[test]
    fn identity_transform_reproduces_input() {
        let src = DynamicImage::ImageRgb8(gradient(23, 17));
        let out = warp_perspective(&src, &TransformMatrix::identity(), 23, 17, [255; 4]).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn out_of_bounds_takes_background() {
        let src = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([0u8])));
        // Shift the source 20px right: every destination pixel misses it.
        let shifted = TransformMatrix::from_correspondences(
            target_corners(10, 10),
            target_corners(10, 10).map(|p| Point2D::new(p.x + 20.0, p.y)),
        )
        .unwrap();
        let out = warp_perspective(&src, &shifted, 10, 10, [255, 255, 255, 255]).unwrap();
        let gray = out.as_luma8().unwrap();
        assert!(gray.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn half_pixel_border_is_clamped() {
        let buf = GrayImage::from_fn(4, 4, |x, _| Luma([(x * 60) as u8]));
        assert_eq!(sample_bilinear(&buf, Point2D::new(-0.4, 1.0)), Some(Luma([0])));
        assert_eq!(sample_bilinear(&buf, Point2D::new(3.5, 1.0)), Some(Luma([180])));
        assert_eq!(sample_bilinear(&buf, Point2D::new(3.6, 1.0)), None);
        assert_eq!(sample_bilinear(&buf, Point2D::new(1.5, 0.0)), Some(Luma([90])));
    }

    #[test]
    fn pixel_format_is_preserved() {
        let src = DynamicImage::ImageRgb32F(Rgb32FImage::from_pixel(8, 8, Rgb([0.25, 0.5, 0.75])));
        let out = warp_perspective(&src, &TransformMatrix::identity(), 4, 6, [0; 4]).unwrap();
        let buf = out.as_rgb32f().expect("Rgb32F output");
        assert_eq!(buf.dimensions(), (4, 6));
        assert_eq!(*buf.get_pixel(2, 2), Rgb([0.25, 0.5, 0.75]));
    }

    #[test]
    fn background_converts_to_luma() {
        let src = DynamicImage::ImageLuma16(image::ImageBuffer::from_pixel(4, 4, Luma([7u16])));
        let out = warp_perspective(&src, &TransformMatrix::identity(), 8, 4, [255; 4]).unwrap();
        let buf = out.as_luma16().unwrap();
        assert_eq!(buf.get_pixel(1, 1).0[0], 7);
        assert_eq!(buf.get_pixel(7, 1).0[0], u16::MAX);
    }
}
