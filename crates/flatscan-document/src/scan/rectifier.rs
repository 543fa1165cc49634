// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rectification orchestrator: sequences edge detection, contour tracing,
// quadrilateral selection, corner ordering and the projective warp, and
// applies the fallback policy.
//
// Only unreadable input is an error. Every other stage failure hands the
// original image back unchanged together with the reason.

use flatscan_core::config::RectifyConfig;
use flatscan_core::error::{FlatscanError, RectifyError};
use image::DynamicImage;
use tracing::{debug, info, instrument, warn};

use super::contours::extract_contours;
use super::corners::order_corners;
use super::edges::build_edge_map;
use super::geometry::{OrderedCorners, Point2D};
use super::homography::{TransformMatrix, target_corners, target_size};
use super::polygon::select_document_quad;
use super::warp::warp_perspective;
use crate::image::processor::ImageProcessor;

/// Why a rectification request returned the input unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// No four-vertex contour was found.
    NoBoundaryFound,
    /// The detected corners give a zero-sized or zero-area page.
    DegenerateGeometry { width: i64, height: i64 },
    /// The projective transform could not be solved or inverted.
    TransformSolveFailure(String),
}

impl FallbackReason {
    fn from_error(err: RectifyError) -> Result<Self, FlatscanError> {
        match err {
            RectifyError::NoBoundaryFound => Ok(Self::NoBoundaryFound),
            RectifyError::DegenerateGeometry { width, height } => {
                Ok(Self::DegenerateGeometry { width, height })
            }
            RectifyError::TransformSolveFailure(detail) => Ok(Self::TransformSolveFailure(detail)),
            RectifyError::Decode(detail) => Err(FlatscanError::Decode(detail)),
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoBoundaryFound => write!(f, "no document boundary found"),
            Self::DegenerateGeometry { width, height } => {
                write!(f, "degenerate geometry ({width}x{height})")
            }
            Self::TransformSolveFailure(detail) => write!(f, "transform solve failed: {detail}"),
        }
    }
}

/// Outcome of a rectification request.
#[derive(Debug, Clone, PartialEq)]
pub enum Rectification {
    /// The page was found and flattened.
    Rectified {
        image: DynamicImage,
        corners: OrderedCorners,
        size: (u32, u32),
    },
    /// The input image, returned untouched.
    Unchanged {
        image: DynamicImage,
        reason: FallbackReason,
    },
}

impl Rectification {
    pub fn image(&self) -> &DynamicImage {
        match self {
            Self::Rectified { image, .. } | Self::Unchanged { image, .. } => image,
        }
    }

    pub fn into_image(self) -> DynamicImage {
        match self {
            Self::Rectified { image, .. } | Self::Unchanged { image, .. } => image,
        }
    }

    pub fn is_rectified(&self) -> bool {
        matches!(self, Self::Rectified { .. })
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            Self::Rectified { .. } => None,
            Self::Unchanged { reason, .. } => Some(reason),
        }
    }
}

/// Detects a photographed page and warps it to a fronto-parallel rectangle.
///
/// Holds only immutable configuration, so one instance can serve many
/// threads.
#[derive(Debug, Clone, Default)]
pub struct DocumentRectifier {
    config: RectifyConfig,
}

impl DocumentRectifier {
    /// Build a rectifier, rejecting settings the pipeline cannot run with.
    pub fn new(config: RectifyConfig) -> Result<Self, FlatscanError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RectifyConfig {
        &self.config
    }

    // -- Entry points ---------------------------------------------------------

    /// Rectify an in-memory image.
    ///
    /// ## Pipeline
    ///
    /// 1. Edge map (luma, Gaussian blur, Canny)
    /// 2. Contour tracing
    /// 3. Douglas–Peucker approximation; largest quadrilateral wins
    /// 4. Corner ordering (tl, tr, br, bl)
    /// 5. Target size, homography solve, bilinear warp
    ///
    /// Returns `Rectification::Unchanged` if any of steps 3–5 cannot produce
    /// a page. Errors only on an empty image.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn rectify(&self, image: DynamicImage) -> Result<Rectification, FlatscanError> {
        info!("Starting perspective rectification");
        let attempt = self
            .locate(&image)
            .and_then(|corners| self.warp(&image, corners).map(|(out, size)| (out, corners, size)));

        match attempt {
            Ok((rectified, corners, size)) => {
                info!(out_w = size.0, out_h = size.1, "Perspective rectification applied");
                Ok(Rectification::Rectified {
                    image: rectified,
                    corners,
                    size,
                })
            }
            Err(err) => self.fall_back(image, err),
        }
    }

    /// Decode encoded image bytes, then rectify.
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    pub fn rectify_bytes(&self, data: &[u8]) -> Result<Rectification, FlatscanError> {
        let image = ImageProcessor::from_bytes(data)?.into_dynamic();
        self.rectify(image)
    }

    /// Rectify using caller-supplied corners (any order), skipping
    /// detection. The same fallback policy applies.
    #[instrument(skip(self, image))]
    pub fn rectify_with_corners(
        &self,
        image: DynamicImage,
        points: [Point2D; 4],
    ) -> Result<Rectification, FlatscanError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(FlatscanError::Decode("image has zero dimension".into()));
        }
        let corners = order_corners(points);
        match self.warp(&image, corners) {
            Ok((rectified, size)) => Ok(Rectification::Rectified {
                image: rectified,
                corners,
                size,
            }),
            Err(err) => self.fall_back(image, err),
        }
    }

    /// Run detection only and report the ordered page corners, if any.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn detect_corners(&self, image: &DynamicImage) -> Result<Option<OrderedCorners>, FlatscanError> {
        match self.locate(image) {
            Ok(corners) => Ok(Some(corners)),
            Err(RectifyError::NoBoundaryFound) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    // -- Stages ---------------------------------------------------------------

    fn locate(&self, image: &DynamicImage) -> Result<OrderedCorners, RectifyError> {
        let edges = build_edge_map(image, &self.config)?;
        let image_area = f64::from(image.width()) * f64::from(image.height());
        let quad = select_document_quad(extract_contours(&edges), &self.config, image_area)?;
        let corners = order_corners(*quad.vertices());
        debug!(
            top_left = ?corners.top_left,
            top_right = ?corners.top_right,
            bottom_right = ?corners.bottom_right,
            bottom_left = ?corners.bottom_left,
            area = quad.area(),
            "Document corners located"
        );
        Ok(corners)
    }

    fn warp(
        &self,
        image: &DynamicImage,
        corners: OrderedCorners,
    ) -> Result<(DynamicImage, (u32, u32)), RectifyError> {
        let (width, height) = target_size(&corners)?;
        let transform =
            TransformMatrix::from_correspondences(corners.to_array(), target_corners(width, height))?;
        let out = warp_perspective(image, &transform, width, height, self.config.background)?;
        Ok((out, (width, height)))
    }

    fn fall_back(
        &self,
        image: DynamicImage,
        err: RectifyError,
    ) -> Result<Rectification, FlatscanError> {
        let reason = FallbackReason::from_error(err)?;
        warn!(%reason, "Rectification skipped; returning original image");
        Ok(Rectification::Unchanged { image, reason })
    }
}

/// Rectify with default settings, returning just the image.
pub fn rectify(image: DynamicImage) -> Result<DynamicImage, FlatscanError> {
    DocumentRectifier::default()
        .rectify(image)
        .map(Rectification::into_image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn page_on_desk(w: u32, h: u32, page: (u32, u32, u32, u32)) -> DynamicImage {
        let (x0, y0, x1, y1) = page;
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
                Rgb([245, 245, 240])
            } else {
                Rgb([40, 45, 50])
            }
        }))
    }

    #[test]
    fn rectifier_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DocumentRectifier>();
    }

    #[test]
    fn blank_image_is_returned_unchanged() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(80, 60, Luma([200])));
        let result = DocumentRectifier::default().rectify(img.clone()).unwrap();
        assert_eq!(result.fallback_reason(), Some(&FallbackReason::NoBoundaryFound));
        assert_eq!(result.into_image(), img);
    }

    #[test]
    fn full_frame_page_is_returned_unchanged() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(90, 70, Rgb([250, 250, 250])));
        let out = rectify(img.clone()).unwrap();
        assert_eq!((out.width(), out.height()), (90, 70));
        assert_eq!(out, img);
    }

    #[test]
    fn empty_image_is_a_hard_error() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        let err = DocumentRectifier::default().rectify(img).unwrap_err();
        assert!(matches!(err, FlatscanError::Decode(_)));
    }

    #[test]
    fn manual_corners_set_output_size() {
        let img = page_on_desk(160, 120, (0, 0, 160, 120));
        let points = [
            Point2D::new(100.0, 50.0),
            Point2D::new(0.0, 0.0),
            Point2D::new(100.0, 0.0),
            Point2D::new(0.0, 50.0),
        ];
        let result = DocumentRectifier::default()
            .rectify_with_corners(img, points)
            .unwrap();
        assert!(result.is_rectified());
        assert_eq!(result.image().width(), 100);
        assert_eq!(result.image().height(), 50);
        assert!(result.image().as_rgb8().is_some(), "pixel format preserved");
    }

    #[test]
    fn collinear_corners_fall_back() {
        let img = page_on_desk(64, 64, (8, 8, 56, 56));
        let points = [
            Point2D::new(0.0, 0.0),
            Point2D::new(20.0, 20.0),
            Point2D::new(40.0, 40.0),
            Point2D::new(60.0, 60.0),
        ];
        let result = DocumentRectifier::default()
            .rectify_with_corners(img.clone(), points)
            .unwrap();
        assert!(matches!(
            result.fallback_reason(),
            Some(FallbackReason::DegenerateGeometry { .. })
        ));
        assert_eq!(result.into_image(), img);
    }

    #[test]
    fn one_pixel_wide_page_falls_back_on_solve_failure() {
        let img = page_on_desk(64, 64, (8, 8, 56, 56));
        // Width rounds to 1, so both target columns collapse onto x = 0.
        let points = [
            Point2D::new(10.0, 10.0),
            Point2D::new(11.0, 10.0),
            Point2D::new(11.0, 60.0),
            Point2D::new(10.0, 60.0),
        ];
        let result = DocumentRectifier::default()
            .rectify_with_corners(img.clone(), points)
            .unwrap();
        assert!(
            matches!(result.fallback_reason(), Some(FallbackReason::TransformSolveFailure(_))),
            "{:?}",
            result.fallback_reason()
        );
        assert_eq!(result.into_image().as_bytes(), img.as_bytes());
    }

    #[test]
    fn oversized_corners_fall_back_without_allocating() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([128])));
        let points = [
            Point2D::new(0.0, 0.0),
            Point2D::new(1e6, 0.0),
            Point2D::new(1e6, 1e6),
            Point2D::new(0.0, 1e6),
        ];
        let result = DocumentRectifier::default()
            .rectify_with_corners(img.clone(), points)
            .unwrap();
        assert_eq!(
            result.fallback_reason(),
            Some(&FallbackReason::DegenerateGeometry {
                width: 1_000_000,
                height: 1_000_000
            })
        );
        assert_eq!(result.into_image(), img);
    }

    #[test]
    fn only_decode_failures_escape_fall_back() {
        let rectifier = DocumentRectifier::default();
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([9])));

        let err = rectifier
            .fall_back(img.clone(), RectifyError::Decode("truncated".into()))
            .unwrap_err();
        assert!(matches!(err, FlatscanError::Decode(ref d) if d == "truncated"));

        for recoverable in [
            RectifyError::NoBoundaryFound,
            RectifyError::DegenerateGeometry { width: 0, height: 12 },
            RectifyError::TransformSolveFailure("singular".into()),
        ] {
            let result = rectifier.fall_back(img.clone(), recoverable).unwrap();
            assert!(result.fallback_reason().is_some());
            assert_eq!(result.into_image(), img);
        }
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let err = DocumentRectifier::new(RectifyConfig {
            blur_sigma: 0.0,
            ..RectifyConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, FlatscanError::Config(_)));
        assert!(DocumentRectifier::new(RectifyConfig::default()).is_ok());
    }

    #[test]
    fn page_on_desk_is_cropped_to_page() {
        let img = page_on_desk(240, 200, (40, 30, 200, 170));
        let rectifier = DocumentRectifier::default();

        let corners = rectifier.detect_corners(&img).unwrap().expect("page detected");
        assert!((corners.top_left.x - 40.0).abs() <= 3.0, "{:?}", corners);
        assert!((corners.bottom_right.y - 170.0).abs() <= 3.0, "{:?}", corners);

        let result = rectifier.rectify(img).unwrap();
        assert!(result.is_rectified(), "{:?}", result.fallback_reason());
        let out = result.image();
        assert!((out.width() as i64 - 160).abs() <= 4, "width {}", out.width());
        assert!((out.height() as i64 - 140).abs() <= 4, "height {}", out.height());

        // The middle of the output is page, not desk.
        let centre = out.to_rgb8().get_pixel(out.width() / 2, out.height() / 2).0;
        assert!(centre[0] > 200, "centre pixel {:?}", centre);
    }

    #[test]
    fn undecodable_bytes_are_a_hard_error() {
        let err = DocumentRectifier::default()
            .rectify_bytes(&[0x00, 0x01, 0x02])
            .unwrap_err();
        assert!(matches!(err, FlatscanError::Decode(_)));
    }
}
