// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Projective transform between the detected page and the output rectangle.
//
// The 3x3 matrix is solved from four point correspondences as an 8x8 linear
// system with h33 fixed to 1, then checked for invertibility and for how
// closely it reproduces the correspondences.

use flatscan_core::error::RectifyError;
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use super::geometry::{OrderedCorners, Point2D};

/// Largest accepted reprojection miss for the solved correspondences (px).
const MAX_REPROJECTION_ERROR: f64 = 1e-3;

/// Determinant magnitude below which the matrix is treated as singular.
const MIN_DETERMINANT: f64 = 1e-12;

/// Corner loops enclosing less than this area (px²) cannot be flattened.
const MIN_CORNER_AREA: f64 = 1.0;

/// Largest output raster (pixels) a rectification may allocate.
pub const MAX_OUTPUT_PIXELS: u64 = 64 * 1024 * 1024;

/// A planar projective transform in homogeneous coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformMatrix {
    matrix: Matrix3<f64>,
}

impl TransformMatrix {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// Solve the transform mapping each `src[i]` onto `dst[i]`.
    pub fn from_correspondences(
        src: [Point2D; 4],
        dst: [Point2D; 4],
    ) -> Result<Self, RectifyError> {
        if src.iter().chain(dst.iter()).any(|p| !p.is_finite()) {
            return Err(RectifyError::TransformSolveFailure(
                "non-finite correspondence".into(),
            ));
        }

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            let r = 2 * i;
            a[(r, 0)] = s.x;
            a[(r, 1)] = s.y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -d.x * s.x;
            a[(r, 7)] = -d.x * s.y;
            b[r] = d.x;

            a[(r + 1, 3)] = s.x;
            a[(r + 1, 4)] = s.y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -d.y * s.x;
            a[(r + 1, 7)] = -d.y * s.y;
            b[r + 1] = d.y;
        }

        let h = a.lu().solve(&b).ok_or_else(|| {
            RectifyError::TransformSolveFailure("correspondence system is singular".into())
        })?;
        if h.iter().any(|v| !v.is_finite()) {
            return Err(RectifyError::TransformSolveFailure(
                "solution has non-finite entries".into(),
            ));
        }

        #[rustfmt::skip]
        let matrix = Matrix3::new(
            h[0], h[1], h[2],
            h[3], h[4], h[5],
            h[6], h[7], 1.0,
        );
        let det = matrix.determinant();
        if !det.is_finite() || det.abs() < MIN_DETERMINANT {
            return Err(RectifyError::TransformSolveFailure(format!(
                "matrix is not invertible (det = {det:e})"
            )));
        }

        let transform = Self { matrix };
        let worst = src
            .iter()
            .zip(dst.iter())
            .map(|(s, d)| {
                transform
                    .project(*s)
                    .map_or(f64::INFINITY, |p| p.distance(d))
            })
            .fold(0.0_f64, f64::max);
        if worst.is_nan() || worst > MAX_REPROJECTION_ERROR {
            return Err(RectifyError::TransformSolveFailure(format!(
                "reprojection error {worst:e} px exceeds tolerance"
            )));
        }

        Ok(transform)
    }

    /// Map a point. `None` when it lands on the line at infinity.
    pub fn project(&self, point: Point2D) -> Option<Point2D> {
        let v = self.matrix * Vector3::new(point.x, point.y, 1.0);
        if v.z.abs() < f64::EPSILON {
            return None;
        }
        let mapped = Point2D::new(v.x / v.z, v.y / v.z);
        mapped.is_finite().then_some(mapped)
    }

    pub fn inverse(&self) -> Result<Self, RectifyError> {
        self.matrix
            .try_inverse()
            .map(|matrix| Self { matrix })
            .ok_or_else(|| RectifyError::TransformSolveFailure("matrix has no inverse".into()))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }
}

/// Output raster size for a labelled page: the longer of each pair of
/// opposite edges, rounded to whole pixels.
///
/// Sizes above `MAX_OUTPUT_PIXELS` are rejected as degenerate.
pub fn target_size(corners: &OrderedCorners) -> Result<(u32, u32), RectifyError> {
    let OrderedCorners {
        top_left: tl,
        top_right: tr,
        bottom_right: br,
        bottom_left: bl,
    } = *corners;

    if corners.to_array().iter().any(|p| !p.is_finite()) {
        return Err(RectifyError::DegenerateGeometry {
            width: 0,
            height: 0,
        });
    }

    let width = br.distance(&bl).max(tr.distance(&tl)).round();
    let height = tr.distance(&br).max(tl.distance(&bl)).round();
    let (w, h) = (width as i64, height as i64);

    let too_large = w
        .checked_mul(h)
        .is_none_or(|pixels| pixels > MAX_OUTPUT_PIXELS as i64);
    if w <= 0 || h <= 0 || w > i64::from(u32::MAX) || h > i64::from(u32::MAX) || too_large {
        return Err(RectifyError::DegenerateGeometry {
            width: w,
            height: h,
        });
    }
    if corners.area() < MIN_CORNER_AREA {
        return Err(RectifyError::DegenerateGeometry {
            width: w,
            height: h,
        });
    }

    Ok((w as u32, h as u32))
}

/// Destination rectangle corners in tl, tr, br, bl order.
pub fn target_corners(width: u32, height: u32) -> [Point2D; 4] {
    let (w, h) = (f64::from(width) - 1.0, f64::from(height) - 1.0);
    [
        Point2D::new(0.0, 0.0),
        Point2D::new(w, 0.0),
        Point2D::new(w, h),
        Point2D::new(0.0, h),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corners(pts: [(f64, f64); 4]) -> OrderedCorners {
        OrderedCorners {
            top_left: pts[0].into(),
            top_right: pts[1].into(),
            bottom_right: pts[2].into(),
            bottom_left: pts[3].into(),
        }
    }

    #[test]
    fn size_of_axis_aligned_page() {
        let c = corners([(0.0, 0.0), (100.0, 0.0), (100.0, 50.0), (0.0, 50.0)]);
        assert_eq!(target_size(&c).unwrap(), (100, 50));
    }

    #[test]
    fn size_uses_longer_opposite_edge() {
        let c = corners([(10.0, 10.0), (200.0, 30.0), (210.0, 300.0), (0.0, 280.0)]);
        let (w, h) = target_size(&c).unwrap();
        let bottom = (210.0_f64 - 0.0).hypot(300.0 - 280.0);
        let left = (10.0_f64 - 0.0).hypot(10.0 - 280.0);
        assert_eq!(w, bottom.round() as u32);
        assert!(f64::from(h) >= left.round());
    }

    #[test]
    fn collinear_corners_are_degenerate() {
        let c = corners([(0.0, 0.0), (0.0, 0.0), (150.0, 150.0), (0.0, 0.0)]);
        assert!(matches!(
            target_size(&c),
            Err(RectifyError::DegenerateGeometry { .. })
        ));

        let line = corners([(0.0, 0.0), (50.0, 50.0), (150.0, 150.0), (100.0, 100.0)]);
        assert!(matches!(
            target_size(&line),
            Err(RectifyError::DegenerateGeometry { .. })
        ));
    }

    #[test]
    fn non_finite_corners_are_degenerate() {
        let c = corners([(f64::NAN, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        assert_eq!(
            target_size(&c),
            Err(RectifyError::DegenerateGeometry { width: 0, height: 0 })
        );
    }

    #[test]
    fn oversized_page_is_rejected() {
        let c = corners([(0.0, 0.0), (1e6, 0.0), (1e6, 1e6), (0.0, 1e6)]);
        assert_eq!(
            target_size(&c),
            Err(RectifyError::DegenerateGeometry {
                width: 1_000_000,
                height: 1_000_000
            })
        );

        // Just inside the limit is still accepted.
        let side = (MAX_OUTPUT_PIXELS as f64).sqrt().floor();
        let c = corners([(0.0, 0.0), (side, 0.0), (side, side), (0.0, side)]);
        assert_eq!(target_size(&c).unwrap(), (side as u32, side as u32));
    }

    #[test]
    fn solved_transform_hits_every_correspondence() {
        let src = [
            Point2D::new(12.0, 8.0),
            Point2D::new(310.0, 30.0),
            Point2D::new(295.0, 420.0),
            Point2D::new(5.0, 401.0),
        ];
        let dst = target_corners(300, 400);
        let t = TransformMatrix::from_correspondences(src, dst).unwrap();
        for (s, d) in src.iter().zip(dst.iter()) {
            let p = t.project(*s).unwrap();
            assert!(p.distance(d) < 1e-6, "{:?} -> {:?}, want {:?}", s, p, d);
        }

        let inv = t.inverse().unwrap();
        for (s, d) in src.iter().zip(dst.iter()) {
            let p = inv.project(*d).unwrap();
            assert!(p.distance(s) < 1e-6);
        }
    }

    #[test]
    fn identity_correspondences_give_identity() {
        let pts = target_corners(64, 32);
        let t = TransformMatrix::from_correspondences(pts, pts).unwrap();
        assert!((t.matrix() - Matrix3::identity()).amax() < 1e-9);
        assert_eq!(
            TransformMatrix::identity().project(Point2D::new(3.0, 4.0)),
            Some(Point2D::new(3.0, 4.0))
        );
    }

    #[test]
    fn collapsed_source_fails_to_solve() {
        let src = [Point2D::new(5.0, 5.0); 4];
        let err = TransformMatrix::from_correspondences(src, target_corners(10, 10)).unwrap_err();
        assert!(matches!(err, RectifyError::TransformSolveFailure(_)));
    }
}
