// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Corner labelling for a detected page quadrilateral.

use super::geometry::{OrderedCorners, Point2D};

/// Label four unordered points as top-left, top-right, bottom-right and
/// bottom-left.
///
/// With `sum = x + y` and `diff = y - x`: top-left has the smallest sum,
/// bottom-right the largest, top-right the smallest diff, bottom-left the
/// largest. Comparisons are strict, so on an exact tie the earliest point
/// keeps the role.
pub fn order_corners(points: [Point2D; 4]) -> OrderedCorners {
    let sum = |p: &Point2D| p.x + p.y;
    let diff = |p: &Point2D| p.y - p.x;

    let (mut tl, mut br, mut tr, mut bl) = (0, 0, 0, 0);
    for (i, p) in points.iter().enumerate().skip(1) {
        if sum(p) < sum(&points[tl]) {
            tl = i;
        }
        if sum(p) > sum(&points[br]) {
            br = i;
        }
        if diff(p) < diff(&points[tr]) {
            tr = i;
        }
        if diff(p) > diff(&points[bl]) {
            bl = i;
        }
    }

    OrderedCorners {
        top_left: points[tl],
        top_right: points[tr],
        bottom_right: points[br],
        bottom_left: points[bl],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permutations(items: [Point2D; 4]) -> Vec<[Point2D; 4]> {
        let mut out = Vec::new();
        for a in 0..4 {
            for b in 0..4 {
                for c in 0..4 {
                    for d in 0..4 {
                        let idx = [a, b, c, d];
                        let mut seen = [false; 4];
                        idx.iter().for_each(|&i| seen[i] = true);
                        if seen.iter().all(|&s| s) {
                            out.push(idx.map(|i| items[i]));
                        }
                    }
                }
            }
        }
        out
    }

    #[test]
    fn axis_aligned_rectangle() {
        let corners = order_corners([
            Point2D::new(100.0, 50.0),
            Point2D::new(0.0, 0.0),
            Point2D::new(0.0, 50.0),
            Point2D::new(100.0, 0.0),
        ]);
        assert_eq!(corners.top_left, Point2D::new(0.0, 0.0));
        assert_eq!(corners.top_right, Point2D::new(100.0, 0.0));
        assert_eq!(corners.bottom_right, Point2D::new(100.0, 50.0));
        assert_eq!(corners.bottom_left, Point2D::new(0.0, 50.0));
    }

    #[test]
    fn every_permutation_gives_same_labels() {
        let skewed = [
            Point2D::new(12.0, 8.0),
            Point2D::new(310.0, 30.0),
            Point2D::new(295.0, 420.0),
            Point2D::new(5.0, 401.0),
        ];
        let expected = order_corners(skewed);
        let perms = permutations(skewed);
        assert_eq!(perms.len(), 24);
        for perm in perms {
            assert_eq!(order_corners(perm), expected, "permutation {:?}", perm);
        }
        assert_eq!(expected.top_left, skewed[0]);
        assert_eq!(expected.top_right, skewed[1]);
        assert_eq!(expected.bottom_right, skewed[2]);
        assert_eq!(expected.bottom_left, skewed[3]);
    }

    #[test]
    fn ties_resolve_to_first_point() {
        // A diamond: every extreme of sum and diff is shared by two points.
        let pts = [
            Point2D::new(10.0, 0.0),
            Point2D::new(20.0, 10.0),
            Point2D::new(10.0, 20.0),
            Point2D::new(0.0, 10.0),
        ];
        let corners = order_corners(pts);
        assert_eq!(corners.top_left, pts[0]);
        assert_eq!(corners.bottom_right, pts[1]);

        let swapped = [pts[3], pts[1], pts[2], pts[0]];
        assert_eq!(order_corners(swapped).top_left, pts[3]);
    }
}
