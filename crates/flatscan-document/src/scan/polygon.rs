// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Polygon approximation and document quadrilateral selection.
//
// Each contour is simplified with closed Douglas–Peucker at a tolerance
// proportional to its perimeter. Contours that collapse to exactly four
// vertices are page candidates; the one enclosing the largest area wins.

use flatscan_core::config::RectifyConfig;
use flatscan_core::error::RectifyError;
use tracing::{debug, instrument};

use super::geometry::{Contour, Point2D, Polygon, Quadrilateral};

// ---------------------------------------------------------------------------
// Douglas–Peucker
// ---------------------------------------------------------------------------

/// Simplify a closed contour with Douglas–Peucker.
///
/// The loop is cut at an approximate diameter pair: the point farthest from
/// the trace start, then the point farthest from that one. Both arcs between
/// the pair are simplified as open chains and rejoined, so the two anchor
/// points always survive.
pub fn approximate_closed(points: &[Point2D], epsilon: f64) -> Polygon {
    let n = points.len();
    if n < 3 {
        return Polygon::new(points.to_vec());
    }

    let a = farthest_from(points, points[0]);
    let b = farthest_from(points, points[a]);
    if a == b {
        // Every point coincides.
        return Polygon::new(vec![points[0]]);
    }
    let (lo, hi) = (a.min(b), a.max(b));

    let first_arc: Vec<Point2D> = points[lo..=hi].to_vec();
    let second_arc: Vec<Point2D> = points[hi..]
        .iter()
        .chain(points[..=lo].iter())
        .copied()
        .collect();

    let mut vertices = simplify_open(&first_arc, epsilon);
    vertices.pop();
    let mut tail = simplify_open(&second_arc, epsilon);
    tail.pop();
    vertices.extend(tail);

    Polygon::new(vertices)
}

/// Open-chain Douglas–Peucker. Endpoints are always kept.
fn simplify_open(chain: &[Point2D], epsilon: f64) -> Vec<Point2D> {
    let n = chain.len();
    if n <= 2 {
        return chain.to_vec();
    }

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    let mut stack = vec![(0usize, n - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let (mut split, mut max_dist) = (start, 0.0_f64);
        for (i, p) in chain.iter().enumerate().take(end).skip(start + 1) {
            let d = line_distance(*p, chain[start], chain[end]);
            if d > max_dist {
                max_dist = d;
                split = i;
            }
        }
        if max_dist > epsilon {
            keep[split] = true;
            stack.push((start, split));
            stack.push((split, end));
        }
    }

    chain
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

fn farthest_from(points: &[Point2D], origin: Point2D) -> usize {
    let mut best = 0;
    let mut best_dist = 0.0_f64;
    for (i, p) in points.iter().enumerate() {
        let d = p.distance(&origin);
        if d > best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// Perpendicular distance from `p` to the line through `a` and `b`, or to
/// `a` when the two coincide.
fn line_distance(p: Point2D, a: Point2D, b: Point2D) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = dx.hypot(dy);
    if len == 0.0 {
        return p.distance(&a);
    }
    (dx * (p.y - a.y) - dy * (p.x - a.x)).abs() / len
}

// ---------------------------------------------------------------------------
// Candidate selection
// ---------------------------------------------------------------------------

/// Pick the largest four-vertex approximation among `contours`.
///
/// Candidates must enclose a positive area of at least
/// `min_area_ratio × image_area`. On equal areas the first candidate seen is
/// kept.
#[instrument(skip(contours, config))]
pub fn select_document_quad(
    contours: impl IntoIterator<Item = Contour>,
    config: &RectifyConfig,
    image_area: f64,
) -> Result<Quadrilateral, RectifyError> {
    let min_area = config.min_area_ratio * image_area;
    let mut best: Option<Quadrilateral> = None;
    let mut examined = 0usize;
    let mut quads = 0usize;

    for contour in contours {
        examined += 1;
        let epsilon = config.approx_epsilon_ratio * contour.perimeter();
        let Some(quad) = approximate_closed(contour.points(), epsilon).into_quadrilateral() else {
            continue;
        };
        quads += 1;

        let area = quad.area();
        if area <= 0.0 || area < min_area {
            continue;
        }
        if best.is_none_or(|b| area > b.area()) {
            best = Some(quad);
        }
    }

    debug!(examined, quads, best_area = best.map(|q| q.area()), "Quadrilateral search done");
    best.ok_or(RectifyError::NoBoundaryFound)
}
