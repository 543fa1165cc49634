// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plane geometry shared by the scan pipeline stages.
//
// All coordinates are in source-image pixel space with pixel centres at
// integer positions, x growing right and y growing down.

use serde::{Deserialize, Serialize};

/// A point in source-image space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// A traced closed boundary. Point order is the trace order.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    points: Vec<Point2D>,
}

impl Contour {
    pub fn new(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Length of the closed boundary, including the closing segment.
    pub fn perimeter(&self) -> f64 {
        closed_perimeter(&self.points)
    }
}

/// A simplified closed polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<Point2D>,
}

impl Polygon {
    /// Build a polygon, dropping consecutive duplicate vertices (including a
    /// last vertex equal to the first).
    pub fn new(mut vertices: Vec<Point2D>) -> Self {
        vertices.dedup();
        while vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Point2D] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Enclosed area (unsigned).
    pub fn area(&self) -> f64 {
        shoelace_area(&self.vertices)
    }

    /// Narrow to a quadrilateral if the polygon has exactly four vertices.
    pub fn into_quadrilateral(self) -> Option<Quadrilateral> {
        let vertices: [Point2D; 4] = self.vertices.try_into().ok()?;
        Some(Quadrilateral::new(vertices))
    }
}

/// A four-vertex polygon together with its enclosed area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadrilateral {
    vertices: [Point2D; 4],
    area: f64,
}

impl Quadrilateral {
    pub fn new(vertices: [Point2D; 4]) -> Self {
        let area = shoelace_area(&vertices);
        Self { vertices, area }
    }

    pub fn vertices(&self) -> &[Point2D; 4] {
        &self.vertices
    }

    pub fn area(&self) -> f64 {
        self.area
    }
}

/// Quadrilateral corners labelled by role.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderedCorners {
    pub top_left: Point2D,
    pub top_right: Point2D,
    pub bottom_right: Point2D,
    pub bottom_left: Point2D,
}

impl OrderedCorners {
    /// Corners in tl, tr, br, bl order.
    pub fn to_array(&self) -> [Point2D; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Area enclosed by the tl → tr → br → bl loop.
    pub fn area(&self) -> f64 {
        shoelace_area(&self.to_array())
    }
}

/// Unsigned shoelace area of a closed vertex loop.
pub fn shoelace_area(vertices: &[Point2D]) -> f64 {
    let n = vertices.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice.abs() / 2.0
}

/// Arc length of a closed point loop.
pub fn closed_perimeter(points: &[Point2D]) -> f64 {
    match points {
        [] | [_] => 0.0,
        _ => points
            .iter()
            .zip(points.iter().cycle().skip(1))
            .map(|(a, b)| a.distance(b))
            .sum(),
    }
}
