// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline: locate the page quadrilateral in a photograph, flatten
// it with a projective warp, then apply scan filters and export.
//
// Stage order: edges → contours → polygon → corners → homography/warp,
// sequenced by `rectifier`.

pub mod contours;
pub mod corners;
pub mod edges;
pub mod enhance;
pub mod geometry;
pub mod homography;
pub mod polygon;
pub mod rectifier;
pub mod warp;

pub use enhance::{ScanEnhancer, ScanFilter};
pub use rectifier::{DocumentRectifier, FallbackReason, Rectification};
