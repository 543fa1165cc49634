// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// flatscan-document: Document processing for flatscan.
//
// Provides the perspective rectification pipeline (edge map, contour tracing,
// quadrilateral selection, corner ordering, projective warp), image
// processing (decode, grayscale, brightness/contrast, encode), scan filters,
// and single-page PDF export.

pub mod image;
pub mod pdf;
pub mod scan;

// Re-export the primary structs so callers can use `flatscan_document::DocumentRectifier` etc.
pub use image::processor::ImageProcessor;
pub use pdf::writer::PdfWriter;
pub use scan::enhance::{ScanEnhancer, ScanFilter};
pub use scan::geometry::{OrderedCorners, Point2D, Quadrilateral};
pub use scan::rectifier::{DocumentRectifier, FallbackReason, Rectification, rectify};
