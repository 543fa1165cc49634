// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for flatscan.

use serde::{Deserialize, Serialize};

/// Encoded output formats for a finished scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Png,
    Jpeg,
    /// Single-page PDF with the scan centred on a paper-sized page.
    Pdf,
}

impl OutputFormat {
    /// MIME type string, as sent to the upload collaborator.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Pdf => "application/pdf",
        }
    }

    /// Canonical file extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Pdf => "pdf",
        }
    }

    /// Infer the output format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Infer the output format from a path's extension.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Colour treatment applied to the rectified scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Colorspace {
    /// Keep the original channels.
    #[default]
    Color,
    /// Single-channel luma.
    Grayscale,
    /// Adaptive-threshold black and white, like a fax or photocopy.
    BlackWhite,
}

/// Standard paper sizes, used to lay out PDF output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Tabloid,
    Custom { width_mm: u32, height_mm: u32 },
}

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A4 => (210, 297),
            Self::A3 => (297, 420),
            Self::A5 => (148, 210),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
            Self::Tabloid => (279, 432),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }

    /// Parse a paper name such as `a4` or `letter` (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "a4" => Some(Self::A4),
            "a3" => Some(Self::A3),
            "a5" => Some(Self::A5),
            "letter" => Some(Self::Letter),
            "legal" => Some(Self::Legal),
            "tabloid" => Some(Self::Tabloid),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn format_from_path_is_case_insensitive() {
        assert_eq!(OutputFormat::from_path(Path::new("scan.JPEG")), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_path(Path::new("out/page.pdf")), Some(OutputFormat::Pdf));
        assert_eq!(OutputFormat::from_path(Path::new("notes.txt")), None);
        assert_eq!(OutputFormat::from_path(Path::new("no_extension")), None);
    }

    #[test]
    fn mime_types_match_formats() {
        assert_eq!(OutputFormat::Png.mime_type(), "image/png");
        assert_eq!(OutputFormat::Pdf.mime_type(), "application/pdf");
    }

    #[test]
    fn colorspace_serializes_snake_case() {
        let json = serde_json::to_string(&Colorspace::BlackWhite).unwrap();
        assert_eq!(json, "\"black_white\"");
    }

    #[test]
    fn paper_names() {
        assert_eq!(PaperSize::from_name("Letter"), Some(PaperSize::Letter));
        assert_eq!(PaperSize::from_name("b5"), None);
        assert_eq!(PaperSize::A4.dimensions_mm(), (210, 297));
    }
}
