// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan finishing: rectification, the scanner look (level stretch,
// brightness/contrast, warm tint, blur, grain), colour treatment (colour,
// grayscale, adaptive black and white) and export to PNG, JPEG or a
// single-page PDF.

use std::path::Path;

use flatscan_core::config::OutputConfig;
use flatscan_core::error::FlatscanError;
use flatscan_core::{Colorspace, OutputFormat, PaperSize};
use image::{DynamicImage, GrayImage, Luma};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::rectifier::{DocumentRectifier, FallbackReason, Rectification};
use crate::image::processor::ImageProcessor;
use crate::pdf::writer::PdfWriter;

/// Neighbourhood radius for adaptive binarization.
const BINARIZE_BLOCK_RADIUS: u32 = 15;
/// Offset subtracted from the local mean before thresholding.
const BINARIZE_OFFSET: i32 = 10;
/// Grain amplitude in levels at `noise = 1.0`.
const NOISE_FULL_SCALE: f32 = 24.0;
/// Seed for the grain pattern, so a page always gets the same grain.
const NOISE_SEED: u64 = 0x5CA7;
/// Fraction of pixels saturated at each end by the magic colour stretch.
const MAGIC_COLOR_CLIP: f64 = 0.01;

/// User-facing filters applied after rectification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanFilter {
    pub colorspace: Colorspace,
    /// Brightness offset (-255..=255).
    pub brightness: i32,
    /// Contrast factor around mid-grey.
    pub contrast: f32,
    /// Gaussian blur sigma in pixels (0 disables).
    pub blur: f32,
    /// Grain strength, 0.0–1.0 (0 disables).
    pub noise: f32,
    /// Warm paper tint.
    pub yellowish: bool,
    /// Per-channel level stretch.
    pub magic_color: bool,
}

impl ScanFilter {
    /// A filter that leaves the image exactly as it is.
    pub const NONE: Self = Self {
        colorspace: Colorspace::Color,
        brightness: 0,
        contrast: 1.0,
        blur: 0.0,
        noise: 0.0,
        yellowish: false,
        magic_color: false,
    };
}

/// The default scanner look: a light blur and faint grain.
impl Default for ScanFilter {
    fn default() -> Self {
        Self::from(&OutputConfig::default())
    }
}

impl From<&OutputConfig> for ScanFilter {
    fn from(config: &OutputConfig) -> Self {
        Self {
            colorspace: config.colorspace,
            brightness: config.brightness,
            contrast: config.contrast,
            blur: config.blur,
            noise: config.noise,
            yellowish: config.yellowish,
            magic_color: config.magic_color,
        }
    }
}

/// Turns a photographed page into a finished scan.
///
/// ```ignore
/// let pdf = ScanEnhancer::open("receipt.jpg", PaperSize::A4)?
///     .rectify(&DocumentRectifier::default())?
///     .apply(&ScanFilter { colorspace: Colorspace::BlackWhite, ..Default::default() })
///     .encode(OutputFormat::Pdf, 90)?;
/// ```
pub struct ScanEnhancer {
    /// The working image.
    image: DynamicImage,
    /// Target paper size for PDF output.
    paper_size: PaperSize,
    /// Set when rectification ran and returned the input unchanged.
    fallback: Option<FallbackReason>,
}

impl ScanEnhancer {
    // -- Construction ---------------------------------------------------------

    /// Create an enhancer from raw image bytes (JPEG, PNG, TIFF, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8], paper_size: PaperSize) -> Result<Self, FlatscanError> {
        let image = ImageProcessor::from_bytes(data)?.into_dynamic();
        info!(width = image.width(), height = image.height(), "Scan image loaded");
        Ok(Self::from_dynamic(image, paper_size))
    }

    /// Create an enhancer from a file path.
    pub fn open(path: impl AsRef<Path>, paper_size: PaperSize) -> Result<Self, FlatscanError> {
        let image = ImageProcessor::open(path)?.into_dynamic();
        Ok(Self::from_dynamic(image, paper_size))
    }

    /// Create an enhancer wrapping an existing `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage, paper_size: PaperSize) -> Self {
        Self {
            image,
            paper_size,
            fallback: None,
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Why rectification left the image as it was, if it did.
    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        self.fallback.as_ref()
    }

    // -- Pipeline -------------------------------------------------------------

    /// Flatten the page with `rectifier`. A missing or unusable boundary is
    /// not an error; the image is kept and the reason recorded.
    pub fn rectify(self, rectifier: &DocumentRectifier) -> Result<Self, FlatscanError> {
        let paper_size = self.paper_size;
        let (image, fallback) = match rectifier.rectify(self.image)? {
            Rectification::Rectified { image, .. } => (image, None),
            Rectification::Unchanged { image, reason } => (image, Some(reason)),
        };
        Ok(Self {
            image,
            paper_size,
            fallback,
        })
    }

    /// Apply the filter in a fixed order: level stretch, brightness,
    /// contrast, warm tint, blur, grain, then the colour treatment.
    #[instrument(skip(self))]
    pub fn apply(self, filter: &ScanFilter) -> Self {
        let Self {
            image,
            paper_size,
            fallback,
        } = self;

        let mut processor = ImageProcessor::from_dynamic(image);
        if filter.magic_color {
            processor = processor.stretch_levels(MAGIC_COLOR_CLIP);
        }
        processor = processor
            .adjust_brightness(filter.brightness)
            .adjust_contrast(filter.contrast);
        if filter.yellowish {
            processor = processor.warm_tint();
        }
        processor = processor
            .gaussian_blur(filter.blur)
            .add_noise(filter.noise.clamp(0.0, 1.0) * NOISE_FULL_SCALE, NOISE_SEED);
        if filter.colorspace == Colorspace::Grayscale {
            processor = processor.grayscale();
        }

        let adjusted = Self {
            image: processor.into_dynamic(),
            paper_size,
            fallback,
        };
        match filter.colorspace {
            Colorspace::BlackWhite => adjusted.binarize(BINARIZE_BLOCK_RADIUS, BINARIZE_OFFSET),
            Colorspace::Color | Colorspace::Grayscale => adjusted,
        }
    }

    /// Apply adaptive thresholding to produce a black-and-white image.
    ///
    /// For each pixel, the threshold is the mean intensity within a
    /// `block_radius` neighbourhood, minus a constant `c`. Pixels darker than
    /// the local threshold become black; others become white.
    #[instrument(skip(self))]
    pub fn binarize(self, block_radius: u32, c: i32) -> Self {
        info!(block_radius, c, "Applying adaptive binarization");

        let gray = self.image.to_luma8();
        let (width, height) = gray.dimensions();
        let integral = compute_integral_image(&gray);

        let output = GrayImage::from_fn(width, height, |x, y| {
            let local_mean = region_mean(&integral, width, height, x, y, block_radius);
            let threshold = (local_mean as i32 - c).clamp(0, 255) as u8;
            let value = gray.get_pixel(x, y).0[0];
            Luma([if value < threshold { 0u8 } else { 255u8 }])
        });

        debug!("Binarization complete");
        Self {
            image: DynamicImage::ImageLuma8(output),
            ..self
        }
    }

    // -- Export ---------------------------------------------------------------

    /// Encode the finished scan.
    #[instrument(skip(self))]
    pub fn encode(&self, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>, FlatscanError> {
        let bytes = match format {
            OutputFormat::Pdf => {
                let mut writer = PdfWriter::new(self.paper_size);
                writer.set_title("Flatscan Scan");
                writer.create_from_image(&self.image)?
            }
            raster => ImageProcessor::from_dynamic(self.image.clone()).encode(raster, jpeg_quality)?,
        };
        debug!(bytes = bytes.len(), "Scan encoded");
        Ok(bytes)
    }

    /// Encode and write the scan to `path`.
    pub fn save(
        &self,
        path: impl AsRef<Path>,
        format: OutputFormat,
        jpeg_quality: u8,
    ) -> Result<(), FlatscanError> {
        let bytes = self.encode(format, jpeg_quality)?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!(path = %path.as_ref().display(), ?format, "Scan written");
        Ok(())
    }
}

// -- Integral image helpers ---------------------------------------------------

/// Summed-area table of a grayscale image.
///
/// `integral[y * (width+1) + x]` holds the sum of all pixels in `[0, x) x
/// [0, y)`. The table is `(width+1) x (height+1)` with a zero border.
fn compute_integral_image(gray: &GrayImage) -> Vec<u64> {
    let (w, h) = gray.dimensions();
    let stride = (w + 1) as usize;
    let mut table = vec![0u64; stride * (h + 1) as usize];

    for y in 0..h {
        let mut row_sum: u64 = 0;
        for x in 0..w {
            row_sum += u64::from(gray.get_pixel(x, y).0[0]);
            let idx = (y + 1) as usize * stride + (x + 1) as usize;
            let above = y as usize * stride + (x + 1) as usize;
            table[idx] = row_sum + table[above];
        }
    }

    table
}

/// Mean over the square of `radius` around (cx, cy), clipped to the image.
fn region_mean(
    integral: &[u64],
    img_width: u32,
    img_height: u32,
    cx: u32,
    cy: u32,
    radius: u32,
) -> f64 {
    let stride = (img_width + 1) as usize;

    let x1 = cx.saturating_sub(radius) as usize;
    let y1 = cy.saturating_sub(radius) as usize;
    let x2 = (cx.saturating_add(radius).saturating_add(1) as usize).min(img_width as usize);
    let y2 = (cy.saturating_add(radius).saturating_add(1) as usize).min(img_height as usize);

    let area = ((x2 - x1) * (y2 - y1)) as f64;
    if area == 0.0 {
        return 128.0;
    }

    let sum = integral[y2 * stride + x2] as f64 - integral[y1 * stride + x2] as f64
        - integral[y2 * stride + x1] as f64
        + integral[y1 * stride + x1] as f64;

    sum / area
}

// -- Tests --------------------------------------------------------------------
