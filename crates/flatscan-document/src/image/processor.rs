// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decode, grayscale, brightness/contrast adjustment, the
// scanner-look effects (blur, grain, warm tint, level stretch) and raster
// encoding. Operates on in-memory images using the `image` crate.

use std::path::Path;

use flatscan_core::OutputFormat;
use flatscan_core::error::FlatscanError;
use image::{DynamicImage, ImageFormat, Rgba};
use imageproc::filter::gaussian_blur_f32;
use rand::prelude::*;
use tracing::{debug, info, instrument};

/// Per-channel offset of the warm paper tint (r, g, b).
const WARM_TINT: [i16; 3] = [12, 6, -22];

/// Raster processing on a single in-memory image.
///
/// Each method consumes `self` and returns a new `ImageProcessor` wrapping
/// the transformed image, enabling method chaining.
///
/// ```ignore
/// let png = ImageProcessor::open("page.jpg")?
///     .grayscale()
///     .adjust_contrast(1.3)
///     .to_png_bytes()?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FlatscanError> {
        let img = image::open(path.as_ref()).map_err(|err| {
            FlatscanError::Decode(format!("failed to open {}: {}", path.as_ref().display(), err))
        })?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Create a processor from raw encoded bytes (JPEG, PNG, TIFF, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, FlatscanError> {
        let img = image::load_from_memory(data)
            .map_err(|err| FlatscanError::Decode(err.to_string()))?;
        debug!(width = img.width(), height = img.height(), "Image decoded from bytes");
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Adjustments (consume self, return new Self) --------------------------

    /// Convert the image to grayscale (luma), keeping alpha if present.
    #[instrument(skip(self))]
    pub fn grayscale(self) -> Self {
        info!("Converting to grayscale");
        Self {
            image: self.image.grayscale(),
        }
    }

    /// Adjust brightness by `value` (-255..=255).
    ///
    /// Positive values brighten, negative values darken. Zero leaves the
    /// image (and its pixel format) untouched.
    #[instrument(skip(self), fields(value))]
    pub fn adjust_brightness(self, value: i32) -> Self {
        let clamped = value.clamp(-255, 255);
        if clamped == 0 {
            return self;
        }
        info!(clamped, "Adjusting brightness");
        self.map_rgb_channels(|channel| (i32::from(channel) + clamped).clamp(0, 255) as u8)
    }

    /// Adjust contrast by a factor around mid-grey. Values > 1.0 increase
    /// contrast; 1.0 is a no-op.
    #[instrument(skip(self), fields(factor))]
    pub fn adjust_contrast(self, factor: f32) -> Self {
        if (factor - 1.0).abs() < f32::EPSILON {
            return self;
        }
        info!(factor, "Adjusting contrast");
        self.map_rgb_channels(|channel| {
            (factor * (f32::from(channel) - 128.0) + 128.0).clamp(0.0, 255.0) as u8
        })
    }

    // -- Scanner effects ------------------------------------------------------

    /// Gaussian blur with standard deviation `sigma` (pixels). A sigma that
    /// is not a positive finite number leaves the image untouched.
    #[instrument(skip(self), fields(sigma))]
    pub fn gaussian_blur(self, sigma: f32) -> Self {
        if !sigma.is_finite() || sigma <= 0.0 {
            return self;
        }
        debug!(sigma, "Blurring");
        let image = match self.image {
            DynamicImage::ImageLuma8(buf) => DynamicImage::ImageLuma8(gaussian_blur_f32(&buf, sigma)),
            DynamicImage::ImageLumaA8(buf) => {
                DynamicImage::ImageLumaA8(gaussian_blur_f32(&buf, sigma))
            }
            DynamicImage::ImageRgb8(buf) => DynamicImage::ImageRgb8(gaussian_blur_f32(&buf, sigma)),
            other => DynamicImage::ImageRgba8(gaussian_blur_f32(&other.to_rgba8(), sigma)),
        };
        Self { image }
    }

    /// Add uniform grain of up to `amplitude` levels. Every colour channel
    /// of a pixel moves by the same amount, so gray stays gray. The same
    /// `seed` always yields the same grain.
    #[instrument(skip(self), fields(amplitude, seed))]
    pub fn add_noise(self, amplitude: f32, seed: u64) -> Self {
        if !amplitude.is_finite() || amplitude <= 0.0 {
            return self;
        }
        debug!(amplitude, "Adding grain");
        let mut rng = StdRng::seed_from_u64(seed);
        self.map_rgb_pixels(|rgb| {
            let offset = rng.gen_range(-amplitude..=amplitude);
            rgb.map(|c| (f32::from(c) + offset).round().clamp(0.0, 255.0) as u8)
        })
    }

    /// Shift colours towards warm, slightly yellowed paper. Grayscale input
    /// is promoted to colour.
    #[instrument(skip(self))]
    pub fn warm_tint(self) -> Self {
        debug!("Applying warm tint");
        let image = match self.image {
            gray @ DynamicImage::ImageLuma8(_) => DynamicImage::ImageRgb8(gray.to_rgb8()),
            gray @ DynamicImage::ImageLumaA8(_) => DynamicImage::ImageRgba8(gray.to_rgba8()),
            other => other,
        };
        Self { image }.map_rgb_pixels(|[r, g, b]| {
            let shift = |c: u8, by: i16| (i16::from(c) + by).clamp(0, 255) as u8;
            [shift(r, WARM_TINT[0]), shift(g, WARM_TINT[1]), shift(b, WARM_TINT[2])]
        })
    }

    /// Stretch each colour channel so that its darkest and brightest `clip`
    /// fraction of pixels saturate to 0 and 255. Washed-out photos regain
    /// white paper and black ink; a flat channel is left alone.
    #[instrument(skip(self), fields(clip))]
    pub fn stretch_levels(self, clip: f64) -> Self {
        let rgba = self.image.to_rgba8();
        let total = u64::from(rgba.width()) * u64::from(rgba.height());
        if total == 0 {
            return self;
        }

        let mut histograms = [[0u64; 256]; 3];
        for pixel in rgba.pixels() {
            for (histogram, &value) in histograms.iter_mut().zip(&pixel.0[..3]) {
                histogram[usize::from(value)] += 1;
            }
        }
        let clip_count = (total as f64 * clip.clamp(0.0, 0.49)) as u64;
        let tables = histograms.map(|histogram| {
            let (low, high) = channel_bounds(&histogram, clip_count);
            stretch_table(low, high)
        });
        debug!(clip_count, "Stretching channel levels");

        self.map_rgb_pixels(|[r, g, b]| {
            [
                tables[0][usize::from(r)],
                tables[1][usize::from(g)],
                tables[2][usize::from(b)],
            ]
        })
    }

    /// Apply `adjust` to every colour channel, preserving alpha. Grayscale
    /// input stays grayscale.
    fn map_rgb_channels(self, adjust: impl Fn(u8) -> u8) -> Self {
        self.map_rgb_pixels(|rgb| rgb.map(&adjust))
    }

    /// Apply `adjust` to every pixel's colour channels in row-major order,
    /// preserving alpha and the original pixel layout.
    fn map_rgb_pixels(self, mut adjust: impl FnMut([u8; 3]) -> [u8; 3]) -> Self {
        let mut rgba = self.image.to_rgba8();
        for pixel in rgba.pixels_mut() {
            let Rgba([r, g, b, a]) = *pixel;
            let [r, g, b] = adjust([r, g, b]);
            *pixel = Rgba([r, g, b, a]);
        }
        let adjusted = DynamicImage::ImageRgba8(rgba);
        let image = match self.image {
            DynamicImage::ImageLuma8(_) => DynamicImage::ImageLuma8(adjusted.to_luma8()),
            DynamicImage::ImageLumaA8(_) => DynamicImage::ImageLumaA8(adjusted.to_luma_alpha8()),
            DynamicImage::ImageRgb8(_) => DynamicImage::ImageRgb8(adjusted.to_rgb8()),
            _ => adjusted,
        };
        Self { image }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode as PNG or JPEG. PDF output goes through `PdfWriter`.
    pub fn encode(&self, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>, FlatscanError> {
        match format {
            OutputFormat::Png => self.to_png_bytes(),
            OutputFormat::Jpeg => self.to_jpeg_bytes(jpeg_quality),
            OutputFormat::Pdf => Err(FlatscanError::ImageError(
                "PDF is not a raster format; use PdfWriter".into(),
            )),
        }
    }

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, FlatscanError> {
        encode_to_format(&self.image, ImageFormat::Png)
    }

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>, FlatscanError> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        rgb.write_with_encoder(encoder)
            .map_err(|err| FlatscanError::ImageError(format!("JPEG encoding failed: {}", err)))?;
        Ok(buffer)
    }

    /// Write the image to a file. The format is inferred from the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FlatscanError> {
        self.image.save(path.as_ref()).map_err(|err| {
            FlatscanError::ImageError(format!(
                "failed to save image to {}: {}",
                path.as_ref().display(),
                err
            ))
        })
    }
}

/// Darkest and brightest levels once `clip` pixels are discarded at each end.
fn channel_bounds(histogram: &[u64; 256], clip: u64) -> (u8, u8) {
    let low = first_level_past(histogram.iter().enumerate(), clip).unwrap_or(0);
    let high = first_level_past(histogram.iter().enumerate().rev(), clip).unwrap_or(255);
    (low, high)
}

/// First level at which the running pixel count exceeds `clip`.
fn first_level_past<'a>(
    mut levels: impl Iterator<Item = (usize, &'a u64)>,
    clip: u64,
) -> Option<u8> {
    let mut seen = 0u64;
    levels
        .find(|&(_, &count)| {
            seen += count;
            seen > clip
        })
        .map(|(level, _)| level as u8)
}

/// Lookup table mapping `low..=high` linearly onto `0..=255`.
fn stretch_table(low: u8, high: u8) -> [u8; 256] {
    if high <= low {
        return std::array::from_fn(|level| level as u8);
    }
    let scale = 255.0 / f32::from(high - low);
    std::array::from_fn(|level| {
        ((level as f32 - f32::from(low)) * scale).round().clamp(0.0, 255.0) as u8
    })
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, FlatscanError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| FlatscanError::ImageError(format!("image encoding failed: {}", err)))?;
    Ok(buffer)
}
