// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: loads settings once and runs the scan and upload
// workflows for the command line.
//
// The upload session is built on the first upload and kept for the rest of
// the process, so a batch of uploads shares one credential.

use std::path::{Path, PathBuf};

use flatscan_core::error::Result;
use flatscan_core::{AppConfig, OutputFormat};
use flatscan_document::{DocumentRectifier, FallbackReason, OrderedCorners, ScanEnhancer, ScanFilter};
use flatscan_upload::{DriveSession, RemoteObjectId};
use tracing::{info, warn};

use super::data_dir;

/// Per-invocation overrides of the persisted output settings.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub format: Option<OutputFormat>,
    pub filter: Option<ScanFilter>,
    pub paper_size: Option<flatscan_core::PaperSize>,
    /// Skip rectification and only filter and encode.
    pub skip_rectify: bool,
}

/// What a scan run produced.
#[derive(Debug)]
pub struct ScanOutcome {
    pub path: PathBuf,
    pub format: OutputFormat,
    /// Set when the page could not be flattened and the photo was kept.
    pub fallback: Option<FallbackReason>,
}

pub struct ScanServices {
    config: AppConfig,
    rectifier: DocumentRectifier,
    upload: Option<DriveSession>,
}

impl ScanServices {
    /// Load settings from `explicit`, else from the data directory if a
    /// settings file exists there, else defaults. Upload credentials always
    /// come from the environment.
    pub fn init(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => AppConfig::load(path)?,
            None => {
                let path = data_dir::config_path();
                if path.exists() {
                    AppConfig::load(&path)?
                } else {
                    AppConfig::default()
                }
            }
        };
        config.upload = config.upload.with_env();
        Self::with_config(config)
    }

    pub fn with_config(config: AppConfig) -> Result<Self> {
        let rectifier = DocumentRectifier::new(config.rectify.clone())?;
        info!(credentials = config.upload.credentials.kind(), "Scan services initialised");
        Ok(Self {
            rectifier,
            config,
            upload: None,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // -- Scanning ---------------------------------------------------------------

    /// Flatten, filter and encode the photo at `input` into `output`.
    pub fn scan(&self, input: &Path, output: &Path, options: &ScanOptions) -> Result<ScanOutcome> {
        let defaults = &self.config.output;
        let format = resolve_format(options.format, output, defaults.format);
        let filter = options.filter.unwrap_or_else(|| ScanFilter::from(defaults));
        let paper_size = options.paper_size.unwrap_or(defaults.paper_size);

        let mut enhancer = ScanEnhancer::open(input, paper_size)?;
        if !options.skip_rectify {
            enhancer = enhancer.rectify(&self.rectifier)?;
        }
        let fallback = enhancer.fallback_reason().cloned();
        if let Some(reason) = &fallback {
            warn!(%reason, "Page kept as photographed");
        }

        enhancer
            .apply(&filter)
            .save(output, format, defaults.jpeg_quality)?;
        Ok(ScanOutcome {
            path: output.to_path_buf(),
            format,
            fallback,
        })
    }

    /// Locate the page boundary without warping.
    pub fn detect(&self, input: &Path) -> Result<Option<OrderedCorners>> {
        let data = std::fs::read(input)?;
        let image = flatscan_document::ImageProcessor::from_bytes(&data)?.into_dynamic();
        self.rectifier.detect_corners(&image)
    }

    // -- Upload -----------------------------------------------------------------

    /// Upload a finished file, building the upload session on first use.
    pub async fn upload(
        &mut self,
        path: &Path,
        file_name: &str,
        mime_type: &str,
    ) -> Result<RemoteObjectId> {
        let session = match &mut self.upload {
            Some(session) => session,
            slot => slot.insert(DriveSession::from_config(&self.config.upload)?),
        };
        let id = session.upload_file(path, file_name, mime_type).await?;
        Ok(id)
    }
}

/// Explicit choice, else the output extension, else the configured default.
pub fn resolve_format(
    explicit: Option<OutputFormat>,
    output: &Path,
    default: OutputFormat,
) -> OutputFormat {
    explicit
        .or_else(|| OutputFormat::from_path(output))
        .unwrap_or(default)
}

/// `<stem>_scan.<ext>` next to `input`, for runs without an explicit output.
pub fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("page");
    input.with_file_name(format!("{stem}_scan.{}", format.extension()))
}

/// MIME type for an existing file, from its extension.
pub fn guess_mime(path: &Path) -> &'static str {
    OutputFormat::from_path(path)
        .map(|f| f.mime_type())
        .unwrap_or("application/octet-stream")
}

/// Remote name for `path`: its file name, or `fallback` if it has none.
pub fn remote_name(path: &Path, fallback: &str) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .unwrap_or_else(|| fallback.to_owned())
}
