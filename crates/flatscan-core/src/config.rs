// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.
//
// Settings are persisted as JSON. Upload credentials are never written to
// disk: they are read from the environment on every start.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FlatscanError, Result};
use crate::types::{Colorspace, OutputFormat, PaperSize};

/// Persistent application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Tuning for the perspective rectification pipeline.
    pub rectify: RectifyConfig,
    /// Filters and encoding applied to the finished scan.
    pub output: OutputConfig,
    /// Remote upload destination and transport settings.
    pub upload: UploadConfig,
}

impl AppConfig {
    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.rectify.validate()?;
        Ok(config)
    }

    /// Write settings to a JSON file (pretty-printed).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

/// Parameters of the edge → contour → quadrilateral → warp pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyConfig {
    /// Gaussian sigma for the pre-edge smoothing pass (≈ a 5x5 kernel).
    pub blur_sigma: f32,
    /// Canny hysteresis low threshold (0–255 intensity scale).
    pub canny_low: f32,
    /// Canny hysteresis high threshold (0–255 intensity scale).
    pub canny_high: f32,
    /// Douglas–Peucker tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_ratio: f64,
    /// Ignore quadrilaterals smaller than this fraction of the image area.
    /// `0.0` accepts any size.
    pub min_area_ratio: f64,
    /// RGBA fill for destination pixels that map outside the source.
    pub background: [u8; 4],
}

impl Default for RectifyConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            canny_low: 75.0,
            canny_high: 200.0,
            approx_epsilon_ratio: 0.02,
            min_area_ratio: 0.0,
            background: [255, 255, 255, 255],
        }
    }
}

impl RectifyConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.blur_sigma.is_finite() || self.blur_sigma <= 0.0 {
            return Err(FlatscanError::Config(format!(
                "blur_sigma must be positive, got {}",
                self.blur_sigma
            )));
        }
        if self.canny_low < 0.0 || self.canny_low > self.canny_high {
            return Err(FlatscanError::Config(format!(
                "canny thresholds must satisfy 0 <= low <= high, got {}/{}",
                self.canny_low, self.canny_high
            )));
        }
        if !(0.0..1.0).contains(&self.approx_epsilon_ratio) || self.approx_epsilon_ratio == 0.0 {
            return Err(FlatscanError::Config(format!(
                "approx_epsilon_ratio must be in (0, 1), got {}",
                self.approx_epsilon_ratio
            )));
        }
        if !(0.0..1.0).contains(&self.min_area_ratio) {
            return Err(FlatscanError::Config(format!(
                "min_area_ratio must be in [0, 1), got {}",
                self.min_area_ratio
            )));
        }
        Ok(())
    }
}

/// Filters and encoding for the finished scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format when it cannot be inferred from the file name.
    pub format: OutputFormat,
    pub colorspace: Colorspace,
    /// Brightness offset (-255..=255). 0 leaves the image unchanged.
    pub brightness: i32,
    /// Contrast factor. 1.0 leaves the image unchanged.
    pub contrast: f32,
    /// Gaussian blur sigma in pixels, softening the scan like a flatbed
    /// sensor. 0 disables it.
    pub blur: f32,
    /// Grain strength (0.0–1.0). 0 disables it.
    pub noise: f32,
    /// Warm, slightly yellowed paper tint.
    pub yellowish: bool,
    /// Stretch each channel to the full range before the other filters.
    pub magic_color: bool,
    /// JPEG quality (1–100).
    pub jpeg_quality: u8,
    /// Page size for PDF output.
    pub paper_size: PaperSize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            colorspace: Colorspace::Color,
            brightness: 0,
            contrast: 1.0,
            blur: 0.5,
            noise: 0.2,
            yellowish: false,
            magic_color: false,
            jpeg_quality: 90,
            paper_size: PaperSize::A4,
        }
    }
}

/// Environment variable holding a service-account key as JSON.
pub const ENV_SERVICE_ACCOUNT_JSON: &str = "GOOGLE_SERVICE_ACCOUNT_JSON";
/// Environment variable overriding the destination folder.
pub const ENV_TARGET_FOLDER_ID: &str = "GOOGLE_DRIVE_TARGET_FOLDER_ID";
/// OAuth client id for the installed-app and refresh-token flows.
pub const ENV_OAUTH_CLIENT_ID: &str = "GOOGLE_OAUTH_CLIENT_ID";
/// OAuth client secret for the installed-app and refresh-token flows.
pub const ENV_OAUTH_CLIENT_SECRET: &str = "GOOGLE_OAUTH_CLIENT_SECRET";
/// Long-lived refresh token.
pub const ENV_OAUTH_REFRESH_TOKEN: &str = "GOOGLE_OAUTH_REFRESH_TOKEN";

/// Remote upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Application name sent as the HTTP user agent.
    pub application_name: String,
    /// Destination folder id. `None` uploads into the account's root.
    pub folder_id: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Loopback port for the interactive OAuth redirect (0 = any free port).
    pub redirect_port: u16,
    /// Credentials, resolved from the environment and never persisted.
    #[serde(skip)]
    pub credentials: CredentialConfig,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            application_name: "flatscan".into(),
            folder_id: None,
            timeout_secs: 120,
            redirect_port: 0,
            credentials: CredentialConfig::None,
        }
    }
}

impl UploadConfig {
    /// Overlay folder and credentials from the process environment.
    pub fn with_env(self) -> Self {
        self.with_env_lookup(|key| std::env::var(key).ok())
    }

    /// Overlay folder and credentials from an arbitrary lookup.
    ///
    /// Selection order: a refresh token wins, then a service-account key,
    /// then a bare client id (interactive flow). Empty values count as unset.
    pub fn with_env_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(folder) = get(ENV_TARGET_FOLDER_ID) {
            self.folder_id = Some(folder);
        }

        let client_id = get(ENV_OAUTH_CLIENT_ID);
        let client_secret = get(ENV_OAUTH_CLIENT_SECRET);

        self.credentials = match (client_id, get(ENV_OAUTH_REFRESH_TOKEN)) {
            (Some(client_id), Some(refresh_token)) => CredentialConfig::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            },
            (client_id, _) => match (get(ENV_SERVICE_ACCOUNT_JSON), client_id) {
                (Some(key_json), _) => CredentialConfig::ServiceAccountKey { key_json },
                (None, Some(client_id)) => CredentialConfig::InteractiveOAuth {
                    client_id,
                    client_secret,
                },
                (None, None) => CredentialConfig::None,
            },
        };
        self
    }
}

/// Which authentication strategy the upload collaborator should use.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum CredentialConfig {
    /// Nothing configured; uploads fail with missing credentials.
    #[default]
    None,
    /// Service-account key file contents (JSON).
    ServiceAccountKey { key_json: String },
    /// Installed-app authorization-code flow in the user's browser.
    InteractiveOAuth {
        client_id: String,
        client_secret: Option<String>,
    },
    /// Refresh-token grant.
    RefreshToken {
        client_id: String,
        client_secret: Option<String>,
        refresh_token: String,
    },
}

impl CredentialConfig {
    /// Short name of the selected strategy, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ServiceAccountKey { .. } => "service_account_key",
            Self::InteractiveOAuth { .. } => "interactive_oauth",
            Self::RefreshToken { .. } => "refresh_token",
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InteractiveOAuth { client_id, .. } | Self::RefreshToken { client_id, .. } => f
                .debug_struct(self.kind())
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            _ => f.write_str(self.kind()),
        }
    }
}
