// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// flatscan: flatten photographed pages into scans.
//
// Entry point. Initialises logging, loads settings, and dispatches the
// subcommand.

mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use flatscan_core::error::Result;
use flatscan_core::{Colorspace, OutputFormat, PaperSize};
use flatscan_document::ScanFilter;

use services::scan_services::{
    ScanOptions, ScanServices, default_output_path, guess_mime, remote_name,
};

/// Flatten photographed documents into head-on scans
#[derive(Parser, Debug)]
#[command(name = "flatscan", version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to the data directory's config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rectify a photo and write the finished scan
    Rectify(RectifyArgs),
    /// Print the detected page corners as JSON
    Detect {
        /// Input photo
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Upload an existing file
    Upload {
        /// File to upload
        #[arg(short, long)]
        file: PathBuf,
        /// Remote file name (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,
        /// MIME type (guessed from the extension if omitted)
        #[arg(long)]
        mime: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
struct RectifyArgs {
    /// Input photo
    #[arg(short, long)]
    input: PathBuf,

    /// Output file; the format follows its extension unless --format is given.
    /// Defaults to `<input>_scan.<ext>` beside the input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    #[arg(long, value_enum)]
    colorspace: Option<ColorspaceArg>,

    /// Brightness offset (-255..=255)
    #[arg(long, allow_hyphen_values = true, value_parser = clap::value_parser!(i32).range(-255..=255))]
    brightness: Option<i32>,

    /// Contrast factor (1.0 leaves contrast unchanged)
    #[arg(long)]
    contrast: Option<f32>,

    /// Blur sigma in pixels (0 disables)
    #[arg(long)]
    blur: Option<f32>,

    /// Grain strength, 0.0 to 1.0 (0 disables)
    #[arg(long, value_parser = parse_unit)]
    noise: Option<f32>,

    /// Warm, slightly yellowed paper tint
    #[arg(long)]
    yellowish: bool,

    /// Stretch each colour channel to the full range
    #[arg(long)]
    magic_color: bool,

    /// Paper size for PDF output (a4, a3, a5, letter, legal, tabloid)
    #[arg(long, value_parser = parse_paper)]
    paper: Option<PaperSize>,

    /// Keep the photo's geometry; only filter and encode
    #[arg(long)]
    no_rectify: bool,

    /// Upload the finished scan
    #[arg(long)]
    upload: bool,

    /// Remote file name for --upload
    #[arg(long, requires = "upload")]
    name: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Png,
    Jpeg,
    Pdf,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Jpeg => OutputFormat::Jpeg,
            FormatArg::Pdf => OutputFormat::Pdf,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorspaceArg {
    Color,
    Grayscale,
    BlackWhite,
}

impl From<ColorspaceArg> for Colorspace {
    fn from(arg: ColorspaceArg) -> Self {
        match arg {
            ColorspaceArg::Color => Colorspace::Color,
            ColorspaceArg::Grayscale => Colorspace::Grayscale,
            ColorspaceArg::BlackWhite => Colorspace::BlackWhite,
        }
    }
}

fn parse_paper(name: &str) -> std::result::Result<PaperSize, String> {
    PaperSize::from_name(name).ok_or_else(|| format!("unknown paper size `{name}`"))
}

fn parse_unit(value: &str) -> std::result::Result<f32, String> {
    let v: f32 = value.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(format!("{v} is not between 0 and 1"))
    }
}

impl RectifyArgs {
    /// The explicit output path, else one derived from the input and format.
    fn output_path(&self, services: &ScanServices) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let format = self
                .format
                .map_or(services.config().output.format, OutputFormat::from);
            default_output_path(&self.input, format)
        })
    }

    /// Merge command-line filter flags over the configured defaults.
    fn options(&self, services: &ScanServices) -> ScanOptions {
        let defaults = ScanFilter::from(&services.config().output);
        let overridden = self.colorspace.is_some()
            || self.brightness.is_some()
            || self.contrast.is_some()
            || self.blur.is_some()
            || self.noise.is_some()
            || self.yellowish
            || self.magic_color;
        let filter = overridden.then(|| ScanFilter {
            colorspace: self.colorspace.map_or(defaults.colorspace, Colorspace::from),
            brightness: self.brightness.unwrap_or(defaults.brightness),
            contrast: self.contrast.unwrap_or(defaults.contrast),
            blur: self.blur.unwrap_or(defaults.blur),
            noise: self.noise.unwrap_or(defaults.noise),
            yellowish: self.yellowish || defaults.yellowish,
            magic_color: self.magic_color || defaults.magic_color,
        });
        ScanOptions {
            format: self.format.map(OutputFormat::from),
            filter,
            paper_size: self.paper,
            skip_rectify: self.no_rectify,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "flatscan failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut services = ScanServices::init(cli.config.as_deref())?;

    match cli.command {
        Command::Rectify(args) => {
            let output = args.output_path(&services);
            let outcome = services.scan(&args.input, &output, &args.options(&services))?;
            match &outcome.fallback {
                Some(reason) => println!(
                    "{} written unrectified ({reason})",
                    outcome.path.display()
                ),
                None => println!("{} written", outcome.path.display()),
            }

            if args.upload {
                let name = args
                    .name
                    .unwrap_or_else(|| remote_name(&outcome.path, "scan"));
                let id = services
                    .upload(&outcome.path, &name, outcome.format.mime_type())
                    .await?;
                println!("uploaded as {id}");
            }
        }
        Command::Detect { input } => {
            match services.detect(&input)? {
                Some(corners) => println!("{}", serde_json::to_string_pretty(&corners)?),
                None => println!("no document boundary found"),
            }
        }
        Command::Upload { file, name, mime } => {
            let name = name.unwrap_or_else(|| remote_name(&file, "upload"));
            let mime = mime.unwrap_or_else(|| guess_mime(&file).to_string());
            let id = services.upload(&file, &name, &mime).await?;
            println!("{id}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use flatscan_core::AppConfig;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn rectify_flags_parse() {
        let cli = Cli::try_parse_from([
            "flatscan", "rectify", "-i", "in.jpg", "-o", "out.pdf",
            "--colorspace", "black-white", "--brightness", "-20", "--paper", "letter",
        ])
        .unwrap();
        let Command::Rectify(args) = cli.command else {
            panic!("expected rectify");
        };
        let services = ScanServices::with_config(AppConfig::default()).unwrap();
        let options = args.options(&services);

        let filter = options.filter.unwrap();
        assert_eq!(filter.colorspace, Colorspace::BlackWhite);
        assert_eq!(filter.brightness, -20);
        assert_eq!(filter.contrast, 1.0);
        assert_eq!(filter.blur, 0.5);
        assert!(!filter.yellowish);
        assert_eq!(options.paper_size, Some(PaperSize::Letter));
        assert_eq!(options.format, None);
    }

    #[test]
    fn scanner_effect_flags_parse() {
        let cli = Cli::try_parse_from([
            "flatscan", "rectify", "-i", "in.jpg", "--blur", "0", "--noise", "0.6",
            "--yellowish", "--magic-color",
        ])
        .unwrap();
        let Command::Rectify(args) = cli.command else {
            panic!("expected rectify");
        };
        let services = ScanServices::with_config(AppConfig::default()).unwrap();
        let filter = args.options(&services).filter.unwrap();
        assert_eq!(filter.blur, 0.0);
        assert_eq!(filter.noise, 0.6);
        assert!(filter.yellowish && filter.magic_color);
        assert_eq!(filter.colorspace, Colorspace::Color);
    }

    #[test]
    fn noise_outside_unit_range_is_rejected() {
        assert!(Cli::try_parse_from(["flatscan", "rectify", "-i", "a.png", "--noise", "1.5"]).is_err());
    }

    #[test]
    fn filter_defaults_come_from_config() {
        let cli = Cli::try_parse_from(["flatscan", "rectify", "-i", "a.png", "-o", "b.png"]).unwrap();
        let Command::Rectify(args) = cli.command else {
            panic!("expected rectify");
        };
        let options = args.options(&ScanServices::with_config(AppConfig::default()).unwrap());
        assert!(options.filter.is_none());
    }

    #[test]
    fn output_defaults_beside_input() {
        let services = ScanServices::with_config(AppConfig::default()).unwrap();
        let cli = Cli::try_parse_from(["flatscan", "rectify", "-i", "shots/a.jpg", "-f", "pdf"]).unwrap();
        let Command::Rectify(args) = cli.command else {
            panic!("expected rectify");
        };
        assert_eq!(args.output_path(&services), PathBuf::from("shots/a_scan.pdf"));

        let cli = Cli::try_parse_from(["flatscan", "rectify", "-i", "a.jpg"]).unwrap();
        let Command::Rectify(args) = cli.command else {
            panic!("expected rectify");
        };
        assert_eq!(args.output_path(&services), PathBuf::from("a_scan.png"));
    }

    #[test]
    fn name_requires_upload() {
        assert!(Cli::try_parse_from([
            "flatscan", "rectify", "-i", "a.png", "-o", "b.png", "--name", "x"
        ])
        .is_err());
    }

    #[test]
    fn unknown_paper_is_rejected() {
        assert!(Cli::try_parse_from([
            "flatscan", "rectify", "-i", "a.png", "-o", "b.png", "--paper", "b5"
        ])
        .is_err());
    }
}
