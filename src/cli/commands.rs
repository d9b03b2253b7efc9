//! Command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::adapters::toml_config::FileConfig;
use crate::app::{AppContainer, DefaultAppContainer, TrackPipeline};
use crate::cli::args::{ConvertArgs, EncodeOptions, ExtractArgs, InspectArgs};
use crate::cli::progress::IndicatifProgress;
use crate::cli::{Cli, Commands};
use crate::config_initialization::{build_run_config, ConfigOverrides};
use crate::cue::CueSheetParser;
use crate::domain::errors::FailureKind;
use crate::domain::model::PcmFormat;
use crate::engine::{ImageReport, ProgressObserver, TracingProgress, TrackOutcome};
use crate::planner::{BoundaryConverter, CatalogPlan};
use crate::utils::format_file_size;
use crate::utils::time::format_elapsed;

/// An image that could not be processed at all
#[derive(Debug, Serialize)]
struct FailedSource {
    source: PathBuf,
    kind: FailureKind,
    message: String,
}

/// Everything one `extract` or `convert` run produced
#[derive(Debug, Default, Serialize)]
struct RunSummary {
    reports: Vec<ImageReport>,
    failed_sources: Vec<FailedSource>,
}

impl RunSummary {
    fn has_failures(&self) -> bool {
        !self.failed_sources.is_empty() || self.reports.iter().any(ImageReport::has_failures)
    }
}

/// Run the parsed command; `Ok(false)` means some track or image failed
pub async fn run(cli: Cli, file: &FileConfig) -> Result<bool> {
    match &cli.command {
        Commands::Extract(args) => extract(&cli, args, file).await,
        Commands::Convert(args) => convert(&cli, args, file).await,
        Commands::Inspect(args) => inspect(args, file).map(|()| true),
    }
}

fn overrides(cli: &Cli, encode: &EncodeOptions) -> ConfigOverrides {
    ConfigOverrides {
        format: encode.format.clone(),
        quality: encode.quality.clone(),
        dest_dir: encode.dest_dir.clone(),
        preserve: encode.preserve,
        ffmpeg: cli.ffmpeg.clone(),
        qaac: cli.qaac.clone(),
        ..ConfigOverrides::default()
    }
}

/// Execute the extract command
pub async fn extract(cli: &Cli, args: &ExtractArgs, file: &FileConfig) -> Result<bool> {
    let overrides = ConfigOverrides {
        extra_metadata: args.metadata.clone(),
        cue: args.cue.clone(),
        track_list: args.track_list.clone(),
        strategy: args.strategy.clone(),
        ..overrides(cli, &args.encode)
    };
    let config = build_run_config(&overrides, file).context("Invalid extract options")?;

    if config.cue_override.is_some() && args.sources.len() > 1 {
        warn!("--cue applies to every source image");
    }

    let container = DefaultAppContainer::new(config);
    let pipeline = container.track_pipeline();
    let progress = if args.encode.json { None } else { Some(IndicatifProgress::new()) };
    let tracing_progress = TracingProgress::new();
    let observer: &dyn ProgressObserver = match &progress {
        Some(bar) => bar,
        None => &tracing_progress,
    };

    let mut summary = RunSummary::default();
    for source in &args.sources {
        let images = match TrackPipeline::collect_images(source) {
            Ok(images) => images,
            Err(e) => {
                warn!(source = %source.display(), error = %e, "Directory could not be read");
                summary.failed_sources.push(FailedSource {
                    source: source.clone(),
                    kind: FailureKind::Filesystem,
                    message: e.to_string(),
                });
                continue;
            }
        };

        for image in images {
            info!(source = %image.display(), "Starting extraction");
            match pipeline.extract(&image, observer).await {
                Ok(report) => summary.reports.push(report),
                Err(e) => summary.failed_sources.push(FailedSource {
                    source: image,
                    kind: e.kind(),
                    message: e.to_string(),
                }),
            }
        }
    }

    if let Some(bar) = &progress {
        bar.finish();
    }
    print_summary(&summary, args.encode.json)?;
    Ok(!summary.has_failures())
}

/// Execute the convert command
pub async fn convert(cli: &Cli, args: &ConvertArgs, file: &FileConfig) -> Result<bool> {
    let config = build_run_config(&overrides(cli, &args.encode), file)
        .context("Invalid convert options")?;

    let container = DefaultAppContainer::new(config);
    let interactor = container.convert_interactor();
    let progress = if args.encode.json { None } else { Some(IndicatifProgress::new()) };
    let tracing_progress = TracingProgress::new();
    let observer: &dyn ProgressObserver = match &progress {
        Some(bar) => bar,
        None => &tracing_progress,
    };

    let mut summary = RunSummary::default();
    for dir in &args.dirs {
        match interactor.convert(dir, observer).await {
            Ok(report) => summary.reports.push(report),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Directory could not be read");
                summary.failed_sources.push(FailedSource {
                    source: dir.clone(),
                    kind: FailureKind::Filesystem,
                    message: e.to_string(),
                });
            }
        }
    }

    if let Some(bar) = &progress {
        bar.finish();
    }
    print_summary(&summary, args.encode.json)?;
    Ok(!summary.has_failures())
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(summary).context("Failed to serialize run report")?;
        println!("{}", text);
        return Ok(());
    }

    for report in &summary.reports {
        println!("{}", report.source.display());
        for track in &report.tracks {
            let line = match &track.outcome {
                TrackOutcome::Renamed => format!("  [done] {} -> {}", track.title, track.dest.display()),
                TrackOutcome::Skipped { reason } => format!("  [skip] {} ({:?})", track.title, reason),
                TrackOutcome::Failed { message, .. } => format!("  [fail] {}: {}", track.title, message),
            };
            println!("{}", line);
        }
        if let Some(TrackOutcome::Failed { message, .. }) = &report.decoder_error {
            println!("  [fail] decoder: {}", message);
        }
        println!(
            "  {} done, {} skipped, {} failed in {} ({} at {:.1} KiB/s)",
            report.renamed_count(),
            report.skipped_count(),
            report.failed_count(),
            format_elapsed(report.elapsed),
            format_file_size(report.bytes_streamed),
            report.throughput_kib()
        );
    }

    for failed in &summary.failed_sources {
        eprintln!("{}: {}", failed.source.display(), failed.message);
    }
    Ok(())
}

/// Parsed cue sheet with both boundary forms
#[derive(Debug, Serialize)]
struct InspectOutput<'a> {
    cue: &'a Path,
    album: Option<&'a str>,
    album_performer: Option<&'a str>,
    total_bytes: u64,
    #[serde(flatten)]
    plan: CatalogPlan,
}

/// Execute the inspect command
pub fn inspect(args: &InspectArgs, file: &FileConfig) -> Result<()> {
    let config = build_run_config(&ConfigOverrides::default(), file).context("Invalid configuration")?;
    let catalog = CueSheetParser::from_config(&config)
        .parse_file(&args.cue)
        .with_context(|| format!("Failed to read cue sheet {}", args.cue.display()))?;

    let plan = CatalogPlan::build(&catalog, &BoundaryConverter::new(PcmFormat::CD));
    let output = InspectOutput {
        cue: &args.cue,
        album: catalog.album(),
        album_performer: catalog.album_performer(),
        total_bytes: plan.total_bytes(),
        plan,
    };

    if args.json {
        let text = serde_json::to_string_pretty(&output).context("Failed to serialize catalog")?;
        println!("{}", text);
        return Ok(());
    }

    println!("Cue sheet: {}", output.cue.display());
    if let Some(album) = output.album {
        println!("Album: {}", album);
    }
    if let Some(performer) = output.album_performer {
        println!("Performer: {}", performer);
    }
    println!(
        "{:<40} {:>13} {:>13} {:>12} {:>12}",
        "Track", "Start", "Duration", "Offset", "Bytes"
    );
    for track in &output.plan.tracks {
        println!(
            "{:<40} {:>13} {:>13} {:>12} {:>12}",
            track.title, track.seek.start, track.seek.duration, track.bytes.start, track.bytes.length
        );
    }
    println!("Tracks: {}", output.plan.tracks.len());
    Ok(())
}
