// src/main.rs

mod bayes;
mod config;
mod decision;
mod detections;
mod errors;
mod evidence;
mod features;
mod history;
mod pipeline;
mod types;
mod updater;

use anyhow::{Context, Result};
use bayes::DiscreteNetwork;
use detections::DetectionSource;
use pipeline::{ClassificationPipeline, RunStats};
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use types::{Config, EvidencePolicyConfig, ImageDims};
use updater::EvidencePolicy;

fn main() -> Result<()> {
    let config = Config::load("config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("flatness_detection={}", config.logging.level))
        }))
        .init();

    info!("Flatness classification pipeline starting");
    info!("✓ Configuration loaded");

    let policy = match config.calibration.evidence_policy {
        EvidencePolicyConfig::SoftOnly => EvidencePolicy::SoftOnly,
        EvidencePolicyConfig::ThresholdClamped => EvidencePolicy::ThresholdClamped {
            threshold: config.calibration.clamp_threshold,
        },
    };
    info!(
        "Calibration: area_formula={:?}, policy={:?}",
        config.calibration.area_formula, policy
    );

    // Loaded once; each tracked object gets its own copy so per-object
    // evidence never interleaves.
    let network = DiscreteNetwork::load(&config.network.definition_path)
        .context("loading belief network definition")?;
    info!(
        "✓ Belief network ready ({})",
        config.network.definition_path
    );

    let source = DetectionSource::new(config.clone());
    let files = source.find_detection_files()?;
    if files.is_empty() {
        error!(
            "No detection files found in {}",
            config.detections.input_dir
        );
        return Ok(());
    }

    let mut totals = RunStats::default();
    for (idx, path) in files.iter().enumerate() {
        info!(
            "Processing object {}/{}: {}",
            idx + 1,
            files.len(),
            path.display()
        );
        match process_file(path, &network, policy, &config, &source) {
            Ok(stats) => {
                totals.total_frames += stats.total_frames;
                totals.frames_classified += stats.frames_classified;
                totals.frames_dropped += stats.frames_dropped;
                totals.frames_clamped += stats.frames_clamped;
            }
            Err(err) => {
                // A broken input file must not abort the whole run.
                error!("Failed to process {}: {err:#}", path.display());
            }
        }
    }

    info!("========================================");
    info!("Run complete");
    info!("  Total frames: {}", totals.total_frames);
    info!("  ✅ Classified: {}", totals.frames_classified);
    info!("  ⚠️  Dropped: {}", totals.frames_dropped);
    info!("  Hard-clamped: {}", totals.frames_clamped);

    Ok(())
}

fn process_file(
    path: &Path,
    network: &DiscreteNetwork,
    policy: EvidencePolicy,
    config: &Config,
    source: &DetectionSource,
) -> Result<RunStats> {
    let mut pipeline =
        ClassificationPipeline::new(network.clone(), policy, config.calibration.area_formula)?;
    let mut reader = source.open(path)?;
    let mut writer = source.create_writer(path)?;

    let fallback = ImageDims {
        width: config.camera.width,
        height: config.camera.height,
    };

    while let Some(record) = reader.next_record()? {
        let dims = record.image_dims(fallback);
        match pipeline.process_frame(&record.moments, &record.ellipse, dims)? {
            Some(output) => {
                debug!(
                    "frame {}: flat={:.3} nonflat={:.3}",
                    record.frame_id, output.classification.flat, output.classification.nonflat
                );
                writer.write_result(record.frame_id, &output)?;
            }
            None => {
                warn!("frame {}: no classification emitted", record.frame_id);
            }
        }
    }

    if reader.skipped() > 0 {
        warn!("{} malformed record(s) skipped", reader.skipped());
    }

    let stats = pipeline.stats();
    writer.finish(&stats)?;
    Ok(stats)
}
