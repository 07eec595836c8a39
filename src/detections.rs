// src/detections.rs
//
// File IO around the core: discovers blob-detection dumps (JSONL, one
// record per frame) and writes classification results back out. The
// segmentation and blob-detection stages live upstream; this binary
// consumes their per-frame records.

use crate::pipeline::{FrameOutput, RunStats};
use crate::types::{BlobMoments, BoundingEllipse, Config, ImageDims};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// One frame's blob as dumped by the upstream detector.
#[derive(Debug, Clone, Deserialize)]
pub struct BlobRecord {
    pub frame_id: u64,
    pub moments: BlobMoments,
    pub ellipse: BoundingEllipse,
    /// Per-frame camera info; falls back to the configured camera when
    /// the detector did not include it.
    #[serde(default)]
    pub image_width: Option<f64>,
    #[serde(default)]
    pub image_height: Option<f64>,
}

impl BlobRecord {
    pub fn image_dims(&self, fallback: ImageDims) -> ImageDims {
        match (self.image_width, self.image_height) {
            (Some(width), Some(height)) => ImageDims { width, height },
            _ => fallback,
        }
    }
}

/// Classification result written per frame.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRecord<'a> {
    pub frame_id: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub output: &'a FrameOutput,
}

pub struct DetectionSource {
    config: Config,
}

impl DetectionSource {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// All `*.jsonl` detection dumps under the input directory. Each file
    /// is one tracked object's frame sequence.
    pub fn find_detection_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.config.detections.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        info!("Found {} detection file(s)", files.len());
        Ok(files)
    }

    pub fn open(&self, path: &Path) -> Result<RecordReader> {
        info!("Opening detections: {}", path.display());
        let file =
            File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(RecordReader {
            lines: BufReader::new(file).lines(),
            line_no: 0,
            skipped: 0,
        })
    }

    pub fn create_writer(&self, input_path: &Path) -> Result<ResultWriter> {
        std::fs::create_dir_all(&self.config.detections.output_dir)?;
        let stem = input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("detections");
        let output_path = PathBuf::from(&self.config.detections.output_dir)
            .join(format!("{stem}_classified.jsonl"));
        info!("Output results: {}", output_path.display());
        let file = File::create(&output_path)
            .with_context(|| format!("creating {}", output_path.display()))?;
        Ok(ResultWriter {
            writer: BufWriter::new(file),
        })
    }
}

pub struct RecordReader {
    lines: std::io::Lines<BufReader<File>>,
    line_no: usize,
    skipped: usize,
}

impl RecordReader {
    /// Next parseable record. Malformed lines are logged and skipped, the
    /// same way a corrupt frame would be.
    pub fn next_record(&mut self) -> Result<Option<BlobRecord>> {
        for line in self.lines.by_ref() {
            let line = line?;
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<BlobRecord>(&line) {
                Ok(record) => return Ok(Some(record)),
                Err(err) => {
                    warn!(line = self.line_no, %err, "skipping malformed record");
                    self.skipped += 1;
                }
            }
        }
        Ok(None)
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

pub struct ResultWriter {
    writer: BufWriter<File>,
}

impl ResultWriter {
    pub fn write_result(&mut self, frame_id: u64, output: &FrameOutput) -> Result<()> {
        let record = ResultRecord {
            frame_id,
            timestamp: chrono::Utc::now(),
            output,
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn finish(mut self, stats: &RunStats) -> Result<()> {
        self.writer.flush()?;
        info!(
            "Wrote results: {} classified, {} dropped of {} frames",
            stats.frames_classified, stats.frames_dropped, stats.total_frames
        );
        Ok(())
    }
}
