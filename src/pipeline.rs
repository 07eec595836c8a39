// src/pipeline.rs
//
// Per-frame orchestration: moments -> features -> history -> evidence ->
// network update -> posterior. Strictly downstream, one pass per frame.
// Owns the mutable network instance, so callers get single-writer access
// for free as long as they hold the pipeline exclusively.

use crate::bayes::BeliefEngine;
use crate::decision::DecisionEmitter;
use crate::errors::PipelineError;
use crate::evidence::map_evidence;
use crate::features::extract_features;
use crate::history::FeatureHistory;
use crate::types::{
    AreaFormula, BlobMoments, BoundingEllipse, Classification, Evidence, FrameFeatures, ImageDims,
};
use crate::updater::{BeliefUpdater, EvidencePolicy};
use serde::Serialize;
use tracing::warn;

/// Everything the pipeline derives for one successfully classified frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameOutput {
    pub features: FrameFeatures,
    pub evidence: Evidence,
    pub classification: Classification,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct RunStats {
    pub total_frames: u64,
    pub frames_classified: u64,
    pub frames_dropped: u64,
    pub frames_clamped: u64,
}

/// One pipeline instance per tracked object: the feature history and the
/// network posterior are per-object state and must never be shared.
pub struct ClassificationPipeline<E: BeliefEngine> {
    engine: E,
    history: FeatureHistory,
    updater: BeliefUpdater,
    emitter: DecisionEmitter,
    area_formula: AreaFormula,
    stats: RunStats,
}

impl<E: BeliefEngine> ClassificationPipeline<E> {
    pub fn new(
        engine: E,
        policy: EvidencePolicy,
        area_formula: AreaFormula,
    ) -> Result<Self, PipelineError> {
        let updater = BeliefUpdater::new(&engine, policy)?;
        let emitter = DecisionEmitter::new(&engine)?;
        Ok(Self {
            engine,
            history: FeatureHistory::new(),
            updater,
            emitter,
            area_formula,
            stats: RunStats::default(),
        })
    }

    /// Process one frame's blob. `Ok(None)` means the frame was dropped
    /// (degenerate or out-of-range measurement): nothing was appended to
    /// the history and no answer is produced — a dropped frame never
    /// defaults to flat or non-flat. Engine failures propagate as errors.
    pub fn process_frame(
        &mut self,
        moments: &BlobMoments,
        ellipse: &BoundingEllipse,
        image: ImageDims,
    ) -> Result<Option<FrameOutput>, PipelineError> {
        self.stats.total_frames += 1;

        let features = match extract_features(moments, ellipse, image, self.area_formula) {
            Ok(features) => features,
            Err(
                err @ (PipelineError::DegenerateBlob { .. }
                | PipelineError::OutOfRangeFeature { .. }),
            ) => {
                warn!(%err, "dropping frame");
                self.stats.frames_dropped += 1;
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        // The flatness proxy is the convexity (b/a) of the fitted ellipse.
        self.history.append(features.convexity, features.area);

        let evidence = match map_evidence(&self.history) {
            Ok(evidence) => evidence,
            Err(err @ PipelineError::OutOfRangeFeature { .. }) => {
                warn!(%err, "dropping frame");
                self.stats.frames_dropped += 1;
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        self.updater.update(&mut self.engine, &evidence)?;
        if self.updater.last_update_clamped() {
            self.stats.frames_clamped += 1;
        }

        let classification = self.emitter.emit(&self.engine)?;
        self.stats.frames_classified += 1;

        Ok(Some(FrameOutput {
            features,
            evidence,
            classification,
        }))
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn frames_seen(&self) -> usize {
        self.history.len()
    }
}
