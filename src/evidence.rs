// src/evidence.rs
//
// Maps the latest shape measurements to evidence probabilities through
// fixed piecewise-linear calibration curves. Deliberately conservative:
// everything below the breakpoints maps to exactly 0.

use crate::errors::PipelineError;
use crate::history::FeatureHistory;
use crate::types::Evidence;
use tracing::warn;

// ============================================================================
// CALIBRATION CONSTANTS — hand-tuned, not configurable
// ============================================================================
/// A flatness proxy at or below this contributes no evidence.
const FLATNESS_BREAKPOINT: f64 = 0.8;
/// An area ratio below this contributes no evidence.
const AREA_RATIO_BREAKPOINT: f64 = 0.4;

/// Evidence that the bounding ellipse looks flat. Rises linearly from 0 at
/// proxy = 0.8 to 1 at proxy = 1.0. Values above 1.0 are an upstream
/// calibration fault: clamped, but logged.
pub fn flatness_evidence(flatness_proxy: f64) -> Result<f64, PipelineError> {
    if !flatness_proxy.is_finite() {
        return Err(PipelineError::OutOfRangeFeature {
            name: "flatness_proxy",
            value: flatness_proxy,
        });
    }
    let proxy = if flatness_proxy > 1.0 {
        warn!(
            flatness_proxy,
            "flatness proxy above 1.0, clamping; check upstream calibration"
        );
        1.0
    } else {
        flatness_proxy
    };
    if proxy <= FLATNESS_BREAKPOINT {
        Ok(0.0)
    } else {
        Ok(1.0 - (1.0 - proxy) / (1.0 - FLATNESS_BREAKPOINT))
    }
}

/// Evidence that the object is large relative to the largest silhouette
/// ever observed. Rises linearly from 0 at ratio = 0.4 to 1 at ratio = 1.0.
pub fn area_evidence(ratio: f64) -> Result<f64, PipelineError> {
    if !ratio.is_finite() || ratio < 0.0 {
        return Err(PipelineError::OutOfRangeFeature {
            name: "area_ratio",
            value: ratio,
        });
    }
    if ratio < AREA_RATIO_BREAKPOINT {
        Ok(0.0)
    } else {
        Ok(((ratio - AREA_RATIO_BREAKPOINT) / (1.0 - AREA_RATIO_BREAKPOINT)).min(1.0))
    }
}

/// Evidence pair for the current frame, read from the history's latest
/// entry and its running maximum.
pub fn map_evidence(history: &FeatureHistory) -> Result<Evidence, PipelineError> {
    let (proxy, _) = history.latest()?;
    let ratio = history.area_ratio()?;
    Ok(Evidence {
        flatness: flatness_evidence(proxy)?,
        area: area_evidence(ratio)?,
    })
}
