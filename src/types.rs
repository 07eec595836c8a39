use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub calibration: CalibrationConfig,
    pub camera: CameraConfig,
    pub detections: DetectionsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Path to the versioned network-definition artifact (YAML).
    pub definition_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub area_formula: AreaFormula,
    pub evidence_policy: EvidencePolicyConfig,
    pub clamp_threshold: f64,
}

/// The source revisions disagree on the ellipse-area formula; the choice is
/// surfaced here instead of being hardwired. The current-to-max area ratio
/// is scale-invariant, so the decision logic behaves identically under all
/// three — only the exported feature vector differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaFormula {
    /// `pi * a * b` — standard ellipse area.
    PiAb,
    /// `4 * (a / max_pixels) * (b / max_pixels)` — legacy normalized form.
    FourAbNormalized,
    /// `pi * 4 * a * b` — legacy full-axis form.
    PiFourAb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidencePolicyConfig {
    SoftOnly,
    ThresholdClamped,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CameraConfig {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionsConfig {
    pub input_dir: String,
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Raw image moments of one detected blob: orders (0,0), (1,0), (0,1),
/// (1,1), (0,2), (2,0). `m00` is the pixel area and must be strictly
/// positive before any central moment is derived.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlobMoments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m11: f64,
    pub m02: f64,
    pub m20: f64,
}

/// Ellipse fitted around the blob by the upstream detector. Valid for the
/// current frame only; nothing past the frame boundary may hold on to it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingEllipse {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
    pub angle: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ImageDims {
    pub width: f64,
    pub height: f64,
}

impl ImageDims {
    /// Larger image dimension, used to normalize pixel quantities.
    pub fn max_pixels(&self) -> f64 {
        self.width.max(self.height)
    }
}

/// Calibrated shape features derived from one frame's blob.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FrameFeatures {
    /// Semi-major axis from the moment covariance, `a >= b`.
    pub semi_major: f64,
    /// Semi-minor axis, clamped to 0 under numerical noise.
    pub semi_minor: f64,
    /// `b / a`, in (0, 1]; 1.0 for a perfect circle.
    pub convexity: f64,
    /// Ellipse area under the configured formula.
    pub area: f64,
    /// Longest bounding-box side over the larger image dimension.
    pub norm_diameter: f64,
    /// Blob center offset from image center over the larger image
    /// dimension, each component in roughly [-1, 1].
    pub norm_center_x: f64,
    pub norm_center_y: f64,
    /// M7 moment invariant, ~0.0063 for a perfect circle. Diagnostic only,
    /// never consumed by the decision logic.
    pub circularity: f64,
}

/// Evidence probabilities produced fresh each frame, never stored.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Evidence {
    pub flatness: f64,
    pub area: f64,
}

/// Posterior classification for one frame. `probabilities` preserves the
/// fixed node order `[flat, nonflat]` so consumers can index positionally.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub flat: f64,
    pub nonflat: f64,
    pub probabilities: Vec<f64>,
}
