// src/features.rs
//
// Shape feature extraction: raw blob moments + bounding ellipse in,
// calibrated per-frame feature record out. Pure function of its inputs.

use crate::errors::PipelineError;
use crate::types::{AreaFormula, BlobMoments, BoundingEllipse, FrameFeatures, ImageDims};
use std::f64::consts::PI;
use tracing::debug;

/// M7 invariant of an ideal circle at this calibration; logged alongside
/// the measured value for drift checks.
pub const CIRCLE_CIRCULARITY: f64 = 0.0063;

/// Derive the frame's shape features from one blob.
///
/// Fails with `DegenerateBlob` when `m00 <= 0` (central moments undefined)
/// or when the covariance collapses to a point (`a == 0`), and with
/// `OutOfRangeFeature` when the arithmetic overflows. No NaN or Inf ever
/// escapes on the success path.
pub fn extract_features(
    moments: &BlobMoments,
    ellipse: &BoundingEllipse,
    image: ImageDims,
    area_formula: AreaFormula,
) -> Result<FrameFeatures, PipelineError> {
    if moments.m00 <= 0.0 {
        return Err(PipelineError::DegenerateBlob { m00: moments.m00 });
    }

    let m00 = moments.m00;
    let central_11 = moments.m11 - (moments.m10 * moments.m01) / m00;
    let central_02 = moments.m02 - (moments.m01 * moments.m01) / m00;
    let central_20 = moments.m20 - (moments.m10 * moments.m10) / m00;

    // Eigenvalues of the covariance give the squared semi-axes. The inner
    // radicand is a sum of squares; the outer one for `b` can dip below
    // zero from floating-point noise and is clamped before the sqrt.
    let spread = (central_11 * central_11
        + (central_20 - central_02) * (central_20 - central_02))
        .sqrt();
    let semi_major = (2.0 * (central_20 + central_02 + spread)).max(0.0).sqrt();
    let semi_minor = (2.0 * (central_20 + central_02 - spread)).max(0.0).sqrt();

    if semi_major <= 0.0 {
        return Err(PipelineError::DegenerateBlob { m00 });
    }
    let convexity = semi_minor / semi_major;

    let circularity =
        (central_20 * central_02 - central_11 * central_11) / (m00 * m00 * m00 * m00);
    debug!(
        circularity,
        reference = CIRCLE_CIRCULARITY,
        "M7 circularity diagnostic"
    );

    let max_pixels = image.max_pixels();
    let area = match area_formula {
        AreaFormula::PiAb => PI * semi_major * semi_minor,
        AreaFormula::FourAbNormalized => {
            4.0 * (semi_major / max_pixels) * (semi_minor / max_pixels)
        }
        AreaFormula::PiFourAb => PI * 4.0 * semi_major * semi_minor,
    };

    let norm_diameter = ellipse.width.max(ellipse.height) / max_pixels;
    // Image center becomes the origin; components land in roughly [-1, 1].
    let norm_center_x = (ellipse.center_x - image.width / 2.0) / max_pixels;
    let norm_center_y = (ellipse.center_y - image.height / 2.0) / max_pixels;

    let features = FrameFeatures {
        semi_major,
        semi_minor,
        convexity,
        area,
        norm_diameter,
        norm_center_x,
        norm_center_y,
        circularity,
    };
    // Extreme moments can overflow the axis or area arithmetic; such a
    // frame must fail here, before anything reaches the history.
    for (name, value) in [
        ("semi_major", features.semi_major),
        ("semi_minor", features.semi_minor),
        ("convexity", features.convexity),
        ("area", features.area),
        ("norm_diameter", features.norm_diameter),
        ("norm_center_x", features.norm_center_x),
        ("norm_center_y", features.norm_center_y),
        ("circularity", features.circularity),
    ] {
        if !value.is_finite() {
            return Err(PipelineError::OutOfRangeFeature { name, value });
        }
    }
    Ok(features)
}
