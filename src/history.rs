// src/history.rs
//
// Per-object feature history across frames. Append-only, chronological;
// the area ratio normalizes against the maximum seen *so far*, not a
// global maximum, so insertion order matters.

use crate::errors::PipelineError;

/// Running history of the flatness proxy and the blob area for a single
/// tracked object. One instance per object — never shared across tracks.
#[derive(Debug, Default)]
pub struct FeatureHistory {
    flatness: Vec<f64>,
    areas: Vec<f64>,
    max_area: f64,
}

impl FeatureHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current frame's scalars. The running maximum is updated
    /// incrementally; entries are never removed or reordered.
    pub fn append(&mut self, flatness_proxy: f64, area: f64) {
        self.flatness.push(flatness_proxy);
        self.areas.push(area);
        if area > self.max_area || self.areas.len() == 1 {
            self.max_area = area;
        }
    }

    /// Most recent (flatness proxy, area) pair.
    pub fn latest(&self) -> Result<(f64, f64), PipelineError> {
        match (self.flatness.last(), self.areas.last()) {
            (Some(&f), Some(&a)) => Ok((f, a)),
            _ => Err(PipelineError::HistoryEmpty),
        }
    }

    /// Maximum area ever appended.
    pub fn running_max_area(&self) -> Result<f64, PipelineError> {
        if self.areas.is_empty() {
            return Err(PipelineError::HistoryEmpty);
        }
        Ok(self.max_area)
    }

    /// Latest area over the running maximum, in (0, 1]. A lone observation
    /// is its own maximum, so the ratio defaults to 1.0.
    pub fn area_ratio(&self) -> Result<f64, PipelineError> {
        let (_, current) = self.latest()?;
        let max = self.running_max_area()?;
        if max <= 0.0 {
            return Ok(1.0);
        }
        Ok(current / max)
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PipelineError;

    #[test]
    fn empty_history_errors() {
        let h = FeatureHistory::new();
        assert!(matches!(h.latest(), Err(PipelineError::HistoryEmpty)));
        assert!(matches!(
            h.running_max_area(),
            Err(PipelineError::HistoryEmpty)
        ));
    }

    #[test]
    fn lone_observation_ratio_is_one() {
        let mut h = FeatureHistory::new();
        h.append(0.95, 42.0);
        assert_eq!(h.area_ratio().unwrap(), 1.0);
        assert_eq!(h.running_max_area().unwrap(), 42.0);
    }

    #[test]
    fn running_max_tracks_maximum_so_far() {
        let mut h = FeatureHistory::new();
        h.append(0.9, 10.0);
        h.append(0.9, 20.0);
        h.append(0.9, 15.0);
        assert_eq!(h.running_max_area().unwrap(), 20.0);

        h.append(0.9, 15.0);
        assert_eq!(h.running_max_area().unwrap(), 20.0);
        assert!((h.area_ratio().unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn latest_follows_appends() {
        let mut h = FeatureHistory::new();
        h.append(0.5, 1.0);
        h.append(0.7, 2.0);
        assert_eq!(h.latest().unwrap(), (0.7, 2.0));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn shrinking_object_keeps_old_maximum() {
        let mut h = FeatureHistory::new();
        for area in [100.0, 80.0, 60.0, 40.0] {
            h.append(0.9, area);
        }
        assert_eq!(h.running_max_area().unwrap(), 100.0);
        assert!((h.area_ratio().unwrap() - 0.4).abs() < 1e-12);
    }
}
