use serde::Serialize;

use super::distance::DistanceSequence;
use super::error::ShotError;

/// 自适应阈值：`cut` 即 TB，`transition` 即 TS
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub cut: f64,
    pub transition: f64,
}

impl Thresholds {
    pub fn new(cut: f64, transition: f64) -> Self {
        Self { cut, transition }
    }
}

/// 距离序列的均值与总体标准差
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl SequenceStats {
    pub fn of(distances: &DistanceSequence) -> Result<Self, ShotError> {
        let values = distances.values();
        if values.is_empty() {
            return Err(ShotError::EmptyDistances);
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Ok(Self {
            mean,
            std_dev: variance.sqrt(),
        })
    }

    pub fn is_flat(&self) -> bool {
        self.std_dev == 0.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThresholdEstimator {
    pub cut_std_dev_multiplier: f64,
    pub transition_mean_multiplier: f64,
}

impl Default for ThresholdEstimator {
    fn default() -> Self {
        Self {
            cut_std_dev_multiplier: 11.0,
            transition_mean_multiplier: 2.0,
        }
    }
}

impl ThresholdEstimator {
    pub fn new(cut_std_dev_multiplier: f64, transition_mean_multiplier: f64) -> Self {
        Self {
            cut_std_dev_multiplier,
            transition_mean_multiplier,
        }
    }

    pub fn estimate(&self, distances: &DistanceSequence) -> Result<Thresholds, ShotError> {
        let stats = SequenceStats::of(distances)?;
        Ok(self.thresholds_for(&stats))
    }

    pub fn thresholds_for(&self, stats: &SequenceStats) -> Thresholds {
        Thresholds {
            cut: stats.mean + self.cut_std_dev_multiplier * stats.std_dev,
            transition: self.transition_mean_multiplier * stats.mean,
        }
    }
}
