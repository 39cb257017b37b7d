use super::error::ShotError;
use super::histogram::Histogram;

/// 相邻帧距离序列，`values[i]` 为第 i 帧与第 i+1 帧的距离
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DistanceSequence {
    values: Vec<f64>,
}

impl DistanceSequence {
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<f64>> for DistanceSequence {
    fn from(values: Vec<f64>) -> Self {
        Self::from_values(values)
    }
}

pub struct DissimilaritySequencer;

impl DissimilaritySequencer {
    /// L1 距离：逐箱差值绝对值之和
    pub fn distance(a: &Histogram, b: &Histogram) -> Result<u64, ShotError> {
        if a.len() != b.len() {
            return Err(ShotError::HistogramLengthMismatch {
                index: 0,
                left: a.len(),
                right: b.len(),
            });
        }

        Ok(a.counts()
            .iter()
            .zip(b.counts())
            .map(|(x, y)| x.abs_diff(*y))
            .sum())
    }

    pub fn sequence(histograms: &[Histogram]) -> Result<DistanceSequence, ShotError> {
        let values = histograms
            .windows(2)
            .enumerate()
            .map(|(index, pair)| {
                Self::distance(&pair[0], &pair[1])
                    .map(|d| d as f64)
                    .map_err(|e| match e {
                        ShotError::HistogramLengthMismatch { left, right, .. } => {
                            ShotError::HistogramLengthMismatch { index, left, right }
                        }
                        other => other,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DistanceSequence { values })
    }
}
