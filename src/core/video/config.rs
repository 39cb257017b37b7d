use serde::{Deserialize, Serialize};

use super::classifier::{ClassifierConfig, CutResetRule};
use super::error::ShotError;
use super::histogram::BinEdges;
use super::threshold::ThresholdEstimator;

/// 只分析帧号落在 `[first, last]` 内的帧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub first: u64,
    pub last: u64,
}

impl FrameRange {
    pub fn contains(&self, frame_number: u64) -> bool {
        (self.first..=self.last).contains(&frame_number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub cut_std_dev_multiplier: f64,
    pub transition_mean_multiplier: f64,
    pub tolerance_count: u32,
    /// 为空时取第一帧的帧号
    pub start_frame_offset: Option<u64>,
    pub cut_reset: CutResetRule,
    pub suppress_window_on_cut: bool,
    /// 距离序列零方差时直接报告无边界；默认关闭，按阈值原样分类
    pub skip_flat_sequences: bool,
    pub frame_range: Option<FrameRange>,
    pub bin_edges: BinEdges,
    /// 0 表示 min(CPU 核数, 4)
    pub parallelism: usize,
    pub jpeg_quality: u8,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            cut_std_dev_multiplier: 11.0,
            transition_mean_multiplier: 2.0,
            tolerance_count: 2,
            start_frame_offset: None,
            cut_reset: CutResetRule::PrecedingIndex,
            suppress_window_on_cut: false,
            skip_flat_sequences: false,
            frame_range: None,
            bin_edges: BinEdges::default(),
            parallelism: 0,
            jpeg_quality: 70,
        }
    }
}

impl DetectionConfig {
    /// 解析 JSON5 文本，缺省字段取默认值
    pub fn from_json5(text: &str) -> Result<Self, ShotError> {
        let config: DetectionConfig = json5::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ShotError> {
        for (name, value) in [
            ("cut_std_dev_multiplier", self.cut_std_dev_multiplier),
            ("transition_mean_multiplier", self.transition_mean_multiplier),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ShotError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        BinEdges::new(self.bin_edges.as_slice().to_vec())?;

        if let Some(range) = self.frame_range {
            if range.first > range.last {
                return Err(ShotError::InvalidConfig(format!(
                    "frame_range first {} is after last {}",
                    range.first, range.last
                )));
            }
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ShotError::InvalidConfig(format!(
                "jpeg_quality must be in 1..=100, got {}",
                self.jpeg_quality
            )));
        }

        Ok(())
    }

    pub fn threads(&self) -> usize {
        if self.parallelism == 0 {
            num_cpus::get().min(4)
        } else {
            self.parallelism
        }
    }

    pub fn estimator(&self) -> ThresholdEstimator {
        ThresholdEstimator::new(self.cut_std_dev_multiplier, self.transition_mean_multiplier)
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            tolerance_count: self.tolerance_count,
            cut_reset: self.cut_reset,
            suppress_window_on_cut: self.suppress_window_on_cut,
        }
    }
}
