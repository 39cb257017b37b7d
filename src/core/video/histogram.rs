//! 亮度直方图提取

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::ShotError;
use super::frame::Frame;

/// 直方图分箱边界
///
/// 与 numpy.histogram 一致：`edges[k] <= v < edges[k+1]` 落入第 k 箱，
/// 最后一箱两端闭合，超出范围的值被丢弃。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinEdges(Vec<f64>);

impl BinEdges {
    pub fn new(edges: Vec<f64>) -> Result<Self, ShotError> {
        if edges.len() < 2 {
            return Err(ShotError::InvalidConfig(format!(
                "need at least 2 bin edges, got {}",
                edges.len()
            )));
        }
        if edges.iter().any(|e| !e.is_finite()) || edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ShotError::InvalidConfig(
                "bin edges must be finite and strictly increasing".into(),
            ));
        }
        Ok(Self(edges))
    }

    pub fn bin_count(&self) -> usize {
        self.0.len() - 1
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn bin_of(&self, value: f64) -> Option<usize> {
        let edges = &self.0;
        let last = edges[edges.len() - 1];
        if !(edges[0]..=last).contains(&value) {
            return None;
        }
        if value == last {
            return Some(self.bin_count() - 1);
        }
        Some(edges.partition_point(|&e| e <= value) - 1)
    }
}

impl Default for BinEdges {
    /// `[0, 10, 20, ..., 240, 255]`，共 25 箱
    fn default() -> Self {
        let mut edges: Vec<f64> = (0..25).map(|i| (i * 10) as f64).collect();
        edges.push(255.0);
        Self(edges)
    }
}

/// 原始像素计数，不做归一化，只能在同分辨率帧之间比较
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    counts: Vec<u64>,
}

impl Histogram {
    pub fn from_counts(counts: Vec<u64>) -> Self {
        Self { counts }
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// 感知亮度，输入为 [0,255] 通道值
pub fn luma(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

#[derive(Debug, Clone, Default)]
pub struct HistogramExtractor {
    edges: BinEdges,
}

impl HistogramExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_edges(edges: BinEdges) -> Self {
        Self { edges }
    }

    pub fn extract(&self, frame: &Frame) -> Histogram {
        let mut counts = vec![0u64; self.edges.bin_count()];

        for px in frame.data.chunks_exact(3) {
            // 255 通道的加权和可能因浮点误差略超 255
            let y = luma(px[0], px[1], px[2]).min(255.0);
            if let Some(bin) = self.edges.bin_of(y) {
                counts[bin] += 1;
            }
        }

        Histogram { counts }
    }

    /// 在当前 rayon 线程池上并行提取，输出顺序与输入一致
    pub fn extract_all(&self, frames: &[&Frame]) -> Vec<Histogram> {
        debug!(
            "📊 Extracting {} histograms on {} threads",
            frames.len(),
            rayon::current_num_threads()
        );
        frames.par_iter().map(|f| self.extract(f)).collect()
    }
}
