//! 边界分类器 - 单次前向扫描距离序列，输出硬切与渐变
//!
//! 状态机只有两个状态：
//! - `Idle`：没有候选窗口
//! - `Open`：出现过 `TS <= d < TB` 的值，正在累积候选渐变窗口
//!
//! 窗口在容忍计数耗尽或遇到硬切时关闭；序列结束时仍打开的窗口直接丢弃。

use serde::{Deserialize, Serialize};

use super::distance::DistanceSequence;
use super::threshold::Thresholds;

/// 硬切，`end_frame == start_frame + 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cut {
    pub start_frame: u64,
    pub end_frame: u64,
}

impl Cut {
    pub fn at(start_frame: u64) -> Self {
        Self {
            start_frame,
            end_frame: start_frame + 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GradualTransition {
    pub start_frame: u64,
    pub end_frame: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Boundary {
    Cut(Cut),
    Gradual(GradualTransition),
}

impl Boundary {
    pub fn start_frame(&self) -> u64 {
        match self {
            Boundary::Cut(c) => c.start_frame,
            Boundary::Gradual(g) => g.start_frame,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Classification {
    pub cuts: Vec<Cut>,
    pub transitions: Vec<GradualTransition>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty() && self.transitions.is_empty()
    }

    /// 两类边界按起始帧合并，起始帧相同时硬切在前
    pub fn boundaries(&self) -> Vec<Boundary> {
        let mut all: Vec<Boundary> = self
            .cuts
            .iter()
            .copied()
            .map(Boundary::Cut)
            .chain(self.transitions.iter().copied().map(Boundary::Gradual))
            .collect();
        all.sort_by_key(|b| (b.start_frame(), matches!(b, Boundary::Gradual(_))));
        all
    }
}

/// 硬切在哪个下标触发候选窗口关闭
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutResetRule {
    /// 第 `i - 1` 个值是硬切时，在第 `i` 步关闭
    #[default]
    PrecedingIndex,
    /// 第 `i` 个值是硬切时，当步关闭
    SameIndex,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    pub tolerance_count: u32,
    pub cut_reset: CutResetRule,
    /// 硬切所在下标不参与候选窗口记账
    pub suppress_window_on_cut: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            tolerance_count: 2,
            cut_reset: CutResetRule::PrecedingIndex,
            suppress_window_on_cut: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WindowState {
    Idle,
    Open {
        start: usize,
        end: Option<usize>,
        below_count: u32,
    },
}

impl WindowState {
    fn observe(self, index: usize, value: f64, thresholds: &Thresholds) -> WindowState {
        let candidate = value >= thresholds.transition && value < thresholds.cut;

        match self {
            WindowState::Idle if candidate => WindowState::Open {
                start: index,
                end: None,
                below_count: 0,
            },
            WindowState::Idle => WindowState::Idle,
            WindowState::Open {
                start, below_count, ..
            } if candidate => WindowState::Open {
                start,
                end: Some(index),
                below_count,
            },
            WindowState::Open {
                start,
                end,
                below_count,
            } => WindowState::Open {
                start,
                end,
                below_count: below_count + 1,
            },
        }
    }

    fn tolerance_exceeded(&self, tolerance: u32) -> bool {
        matches!(self, WindowState::Open { below_count, .. } if *below_count > tolerance)
    }

    /// 窗口内距离之和达到 TB 才算渐变
    fn evaluate(&self, values: &[f64], cut_threshold: f64) -> Option<(usize, usize)> {
        match *self {
            WindowState::Open {
                start,
                end: Some(end),
                ..
            } => {
                let sum: f64 = values[start..=end].iter().sum();
                (sum >= cut_threshold).then_some((start, end))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoundaryClassifier {
    config: ClassifierConfig,
}

impl BoundaryClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn classify(
        &self,
        distances: &DistanceSequence,
        thresholds: &Thresholds,
        start_frame: u64,
    ) -> Classification {
        let values = distances.values();
        let mut result = Classification::default();
        let mut window = WindowState::Idle;
        let mut last_cut: Option<usize> = None;

        for (i, &value) in values.iter().enumerate() {
            let is_cut = value >= thresholds.cut;
            if is_cut {
                result.cuts.push(Cut::at(start_frame + i as u64 + 1));
            }

            if !(is_cut && self.config.suppress_window_on_cut) {
                window = window.observe(i, value, thresholds);
            }

            let cut_closes = match self.config.cut_reset {
                CutResetRule::PrecedingIndex => i > 0 && last_cut == Some(i - 1),
                CutResetRule::SameIndex => is_cut,
            };
            if is_cut {
                last_cut = Some(i);
            }

            if cut_closes || window.tolerance_exceeded(self.config.tolerance_count) {
                if let Some((start, end)) = window.evaluate(values, thresholds.cut) {
                    result.transitions.push(GradualTransition {
                        start_frame: start_frame + start as u64 + 1,
                        end_frame: start_frame + end as u64 + 1,
                    });
                }
                window = WindowState::Idle;
            }
        }

        result
    }
}
