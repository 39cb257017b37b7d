//! 镜头边界检测器

use crate::core::video::{
    encode_keyframes, DetectionConfig, Frame, RawFrame, ShotDetector, ShotError, ShotReport,
    ShotStartKind,
};
use flutter_rust_bridge::frb;
use log::info;
use std::sync::Mutex;

/// RGB 帧数据（每像素 3 字节）
#[derive(Debug, Clone)]
pub struct RgbFrameData {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    pub timestamp_ms: f64,
    pub frame_number: u64,
}

/// YUV 4:2:0 平面帧数据
#[derive(Debug, Clone)]
pub struct YuvFrameData {
    pub width: u32,
    pub height: u32,
    pub y_plane: Vec<u8>,
    pub u_plane: Vec<u8>,
    pub v_plane: Vec<u8>,
    pub timestamp_ms: f64,
    pub frame_number: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSpan {
    pub start_frame: u64,
    pub end_frame: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShotStart {
    pub frame_number: u64,
    pub timestamp_secs: Option<f64>,
    pub is_cut: bool,
}

/// 检测结果
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub cuts: Vec<FrameSpan>,
    pub transitions: Vec<FrameSpan>,
    pub shots: Vec<ShotStart>,
    pub cut_threshold: Option<f64>,
    pub transition_threshold: Option<f64>,
    /// 完整报告的 JSON 文本
    pub report_json: String,
}

impl DetectionResult {
    fn from_report(report: &ShotReport) -> Result<Self, ShotError> {
        Ok(Self {
            cuts: report
                .boundaries
                .cuts
                .iter()
                .map(|c| FrameSpan {
                    start_frame: c.start_frame,
                    end_frame: c.end_frame,
                })
                .collect(),
            transitions: report
                .boundaries
                .transitions
                .iter()
                .map(|t| FrameSpan {
                    start_frame: t.start_frame,
                    end_frame: t.end_frame,
                })
                .collect(),
            shots: report
                .shots
                .iter()
                .map(|s| ShotStart {
                    frame_number: s.frame_number,
                    timestamp_secs: s.timestamp_secs,
                    is_cut: s.kind == ShotStartKind::Cut,
                })
                .collect(),
            cut_threshold: report.thresholds.map(|t| t.cut),
            transition_threshold: report.thresholds.map(|t| t.transition),
            report_json: report.to_json()?,
        })
    }
}

/// 镜头关键帧（JPEG）
#[derive(Debug, Clone)]
pub struct ShotKeyframe {
    pub frame_number: u64,
    pub timestamp_ms: f64,
    pub width: u32,
    pub height: u32,
    pub jpeg_data: Vec<u8>,
}

/// 检测统计
#[derive(Debug, Clone, Default)]
pub struct DetectionStats {
    pub processed_frames: u64,
    pub cuts: u64,
    pub transitions: u64,
    pub shots: u64,
}

/// 镜头边界检测器 - 硬切 + 渐变
///
/// ```dart
/// final detector = ShotBoundaryDetector.create(configJson5: null);
/// final result = await detector.detectRgb(frames: frames);
/// final keyframes = await detector.keyframes(frames: frames);
/// ```
#[frb(opaque)]
pub struct ShotBoundaryDetector {
    detector: ShotDetector,
    last_report: Mutex<Option<ShotReport>>,
    stats: Mutex<DetectionStats>,
}

impl ShotBoundaryDetector {
    /// 创建检测器；`config_json5` 为空时使用默认参数
    #[frb(sync)]
    pub fn create(config_json5: Option<String>) -> Result<Self, ShotError> {
        crate::init_logging();

        let config = match config_json5 {
            Some(text) => DetectionConfig::from_json5(&text)?,
            None => DetectionConfig::default(),
        };
        info!(
            "🎬 ShotBoundaryDetector: created (TB x{}, TS x{}, tolerance {})",
            config.cut_std_dev_multiplier, config.transition_mean_multiplier, config.tolerance_count
        );

        Ok(Self {
            detector: ShotDetector::with_config(config)?,
            last_report: Mutex::new(None),
            stats: Mutex::new(DetectionStats::default()),
        })
    }

    #[frb]
    pub fn detect_rgb(&self, frames: Vec<RgbFrameData>) -> Result<DetectionResult, ShotError> {
        let frames = frames
            .into_iter()
            .map(|f| Frame::new(f.width, f.height, f.rgb, f.timestamp_ms, f.frame_number))
            .collect::<Result<Vec<_>, _>>()?;
        self.run(&frames)
    }

    #[frb]
    pub fn detect_yuv(&self, frames: Vec<YuvFrameData>) -> Result<DetectionResult, ShotError> {
        let frames = frames
            .into_iter()
            .map(|f| {
                RawFrame {
                    width: f.width,
                    height: f.height,
                    y_plane: f.y_plane,
                    u_plane: f.u_plane,
                    v_plane: f.v_plane,
                    timestamp_ms: f.timestamp_ms,
                    frame_number: f.frame_number,
                }
                .to_rgb()
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.run(&frames)
    }

    /// 为上一次检测得到的镜头起点编码 JPEG 关键帧
    #[frb]
    pub fn keyframes(&self, frames: Vec<RgbFrameData>) -> Result<Vec<ShotKeyframe>, ShotError> {
        let frames = frames
            .into_iter()
            .map(|f| Frame::new(f.width, f.height, f.rgb, f.timestamp_ms, f.frame_number))
            .collect::<Result<Vec<_>, _>>()?;

        let guard = self.last_report.lock().unwrap_or_else(|e| e.into_inner());
        let Some(report) = guard.as_ref() else {
            return Ok(vec![]);
        };

        Ok(
            encode_keyframes(&frames, report, self.detector.config().jpeg_quality)?
                .into_iter()
                .map(|k| ShotKeyframe {
                    frame_number: k.frame_number,
                    timestamp_ms: k.timestamp_ms,
                    width: k.width,
                    height: k.height,
                    jpeg_data: k.jpeg_data,
                })
                .collect(),
        )
    }

    /// 获取检测统计
    #[frb(sync, getter)]
    pub fn stats(&self) -> DetectionStats {
        self.stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// 重置状态
    #[frb(sync)]
    pub fn reset(&self) {
        if let Ok(mut stats) = self.stats.lock() {
            *stats = DetectionStats::default();
        }
        if let Ok(mut report) = self.last_report.lock() {
            *report = None;
        }
    }

    fn run(&self, frames: &[Frame]) -> Result<DetectionResult, ShotError> {
        let report = self.detector.detect(frames)?;
        let result = DetectionResult::from_report(&report)?;

        if let Ok(mut stats) = self.stats.lock() {
            stats.processed_frames += report.analyzed_frames as u64;
            stats.cuts += report.boundaries.cuts.len() as u64;
            stats.transitions += report.boundaries.transitions.len() as u64;
            stats.shots += report.shot_count() as u64;
        }
        if let Ok(mut last) = self.last_report.lock() {
            *last = Some(report);
        }

        Ok(result)
    }
}

impl Drop for ShotBoundaryDetector {
    fn drop(&mut self) {
        info!("🗑️ ShotBoundaryDetector: released");
    }
}
