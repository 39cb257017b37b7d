//! 镜头边界检测流水线：直方图 → 距离序列 → 阈值 → 分类

use log::{debug, info, warn};

use rayon::{ThreadPool, ThreadPoolBuilder};

use super::classifier::{BoundaryClassifier, Classification};
use super::config::DetectionConfig;
use super::distance::DissimilaritySequencer;
use super::error::ShotError;
use super::frame::{Frame, FrameInfo};
use super::histogram::{Histogram, HistogramExtractor};
use super::shots::ShotReport;
use super::threshold::{SequenceStats, ThresholdEstimator};

pub struct ShotDetector {
    config: DetectionConfig,
    extractor: HistogramExtractor,
    estimator: ThresholdEstimator,
    classifier: BoundaryClassifier,
    // 构造时建一次，批量检测复用
    pool: Option<ThreadPool>,
    // 增量模式：只保留直方图，像素随帧释放
    pending: Vec<(FrameInfo, Histogram)>,
}

impl ShotDetector {
    pub fn new() -> Self {
        let config = DetectionConfig::default();
        let pool = build_pool(&config)
            .map_err(|e| warn!("⚠️ Falling back to global rayon pool: {}", e))
            .ok();
        Self::from_parts(config, pool)
    }

    pub fn with_config(config: DetectionConfig) -> Result<Self, ShotError> {
        config.validate()?;
        let pool = build_pool(&config)?;
        Ok(Self::from_parts(config, Some(pool)))
    }

    fn from_parts(config: DetectionConfig, pool: Option<ThreadPool>) -> Self {
        Self {
            extractor: HistogramExtractor::with_edges(config.bin_edges.clone()),
            estimator: config.estimator(),
            classifier: BoundaryClassifier::with_config(config.classifier_config()),
            pool,
            pending: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// 批量检测，直方图并行提取
    pub fn detect(&self, frames: &[Frame]) -> Result<ShotReport, ShotError> {
        let selected: Vec<&Frame> = frames
            .iter()
            .filter(|f| self.in_range(f.frame_number))
            .collect();

        if selected.len() < 2 {
            return Err(ShotError::NotEnoughFrames(selected.len()));
        }
        check_resolution(selected.iter().map(|f| FrameInfo::from_frame(f)))?;

        info!(
            "🎬 ShotDetector: analyzing {} of {} frames",
            selected.len(),
            frames.len()
        );

        let histograms = match &self.pool {
            Some(pool) => pool.install(|| self.extractor.extract_all(&selected)),
            None => self.extractor.extract_all(&selected),
        };
        let infos: Vec<FrameInfo> = selected
            .iter()
            .map(|f| FrameInfo::from_frame(f))
            .collect();
        self.analyze(&infos, &histograms)
    }

    /// 增量喂帧；范围外的帧直接忽略，返回是否被接收
    pub fn push_frame(&mut self, frame: &Frame) -> Result<bool, ShotError> {
        if !self.in_range(frame.frame_number) {
            return Ok(false);
        }

        let info = FrameInfo::from_frame(frame);
        if let Some((first, _)) = self.pending.first() {
            if (first.width, first.height) != (info.width, info.height) {
                return Err(ShotError::ResolutionMismatch {
                    frame_number: info.frame_number,
                    expected: (first.width, first.height),
                    actual: (info.width, info.height),
                });
            }
        }

        self.pending.push((info, self.extractor.extract(frame)));
        Ok(true)
    }

    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    /// 对已接收的帧运行检测并清空缓冲
    pub fn finish(&mut self) -> Result<ShotReport, ShotError> {
        let (infos, histograms): (Vec<FrameInfo>, Vec<Histogram>) =
            std::mem::take(&mut self.pending).into_iter().unzip();

        if infos.len() < 2 {
            return Err(ShotError::NotEnoughFrames(infos.len()));
        }
        self.analyze(&infos, &histograms)
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }

    fn in_range(&self, frame_number: u64) -> bool {
        self.config
            .frame_range
            .map_or(true, |r| r.contains(frame_number))
    }

    fn analyze(
        &self,
        infos: &[FrameInfo],
        histograms: &[Histogram],
    ) -> Result<ShotReport, ShotError> {
        let start_frame = self
            .config
            .start_frame_offset
            .unwrap_or(infos[0].frame_number);

        let distances = DissimilaritySequencer::sequence(histograms)?;
        let stats = SequenceStats::of(&distances)?;
        let thresholds = self.estimator.thresholds_for(&stats);

        debug!(
            "📈 mean={:.2} std_dev={:.2} TB={:.2} TS={:.2}",
            stats.mean, stats.std_dev, thresholds.cut, thresholds.transition
        );

        let boundaries = if stats.is_flat() && self.config.skip_flat_sequences {
            warn!(
                "⚠️ Flat distance sequence ({} values of {:.2}), skipped",
                distances.len(),
                stats.mean
            );
            Classification::default()
        } else {
            if stats.is_flat() {
                // 零方差时 TB = mean，每个距离都会被判为硬切
                warn!(
                    "⚠️ Flat distance sequence ({} values of {:.2}), TB equals every distance",
                    distances.len(),
                    stats.mean
                );
            }
            self.classifier.classify(&distances, &thresholds, start_frame)
        };

        info!(
            "✓ Found {} cuts, {} gradual transitions",
            boundaries.cuts.len(),
            boundaries.transitions.len()
        );

        Ok(ShotReport::build(
            boundaries,
            Some(thresholds),
            start_frame,
            infos,
        ))
    }
}

impl Default for ShotDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn build_pool(config: &DetectionConfig) -> Result<ThreadPool, ShotError> {
    let threads = config.threads();
    debug!("🧵 Building histogram pool with {} threads", threads);
    Ok(ThreadPoolBuilder::new().num_threads(threads).build()?)
}

fn check_resolution(mut infos: impl Iterator<Item = FrameInfo>) -> Result<(), ShotError> {
    let Some(first) = infos.next() else {
        return Ok(());
    };

    for info in infos {
        if (info.width, info.height) != (first.width, first.height) {
            return Err(ShotError::ResolutionMismatch {
                frame_number: info.frame_number,
                expected: (first.width, first.height),
                actual: (info.width, info.height),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::classifier::{Cut, CutResetRule, GradualTransition};
    use crate::core::video::config::FrameRange;

    fn create_test_frame(width: u32, height: u32, fill: u8, frame_number: u64) -> Frame {
        let data = vec![fill; (width * height * 3) as usize];
        Frame::new(width, height, data, frame_number as f64 * 40.0, frame_number).unwrap()
    }

    /// 每帧的前 `dark` 个像素为 0，其余为 200
    fn split_frame(dark: usize, frame_number: u64) -> Frame {
        let mut data = vec![200u8; 10 * 10 * 3];
        data[..dark * 3].fill(0);
        Frame::new(10, 10, data, frame_number as f64 * 40.0, frame_number).unwrap()
    }

    /// 距离为 2 * |dark[i+1] - dark[i]| 的帧序列
    fn frames_from_dark_counts(dark: &[usize], first: u64) -> Vec<Frame> {
        dark.iter()
            .enumerate()
            .map(|(i, &d)| split_frame(d, first + i as u64))
            .collect()
    }

    #[test]
    fn test_single_hard_cut() {
        // 单个尖峰需要足够长的序列才能超过 mean + 11 * std_dev
        let frames: Vec<Frame> = (0..200)
            .map(|i| create_test_frame(8, 8, if i < 100 { 30 } else { 220 }, i))
            .collect();

        let report = ShotDetector::new().detect(&frames).unwrap();

        assert_eq!(report.boundaries.cuts, vec![Cut::at(100)]);
        assert!(report.boundaries.transitions.is_empty());
        assert_eq!(report.shots.len(), 1);
        assert_eq!(report.shots[0].frame_number, 101);
        let secs = report.shots[0].timestamp_secs.unwrap();
        assert!((secs - 4.04).abs() < 1e-6);
    }

    #[test]
    fn test_identical_frames_all_cuts() {
        // 距离全为 0，TB = TS = 0，每个位置都满足 d >= TB
        let frames: Vec<Frame> = (0..10).map(|i| create_test_frame(8, 8, 90, i)).collect();
        let report = ShotDetector::new().detect(&frames).unwrap();

        let thresholds = report.thresholds.unwrap();
        assert_eq!(thresholds.cut, 0.0);
        assert_eq!(thresholds.transition, 0.0);
        let expected: Vec<Cut> = (1..=9).map(Cut::at).collect();
        assert_eq!(report.boundaries.cuts, expected);
    }

    #[test]
    fn test_two_frames_black_to_white() {
        let frames = vec![
            create_test_frame(8, 8, 0, 0),
            create_test_frame(8, 8, 255, 1),
        ];
        let report = ShotDetector::new().detect(&frames).unwrap();

        assert_eq!(report.analyzed_frames, 2);
        assert_eq!(report.boundaries.cuts, vec![Cut::at(1)]);
        assert!(report.boundaries.transitions.is_empty());
        // 终点帧 2 不在输入中，没有时间戳
        assert_eq!(report.shots[0].frame_number, 2);
        assert_eq!(report.shots[0].timestamp_secs, None);
    }

    #[test]
    fn test_skip_flat_sequences() {
        let config = DetectionConfig {
            skip_flat_sequences: true,
            ..Default::default()
        };
        let detector = ShotDetector::with_config(config).unwrap();

        let frames: Vec<Frame> = (0..10).map(|i| create_test_frame(8, 8, 90, i)).collect();
        let report = detector.detect(&frames).unwrap();
        assert!(report.boundaries.is_empty());
        assert!(report.shots.is_empty());
        assert!(report.thresholds.is_some());

        let frames = vec![
            create_test_frame(8, 8, 0, 0),
            create_test_frame(8, 8, 255, 1),
        ];
        assert!(detector.detect(&frames).unwrap().boundaries.is_empty());
    }

    #[test]
    fn test_fractional_timestamps() {
        // 29.97fps
        let frames: Vec<Frame> = (0..200u64)
            .map(|i| {
                let fill = if i < 100 { 30 } else { 220 };
                let data = vec![fill; 8 * 8 * 3];
                Frame::new(8, 8, data, i as f64 * 33.3667, i).unwrap()
            })
            .collect();

        let report = ShotDetector::new().detect(&frames).unwrap();
        let secs = report.shots[0].timestamp_secs.unwrap();
        assert!((secs - 101.0 * 0.0333667).abs() < 1e-6);
    }

    #[test]
    fn test_parallelism_setting_matches_default() {
        let dark = [0, 1, 5, 6, 10, 18, 21, 24, 25, 26];
        let frames = frames_from_dark_counts(&dark, 0);
        let config = DetectionConfig {
            cut_std_dev_multiplier: 2.0,
            transition_mean_multiplier: 0.5,
            ..Default::default()
        };

        let default_report = ShotDetector::with_config(config.clone())
            .unwrap()
            .detect(&frames)
            .unwrap();

        let detector = ShotDetector::with_config(DetectionConfig {
            parallelism: 2,
            ..config
        })
        .unwrap();
        // 同一个检测器多次调用复用线程池
        for _ in 0..3 {
            assert_eq!(detector.detect(&frames).unwrap(), default_report);
        }
    }

    #[test]
    fn test_mixed_sequence_end_to_end() {
        // 每帧亮暗两箱，距离 = 2 * 差值，即 [1,4,1,4,8,3,3,1,1] * 2
        let dark = [0, 1, 5, 6, 10, 18, 21, 24, 25, 26];
        let frames = frames_from_dark_counts(&dark, 1000);

        // 距离 [2,8,2,8,16,6,6,2,2]：TB ≈ 14.51，TS ≈ 2.89
        let config = DetectionConfig {
            cut_std_dev_multiplier: 2.0,
            transition_mean_multiplier: 0.5,
            ..Default::default()
        };
        let report = ShotDetector::with_config(config)
            .unwrap()
            .detect(&frames)
            .unwrap();

        let thresholds = report.thresholds.unwrap();
        assert!(thresholds.cut > 8.0 && thresholds.cut <= 16.0);
        assert!(thresholds.transition > 2.0 && thresholds.transition <= 6.0);
        assert_eq!(report.start_frame, 1000);
        assert_eq!(report.boundaries.cuts, vec![Cut::at(1005)]);
        assert_eq!(
            report.boundaries.transitions,
            vec![GradualTransition {
                start_frame: 1002,
                end_frame: 1006
            }]
        );
    }

    #[test]
    fn test_same_index_rule_end_to_end() {
        let dark = [0, 1, 5, 6, 10, 18, 21, 24, 25, 26];
        let frames = frames_from_dark_counts(&dark, 0);
        let config = DetectionConfig {
            cut_std_dev_multiplier: 2.0,
            transition_mean_multiplier: 0.5,
            cut_reset: CutResetRule::SameIndex,
            ..Default::default()
        };
        let report = ShotDetector::with_config(config)
            .unwrap()
            .detect(&frames)
            .unwrap();

        assert_eq!(report.boundaries.cuts, vec![Cut::at(5)]);
        assert_eq!(
            report.boundaries.transitions,
            vec![GradualTransition {
                start_frame: 2,
                end_frame: 4
            }]
        );
    }

    #[test]
    fn test_frame_range_and_offset() {
        let dark = [0, 1, 5, 6, 10, 18, 21, 24, 25, 26];
        let mut frames = vec![
            create_test_frame(10, 10, 0, 0),
            create_test_frame(10, 10, 255, 1),
        ];
        frames.extend(frames_from_dark_counts(&dark, 2));

        let config = DetectionConfig {
            cut_std_dev_multiplier: 2.0,
            transition_mean_multiplier: 0.5,
            frame_range: Some(FrameRange { first: 2, last: 11 }),
            start_frame_offset: Some(500),
            ..Default::default()
        };
        let report = ShotDetector::with_config(config)
            .unwrap()
            .detect(&frames)
            .unwrap();

        assert_eq!(report.analyzed_frames, 10);
        assert_eq!(report.start_frame, 500);
        assert_eq!(report.boundaries.cuts, vec![Cut::at(505)]);
    }

    #[test]
    fn test_incremental_matches_batch() {
        let dark = [0, 1, 5, 6, 10, 18, 21, 24, 25, 26];
        let frames = frames_from_dark_counts(&dark, 0);
        let config = DetectionConfig {
            cut_std_dev_multiplier: 2.0,
            transition_mean_multiplier: 0.5,
            ..Default::default()
        };

        let batch = ShotDetector::with_config(config.clone())
            .unwrap()
            .detect(&frames)
            .unwrap();

        let mut detector = ShotDetector::with_config(config).unwrap();
        for frame in &frames {
            assert!(detector.push_frame(frame).unwrap());
        }
        assert_eq!(detector.pending_frames(), 10);
        let incremental = detector.finish().unwrap();

        assert_eq!(batch, incremental);
        assert_eq!(detector.pending_frames(), 0);
    }

    #[test]
    fn test_not_enough_frames() {
        let err = ShotDetector::new()
            .detect(&[create_test_frame(4, 4, 0, 0)])
            .unwrap_err();
        assert!(matches!(err, ShotError::NotEnoughFrames(1)));

        let mut detector = ShotDetector::new();
        assert!(matches!(detector.finish(), Err(ShotError::NotEnoughFrames(0))));
    }

    #[test]
    fn test_resolution_mismatch() {
        let frames = vec![
            create_test_frame(4, 4, 0, 0),
            create_test_frame(4, 4, 0, 1),
            create_test_frame(8, 4, 0, 2),
        ];
        let err = ShotDetector::new().detect(&frames).unwrap_err();
        assert!(matches!(
            err,
            ShotError::ResolutionMismatch {
                frame_number: 2,
                ..
            }
        ));

        let mut detector = ShotDetector::new();
        detector.push_frame(&frames[0]).unwrap();
        assert!(detector.push_frame(&frames[2]).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DetectionConfig {
            cut_std_dev_multiplier: f64::NAN,
            ..Default::default()
        };
        assert!(ShotDetector::with_config(config).is_err());
    }
}
