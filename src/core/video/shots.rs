//! 镜头报告 - 由边界推导每个镜头的起始帧与时间戳

use std::collections::BTreeMap;
use std::io::Cursor;

use image::ImageOutputFormat;
use log::warn;
use serde::Serialize;

use super::classifier::Classification;
use super::error::ShotError;
use super::frame::{Frame, FrameInfo};
use super::threshold::Thresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotStartKind {
    Cut,
    Gradual,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShotMarker {
    pub frame_number: u64,
    /// 帧号不在分析范围内时为空
    pub timestamp_secs: Option<f64>,
    pub kind: ShotStartKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShotReport {
    pub analyzed_frames: usize,
    pub start_frame: u64,
    pub thresholds: Option<Thresholds>,
    #[serde(flatten)]
    pub boundaries: Classification,
    pub shots: Vec<ShotMarker>,
}

impl ShotReport {
    /// 硬切以后一帧开始新镜头；渐变取起始帧的下一帧作为关键帧
    pub fn build(
        boundaries: Classification,
        thresholds: Option<Thresholds>,
        start_frame: u64,
        frames: &[FrameInfo],
    ) -> Self {
        let timestamps: BTreeMap<u64, f64> = frames
            .iter()
            .map(|f| (f.frame_number, f.timestamp_ms))
            .collect();

        let mut starts: BTreeMap<u64, ShotStartKind> = BTreeMap::new();
        for cut in &boundaries.cuts {
            starts.entry(cut.end_frame).or_insert(ShotStartKind::Cut);
        }
        for gradual in &boundaries.transitions {
            starts
                .entry(gradual.start_frame + 1)
                .or_insert(ShotStartKind::Gradual);
        }

        let shots = starts
            .into_iter()
            .map(|(frame_number, kind)| ShotMarker {
                frame_number,
                timestamp_secs: timestamps
                    .get(&frame_number)
                    .map(|&ms| ms / 1000.0),
                kind,
            })
            .collect();

        Self {
            analyzed_frames: frames.len(),
            start_frame,
            thresholds,
            boundaries,
            shots,
        }
    }

    pub fn shot_count(&self) -> usize {
        self.shots.len()
    }

    pub fn to_json(&self) -> Result<String, ShotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone)]
pub struct Keyframe {
    pub frame_number: u64,
    pub timestamp_ms: f64,
    pub width: u32,
    pub height: u32,
    pub jpeg_data: Vec<u8>,
}

pub fn compress_to_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, ShotError> {
    let img = frame.to_image().ok_or(ShotError::InvalidPixelBuffer {
        expected: frame.pixel_count() * 3,
        actual: frame.data.len(),
    })?;

    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageOutputFormat::Jpeg(quality))?;
    Ok(buffer.into_inner())
}

/// 为每个镜头起点编码一张 JPEG；起点帧不在 `frames` 中时跳过
pub fn encode_keyframes(
    frames: &[Frame],
    report: &ShotReport,
    quality: u8,
) -> Result<Vec<Keyframe>, ShotError> {
    let by_number: BTreeMap<u64, &Frame> = frames.iter().map(|f| (f.frame_number, f)).collect();

    let mut keyframes = Vec::with_capacity(report.shots.len());
    for shot in &report.shots {
        let Some(frame) = by_number.get(&shot.frame_number) else {
            warn!("⚠️ Shot start frame {} not available", shot.frame_number);
            continue;
        };

        keyframes.push(Keyframe {
            frame_number: frame.frame_number,
            timestamp_ms: frame.timestamp_ms(),
            width: frame.width,
            height: frame.height,
            jpeg_data: compress_to_jpeg(frame, quality)?,
        });
    }

    Ok(keyframes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::classifier::{Cut, GradualTransition};

    fn infos(first: u64, count: u64) -> Vec<FrameInfo> {
        (first..first + count)
            .map(|n| FrameInfo {
                width: 4,
                height: 4,
                timestamp_ms: n as f64 * 40.0,
                frame_number: n,
            })
            .collect()
    }

    fn sample_boundaries() -> Classification {
        Classification {
            cuts: vec![Cut::at(5)],
            transitions: vec![
                GradualTransition {
                    start_frame: 2,
                    end_frame: 6,
                },
                GradualTransition {
                    start_frame: 5,
                    end_frame: 7,
                },
            ],
        }
    }

    #[test]
    fn test_shot_starts_sorted_and_deduplicated() {
        let report = ShotReport::build(sample_boundaries(), None, 0, &infos(0, 10));

        let frames: Vec<u64> = report.shots.iter().map(|s| s.frame_number).collect();
        assert_eq!(frames, vec![3, 6]);
        assert_eq!(report.shots[0].kind, ShotStartKind::Gradual);
        // 6 同时是硬切终点与渐变关键帧，保留硬切
        assert_eq!(report.shots[1].kind, ShotStartKind::Cut);
        assert_eq!(report.shots[1].timestamp_secs, Some(0.24));
    }

    #[test]
    fn test_fractional_timestamp_in_report() {
        // 29.97fps：第 3 帧位于 100.1ms
        let frames: Vec<FrameInfo> = (0..10u64)
            .map(|n| FrameInfo {
                width: 4,
                height: 4,
                timestamp_ms: n as f64 * 33.3667,
                frame_number: n,
            })
            .collect();
        let report = ShotReport::build(sample_boundaries(), None, 0, &frames);

        let secs = report.shots[0].timestamp_secs.unwrap();
        assert!((secs - 0.1001001).abs() < 1e-9);
        assert_eq!(report.shot_count(), 2);
    }

    #[test]
    fn test_missing_timestamp() {
        let report = ShotReport::build(sample_boundaries(), None, 0, &infos(0, 4));
        assert_eq!(report.shots[0].timestamp_secs, Some(0.12));
        assert_eq!(report.shots[1].timestamp_secs, None);
    }

    #[test]
    fn test_json_contains_boundaries() {
        let report = ShotReport::build(
            sample_boundaries(),
            Some(Thresholds::new(7.0, 2.0)),
            0,
            &infos(0, 10),
        );
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["cuts"][0]["start_frame"], 5);
        assert_eq!(json["transitions"][1]["end_frame"], 7);
        assert_eq!(json["thresholds"]["cut"], 7.0);
        assert_eq!(json["shots"][1]["kind"], "cut");
        assert_eq!(json["analyzed_frames"], 10);
    }

    #[test]
    fn test_encode_keyframes() {
        let frames: Vec<Frame> = (0..10u64)
            .map(|n| Frame::new(4, 4, vec![(n * 20) as u8; 48], n as f64 * 40.0, n).unwrap())
            .collect();
        let report = ShotReport::build(sample_boundaries(), None, 0, &infos(0, 10));

        let keyframes = encode_keyframes(&frames[..5], &report, 70).unwrap();
        assert_eq!(keyframes.len(), 1);
        assert_eq!(keyframes[0].frame_number, 3);
        assert_eq!(keyframes[0].timestamp_ms, 120.0);
        // JPEG SOI 标记
        assert_eq!(&keyframes[0].jpeg_data[..2], &[0xFF, 0xD8]);
    }
}
