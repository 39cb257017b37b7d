use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShotError {
    #[error("Distance sequence is empty")]
    EmptyDistances,
    #[error("Histogram length mismatch at pair {index}: {left} vs {right}")]
    HistogramLengthMismatch {
        index: usize,
        left: usize,
        right: usize,
    },
    #[error("Invalid pixel buffer: expected {expected} bytes, got {actual}")]
    InvalidPixelBuffer { expected: usize, actual: usize },
    #[error("Invalid timestamp: {0} ms")]
    InvalidTimestamp(f64),
    #[error("Frame {frame_number} resolution {actual:?} differs from {expected:?}")]
    ResolutionMismatch {
        frame_number: u64,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("Need at least 2 frames, got {0}")]
    NotEnoughFrames(usize),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] json5::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
