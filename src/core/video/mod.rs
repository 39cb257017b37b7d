pub mod classifier;
pub mod config;
pub mod detector;
pub mod distance;
pub mod error;
pub mod frame;
pub mod histogram;
pub mod shots;
pub mod threshold;

pub use classifier::{
    Boundary, BoundaryClassifier, Classification, ClassifierConfig, Cut, CutResetRule,
    GradualTransition,
};
pub use config::{DetectionConfig, FrameRange};
pub use detector::ShotDetector;
pub use distance::{DissimilaritySequencer, DistanceSequence};
pub use error::ShotError;
pub use frame::{Frame, FrameInfo, RawFrame};
pub use histogram::{BinEdges, Histogram, HistogramExtractor};
pub use shots::{encode_keyframes, Keyframe, ShotMarker, ShotReport, ShotStartKind};
pub use threshold::{SequenceStats, ThresholdEstimator, Thresholds};
