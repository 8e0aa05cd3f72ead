pub use crate::anchors::config::{AnchorConfig, AnchorLevelConfig};
pub use crate::anchors::{AnchorLocation, Anchors, LevelGeometry};
pub use crate::batch::{BatchProcessor, BatchRequest, BatchResult, DetectionInput};
pub use crate::detection::{Candidates, Detection, DetectionOptions, Detections, PostProcessor};
pub use crate::labeler::{AnchorLabeler, GroundTruthBox, LabelTargets, LevelGrid};
pub use crate::matcher::{ArgMaxMatcher, IouSimilarity, Match, MatcherOptions, Matches};
pub use crate::utils::bbox::BoundingBox;
pub use crate::utils::box_coder::BoxCoder;
pub use crate::utils::nms::nms;
pub use crate::Errors;
