/// Geometric primitives: boxes, box coding and non-maximum suppression
///
pub mod utils;

/// Multiscale anchor grid generation
///
pub mod anchors;

/// Region similarity and argmax matching of anchors to ground truth
///
pub mod matcher;

/// Training target assignment
///
pub mod labeler;

/// Inference-time decoding and per-class NMS
///
pub mod detection;

/// Parallel processing of many images against shared anchors
///
pub mod batch;

/// Everyday types
///
pub mod prelude;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Errors {
    #[error("Image {width}x{height} is not a multiple of the stride {stride} of level {level}.")]
    InvalidGeometry {
        level: u32,
        stride: u32,
        width: u32,
        height: u32,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Class id {class_id} is outside of [0, {num_classes}).")]
    InvalidClassId { class_id: i64, num_classes: usize },
    #[error("Anchor index {index} is out of range, the anchor set has {total} anchors.")]
    AnchorIndexOutOfRange { index: usize, total: usize },
    #[error("Field `{field}` has {actual} elements, {expected} expected.")]
    CandidateLengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

pub(crate) const EPS: f32 = 0.00001;

/// Approximate comparison with an explicit tolerance
///
pub trait EstimateClose {
    fn almost_same(&self, other: &Self, eps: f32) -> bool;
}
