use crate::anchors::Anchors;
use crate::utils::bbox::BoundingBox;
use crate::utils::box_coder::{BoxCode, BoxCoder};
use crate::utils::nms::nms;
use crate::Errors;
use anyhow::Result;
use log::debug;
use std::sync::Arc;

/// Default cap on the number of detections returned for an image
///
pub const MAX_DETECTIONS_PER_IMAGE: usize = 100;

/// Logit floor conventionally used when pre-selecting candidates
///
pub const MIN_CLASS_SCORE: f32 = -5.0;

pub const DEFAULT_NMS_THRESHOLD: f32 = 0.5;

/// Logistic sigmoid
///
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Post-processing options
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionOptions {
    /// Candidates with a class id outside of `[0, num_classes)` are skipped
    pub num_classes: usize,
    pub nms_threshold: f32,
    pub max_detections_per_image: usize,
    /// When set, candidates with a lower logit are dropped before NMS
    pub min_class_logit: Option<f32>,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            num_classes: 90,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            max_detections_per_image: MAX_DETECTIONS_PER_IMAGE,
            min_class_logit: None,
        }
    }
}

impl DetectionOptions {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            ..Default::default()
        }
    }
}

/// Pre-selected (top-K) network outputs of one image
///
/// All vectors are parallel and must have the same length.
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Candidates {
    pub class_logits: Vec<f32>,
    /// `(dy, dx, dh, dw)` regression outputs
    pub box_deltas: Vec<BoxCode>,
    /// Indices into the full anchor set
    pub anchor_indices: Vec<usize>,
    /// Zero-based predicted class ids
    pub class_ids: Vec<usize>,
    pub level_indices: Vec<u32>,
}

impl Candidates {
    pub fn len(&self) -> usize {
        self.class_logits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.class_logits.is_empty()
    }

    pub fn push(
        &mut self,
        class_logit: f32,
        box_delta: BoxCode,
        anchor_index: usize,
        class_id: usize,
        level_index: u32,
    ) {
        self.class_logits.push(class_logit);
        self.box_deltas.push(box_delta);
        self.anchor_indices.push(anchor_index);
        self.class_ids.push(class_id);
        self.level_indices.push(level_index);
    }

    fn validate(&self) -> Result<()> {
        let expected = self.len();
        for (field, actual) in [
            ("box_deltas", self.box_deltas.len()),
            ("anchor_indices", self.anchor_indices.len()),
            ("class_ids", self.class_ids.len()),
            ("level_indices", self.level_indices.len()),
        ] {
            if actual != expected {
                return Err(Errors::CandidateLengthMismatch {
                    field,
                    expected,
                    actual,
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Final detection
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub image_id: i64,
    /// Box in the original image coordinates
    pub bbox: BoundingBox,
    /// Sigmoid probability
    pub score: f32,
    /// One-based class id, `0` is reserved
    pub class_id: usize,
    pub level_index: u32,
}

/// Detections of one image ordered by descending score
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Detections {
    image_id: i64,
    detections: Vec<Detection>,
}

impl Detections {
    pub fn image_id(&self) -> i64 {
        self.image_id
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.detections
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Boxes as `(x_min, y_min, x_max, y_max)` rows
    ///
    pub fn boxes(&self) -> Vec<[f32; 4]> {
        self.detections.iter().map(|d| d.bbox.as_xyxy()).collect()
    }

    pub fn scores(&self) -> Vec<f32> {
        self.detections.iter().map(|d| d.score).collect()
    }

    pub fn class_ids(&self) -> Vec<usize> {
        self.detections.iter().map(|d| d.class_id).collect()
    }

    pub fn level_indices(&self) -> Vec<u32> {
        self.detections.iter().map(|d| d.level_index).collect()
    }
}

impl IntoIterator for Detections {
    type Item = Detection;
    type IntoIter = std::vec::IntoIter<Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.into_iter()
    }
}

/// Turns network outputs into final detections
///
/// Decodes the candidate boxes against their anchors, runs greedy NMS class by class,
/// keeps the best `max_detections_per_image` and rescales them to the original image.
///
#[derive(Clone, Debug)]
pub struct PostProcessor {
    anchors: Arc<Anchors>,
    options: DetectionOptions,
    coder: BoxCoder,
}

impl PostProcessor {
    pub fn new(anchors: Arc<Anchors>, options: DetectionOptions) -> Result<Self> {
        Self::with_coder(anchors, options, BoxCoder::default())
    }

    pub fn with_coder(
        anchors: Arc<Anchors>,
        options: DetectionOptions,
        coder: BoxCoder,
    ) -> Result<Self> {
        if options.num_classes == 0 {
            return Err(
                Errors::InvalidConfiguration("num_classes must be positive".into()).into(),
            );
        }
        if !(0.0..=1.0).contains(&options.nms_threshold) {
            return Err(Errors::InvalidConfiguration(format!(
                "nms_threshold must be in [0, 1], got {}",
                options.nms_threshold
            ))
            .into());
        }
        Ok(Self {
            anchors,
            options,
            coder,
        })
    }

    pub fn anchors(&self) -> &Arc<Anchors> {
        &self.anchors
    }

    pub fn options(&self) -> &DetectionOptions {
        &self.options
    }

    pub fn generate_detections(
        &self,
        candidates: &Candidates,
        image_id: i64,
        image_scale: f32,
    ) -> Result<Detections> {
        candidates.validate()?;

        let boxes = candidates
            .anchor_indices
            .iter()
            .zip(&candidates.box_deltas)
            .map(|(&index, delta)| {
                self.anchors
                    .get(index)
                    .map(|anchor| self.coder.decode(delta, anchor))
                    .ok_or_else(|| Errors::AnchorIndexOutOfRange {
                        index,
                        total: self.anchors.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let scores = candidates
            .class_logits
            .iter()
            .map(|l| sigmoid(*l))
            .collect::<Vec<_>>();

        let mut per_class = vec![Vec::<usize>::default(); self.options.num_classes];
        for (i, &class_id) in candidates.class_ids.iter().enumerate() {
            if let Some(floor) = self.options.min_class_logit {
                if candidates.class_logits[i] < floor {
                    continue;
                }
            }
            match per_class.get_mut(class_id) {
                Some(bucket) => bucket.push(i),
                None => debug!(
                    "Candidate {} has class id {} outside of [0, {}), skipped",
                    i, class_id, self.options.num_classes
                ),
            }
        }

        let mut detections = Vec::default();
        for (class_id, members) in per_class.iter().enumerate() {
            if members.is_empty() {
                continue;
            }
            let class_boxes = members
                .iter()
                .map(|&i| (boxes[i], scores[i]))
                .collect::<Vec<_>>();
            let keep = nms(&class_boxes, self.options.nms_threshold);
            debug!(
                "Class {}: {} of {} candidates survived NMS",
                class_id,
                keep.len(),
                members.len()
            );
            detections.extend(keep.into_iter().map(|k| {
                let i = members[k];
                Detection {
                    image_id,
                    bbox: boxes[i],
                    score: scores[i],
                    class_id: class_id + 1,
                    level_index: candidates.level_indices[i],
                }
            }));
        }

        detections.sort_by(|a, b| b.score.total_cmp(&a.score));
        detections.truncate(self.options.max_detections_per_image);
        for d in &mut detections {
            d.bbox = d.bbox.scale(image_scale);
        }

        Ok(Detections {
            image_id,
            detections,
        })
    }
}
