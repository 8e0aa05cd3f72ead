use crate::anchors::{Anchors, LevelGeometry};
use crate::matcher::{ArgMaxMatcher, IouSimilarity, Match, MatcherOptions, Matches, RegionSimilarity};
use crate::utils::bbox::BoundingBox;
use crate::utils::box_coder::{BoxCode, BoxCoder};
use crate::Errors;
use anyhow::Result;
use log::debug;
use std::sync::Arc;

/// Class target of anchors without a matched ground-truth box
///
pub const BACKGROUND_CLASS: i32 = -1;

/// Ground-truth object of an image
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundTruthBox {
    pub bbox: BoundingBox,
    /// Zero-based class id, must be in `[0, num_classes)`
    pub class_id: i64,
}

impl GroundTruthBox {
    pub fn new(bbox: BoundingBox, class_id: i64) -> Self {
        Self { bbox, class_id }
    }

    /// Builds the box from a one-based dataset label, `0` is reserved by datasets
    ///
    pub fn from_dataset_label(bbox: BoundingBox, label: u32) -> Self {
        Self {
            bbox,
            class_id: label as i64 - 1,
        }
    }
}

/// Dense `(height, width, anchors_per_location)` grid of per-anchor values of one level
///
#[derive(Clone, Debug, PartialEq)]
pub struct LevelGrid<T> {
    level: u32,
    height: usize,
    width: usize,
    depth: usize,
    data: Vec<T>,
}

impl<T: Clone> LevelGrid<T> {
    fn filled(geometry: &LevelGeometry, value: T) -> Self {
        Self {
            level: geometry.level,
            height: geometry.grid_height,
            width: geometry.grid_width,
            depth: geometry.anchors_per_location,
            data: vec![value; geometry.len()],
        }
    }
}

impl<T> LevelGrid<T> {
    pub fn level(&self) -> u32 {
        self.level
    }

    /// `(height, width, anchors_per_location)`
    ///
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.depth)
    }

    pub fn get(&self, row: usize, col: usize, k: usize) -> Option<&T> {
        if row >= self.height || col >= self.width || k >= self.depth {
            return None;
        }
        self.data.get(self.position(row, col, k))
    }

    /// Row-major values, cell after cell
    ///
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    fn position(&self, row: usize, col: usize, k: usize) -> usize {
        (row * self.width + col) * self.depth + k
    }
}

impl LevelGrid<BoxCode> {
    /// Values as a `(height, width, anchors_per_location * 4)` tensor
    ///
    pub fn to_flat(&self) -> Vec<f32> {
        self.data.iter().flatten().copied().collect()
    }
}

/// Training targets of one image
///
#[derive(Clone, Debug)]
pub struct LabelTargets {
    /// Per-level class targets, from the lowest level to the highest
    pub class_targets: Vec<LevelGrid<i32>>,
    /// Per-level `(dy, dx, dh, dw)` regression targets
    pub box_targets: Vec<LevelGrid<BoxCode>>,
    /// Number of anchors with a matched ground-truth box
    pub num_positives: usize,
    pub matches: Matches,
}

/// Assigns classification and regression targets to the anchors
///
/// Matched anchors get the class of their ground-truth box and its encoding relative to the
/// anchor; all others get [`BACKGROUND_CLASS`] and a zero regression target.
///
#[derive(Clone, Debug)]
pub struct AnchorLabeler<S = IouSimilarity> {
    anchors: Arc<Anchors>,
    num_classes: usize,
    similarity: S,
    matcher: ArgMaxMatcher,
    coder: BoxCoder,
}

impl AnchorLabeler<IouSimilarity> {
    /// IoU labeler with a single `match_threshold` and forced matching
    ///
    pub fn new(anchors: Arc<Anchors>, num_classes: usize, match_threshold: f32) -> Result<Self> {
        Self::with_options(
            anchors,
            num_classes,
            IouSimilarity,
            MatcherOptions::with_threshold(match_threshold),
            BoxCoder::default(),
        )
    }
}

impl<S> AnchorLabeler<S>
where
    S: RegionSimilarity,
{
    pub fn with_options(
        anchors: Arc<Anchors>,
        num_classes: usize,
        similarity: S,
        options: MatcherOptions,
        coder: BoxCoder,
    ) -> Result<Self> {
        if num_classes == 0 {
            return Err(
                Errors::InvalidConfiguration("num_classes must be positive".into()).into(),
            );
        }
        Ok(Self {
            anchors,
            num_classes,
            similarity,
            matcher: ArgMaxMatcher::new(options)?,
            coder,
        })
    }

    pub fn anchors(&self) -> &Arc<Anchors> {
        &self.anchors
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Labels the anchors from parallel box and label slices
    ///
    pub fn label(&self, boxes: &[BoundingBox], class_ids: &[i64]) -> Result<LabelTargets> {
        if boxes.len() != class_ids.len() {
            return Err(Errors::CandidateLengthMismatch {
                field: "class_ids",
                expected: boxes.len(),
                actual: class_ids.len(),
            }
            .into());
        }
        let ground_truth = boxes
            .iter()
            .zip(class_ids)
            .map(|(b, c)| GroundTruthBox::new(*b, *c))
            .collect::<Vec<_>>();
        self.label_anchors(&ground_truth)
    }

    /// Labels the anchors with the ground truth of one image
    ///
    pub fn label_anchors(&self, ground_truth: &[GroundTruthBox]) -> Result<LabelTargets> {
        if let Some(gt) = ground_truth
            .iter()
            .find(|gt| gt.class_id < 0 || gt.class_id as usize >= self.num_classes)
        {
            return Err(Errors::InvalidClassId {
                class_id: gt.class_id,
                num_classes: self.num_classes,
            }
            .into());
        }

        let gt_boxes = ground_truth.iter().map(|gt| gt.bbox).collect::<Vec<_>>();
        let similarity = self.similarity.compare(self.anchors.boxes(), &gt_boxes);
        let matches = self.matcher.match_similarity(&similarity);

        let levels = self.anchors.levels();
        let mut class_targets = levels
            .iter()
            .map(|l| LevelGrid::filled(l, BACKGROUND_CLASS))
            .collect::<Vec<_>>();
        let mut box_targets = levels
            .iter()
            .map(|l| LevelGrid::filled(l, [0.0_f32; 4]))
            .collect::<Vec<_>>();

        for ((m, location), anchor) in matches
            .as_slice()
            .iter()
            .zip(self.anchors.locations())
            .zip(self.anchors.boxes())
        {
            if let Match::Matched(gt) = m {
                let classes = &mut class_targets[location.level_index];
                let position = classes.position(location.row, location.col, location.config);
                classes.data[position] = ground_truth[*gt].class_id as i32;
                box_targets[location.level_index].data[position] =
                    self.coder.encode(&gt_boxes[*gt], anchor);
            }
        }

        let num_positives = matches.num_positives();
        debug!(
            "{} positive and {} ignored anchors out of {} for {} ground-truth boxes",
            num_positives,
            matches.num_ignored(),
            matches.len(),
            ground_truth.len()
        );

        Ok(LabelTargets {
            class_targets,
            box_targets,
            num_positives,
            matches,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::anchors::config::AnchorConfig;
    use crate::anchors::Anchors;
    use crate::labeler::{AnchorLabeler, GroundTruthBox, BACKGROUND_CLASS};
    use crate::matcher::Match;
    use crate::utils::bbox::BoundingBox;
    use crate::utils::box_coder::BoxCoder;
    use crate::{EstimateClose, Errors};
    use std::sync::Arc;

    fn small_anchors() -> Arc<Anchors> {
        // level 3: 2x2 cells of 8x8 anchors, level 4: one 16x16 anchor covering the image
        Arc::new(
            Anchors::new(
                AnchorConfig::default()
                    .with_levels(3, 4)
                    .with_num_scales(1)
                    .with_aspect_ratios(&[(1.0, 1.0)])
                    .with_anchor_scale(1.0)
                    .with_image_size(16, 16),
            )
            .unwrap(),
        )
    }

    #[test]
    fn exact_anchor_match() {
        let labeler = AnchorLabeler::new(small_anchors(), 5, 0.5).unwrap();
        let gt = [GroundTruthBox::new(BoundingBox::new(0.0, 0.0, 16.0, 16.0), 3)];
        let targets = labeler.label_anchors(&gt).unwrap();

        assert_eq!(targets.num_positives, 1);
        assert_eq!(targets.class_targets.len(), 2);
        assert_eq!(targets.class_targets[1].shape(), (1, 1, 1));
        assert_eq!(targets.class_targets[1].get(0, 0, 0), Some(&3));
        for c in targets.box_targets[1].get(0, 0, 0).unwrap() {
            assert!(c.abs() < 1e-6);
        }
        assert!(targets.class_targets[0]
            .as_slice()
            .iter()
            .all(|c| *c == BACKGROUND_CLASS));
        assert_eq!(targets.matches.get(4), Some(Match::Matched(0)));
    }

    #[test]
    fn no_ground_truth() {
        let anchors = Arc::new(Anchors::new(AnchorConfig::default()).unwrap());
        let labeler = AnchorLabeler::new(anchors.clone(), 90, 0.5).unwrap();
        let targets = labeler.label_anchors(&[]).unwrap();

        assert_eq!(targets.num_positives, 0);
        assert_eq!(targets.class_targets.len(), 5);
        for (grid, level) in targets.class_targets.iter().zip(anchors.levels()) {
            assert_eq!(
                grid.shape(),
                (level.grid_height, level.grid_width, level.anchors_per_location)
            );
            assert!(grid.as_slice().iter().all(|c| *c == BACKGROUND_CLASS));
        }
        for grid in &targets.box_targets {
            assert!(grid.to_flat().iter().all(|c| *c == 0.0));
        }
    }

    #[test]
    fn grids_follow_generation_order() {
        let anchors = Arc::new(
            Anchors::new(AnchorConfig::default().with_image_size(256, 128)).unwrap(),
        );
        let labeler = AnchorLabeler::new(anchors.clone(), 10, 0.5).unwrap();
        let gt = [
            GroundTruthBox::new(BoundingBox::new(10.0, 20.0, 60.0, 90.0), 1),
            GroundTruthBox::new(BoundingBox::new(40.0, 100.0, 120.0, 250.0), 7),
            GroundTruthBox::new(BoundingBox::new(0.0, 0.0, 128.0, 256.0), 4),
        ];
        let targets = labeler.label_anchors(&gt).unwrap();
        assert!(targets.num_positives >= 3);

        let flat_classes = targets
            .class_targets
            .iter()
            .flat_map(|g| g.as_slice().iter().copied())
            .collect::<Vec<_>>();
        let flat_boxes = targets
            .box_targets
            .iter()
            .flat_map(|g| g.as_slice().iter().copied())
            .collect::<Vec<_>>();
        assert_eq!(flat_classes.len(), anchors.len());

        let coder = BoxCoder::default();
        for (i, m) in targets.matches.as_slice().iter().enumerate() {
            match m {
                Match::Matched(j) => {
                    assert_eq!(flat_classes[i] as i64, gt[*j].class_id);
                    let expected = coder.encode(&gt[*j].bbox, &anchors.boxes()[i]);
                    for (a, b) in flat_boxes[i].iter().zip(expected) {
                        assert!((a - b).abs() < 1e-6);
                    }
                    // decoding the target restores the ground truth
                    let restored = coder.decode(&flat_boxes[i], &anchors.boxes()[i]);
                    assert!(restored.almost_same(&gt[*j].bbox, 1e-2));
                }
                _ => {
                    assert_eq!(flat_classes[i], BACKGROUND_CLASS);
                    assert_eq!(flat_boxes[i], [0.0; 4]);
                }
            }
        }
        for j in 0..gt.len() {
            assert!(!targets.matches.anchors_of(j).is_empty());
        }
    }

    #[test]
    fn dataset_labels_are_one_based() {
        let labeler = AnchorLabeler::new(small_anchors(), 2, 0.5).unwrap();
        let gt = [GroundTruthBox::from_dataset_label(
            BoundingBox::new(0.0, 0.0, 16.0, 16.0),
            2,
        )];
        let targets = labeler.label_anchors(&gt).unwrap();
        assert_eq!(targets.class_targets[1].get(0, 0, 0), Some(&1));

        let gt = [GroundTruthBox::from_dataset_label(
            BoundingBox::new(0.0, 0.0, 16.0, 16.0),
            0,
        )];
        let err = labeler.label_anchors(&gt).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Errors>(),
            Some(&Errors::InvalidClassId {
                class_id: -1,
                num_classes: 2
            })
        );
    }

    #[test]
    fn parallel_slices() {
        let labeler = AnchorLabeler::new(small_anchors(), 2, 0.5).unwrap();
        let boxes = [BoundingBox::new(0.0, 0.0, 8.0, 8.0)];
        let targets = labeler.label(&boxes, &[1]).unwrap();
        assert_eq!(targets.class_targets[0].get(0, 0, 0), Some(&1));
        assert_eq!(targets.num_positives, 1);

        let err = labeler.label(&boxes, &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Errors>(),
            Some(Errors::CandidateLengthMismatch { .. })
        ));
    }

    #[test]
    fn zero_classes_are_rejected() {
        assert!(AnchorLabeler::new(small_anchors(), 0, 0.5).is_err());
    }
}
