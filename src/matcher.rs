use crate::utils::bbox::BoundingBox;
use crate::Errors;
use anyhow::Result;
use nalgebra::DMatrix;

/// Pairwise similarity between two box collections
///
pub trait RegionSimilarity {
    /// Returns the `(anchors.len(), ground_truth.len())` similarity matrix
    ///
    fn compare(&self, anchors: &[BoundingBox], ground_truth: &[BoundingBox]) -> DMatrix<f32>;
}

/// Intersection over union similarity
///
#[derive(Clone, Copy, Debug, Default)]
pub struct IouSimilarity;

impl RegionSimilarity for IouSimilarity {
    fn compare(&self, anchors: &[BoundingBox], ground_truth: &[BoundingBox]) -> DMatrix<f32> {
        DMatrix::from_fn(anchors.len(), ground_truth.len(), |i, j| {
            BoundingBox::iou(&anchors[i], &ground_truth[j])
        })
    }
}

/// Assignment of a single anchor
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Match {
    /// Index of the ground-truth box
    Matched(usize),
    /// Negative (background) anchor
    Unmatched,
    /// Neither positive nor negative, excluded from the losses
    Ignored,
}

impl Match {
    pub fn matched(&self) -> Option<usize> {
        match self {
            Match::Matched(gt) => Some(*gt),
            _ => None,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Match::Matched(_))
    }
}

/// Per-anchor matching result of one image
///
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Matches(Vec<Match>);

impl Matches {
    pub fn as_slice(&self) -> &[Match] {
        &self.0
    }

    pub fn get(&self, anchor: usize) -> Option<Match> {
        self.0.get(anchor).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of anchors matched to a ground-truth box
    ///
    pub fn num_positives(&self) -> usize {
        self.0.iter().filter(|m| m.is_matched()).count()
    }

    pub fn num_negatives(&self) -> usize {
        self.0.iter().filter(|m| **m == Match::Unmatched).count()
    }

    pub fn num_ignored(&self) -> usize {
        self.0.iter().filter(|m| **m == Match::Ignored).count()
    }

    /// Anchors matched to the ground-truth box `gt`
    ///
    pub fn anchors_of(&self, gt: usize) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, m)| **m == Match::Matched(gt))
            .map(|(i, _)| i)
            .collect()
    }
}

impl From<Vec<Match>> for Matches {
    fn from(v: Vec<Match>) -> Self {
        Self(v)
    }
}

/// Argmax matcher options
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatcherOptions {
    /// Anchors whose best similarity is at least this value are matched
    pub matched_threshold: f32,
    /// Anchors whose best similarity is below this value are not matched
    pub unmatched_threshold: f32,
    /// When `true`, anchors below `unmatched_threshold` are negatives and the ones between
    /// the thresholds are ignored; when `false`, the roles are swapped
    pub negatives_lower_than_unmatched: bool,
    /// Every ground-truth box is matched to its most similar anchor regardless of thresholds
    pub force_match_for_each_row: bool,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self::with_threshold(0.5)
    }
}

impl MatcherOptions {
    /// Single threshold setup: no ignored anchors and forced matching
    ///
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            matched_threshold: threshold,
            unmatched_threshold: threshold,
            negatives_lower_than_unmatched: true,
            force_match_for_each_row: true,
        }
    }
}

/// Two-pass argmax matcher
///
/// The first pass takes the best ground-truth box of every anchor and applies the thresholds;
/// the second pass forces every ground-truth box onto its best anchor, overriding the first pass.
/// When several ground-truth boxes share the same best anchor, the lowest ground-truth index
/// wins. Ties in both argmax passes resolve to the lowest index.
///
#[derive(Clone, Debug)]
pub struct ArgMaxMatcher {
    options: MatcherOptions,
}

impl ArgMaxMatcher {
    pub fn new(options: MatcherOptions) -> Result<Self> {
        if options.unmatched_threshold > options.matched_threshold {
            return Err(Errors::InvalidConfiguration(format!(
                "unmatched_threshold {} is greater than matched_threshold {}",
                options.unmatched_threshold, options.matched_threshold
            ))
            .into());
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &MatcherOptions {
        &self.options
    }

    /// Matches the rows (anchors) of `similarity` to its columns (ground truth)
    ///
    pub fn match_similarity(&self, similarity: &DMatrix<f32>) -> Matches {
        let (anchors, ground_truth) = similarity.shape();
        if ground_truth == 0 {
            return Matches(vec![Match::Unmatched; anchors]);
        }

        let (below, between) = if self.options.negatives_lower_than_unmatched {
            (Match::Unmatched, Match::Ignored)
        } else {
            (Match::Ignored, Match::Unmatched)
        };

        let mut matches = similarity
            .row_iter()
            .map(|row| {
                let (gt, value) = argmax(row.iter().copied());
                if value < self.options.unmatched_threshold {
                    below
                } else if value < self.options.matched_threshold {
                    between
                } else {
                    Match::Matched(gt)
                }
            })
            .collect::<Vec<_>>();

        if self.options.force_match_for_each_row && anchors > 0 {
            let mut forced = vec![false; anchors];
            for (gt, column) in similarity.column_iter().enumerate() {
                let (anchor, _) = argmax(column.iter().copied());
                if !forced[anchor] {
                    forced[anchor] = true;
                    matches[anchor] = Match::Matched(gt);
                }
            }
        }

        Matches(matches)
    }
}

/// Index and value of the first maximum; NaN never wins
///
pub(crate) fn argmax(values: impl Iterator<Item = f32>) -> (usize, f32) {
    values
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
}
