use crate::utils::bbox::BoundingBox;
use itertools::Itertools;

#[derive(Clone, Debug)]
struct Candidate<'a> {
    bbox: &'a BoundingBox,
    area: f32,
    score: f32,
    index: usize,
}

impl<'a> Candidate<'a> {
    pub fn new(bbox: &'a BoundingBox, score: f32, index: usize) -> Self {
        Self {
            bbox,
            area: pixel_area(bbox),
            score,
            index,
        }
    }
}

/// Area with the pixel-inclusive convention `(x2 - x1 + 1) * (y2 - y1 + 1)`
///
pub fn pixel_area(b: &BoundingBox) -> f32 {
    (b.x_max() - b.x_min() + 1.0) * (b.y_max() - b.y_min() + 1.0)
}

/// IoU under the pixel-inclusive convention used by the greedy NMS
///
pub fn pixel_iou(l: &BoundingBox, r: &BoundingBox) -> f32 {
    pixel_overlap(l, pixel_area(l), r, pixel_area(r))
}

fn pixel_overlap(l: &BoundingBox, l_area: f32, r: &BoundingBox, r_area: f32) -> f32 {
    let w = (l.x_max().min(r.x_max()) - l.x_min().max(r.x_min()) + 1.0).max(0.0);
    let h = (l.y_max().min(r.y_max()) - l.y_min().max(r.y_min()) + 1.0).max(0.0);
    let intersection = w * h;
    intersection / (l_area + r_area - intersection)
}

/// Greedy NMS algorithm implementation
///
/// # Parameters
/// * `detections` - boxes with their scores;
/// * `nms_threshold` - a box is dropped when its pixel-inclusive IoU with an already kept box is greater than the threshold.
///
/// Returns the indices of the kept boxes in `detections`, ordered by descending score. Equal
/// scores keep the input order.
///
pub fn nms(detections: &[(BoundingBox, f32)], nms_threshold: f32) -> Vec<usize> {
    let nms_boxes = detections
        .iter()
        .enumerate()
        .map(|(index, (b, score))| Candidate::new(b, *score, index))
        .sorted_by(|a, b| b.score.total_cmp(&a.score))
        .collect::<Vec<_>>();

    let mut excluded = vec![false; nms_boxes.len()];
    let mut keep = Vec::default();

    for (index, cb) in nms_boxes.iter().enumerate() {
        if excluded[index] {
            continue;
        }
        keep.push(cb.index);

        for (offset, ob) in nms_boxes[index + 1..].iter().enumerate() {
            let other = index + 1 + offset;
            if excluded[other] {
                continue;
            }

            let metric = pixel_overlap(cb.bbox, cb.area, ob.bbox, ob.area);
            if metric > nms_threshold {
                excluded[other] = true;
            }
        }
    }

    keep
}

#[cfg(test)]
mod tests {
    use crate::utils::bbox::BoundingBox;
    use crate::utils::nms::{nms, pixel_iou};
    use rand::Rng;

    #[test]
    fn nms_test() {
        let bboxes = [
            (BoundingBox::from_xyxy(0.0, 0.0, 10.0, 50.0), 0.7),
            (BoundingBox::from_xyxy(0.0, 0.0, 10.5, 51.0), 0.9),
            (BoundingBox::from_xyxy(0.0, 0.0, 10.0, 49.0), 0.8),
            (BoundingBox::from_xyxy(30.0, 40.0, 40.0, 85.0), 0.5),
        ];
        assert_eq!(nms(&bboxes, 0.5), vec![1, 3]);
    }

    #[test]
    fn overlapping_pair_keeps_higher_score() {
        // pixel-inclusive IoU of the pair is exactly 0.9
        let lo = BoundingBox::from_xyxy(0.0, 0.0, 99.0, 99.0);
        let hi = BoundingBox::from_xyxy(0.0, 0.0, 89.0, 99.0);
        assert!((pixel_iou(&lo, &hi) - 0.9).abs() < 1e-6);

        let res = nms(&[(lo, 0.3), (hi, 0.8)], 0.5);
        assert_eq!(res, vec![1]);
    }

    #[test]
    fn equal_scores_keep_input_order() {
        let b = BoundingBox::from_xyxy(0.0, 0.0, 10.0, 10.0);
        assert_eq!(nms(&[(b, 0.5), (b, 0.5), (b, 0.5)], 0.5), vec![0]);

        let far = BoundingBox::from_xyxy(100.0, 100.0, 110.0, 110.0);
        assert_eq!(nms(&[(far, 0.5), (b, 0.5)], 0.5), vec![0, 1]);
    }

    #[test]
    fn threshold_is_exclusive() {
        let a = BoundingBox::from_xyxy(0.0, 0.0, 9.0, 9.0);
        let b = BoundingBox::from_xyxy(0.0, 5.0, 9.0, 14.0);
        let iou = pixel_iou(&a, &b);
        assert_eq!(nms(&[(a, 1.0), (b, 0.5)], iou), vec![0, 1]);
    }

    #[test]
    fn empty_input() {
        assert!(nms(&[], 0.5).is_empty());
    }

    #[test]
    fn idempotence() {
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let detections = (0..200)
                .map(|_| {
                    let x: f32 = rng.gen_range(0.0..400.0);
                    let y: f32 = rng.gen_range(0.0..400.0);
                    let w: f32 = rng.gen_range(5.0..80.0);
                    let h: f32 = rng.gen_range(5.0..80.0);
                    (
                        BoundingBox::from_xyxy(x, y, x + w, y + h),
                        rng.gen_range(0.0..1.0_f32),
                    )
                })
                .collect::<Vec<_>>();

            let kept = nms(&detections, 0.5)
                .into_iter()
                .map(|i| detections[i])
                .collect::<Vec<_>>();
            let again = nms(&kept, 0.5);
            assert_eq!(again, (0..kept.len()).collect::<Vec<_>>());
        }
    }
}
