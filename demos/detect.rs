use anyhow::Result;
use rand::Rng;
use retina_anchors::prelude::*;
use std::sync::Arc;

/// Labels a synthetic image, turns the targets into noisy "network outputs"
/// and runs them through the post-processor.
///
fn main() -> Result<()> {
    env_logger::init();

    let anchors = Arc::new(Anchors::new(
        AnchorConfig::default().with_image_size(640, 384),
    )?);
    eprintln!(
        "{} anchors, {} per location",
        anchors.len(),
        anchors.anchors_per_location()
    );

    let labeler = AnchorLabeler::new(anchors.clone(), 3, 0.5)?;
    let post = PostProcessor::new(anchors.clone(), DetectionOptions::new(3))?;
    let coder = BoxCoder::default();

    let ground_truth = vec![
        GroundTruthBox::from_dataset_label(BoundingBox::new(40.0, 60.0, 200.0, 180.0), 1),
        GroundTruthBox::from_dataset_label(BoundingBox::new(100.0, 300.0, 360.0, 620.0), 2),
        GroundTruthBox::from_dataset_label(BoundingBox::new(10.0, 400.0, 50.0, 440.0), 3),
    ];
    let targets = labeler.label_anchors(&ground_truth)?;
    eprintln!("{} positive anchors", targets.num_positives);

    let mut rng = rand::thread_rng();
    let mut candidates = Candidates::default();
    for (index, m) in targets.matches.as_slice().iter().enumerate() {
        if let Match::Matched(gt) = m {
            let anchor = &anchors.boxes()[index];
            let mut code = coder.encode(&ground_truth[*gt].bbox, anchor);
            for c in code.iter_mut() {
                *c += rng.gen_range(-0.05..0.05_f32);
            }
            candidates.push(
                rng.gen_range(0.0..4.0_f32),
                code,
                index,
                ground_truth[*gt].class_id as usize,
                anchors.locations()[index].level_index as u32,
            );
        }
    }

    let detections = post.generate_detections(&candidates, 0, 2.0)?;
    for d in detections.as_slice() {
        println!(
            "class={} score={:.3} level={} box={:?}",
            d.class_id,
            d.score,
            d.level_index,
            d.bbox.as_xyxy()
        );
    }

    Ok(())
}
