#![feature(test)]

extern crate test;

use rand::Rng;
use retina_anchors::prelude::*;
use std::sync::Arc;
use test::Bencher;

#[bench]
fn anchors_512(b: &mut Bencher) {
    b.iter(|| Anchors::new(AnchorConfig::default()).unwrap());
}

#[bench]
fn anchors_1024x640(b: &mut Bencher) {
    b.iter(|| Anchors::new(AnchorConfig::default().with_image_size(1024, 640)).unwrap());
}

#[bench]
fn label_anchors_01(b: &mut Bencher) {
    bench_label(1, b);
}

#[bench]
fn label_anchors_10(b: &mut Bencher) {
    bench_label(10, b);
}

#[bench]
fn label_anchors_50(b: &mut Bencher) {
    bench_label(50, b);
}

fn bench_label(objects: usize, b: &mut Bencher) {
    let anchors = Arc::new(Anchors::new(AnchorConfig::default()).unwrap());
    let labeler = AnchorLabeler::new(anchors, 90, 0.5).unwrap();
    let mut rng = rand::thread_rng();
    let gt = (0..objects)
        .map(|_| {
            let y: f32 = rng.gen_range(0.0..400.0);
            let x: f32 = rng.gen_range(0.0..400.0);
            let h: f32 = rng.gen_range(10.0..110.0);
            let w: f32 = rng.gen_range(10.0..110.0);
            GroundTruthBox::new(BoundingBox::new(y, x, y + h, x + w), rng.gen_range(0..90))
        })
        .collect::<Vec<_>>();

    b.iter(|| labeler.label_anchors(&gt).unwrap());
}
