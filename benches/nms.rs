#![feature(test)]

extern crate test;

use rand::Rng;
use retina_anchors::utils::bbox::BoundingBox;
use retina_anchors::utils::nms::nms;
use test::Bencher;

#[bench]
fn nms_00010(b: &mut Bencher) {
    bench_nms(10, b);
}

#[bench]
fn nms_00100(b: &mut Bencher) {
    bench_nms(100, b);
}

#[bench]
fn nms_00300(b: &mut Bencher) {
    bench_nms(300, b);
}

#[bench]
fn nms_01000(b: &mut Bencher) {
    bench_nms(1000, b);
}

fn bench_nms(objects: usize, b: &mut Bencher) {
    let mut rng = rand::thread_rng();
    let detections = (0..objects)
        .map(|i| {
            let x = i as f32 + rng.gen_range(-10.0..10.0_f32);
            let y = i as f32 + rng.gen_range(-10.0..10.0_f32);
            let w = 50.0 + rng.gen_range(-1.0..1.0_f32);
            let h = 50.0 + rng.gen_range(-1.0..1.0_f32);
            (
                BoundingBox::from_xyxy(x, y, x + w, y + h),
                rng.gen_range(0.0..1.0_f32),
            )
        })
        .collect::<Vec<_>>();

    b.iter(|| {
        nms(&detections, 0.5);
    });
}
