use crate::detection::{Candidates, Detections, PostProcessor};
use crate::labeler::{AnchorLabeler, GroundTruthBox, LabelTargets};
use crate::matcher::RegionSimilarity;
use anyhow::Result;
use crossbeam::channel::{Receiver, Sender};
use log::warn;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::{Arc, Mutex};

pub type ImageResult<R> = (i64, Result<R>);

/// Network outputs of one image for [`BatchProcessor::detect`]
///
#[derive(Clone, Debug, Default)]
pub struct DetectionInput {
    pub candidates: Candidates,
    /// Factor from the network input resolution to the original image
    pub image_scale: f32,
}

/// Per-image inputs waiting to be processed
///
#[derive(Debug, Clone)]
pub struct BatchRequest<T, R> {
    batch: Vec<(i64, T)>,
    sender: Sender<ImageResult<R>>,
    batch_size: Arc<Mutex<usize>>,
}

/// Receiving side of a [`BatchRequest`], one result per image in completion order
///
#[derive(Debug)]
pub struct BatchResult<R> {
    receiver: Receiver<ImageResult<R>>,
    batch_size: Arc<Mutex<usize>>,
}

impl<R> BatchResult<R> {
    pub fn ready(&self) -> bool {
        !self.receiver.is_empty()
    }

    /// Blocks until the next image result arrives; `None` when the request is gone
    ///
    pub fn get(&self) -> Option<ImageResult<R>> {
        self.receiver.recv().ok()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.lock().map(|s| *s).unwrap_or_default()
    }
}

impl<T, R> BatchRequest<T, R> {
    pub fn new() -> (Self, BatchResult<R>) {
        let (sender, receiver) = crossbeam::channel::unbounded();
        let batch_size = Arc::new(Mutex::new(0));
        (
            Self {
                batch: Vec::default(),
                sender,
                batch_size: batch_size.clone(),
            },
            BatchResult {
                receiver,
                batch_size,
            },
        )
    }

    pub fn add(&mut self, image_id: i64, elt: T) {
        self.batch.push((image_id, elt));
        if let Ok(mut batch_size) = self.batch_size.lock() {
            *batch_size = self.batch.len();
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch.len()
    }

    pub fn get_batch(&self) -> &[(i64, T)] {
        &self.batch
    }

    pub(crate) fn send(sender: &Sender<ImageResult<R>>, res: ImageResult<R>) -> bool {
        let image_id = res.0;
        if let Err(e) = sender.send(res) {
            warn!(
                "Unable to send the result of image {} to a caller, likely the caller already closed the channel. Error is: {:?}",
                image_id, e
            );
            false
        } else {
            true
        }
    }
}

/// Runs labeling and post-processing of many images on a dedicated thread pool
///
/// Images only share the read-only anchor set, so every image is an independent task.
///
pub struct BatchProcessor {
    pool: ThreadPool,
}

impl BatchProcessor {
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()?;
        Ok(Self { pool })
    }

    /// Pool with one thread per logical CPU
    ///
    pub fn with_all_cpus() -> Result<Self> {
        Self::new(num_cpus::get())
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Labels every image of `images`, results keep the input order
    ///
    pub fn label_all<S>(
        &self,
        labeler: &AnchorLabeler<S>,
        images: &[Vec<GroundTruthBox>],
    ) -> Vec<Result<LabelTargets>>
    where
        S: RegionSimilarity + Sync,
    {
        self.pool.install(|| {
            images
                .par_iter()
                .map(|gt| labeler.label_anchors(gt))
                .collect()
        })
    }

    /// Post-processes every `(image_id, input)` pair, results keep the input order
    ///
    pub fn detect_all(
        &self,
        processor: &PostProcessor,
        images: &[(i64, DetectionInput)],
    ) -> Vec<Result<Detections>> {
        self.pool.install(|| {
            images
                .par_iter()
                .map(|(image_id, input)| {
                    processor.generate_detections(&input.candidates, *image_id, input.image_scale)
                })
                .collect()
        })
    }

    /// Labels the request and delivers one result per image through its channel
    ///
    pub fn label<S>(
        &self,
        labeler: &AnchorLabeler<S>,
        request: BatchRequest<Vec<GroundTruthBox>, LabelTargets>,
    ) where
        S: RegionSimilarity + Sync,
    {
        let BatchRequest { batch, sender, .. } = request;
        self.pool.install(|| {
            batch.into_par_iter().for_each(|(image_id, gt)| {
                let res = labeler.label_anchors(&gt);
                BatchRequest::<Vec<GroundTruthBox>, LabelTargets>::send(&sender, (image_id, res));
            })
        });
    }

    /// Post-processes the request and delivers one result per image through its channel
    ///
    pub fn detect(
        &self,
        processor: &PostProcessor,
        request: BatchRequest<DetectionInput, Detections>,
    ) {
        let BatchRequest { batch, sender, .. } = request;
        self.pool.install(|| {
            batch.into_par_iter().for_each(|(image_id, input)| {
                let res =
                    processor.generate_detections(&input.candidates, image_id, input.image_scale);
                BatchRequest::<DetectionInput, Detections>::send(&sender, (image_id, res));
            })
        });
    }
}
