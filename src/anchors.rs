/// Anchor grid configuration
///
pub mod config;

use crate::anchors::config::{AnchorConfig, AnchorLevelConfig};
use crate::utils::bbox::BoundingBox;
use anyhow::Result;
use log::debug;

/// Position of an anchor inside the pyramid
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnchorLocation {
    /// Index into [`Anchors::levels`], not the pyramid level number
    pub level_index: usize,
    pub row: usize,
    pub col: usize,
    /// Index into the level configurations
    pub config: usize,
}

/// Grid geometry of one pyramid level
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelGeometry {
    pub level: u32,
    pub stride: u32,
    pub grid_height: usize,
    pub grid_width: usize,
    pub anchors_per_location: usize,
    /// Index of the first anchor of the level in the flat anchor set
    pub offset: usize,
}

impl LevelGeometry {
    pub fn len(&self) -> usize {
        self.grid_height * self.grid_width * self.anchors_per_location
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len()
    }
}

/// Multiscale anchor set
///
/// Anchors are stored level by level; inside a level they go row-major over the grid
/// cells and every cell holds all of its (scale, aspect) configurations contiguously.
/// The set is immutable once built and is meant to be shared read-only (e.g. in an `Arc`)
/// between the labeler and the post-processor.
///
#[derive(Clone, Debug)]
pub struct Anchors {
    config: AnchorConfig,
    configs: Vec<AnchorLevelConfig>,
    levels: Vec<LevelGeometry>,
    boxes: Vec<BoundingBox>,
    locations: Vec<AnchorLocation>,
}

impl Anchors {
    /// Builds the anchor set for `config`
    ///
    pub fn new(config: AnchorConfig) -> Result<Self> {
        config.validate()?;

        let anchors_per_location = config.anchors_per_location();
        let mut configs = Vec::default();
        let mut levels = Vec::default();
        let mut boxes = Vec::default();
        let mut locations = Vec::default();

        for (level_index, level) in config.levels().enumerate() {
            let level_configs = config.level_configs(level);
            let stride = AnchorConfig::stride(level);
            let geometry = LevelGeometry {
                level,
                stride,
                grid_height: (config.image_height / stride) as usize,
                grid_width: (config.image_width / stride) as usize,
                anchors_per_location,
                offset: boxes.len(),
            };

            let half_extents = level_configs
                .iter()
                .map(|c| {
                    let base_size = config.anchor_scale as f64
                        * c.stride as f64
                        * 2.0_f64.powf(c.octave_scale);
                    (
                        base_size * c.aspect_ratio.1 as f64 / 2.0,
                        base_size * c.aspect_ratio.0 as f64 / 2.0,
                    )
                })
                .collect::<Vec<_>>();

            boxes.reserve(geometry.len());
            locations.reserve(geometry.len());

            let stride = stride as f64;
            for row in 0..geometry.grid_height {
                let cy = stride / 2.0 + row as f64 * stride;
                for col in 0..geometry.grid_width {
                    let cx = stride / 2.0 + col as f64 * stride;
                    for (k, (half_y, half_x)) in half_extents.iter().enumerate() {
                        boxes.push(BoundingBox::new(
                            (cy - half_y) as f32,
                            (cx - half_x) as f32,
                            (cy + half_y) as f32,
                            (cx + half_x) as f32,
                        ));
                        locations.push(AnchorLocation {
                            level_index,
                            row,
                            col,
                            config: k,
                        });
                    }
                }
            }

            debug!(
                "Level {}: {}x{} grid, {} anchors starting at {}",
                level,
                geometry.grid_height,
                geometry.grid_width,
                geometry.len(),
                geometry.offset
            );

            configs.extend(level_configs);
            levels.push(geometry);
        }

        debug!("Anchor set of {} boxes is built", boxes.len());

        Ok(Self {
            config,
            configs,
            levels,
            boxes,
            locations,
        })
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    /// Anchor configurations of all levels in generation order
    ///
    pub fn configs(&self) -> &[AnchorLevelConfig] {
        &self.configs
    }

    pub fn levels(&self) -> &[LevelGeometry] {
        &self.levels
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    pub fn locations(&self) -> &[AnchorLocation] {
        &self.locations
    }

    pub fn get(&self, index: usize) -> Option<&BoundingBox> {
        self.boxes.get(index)
    }

    pub fn location(&self, index: usize) -> Option<&AnchorLocation> {
        self.locations.get(index)
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn anchors_per_location(&self) -> usize {
        self.config.anchors_per_location()
    }
}
