use crate::Errors;
use anyhow::Result;

/// Largest supported pyramid level; strides are `2^level` pixels held in `u32`
///
pub const MAX_PYRAMID_LEVEL: u32 = 31;

/// Anchor configuration for one (level, octave scale, aspect ratio) combination
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorLevelConfig {
    pub level: u32,
    /// `2^level`
    pub stride: u32,
    /// Octave exponent `octave / num_scales`, the base size is multiplied by `2^octave_scale`
    pub octave_scale: f64,
    /// `(w, h)` ratio pair
    pub aspect_ratio: (f32, f32),
}

/// Geometry of the multiscale anchor grid
///
/// The default is the EfficientDet-D0 setup: levels 3 to 7, three octave scales,
/// three aspect ratios, anchor scale 4 and a 512x512 input.
///
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorConfig {
    pub min_level: u32,
    pub max_level: u32,
    pub num_scales: u32,
    pub aspect_ratios: Vec<(f32, f32)>,
    pub anchor_scale: f32,
    pub image_width: u32,
    pub image_height: u32,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            min_level: 3,
            max_level: 7,
            num_scales: 3,
            aspect_ratios: vec![(1.0, 1.0), (1.4, 0.7), (0.7, 1.4)],
            anchor_scale: 4.0,
            image_width: 512,
            image_height: 512,
        }
    }
}

impl AnchorConfig {
    pub fn with_levels(mut self, min_level: u32, max_level: u32) -> Self {
        self.min_level = min_level;
        self.max_level = max_level;
        self
    }

    pub fn with_num_scales(mut self, num_scales: u32) -> Self {
        self.num_scales = num_scales;
        self
    }

    pub fn with_aspect_ratios(mut self, aspect_ratios: &[(f32, f32)]) -> Self {
        self.aspect_ratios = aspect_ratios.to_vec();
        self
    }

    pub fn with_anchor_scale(mut self, anchor_scale: f32) -> Self {
        self.anchor_scale = anchor_scale;
        self
    }

    pub fn with_image_size(mut self, image_width: u32, image_height: u32) -> Self {
        self.image_width = image_width;
        self.image_height = image_height;
        self
    }

    /// `num_scales * aspect_ratios.len()`
    ///
    pub fn anchors_per_location(&self) -> usize {
        self.num_scales as usize * self.aspect_ratios.len()
    }

    pub fn levels(&self) -> impl Iterator<Item = u32> {
        self.min_level..=self.max_level
    }

    pub fn stride(level: u32) -> u32 {
        1 << level
    }

    /// Checks the parameters and that the image is a multiple of every level stride
    ///
    pub fn validate(&self) -> Result<()> {
        if self.num_scales < 1 {
            return Err(Errors::InvalidConfiguration(format!(
                "num_scales must be at least 1, got {}",
                self.num_scales
            ))
            .into());
        }
        if self.aspect_ratios.is_empty() {
            return Err(
                Errors::InvalidConfiguration("aspect_ratios must not be empty".into()).into(),
            );
        }
        if self.min_level > self.max_level {
            return Err(Errors::InvalidConfiguration(format!(
                "min_level {} is greater than max_level {}",
                self.min_level, self.max_level
            ))
            .into());
        }
        if self.max_level > MAX_PYRAMID_LEVEL {
            return Err(Errors::InvalidConfiguration(format!(
                "max_level {} exceeds {}",
                self.max_level, MAX_PYRAMID_LEVEL
            ))
            .into());
        }
        if !(self.anchor_scale > 0.0) {
            return Err(Errors::InvalidConfiguration(format!(
                "anchor_scale must be positive, got {}",
                self.anchor_scale
            ))
            .into());
        }
        if self
            .aspect_ratios
            .iter()
            .any(|(w, h)| !(*w > 0.0) || !(*h > 0.0))
        {
            return Err(Errors::InvalidConfiguration(
                "aspect ratio components must be positive".into(),
            )
            .into());
        }
        if self.image_width == 0 || self.image_height == 0 {
            return Err(Errors::InvalidConfiguration(format!(
                "image size must be positive, got {}x{}",
                self.image_width, self.image_height
            ))
            .into());
        }

        for level in self.levels() {
            let stride = Self::stride(level);
            if self.image_width % stride != 0 || self.image_height % stride != 0 {
                return Err(Errors::InvalidGeometry {
                    level,
                    stride,
                    width: self.image_width,
                    height: self.image_height,
                }
                .into());
            }
        }

        Ok(())
    }

    /// Per-level anchor configurations, octave-major then aspect ratio
    ///
    pub fn level_configs(&self, level: u32) -> Vec<AnchorLevelConfig> {
        let stride = Self::stride(level);
        (0..self.num_scales)
            .flat_map(|octave| {
                self.aspect_ratios
                    .iter()
                    .map(move |&aspect_ratio| AnchorLevelConfig {
                        level,
                        stride,
                        octave_scale: octave as f64 / self.num_scales as f64,
                        aspect_ratio,
                    })
            })
            .collect()
    }
}
