use crate::{EstimateClose, EPS};

/// Axis-aligned bounding box in the corner format (y_min, x_min, y_max, x_max)
///
/// Coordinates are image pixels (or any consistent unit shared with the anchors).
///
#[derive(Clone, Default, Debug, Copy)]
pub struct BoundingBox {
    _y_min: f32,
    _x_min: f32,
    _y_max: f32,
    _x_max: f32,
}

impl BoundingBox {
    /// Constructor
    ///
    pub fn new(y_min: f32, x_min: f32, y_max: f32, x_max: f32) -> Self {
        Self {
            _y_min: y_min,
            _x_min: x_min,
            _y_max: y_max,
            _x_max: x_max,
        }
    }

    /// Creates the box from the `(x_min, y_min, x_max, y_max)` convention
    ///
    pub fn from_xyxy(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self::new(y_min, x_min, y_max, x_max)
    }

    /// Creates the box from its center and extents
    ///
    pub fn from_center(y_center: f32, x_center: f32, height: f32, width: f32) -> Self {
        Self::new(
            y_center - height / 2.0,
            x_center - width / 2.0,
            y_center + height / 2.0,
            x_center + width / 2.0,
        )
    }

    pub fn y_min(&self) -> f32 {
        self._y_min
    }

    pub fn x_min(&self) -> f32 {
        self._x_min
    }

    pub fn y_max(&self) -> f32 {
        self._y_max
    }

    pub fn x_max(&self) -> f32 {
        self._x_max
    }

    pub fn height(&self) -> f32 {
        self._y_max - self._y_min
    }

    pub fn width(&self) -> f32 {
        self._x_max - self._x_min
    }

    /// Center as `(y_center, x_center)`
    ///
    pub fn center(&self) -> (f32, f32) {
        (
            (self._y_min + self._y_max) / 2.0,
            (self._x_min + self._x_max) / 2.0,
        )
    }

    pub fn area(&self) -> f32 {
        self.height() * self.width()
    }

    pub fn as_yxyx(&self) -> [f32; 4] {
        [self._y_min, self._x_min, self._y_max, self._x_max]
    }

    pub fn as_xyxy(&self) -> [f32; 4] {
        [self._x_min, self._y_min, self._x_max, self._y_max]
    }

    /// Multiplies every coordinate by `factor`
    ///
    pub fn scale(&self, factor: f32) -> Self {
        Self::new(
            self._y_min * factor,
            self._x_min * factor,
            self._y_max * factor,
            self._x_max * factor,
        )
    }

    pub fn intersection(l: &BoundingBox, r: &BoundingBox) -> f32 {
        let (y1, x1) = (l._y_min.max(r._y_min), l._x_min.max(r._x_min));
        let (y2, x2) = (l._y_max.min(r._y_max), l._x_max.min(r._x_max));

        let int_height = y2 - y1;
        let int_width = x2 - x1;

        if int_width > 0.0 && int_height > 0.0 {
            int_width * int_height
        } else {
            0.0
        }
    }

    /// Intersection over union; boxes with an empty union have IoU 0
    ///
    pub fn iou(l: &BoundingBox, r: &BoundingBox) -> f32 {
        let intersection = BoundingBox::intersection(l, r);
        let union = l.area() + r.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    /// Reads `[y_min, x_min, y_max, x_max]`
    fn from(a: [f32; 4]) -> Self {
        BoundingBox::new(a[0], a[1], a[2], a[3])
    }
}

impl EstimateClose for BoundingBox {
    /// Allows comparing bboxes
    ///
    fn almost_same(&self, other: &Self, eps: f32) -> bool {
        (self._y_min - other._y_min).abs() < eps
            && (self._x_min - other._x_min).abs() < eps
            && (self._y_max - other._y_max).abs() < eps
            && (self._x_max - other._x_max).abs() < eps
    }
}

impl PartialEq<Self> for BoundingBox {
    fn eq(&self, other: &Self) -> bool {
        self.almost_same(other, EPS)
    }
}
