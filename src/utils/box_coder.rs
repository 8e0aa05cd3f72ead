use crate::utils::bbox::BoundingBox;

/// Added to heights and widths before division and logarithm when encoding
///
const ENCODE_EPSILON: f32 = 1e-8;

/// Default upper bound for the `dh` and `dw` codes during decoding
///
pub const DEFAULT_SCALE_CLAMP: f32 = 4.135_166_6; // ln(1000 / 16)

/// Relative box codes `(dy, dx, dh, dw)`
///
pub type BoxCode = [f32; 4];

/// Center-size box coder
///
/// Encodes a box relative to an anchor as
/// `dy = (yc - yc_a) / h_a`, `dx = (xc - xc_a) / w_a`, `dh = ln(h / h_a)`, `dw = ln(w / w_a)`
/// and decodes the inverse transform.
///
/// The size codes are clamped from above by `scale_clamp` before `exp` when decoding, so
/// an untrained network cannot produce infinite boxes. Use [`BoxCoder::unclamped`] to
/// get the bare transform.
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxCoder {
    scale_clamp: Option<f32>,
}

impl Default for BoxCoder {
    fn default() -> Self {
        Self {
            scale_clamp: Some(DEFAULT_SCALE_CLAMP),
        }
    }
}

impl BoxCoder {
    pub fn new(scale_clamp: Option<f32>) -> Self {
        Self { scale_clamp }
    }

    pub fn unclamped() -> Self {
        Self { scale_clamp: None }
    }

    pub fn scale_clamp(&self) -> Option<f32> {
        self.scale_clamp
    }

    /// Encodes `bbox` relative to `anchor`
    ///
    pub fn encode(&self, bbox: &BoundingBox, anchor: &BoundingBox) -> BoxCode {
        let (yc_a, xc_a) = anchor.center();
        let ha = anchor.height() + ENCODE_EPSILON;
        let wa = anchor.width() + ENCODE_EPSILON;

        let (yc, xc) = bbox.center();
        let h = bbox.height() + ENCODE_EPSILON;
        let w = bbox.width() + ENCODE_EPSILON;

        [
            (yc - yc_a) / ha,
            (xc - xc_a) / wa,
            (h / ha).ln(),
            (w / wa).ln(),
        ]
    }

    /// Restores the absolute box from `code` relative to `anchor`
    ///
    pub fn decode(&self, code: &BoxCode, anchor: &BoundingBox) -> BoundingBox {
        let (yc_a, xc_a) = anchor.center();
        let ha = anchor.height();
        let wa = anchor.width();

        let [dy, dx, dh, dw] = *code;
        let (dh, dw) = match self.scale_clamp {
            Some(clamp) => (dh.min(clamp), dw.min(clamp)),
            None => (dh, dw),
        };

        let h = dh.exp() * ha;
        let w = dw.exp() * wa;
        let yc = dy * ha + yc_a;
        let xc = dx * wa + xc_a;

        BoundingBox::from_center(yc, xc, h, w)
    }
}
