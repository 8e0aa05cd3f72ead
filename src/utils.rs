/// Bounding boxes
pub mod bbox;

/// Anchor-relative box encoding and decoding
pub mod box_coder;

/// Non maximum suppression implementation for detected boxes
pub mod nms;
