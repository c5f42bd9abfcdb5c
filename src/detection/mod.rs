pub mod aggregate;
pub mod crops;
pub mod enrich;
pub mod filter;
pub mod ocr;
pub mod yolo;

use image::DynamicImage;

use crate::catalog::ClassNames;
use crate::models::RawDetection;

/// Settings handed to a detector for one inference call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Requested square input size in pixels
    pub inference_size: u32,
    /// Confidence floor applied by the detector itself
    pub confidence: f32,
}

/// Object detector producing raw regions for a whole image.
pub trait Detector {
    /// Run inference and return detections in emission order.
    fn detect(&self, img: &DynamicImage, params: &DetectParams) -> anyhow::Result<Vec<RawDetection>>;

    /// Class names bundled with the model, if any.
    fn class_names(&self) -> Option<&ClassNames> {
        None
    }
}
