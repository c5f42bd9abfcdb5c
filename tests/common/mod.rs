mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from pinscan for tests
pub use pinscan::{
    AggregationResult, BoundingBox, ClassCatalog, ClassNames, CropStore, DetectParams, Detector,
    DirCropStore, ParsedParameters, Pipeline, RawDetection, TextRecognizer,
};
