pub mod catalog;
pub mod detection;
pub mod error;
pub mod models;
pub mod params;
pub mod pipeline;

pub use catalog::{ClassCatalog, ClassEntry, ClassNames};
pub use detection::aggregate::ResultAggregator;
pub use detection::crops::{CropStore, DirCropStore};
pub use detection::enrich::DetectionEnricher;
pub use detection::filter::DetectionFilter;
pub use detection::ocr::{OcrsRecognizer, TextRecognizer};
pub use detection::yolo::YoloDetector;
pub use detection::{DetectParams, Detector};
pub use error::ScanError;
pub use models::{AggregationResult, BoundingBox, EnrichedDetection, RawDetection};
pub use params::{ParsedParameters, classify};
pub use pipeline::{DebugConfig, Pipeline};
