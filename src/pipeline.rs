use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::catalog::ClassCatalog;
use crate::detection::aggregate::ResultAggregator;
use crate::detection::crops::CropStore;
use crate::detection::enrich::DetectionEnricher;
use crate::detection::filter::DetectionFilter;
use crate::detection::ocr::TextRecognizer;
use crate::detection::{DetectParams, Detector};
use crate::error::ScanError;
use crate::models::{AggregationResult, BoundingBox, RawDetection};
use crate::params::ParsedParameters;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// Runs one image through detection, filtering, enrichment and aggregation.
pub struct Pipeline<'a> {
    detector: &'a dyn Detector,
    catalog: &'a ClassCatalog,
    recognizer: Option<&'a dyn TextRecognizer>,
    crops: Option<&'a dyn CropStore>,
    debug: Option<DebugConfig>,
}

impl<'a> Pipeline<'a> {
    pub fn new(detector: &'a dyn Detector, catalog: &'a ClassCatalog) -> Self {
        Self {
            detector,
            catalog,
            recognizer: None,
            crops: None,
            debug: None,
        }
    }

    /// Recognizer used when the parameters enable OCR
    pub fn with_recognizer(mut self, recognizer: Option<&'a dyn TextRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    pub fn with_crop_store(mut self, crops: Option<&'a dyn CropStore>) -> Self {
        self.crops = crops;
        self
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self, ScanError> {
        let io_error = |e: std::io::Error| ScanError::Debug(format!("{}: {}", output_dir.display(), e));

        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir).map_err(io_error)?;
            if entries.count() > 0 {
                return Err(ScanError::Debug(format!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&output_dir).map_err(io_error)?;
        }

        self.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Detect, then post-process. `image_stem` names the crops.
    pub fn run(
        &self,
        img: &DynamicImage,
        image_stem: &str,
        params: &ParsedParameters,
    ) -> Result<AggregationResult, ScanError> {
        let detect_params = DetectParams {
            inference_size: params.inference_size.get(),
            confidence: params.confidence,
        };
        let raw = self
            .detector
            .detect(img, &detect_params)
            .map_err(|e| ScanError::Inference(format!("{:#}", e)))?;
        debug!("Detector returned {} regions", raw.len());

        self.process(&raw, img, image_stem, params)
    }

    /// Filter, enrich and aggregate detections already produced for `img`.
    pub fn process(
        &self,
        raw: &[RawDetection],
        img: &DynamicImage,
        image_stem: &str,
        params: &ParsedParameters,
    ) -> Result<AggregationResult, ScanError> {
        let filter = DetectionFilter::new(params.confidence);
        let survivors = filter.apply(raw);
        debug!("{} of {} detections passed the filter", survivors.len(), raw.len());

        let enricher = DetectionEnricher::new(self.catalog)
            .with_class_names(self.detector.class_names())
            .with_ocr(params.ocr, self.recognizer)
            .with_crop_store(self.crops);

        let mut aggregator = ResultAggregator::new();
        for (index, det) in survivors {
            aggregator.push(enricher.enrich(index, det, img, image_stem));
        }
        let result = aggregator.finish();

        info!(
            "{} detections, {} points",
            result.detections.len(),
            result.total_points
        );

        if let Some(debug_config) = &self.debug {
            save_debug_output(debug_config, img, &result)?;
        }

        Ok(result)
    }
}

/// Save the input and a copy with every reported box outlined
fn save_debug_output(
    config: &DebugConfig,
    img: &DynamicImage,
    result: &AggregationResult,
) -> Result<(), ScanError> {
    let save = |buffer: &RgbImage, name: &str| {
        let path = config.output_dir.join(name);
        buffer
            .save(&path)
            .map_err(|e| ScanError::Debug(format!("Failed to save {}: {}", path.display(), e)))?;
        debug!("Debug: saved {}", path.display());
        Ok::<(), ScanError>(())
    };

    let input = img.to_rgb8();
    save(&input, "00_input.png")?;

    let mut annotated = input;
    for det in &result.detections {
        let (x1, y1) = (det.bbox.x1.max(0), det.bbox.y1.max(0));
        let clamped = BoundingBox::new(x1, y1, det.bbox.x2, det.bbox.y2);
        let (w, h) = (clamped.width(), clamped.height());
        if w > 0 && h > 0 {
            let (max_w, max_h) = annotated.dimensions();
            let w = u32::try_from(w).unwrap_or(u32::MAX).min(max_w);
            let h = u32::try_from(h).unwrap_or(u32::MAX).min(max_h);
            draw_hollow_rect_mut(&mut annotated, Rect::at(x1, y1).of_size(w, h), BOX_COLOR);
        }
    }
    save(&annotated, "01_detections.png")
}
