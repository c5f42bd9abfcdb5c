#![allow(dead_code)]

use image::{DynamicImage, ImageBuffer, Rgb};
use pinscan::{ClassNames, DetectParams, Detector, RawDetection, TextRecognizer};
use std::cell::RefCell;
use tempfile::NamedTempFile;

/// Creates a 100x100 red test image and returns the temp file.
/// The file will be automatically cleaned up when dropped.
pub fn create_test_image() -> NamedTempFile {
    let img = ImageBuffer::from_fn(100, 100, |_, _| Rgb([255u8, 0u8, 0u8]));
    let file = tempfile::Builder::new()
        .prefix("shelf")
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

/// A 100x100 image with a white square at (20..60, 20..60).
pub fn test_raster() -> DynamicImage {
    let img = ImageBuffer::from_fn(100, 100, |x, y| {
        if (20..60).contains(&x) && (20..60).contains(&y) {
            Rgb([255u8, 255, 255])
        } else {
            Rgb([0u8, 0, 0])
        }
    });
    DynamicImage::ImageRgb8(img)
}

pub fn detection(x1: i32, y1: i32, x2: i32, y2: i32, score: f32, class_id: u32) -> RawDetection {
    RawDetection {
        bbox: pinscan::BoundingBox::new(x1, y1, x2, y2),
        score,
        class_id,
    }
}

/// Detector returning a canned list and recording the parameters it saw.
#[derive(Default)]
pub struct FakeDetector {
    pub detections: Vec<RawDetection>,
    pub names: Option<ClassNames>,
    pub seen: RefCell<Vec<DetectParams>>,
}

impl FakeDetector {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            detections,
            ..Default::default()
        }
    }

    pub fn with_names(mut self, names: ClassNames) -> Self {
        self.names = Some(names);
        self
    }
}

impl Detector for FakeDetector {
    fn detect(&self, _img: &DynamicImage, params: &DetectParams) -> anyhow::Result<Vec<RawDetection>> {
        self.seen.borrow_mut().push(*params);
        Ok(self.detections.clone())
    }

    fn class_names(&self) -> Option<&ClassNames> {
        self.names.as_ref()
    }
}

/// Recognizer that reports the mean brightness of the crop, failing on
/// crops that are entirely black.
pub struct BrightnessReader;

impl TextRecognizer for BrightnessReader {
    fn recognize(&self, crop: &DynamicImage) -> anyhow::Result<String> {
        let gray = crop.to_luma8();
        let sum: u64 = gray.pixels().map(|p| p[0] as u64).sum();
        if sum == 0 {
            anyhow::bail!("no text found");
        }
        Ok(format!("mean={}", sum / (gray.width() * gray.height()) as u64))
    }
}
