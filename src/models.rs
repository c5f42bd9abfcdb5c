use image::DynamicImage;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Axis-aligned box in original image pixels.
///
/// Coordinates come straight from the detector and are not guaranteed to be
/// ordered or inside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Signed width, widened so extreme coordinates cannot overflow.
    pub fn width(&self) -> i64 {
        i64::from(self.x2) - i64::from(self.x1)
    }

    pub fn height(&self) -> i64 {
        i64::from(self.y2) - i64::from(self.y1)
    }

    pub fn to_array(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Extract the region covered by this box, clamped to the image bounds.
    ///
    /// Returns `None` when nothing of the box lies inside the image.
    pub fn crop(&self, img: &DynamicImage) -> Option<DynamicImage> {
        let (w, h) = (img.width() as i64, img.height() as i64);
        let x1 = (self.x1 as i64).clamp(0, w);
        let y1 = (self.y1 as i64).clamp(0, h);
        let x2 = (self.x2 as i64).clamp(0, w);
        let y2 = (self.y2 as i64).clamp(0, h);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(img.crop_imm(x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32))
    }
}

/// One region reported by the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub bbox: BoundingBox,
    pub score: f32,
    pub class_id: u32,
}

/// A filtered detection with its label, reward, crop and recognized text.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedDetection {
    pub bbox: BoundingBox,
    pub score: f32,
    pub class_id: u32,
    pub label: String,
    pub points: u32,
    /// Reference to the persisted crop, empty when none was written
    pub crop: String,
    /// Recognized text, empty when OCR was off, unavailable or failed
    pub ocr: String,
}

impl Serialize for EnrichedDetection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("EnrichedDetection", 7)?;
        s.serialize_field("box", &self.bbox.to_array())?;
        s.serialize_field("score", &self.score)?;
        // Kept for older consumers; always identical to `score`.
        s.serialize_field("confidence", &self.score)?;
        s.serialize_field("class", &self.class_id)?;
        s.serialize_field("label", &self.label)?;
        s.serialize_field("crop", &self.crop)?;
        s.serialize_field("ocr", &self.ocr)?;
        s.end()
    }
}

/// Terminal report for one image.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct AggregationResult {
    pub detections: Vec<EnrichedDetection>,
    pub total_points: u64,
}
