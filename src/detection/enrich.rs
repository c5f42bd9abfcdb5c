use image::DynamicImage;
use tracing::{debug, warn};

use crate::catalog::{ClassCatalog, ClassNames};
use crate::detection::crops::{CropStore, crop_name};
use crate::detection::ocr::TextRecognizer;
use crate::models::{EnrichedDetection, RawDetection};

/// Turns a filtered detection into an [`EnrichedDetection`].
///
/// Every collaborator call is fail-soft: a failed crop write leaves `crop`
/// empty and a failed recognition leaves `ocr` empty, so each input always
/// yields exactly one output.
pub struct DetectionEnricher<'a> {
    catalog: &'a ClassCatalog,
    names: Option<&'a ClassNames>,
    ocr_enabled: bool,
    recognizer: Option<&'a dyn TextRecognizer>,
    crops: Option<&'a dyn CropStore>,
}

impl<'a> DetectionEnricher<'a> {
    pub fn new(catalog: &'a ClassCatalog) -> Self {
        Self {
            catalog,
            names: None,
            ocr_enabled: false,
            recognizer: None,
            crops: None,
        }
    }

    pub fn with_class_names(mut self, names: Option<&'a ClassNames>) -> Self {
        self.names = names;
        self
    }

    /// Enable OCR. With no recognizer available the text stays empty.
    pub fn with_ocr(mut self, enabled: bool, recognizer: Option<&'a dyn TextRecognizer>) -> Self {
        self.ocr_enabled = enabled;
        self.recognizer = recognizer;
        self
    }

    pub fn with_crop_store(mut self, crops: Option<&'a dyn CropStore>) -> Self {
        self.crops = crops;
        self
    }

    /// `index` is the detector emission index, used to name the crop.
    pub fn enrich(
        &self,
        index: usize,
        det: &RawDetection,
        img: &DynamicImage,
        image_stem: &str,
    ) -> EnrichedDetection {
        let label = self.catalog.label_for(det.class_id, self.names);
        let points = self.catalog.points_for(det.class_id);

        let region = det.bbox.crop(img);
        if region.is_none() {
            debug!("Detection {} has no pixels inside the image", index);
        }

        let crop = region
            .as_ref()
            .map(|region| self.persist_crop(region, &crop_name(image_stem, index)))
            .unwrap_or_default();

        let ocr = region
            .as_ref()
            .map(|region| self.read_text(region, index))
            .unwrap_or_default();

        EnrichedDetection {
            bbox: det.bbox,
            score: det.score,
            class_id: det.class_id,
            label,
            points,
            crop,
            ocr,
        }
    }

    fn persist_crop(&self, region: &DynamicImage, name: &str) -> String {
        let Some(store) = self.crops else {
            return String::new();
        };
        match store.persist(region, name) {
            Ok(reference) => reference,
            Err(e) => {
                warn!("Could not persist crop {}: {:#}", name, e);
                String::new()
            }
        }
    }

    fn read_text(&self, region: &DynamicImage, index: usize) -> String {
        if !self.ocr_enabled {
            return String::new();
        }
        let Some(recognizer) = self.recognizer else {
            return String::new();
        };
        match recognizer.recognize(region) {
            Ok(text) => {
                debug!("Detection {}: recognized {:?}", index, text);
                text
            }
            Err(e) => {
                warn!("OCR failed for detection {}: {:#}", index, e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;
    use std::cell::RefCell;

    struct FixedText(&'static str);

    impl TextRecognizer for FixedText {
        fn recognize(&self, _crop: &DynamicImage) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Broken;

    impl TextRecognizer for Broken {
        fn recognize(&self, _crop: &DynamicImage) -> anyhow::Result<String> {
            anyhow::bail!("engine crashed")
        }
    }

    impl CropStore for Broken {
        fn persist(&self, _crop: &DynamicImage, _name: &str) -> anyhow::Result<String> {
            anyhow::bail!("disk full")
        }
    }

    #[derive(Default)]
    struct Recording(RefCell<Vec<(String, u32, u32)>>);

    impl CropStore for Recording {
        fn persist(&self, crop: &DynamicImage, name: &str) -> anyhow::Result<String> {
            self.0.borrow_mut().push((name.to_string(), crop.width(), crop.height()));
            Ok(format!("mem/{}", name))
        }
    }

    fn raw(class_id: u32) -> RawDetection {
        RawDetection {
            bbox: BoundingBox::new(10, 20, 40, 60),
            score: 0.8,
            class_id,
        }
    }

    fn image() -> DynamicImage {
        DynamicImage::new_rgb8(100, 100)
    }

    #[test]
    fn resolves_label_and_points() {
        let catalog = ClassCatalog::batteries();
        let out = DetectionEnricher::new(&catalog).enrich(0, &raw(4), &image(), "img");
        assert_eq!(out.label, "9V");
        assert_eq!(out.points, 50);
        assert_eq!(out.score, 0.8);
        assert_eq!(out.crop, "");
        assert_eq!(out.ocr, "");
    }

    #[test]
    fn unknown_class_degrades() {
        let catalog = ClassCatalog::batteries();
        let out = DetectionEnricher::new(&catalog).enrich(0, &raw(12), &image(), "img");
        assert_eq!(out.label, "12");
        assert_eq!(out.points, 0);
    }

    #[test]
    fn crops_are_named_by_emission_index() {
        let catalog = ClassCatalog::batteries();
        let store = Recording::default();
        let out = DetectionEnricher::new(&catalog)
            .with_crop_store(Some(&store))
            .enrich(7, &raw(1), &image(), "shelf");

        assert_eq!(out.crop, "mem/shelf_crop_7.jpg");
        assert_eq!(store.0.borrow()[0], ("shelf_crop_7.jpg".to_string(), 30, 40));
    }

    #[test]
    fn ocr_disabled_yields_empty_text() {
        let catalog = ClassCatalog::batteries();
        let reader = FixedText("ENERGIZER");
        let out = DetectionEnricher::new(&catalog)
            .with_ocr(false, Some(&reader))
            .enrich(0, &raw(1), &image(), "img");
        assert_eq!(out.ocr, "");
    }

    #[test]
    fn ocr_enabled_reads_text() {
        let catalog = ClassCatalog::batteries();
        let reader = FixedText("ENERGIZER");
        let out = DetectionEnricher::new(&catalog)
            .with_ocr(true, Some(&reader))
            .enrich(0, &raw(1), &image(), "img");
        assert_eq!(out.ocr, "ENERGIZER");
    }

    #[test]
    fn collaborator_failures_are_absorbed() {
        let catalog = ClassCatalog::batteries();
        let out = DetectionEnricher::new(&catalog)
            .with_ocr(true, Some(&Broken))
            .with_crop_store(Some(&Broken))
            .enrich(0, &raw(2), &image(), "img");
        assert_eq!(out.ocr, "");
        assert_eq!(out.crop, "");
        assert_eq!(out.points, 20);
    }

    #[test]
    fn box_outside_image_skips_crop_and_ocr() {
        let catalog = ClassCatalog::batteries();
        let store = Recording::default();
        let reader = FixedText("never");
        let det = RawDetection {
            bbox: BoundingBox::new(200, 200, 260, 260),
            score: 0.9,
            class_id: 0,
        };
        let out = DetectionEnricher::new(&catalog)
            .with_ocr(true, Some(&reader))
            .with_crop_store(Some(&store))
            .enrich(0, &det, &image(), "img");
        assert_eq!(out.crop, "");
        assert_eq!(out.ocr, "");
        assert!(store.0.borrow().is_empty());
        assert_eq!(out.points, 5);
    }
}
