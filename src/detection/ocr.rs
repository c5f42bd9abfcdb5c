use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DETECTION_MODEL_FILE: &str = "text-detection.rten";
pub const RECOGNITION_MODEL_FILE: &str = "text-recognition.rten";

/// Reads the text printed on a cropped region.
pub trait TextRecognizer {
    fn recognize(&self, crop: &DynamicImage) -> anyhow::Result<String>;
}

/// Standard ocrs model cache: `$HOME/.cache/ocrs`.
pub fn default_model_dir() -> Option<PathBuf> {
    let home_dir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()?;
    Some(Path::new(&home_dir).join(".cache/ocrs"))
}

/// Initialize OCR engine with the detection and recognition models in `model_dir`
pub fn init_ocr_engine(model_dir: &Path) -> anyhow::Result<OcrEngine> {
    let detection_model_path = model_dir.join(DETECTION_MODEL_FILE);
    let recognition_model_path = model_dir.join(RECOGNITION_MODEL_FILE);

    if !detection_model_path.exists() || !recognition_model_path.exists() {
        anyhow::bail!(
            "OCR models not found. Please run: ocrs-cli --help (or download models manually)\n\
             Expected locations:\n  - {}\n  - {}",
            detection_model_path.display(),
            recognition_model_path.display()
        );
    }

    let detection_model = Model::load_file(&detection_model_path)?;
    let recognition_model = Model::load_file(&recognition_model_path)?;

    let engine = OcrEngine::new(OcrEngineParams {
        detection_model: Some(detection_model),
        recognition_model: Some(recognition_model),
        ..Default::default()
    })?;

    Ok(engine)
}

/// [`TextRecognizer`] backed by an ocrs engine.
pub struct OcrsRecognizer {
    engine: OcrEngine,
}

impl OcrsRecognizer {
    pub fn new(engine: OcrEngine) -> Self {
        Self { engine }
    }

    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        debug!("Initializing OCR engine from {}", model_dir.display());
        Ok(Self::new(init_ocr_engine(model_dir)?))
    }
}

impl TextRecognizer for OcrsRecognizer {
    fn recognize(&self, crop: &DynamicImage) -> anyhow::Result<String> {
        let img = crop.to_rgb8();

        let img_source = ImageSource::from_bytes(img.as_raw(), img.dimensions())
            .map_err(|e| anyhow::anyhow!("invalid OCR input: {}", e))?;
        let ocr_input = self.engine.prepare_input(img_source)?;
        let text = self.engine.get_text(&ocr_input)?;

        Ok(text.trim().to_string())
    }
}
