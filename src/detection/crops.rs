use image::DynamicImage;
use std::path::PathBuf;

/// Persists cropped regions and hands back a reference to them.
pub trait CropStore {
    fn persist(&self, crop: &DynamicImage, name: &str) -> anyhow::Result<String>;
}

/// Crop file name for the detection at emission index `index`.
pub fn crop_name(image_stem: &str, index: usize) -> String {
    format!("{}_crop_{}.jpg", image_stem, index)
}

/// Writes crops as files into a directory, created on first use.
#[derive(Debug, Clone)]
pub struct DirCropStore {
    dir: PathBuf,
}

impl DirCropStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CropStore for DirCropStore {
    fn persist(&self, crop: &DynamicImage, name: &str) -> anyhow::Result<String> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);

        // JPEG has no alpha channel
        crop.to_rgb8()
            .save(&path)
            .map_err(|e| anyhow::anyhow!("Failed to save crop {}: {}", path.display(), e))?;

        Ok(path.display().to_string())
    }
}
