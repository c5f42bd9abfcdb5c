//! YOLOv8-style detector running an `.rten` model.
//!
//! The model takes a letterboxed `[1, 3, S, S]` RGB tensor in `[0, 1]` and
//! produces `[1, 4 + classes, anchors]`, where each anchor carries a centre
//! box `(cx, cy, w, h)` in input pixels followed by one score per class.

use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use rten::{Dimension, Model};
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use std::path::Path;
use tracing::{debug, warn};

use crate::catalog::ClassNames;
use crate::detection::{DetectParams, Detector};
use crate::error::ScanError;
use crate::models::{BoundingBox, RawDetection};

pub const STRIDE: u32 = 32;
/// Largest square input the detector will allocate.
pub const MAX_INFERENCE_SIZE: u32 = 8192;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
pub const DEFAULT_MAX_DETECTIONS: usize = 300;
const PAD_VALUE: u8 = 114;

/// A candidate box in original image coordinates, before NMS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    pub class_id: u32,
}

impl Candidate {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn iou(&self, other: &Candidate) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = if x2 > x1 && y2 > y1 { (x2 - x1) * (y2 - y1) } else { 0.0 };
        let union = self.area() + other.area() - intersection;

        if union > 0.0 { intersection / union } else { 0.0 }
    }

    /// Integer pixel box; coordinates are truncated.
    pub fn to_raw(&self) -> RawDetection {
        RawDetection {
            bbox: BoundingBox::new(self.x1 as i32, self.y1 as i32, self.x2 as i32, self.y2 as i32),
            score: self.score,
            class_id: self.class_id,
        }
    }
}

/// Mapping between original image pixels and the letterboxed input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

impl Letterbox {
    pub fn new(orig_w: u32, orig_h: u32, size: u32) -> Self {
        let scale = (size as f32 / orig_w as f32).min(size as f32 / orig_h as f32);
        let scaled_w = (orig_w as f32 * scale).round();
        let scaled_h = (orig_h as f32 * scale).round();
        Self {
            scale,
            pad_x: ((size as f32 - scaled_w) / 2.0).floor(),
            pad_y: ((size as f32 - scaled_h) / 2.0).floor(),
            orig_w,
            orig_h,
        }
    }

    /// Map a centre box in input pixels back to a clipped corner box in
    /// original pixels.
    pub fn unmap(&self, cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
        let max_x = self.orig_w as f32;
        let max_y = self.orig_h as f32;
        let x1 = ((cx - w / 2.0 - self.pad_x) / self.scale).clamp(0.0, max_x);
        let y1 = ((cy - h / 2.0 - self.pad_y) / self.scale).clamp(0.0, max_y);
        let x2 = ((cx + w / 2.0 - self.pad_x) / self.scale).clamp(0.0, max_x);
        let y2 = ((cy + h / 2.0 - self.pad_y) / self.scale).clamp(0.0, max_y);
        (x1, y1, x2, y2)
    }
}

/// Clamp an inference size to `1..=MAX_INFERENCE_SIZE` and round it up to a
/// multiple of the model stride.
pub fn round_to_stride(size: u32) -> u32 {
    size.clamp(1, MAX_INFERENCE_SIZE)
        .div_ceil(STRIDE)
        .saturating_mul(STRIDE)
}

/// Resize with preserved aspect ratio and centre on a grey square canvas.
pub fn letterbox_image(img: &DynamicImage, size: u32) -> (RgbImage, Letterbox) {
    let letterbox = Letterbox::new(img.width(), img.height(), size);
    let scaled_w = ((img.width() as f32 * letterbox.scale).round() as u32).clamp(1, size);
    let scaled_h = ((img.height() as f32 * letterbox.scale).round() as u32).clamp(1, size);

    let scaled = image::imageops::resize(&img.to_rgb8(), scaled_w, scaled_h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
    image::imageops::overlay(&mut canvas, &scaled, letterbox.pad_x as i64, letterbox.pad_y as i64);

    (canvas, letterbox)
}

/// Pack an RGB image as a `[1, 3, H, W]` tensor scaled to `[0, 1]`.
pub fn to_input_tensor(img: &RgbImage) -> NdTensor<f32, 4> {
    let (w, h) = img.dimensions();
    let plane = (w * h) as usize;
    let mut data = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in img.enumerate_pixels() {
        let offset = (y * w + x) as usize;
        for c in 0..3 {
            data[c * plane + offset] = pixel[c] as f32 / 255.0;
        }
    }
    NdTensor::from_data([1, 3, h as usize, w as usize], data)
}

/// Decode `[1, 4 + classes, anchors]` output, keeping the best class of each
/// anchor when it reaches `conf_threshold`.
pub fn decode_output(output: &NdTensor<f32, 3>, letterbox: &Letterbox, conf_threshold: f32) -> Vec<Candidate> {
    let [_batch, attrs, anchors] = output.shape();
    if attrs <= 4 {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    for i in 0..anchors {
        let mut best_class = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for c in 0..attrs - 4 {
            let score = output[[0, 4 + c, i]];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }
        if best_score < conf_threshold {
            continue;
        }

        let (x1, y1, x2, y2) = letterbox.unmap(
            output[[0, 0, i]],
            output[[0, 1, i]],
            output[[0, 2, i]],
            output[[0, 3, i]],
        );
        candidates.push(Candidate {
            x1,
            y1,
            x2,
            y2,
            score: best_score,
            class_id: best_class as u32,
        });
    }
    candidates
}

/// Per-class non-maximum suppression. Output is sorted by descending score.
pub fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32, max_detections: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    let mut kept: Vec<Candidate> = Vec::new();

    'outer: for cand in candidates {
        if kept.len() >= max_detections {
            break;
        }
        for k in &kept {
            if k.class_id == cand.class_id && k.iou(&cand) > iou_threshold {
                continue 'outer;
            }
        }
        kept.push(cand);
    }
    kept
}

/// Read a `.names` file: one class name per line, line number is the index.
pub fn parse_class_names(source: &str) -> ClassNames {
    source
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let name = line.trim();
            (!name.is_empty()).then(|| (i as u32, name.to_string()))
        })
        .collect()
}

pub struct YoloDetector {
    model: Model,
    names: Option<ClassNames>,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl YoloDetector {
    /// Load a model, plus `<model>.names` next to it when present.
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let model = Model::load_file(path).map_err(|e| ScanError::ModelLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let names_path = path.with_extension("names");
        let names = match std::fs::read_to_string(&names_path) {
            Ok(source) => {
                debug!("Loaded class names from {}", names_path.display());
                Some(parse_class_names(&source))
            }
            Err(_) => None,
        };

        Ok(Self {
            model,
            names,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_detections: DEFAULT_MAX_DETECTIONS,
        })
    }

    pub fn with_iou_threshold(mut self, iou_threshold: f32) -> Self {
        self.iou_threshold = iou_threshold;
        self
    }

    pub fn with_max_detections(mut self, max_detections: usize) -> Self {
        self.max_detections = max_detections;
        self
    }

    /// Square input size to run at. A model exported with a fixed input
    /// shape overrides the request.
    fn input_size(&self, requested: u32) -> u32 {
        let size = round_to_stride(requested);
        if requested > MAX_INFERENCE_SIZE {
            warn!("Inference size {} exceeds {}, using {}", requested, MAX_INFERENCE_SIZE, size);
        } else if size != requested {
            warn!("Inference size {} is not a multiple of {}, using {}", requested, STRIDE, size);
        }

        let fixed = self
            .model
            .input_ids()
            .first()
            .and_then(|id| self.model.node_info(*id))
            .and_then(|info| info.shape())
            .and_then(|shape| match shape.last() {
                Some(Dimension::Fixed(n)) => Some(*n as u32),
                _ => None,
            });

        match fixed {
            Some(fixed) if fixed != size => {
                warn!("Model has a fixed input size of {}, ignoring requested {}", fixed, size);
                fixed
            }
            _ => size,
        }
    }
}

impl Detector for YoloDetector {
    fn detect(&self, img: &DynamicImage, params: &DetectParams) -> anyhow::Result<Vec<RawDetection>> {
        let size = self.input_size(params.inference_size);
        let (input_img, letterbox) = letterbox_image(img, size);
        let input = to_input_tensor(&input_img);

        debug!("Running detector at {}x{}", size, size);
        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| anyhow::anyhow!("model run failed: {}", e))?;
        let output: NdTensor<f32, 3> = output
            .try_into()
            .map_err(|e| anyhow::anyhow!("unexpected model output: {:?}", e))?;

        let candidates = decode_output(&output, &letterbox, params.confidence);
        debug!("{} candidates above {}", candidates.len(), params.confidence);

        let kept = nms(candidates, self.iou_threshold, self.max_detections);
        Ok(kept.iter().map(Candidate::to_raw).collect())
    }

    fn class_names(&self) -> Option<&ClassNames> {
        self.names.as_ref()
    }
}
