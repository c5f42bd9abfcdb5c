use clap::Parser;
use clap::error::ErrorKind;
use image::{DynamicImage, ImageReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use pinscan::detection::ocr::default_model_dir;
use pinscan::detection::yolo::{DEFAULT_IOU_THRESHOLD, DEFAULT_MAX_DETECTIONS};
use pinscan::{
    AggregationResult, ClassCatalog, CropStore, DirCropStore, OcrsRecognizer, ParsedParameters, Pipeline,
    ScanError, TextRecognizer, YoloDetector,
};

#[derive(Parser)]
#[command(name = "pinscan", version)]
#[command(about = "Detect batteries in an image and total their reward points")]
#[command(after_help = "TOKENS: a confidence threshold written with a decimal point (0.3), \
    an integer inference size (640), or `ocr` to read text on each detection. \
    A token spelled like an option (-v, --help) is read as that option; \
    put `--` before MODEL to pass every following word as a positional or token.")]
struct Cli {
    /// Path to the detector model (.rten)
    #[arg(value_name = "MODEL")]
    model_path: PathBuf,

    /// Path to input image file
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// Free-form tuning tokens
    #[arg(value_name = "TOKENS", trailing_var_arg = true, allow_hyphen_values = true)]
    tokens: Vec<String>,

    /// Enable verbose output on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Directory that receives one JPEG per detection
    #[arg(long, value_name = "DIR", env = "PINSCAN_CROP_DIR", default_value = "tmp_crops")]
    crop_dir: PathBuf,

    /// Do not write crops
    #[arg(long)]
    no_crops: bool,

    /// Directory holding the ocrs text-detection and text-recognition models
    #[arg(long, value_name = "DIR", env = "PINSCAN_OCR_MODELS")]
    ocr_models: Option<PathBuf>,

    /// TOML class catalog replacing the built-in battery table
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// IoU threshold for non-maximum suppression
    #[arg(long, value_name = "F", default_value_t = DEFAULT_IOU_THRESHOLD)]
    iou: f32,

    /// Maximum detections kept by the detector
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_DETECTIONS)]
    max_det: usize,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => return report(&ScanError::Usage(e.render().to_string().trim().to_string())),
    };

    init_logging(cli.verbose);

    match run(&cli) {
        Ok(result) => match serde_json::to_string(&result) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => report(&ScanError::Inference(format!("cannot encode result: {}", e))),
        },
        Err(e) => report(&e),
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "pinscan=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Print `{"error": ...}` on stdout and return the matching exit code.
fn report(err: &ScanError) -> ExitCode {
    println!("{}", serde_json::json!({ "error": err.to_string() }));
    ExitCode::from(err.exit_code())
}

fn run(cli: &Cli) -> Result<AggregationResult, ScanError> {
    let params = ParsedParameters::from_tokens(&cli.tokens);

    let catalog = match &cli.catalog {
        Some(path) => ClassCatalog::load(path)?,
        None => ClassCatalog::batteries(),
    };

    let img = load_image(&cli.image_path)?;
    tracing::debug!("Image loaded: {}x{}", img.width(), img.height());

    let detector = YoloDetector::load(&cli.model_path)?
        .with_iou_threshold(cli.iou)
        .with_max_detections(cli.max_det);

    let recognizer = if params.ocr { load_recognizer(cli.ocr_models.as_deref()) } else { None };
    let crops = (!cli.no_crops).then(|| DirCropStore::new(&cli.crop_dir));

    let mut pipeline = Pipeline::new(&detector, &catalog)
        .with_recognizer(recognizer.as_ref().map(|r| r as &dyn TextRecognizer))
        .with_crop_store(crops.as_ref().map(|c| c as &dyn CropStore));
    if let Some(debug_dir) = &cli.debug_out {
        pipeline = pipeline.with_debug(debug_dir.clone())?;
    }

    let stem = cli
        .image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    pipeline.run(&img, &stem, &params)
}

fn load_image(path: &Path) -> Result<DynamicImage, ScanError> {
    let decode_error = |message: String| ScanError::ImageDecode {
        path: path.to_path_buf(),
        message,
    };
    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| decode_error(e.to_string()))?
        .decode()
        .map_err(|e| decode_error(e.to_string()))
}

/// OCR that cannot start is treated as unavailable, not as a failure.
fn load_recognizer(model_dir: Option<&Path>) -> Option<OcrsRecognizer> {
    let Some(dir) = model_dir.map(Path::to_path_buf).or_else(default_model_dir) else {
        warn!("OCR unavailable: no model directory (set --ocr-models or HOME)");
        return None;
    };
    match OcrsRecognizer::load(&dir) {
        Ok(recognizer) => Some(recognizer),
        Err(e) => {
            warn!("OCR unavailable: {:#}", e);
            None
        }
    }
}
