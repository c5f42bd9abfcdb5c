//! Free-form tuning tokens that follow the model and image arguments.
//!
//! Tokens carry no flag names. `ocr` enables text recognition, a literal
//! with a decimal point or exponent marker is a confidence threshold, and
//! any other integer is an inference size. Anything else is ignored.

use std::num::NonZeroU32;
use tracing::debug;

pub const DEFAULT_CONFIDENCE: f32 = 0.25;
pub const DEFAULT_INFERENCE_SIZE: u32 = 640;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedParameters {
    pub confidence: f32,
    pub inference_size: NonZeroU32,
    pub ocr: bool,
}

impl Default for ParsedParameters {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            inference_size: NonZeroU32::new(DEFAULT_INFERENCE_SIZE).unwrap_or(NonZeroU32::MIN),
            ocr: false,
        }
    }
}

impl ParsedParameters {
    /// Fold every token over the defaults. Later tokens of the same kind win.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokens
            .into_iter()
            .fold(Self::default(), |params, token| classify(token.as_ref(), params))
    }
}

/// Apply one token to `params`. Never fails: unusable tokens leave the
/// parameters untouched.
pub fn classify(token: &str, mut params: ParsedParameters) -> ParsedParameters {
    let token = token.to_lowercase();

    if token == "ocr" {
        params.ocr = true;
        return params;
    }

    if token.contains('.') || token.contains('e') {
        match token.parse::<f32>() {
            Ok(confidence) => params.confidence = confidence,
            Err(_) => debug!("Ignoring token {:?}: not a confidence value", token),
        }
        return params;
    }

    match token.parse::<NonZeroU32>() {
        Ok(size) => params.inference_size = size,
        Err(_) => debug!("Ignoring token {:?}: not an inference size", token),
    }
    params
}
