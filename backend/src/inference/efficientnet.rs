//! EfficientNetV2-B0 variant: two logits, temperature-scaled softmax and an
//! asymmetric decision threshold.
//!
//! Raw network order is `[AI, REAL]`. The checkpoint was trained on small
//! synthetic images and is overconfident on real photos, hence the very high
//! bar for reporting AI.

use forreal_shared::{Label, ModelVariant};
use image::DynamicImage;

use super::preprocess::prepare;
use super::{Backbone, Classifier, InferenceError, PredictionResult, ensure_finite};

pub const WEIGHTS_FILE: &str = "best_model.pth";

pub const TEMPERATURE: f32 = 2.0;

/// Minimum `p_AI` for an AI verdict.
pub const AI_THRESHOLD: f32 = 0.9996;

pub struct EfficientNetClassifier<B> {
    backbone: B,
}

impl<B: Backbone> EfficientNetClassifier<B> {
    pub fn new(backbone: B) -> Self {
        Self { backbone }
    }
}

impl<B: Backbone> Classifier for EfficientNetClassifier<B> {
    fn variant(&self) -> ModelVariant {
        ModelVariant::Efficientnet
    }

    fn predict(&self, image: &DynamicImage) -> Result<PredictionResult, InferenceError> {
        let input = prepare(image);
        let logits = self.backbone.forward(&input)?;
        let [ai, real] = <[f32; 2]>::try_from(logits.as_slice()).map_err(|_| {
            InferenceError::UnexpectedOutput {
                expected: 2,
                got: logits.len(),
            }
        })?;
        ensure_finite(&logits)?;

        let [prob_ai, prob_real] = softmax_with_temperature([ai, real], TEMPERATURE);
        let result = decide(prob_ai, prob_real);

        log::debug!(
            "Raw: AI={:.2}%, REAL={:.2}% -> Display: [{:.2}%, {:.2}%] -> {}",
            prob_ai * 100.0,
            prob_real * 100.0,
            result.probabilities[0] * 100.0,
            result.probabilities[1] * 100.0,
            result.label
        );
        Ok(result)
    }
}

pub fn softmax_with_temperature(logits: [f32; 2], temperature: f32) -> [f32; 2] {
    let scaled = logits.map(|l| l / temperature);
    let max = scaled[0].max(scaled[1]);
    let exps = scaled.map(|l| (l - max).exp());
    let sum = exps[0] + exps[1];
    exps.map(|e| e / sum)
}

/// Applies the threshold and the display ordering.
///
/// A REAL verdict swaps the pair so the first slot carries the larger,
/// decision-driving value. Confidence always comes from the raw pair.
pub fn decide(prob_ai: f32, prob_real: f32) -> PredictionResult {
    let confidence = prob_ai.max(prob_real) * 100.0;
    if prob_ai >= AI_THRESHOLD {
        PredictionResult {
            label: Label::Ai,
            index: Label::Ai.index(),
            probabilities: [prob_ai, prob_real],
            confidence,
        }
    } else {
        PredictionResult {
            label: Label::Real,
            index: Label::Real.index(),
            probabilities: [prob_real, prob_ai],
            confidence,
        }
    }
}
