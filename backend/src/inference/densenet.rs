//! DenseNet121 variant: one logit read as `p_REAL` through a sigmoid,
//! symmetric 0.5 threshold, fixed `[AI, REAL]` display order.

use forreal_shared::{Label, ModelVariant};
use image::DynamicImage;

use super::preprocess::prepare;
use super::{Backbone, Classifier, InferenceError, PredictionResult, ensure_finite};

pub const WEIGHTS_FILE: &str = "densenet121.ot";

pub const REAL_THRESHOLD: f32 = 0.5;

pub struct DenseNetClassifier<B> {
    backbone: B,
}

impl<B: Backbone> DenseNetClassifier<B> {
    pub fn new(backbone: B) -> Self {
        Self { backbone }
    }
}

impl<B: Backbone> Classifier for DenseNetClassifier<B> {
    fn variant(&self) -> ModelVariant {
        ModelVariant::Densenet
    }

    fn predict(&self, image: &DynamicImage) -> Result<PredictionResult, InferenceError> {
        let input = prepare(image);
        let logits = self.backbone.forward(&input)?;
        let [logit] = <[f32; 1]>::try_from(logits.as_slice()).map_err(|_| {
            InferenceError::UnexpectedOutput {
                expected: 1,
                got: logits.len(),
            }
        })?;
        ensure_finite(&[logit])?;

        let result = decide(sigmoid(logit));
        log::debug!(
            "Logit {:.4} -> AI={:.2}%, REAL={:.2}% -> {}",
            logit,
            result.probabilities[0] * 100.0,
            result.probabilities[1] * 100.0,
            result.label
        );
        Ok(result)
    }
}

pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

pub fn decide(prob_real: f32) -> PredictionResult {
    let prob_ai = 1.0 - prob_real;
    let (label, chosen) = if prob_real >= REAL_THRESHOLD {
        (Label::Real, prob_real)
    } else {
        (Label::Ai, prob_ai)
    };
    PredictionResult {
        label,
        index: label.index(),
        probabilities: [prob_ai, prob_real],
        confidence: chosen * 100.0,
    }
}
