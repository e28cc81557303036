pub mod backbone;
pub mod densenet;
pub mod efficientnet;
pub mod preprocess;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use forreal_shared::{Label, ModelVariant};
use image::DynamicImage;

use crate::config::ModelConfig;
use backbone::{DenseNetBackbone, TorchScriptBackbone};
use densenet::DenseNetClassifier;
use efficientnet::EfficientNetClassifier;
use preprocess::PreparedImage;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Model not found at {}", .0.display())]
    WeightsNotFound(PathBuf),
    #[error("Failed to load model: {0}")]
    Load(#[source] tch::TchError),
    #[error("Forward pass failed: {0}")]
    Forward(#[source] tch::TchError),
    #[error("Unexpected model output: expected {expected} logits, got {got}")]
    UnexpectedOutput { expected: usize, got: usize },
    #[error("Model produced a non-finite logit: {0}")]
    NonFinite(f32),
    #[error("Preprocessing failed: {0}")]
    Preprocess(String),
}

/// Rejects NaN or infinite network output before any decision is made.
pub fn ensure_finite(logits: &[f32]) -> Result<(), InferenceError> {
    match logits.iter().find(|l| !l.is_finite()) {
        Some(&bad) => Err(InferenceError::NonFinite(bad)),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub label: Label,
    pub index: u8,
    /// Display pair; ordering depends on the variant.
    pub probabilities: [f32; 2],
    /// Percentage in [0, 100].
    pub confidence: f32,
}

/// Produces raw logits for a prepared image.
pub trait Backbone: Send + Sync {
    fn forward(&self, input: &PreparedImage) -> Result<Vec<f32>, InferenceError>;
}

pub trait Classifier: Send + Sync {
    fn variant(&self) -> ModelVariant;

    fn predict(&self, image: &DynamicImage) -> Result<PredictionResult, InferenceError>;
}

/// Path of the weights file each variant expects under the model directory.
pub fn weights_path(model_dir: &Path, variant: ModelVariant) -> PathBuf {
    match variant {
        ModelVariant::Efficientnet => model_dir.join(efficientnet::WEIGHTS_FILE),
        ModelVariant::Densenet => model_dir.join(densenet::WEIGHTS_FILE),
    }
}

/// Builds the configured classifier. Exactly one variant is ever loaded.
pub fn load_classifier(config: &ModelConfig) -> Result<Arc<dyn Classifier>, InferenceError> {
    let path = weights_path(&config.dir, config.variant);
    if !path.exists() {
        return Err(InferenceError::WeightsNotFound(path));
    }

    let device = config.device.resolve();
    log::info!(
        "Loading {} model from {} on {:?}...",
        config.variant,
        path.display(),
        device
    );

    let classifier: Arc<dyn Classifier> = match config.variant {
        ModelVariant::Efficientnet => Arc::new(EfficientNetClassifier::new(
            TorchScriptBackbone::load(&path, device)?,
        )),
        ModelVariant::Densenet => Arc::new(DenseNetClassifier::new(DenseNetBackbone::load(
            &path, device,
        )?)),
    };
    Ok(classifier)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceChoice;

    #[test]
    fn weights_live_under_model_dir() {
        let dir = Path::new("model");
        assert_eq!(
            weights_path(dir, ModelVariant::Efficientnet),
            PathBuf::from("model/best_model.pth")
        );
        assert_eq!(
            weights_path(dir, ModelVariant::Densenet),
            PathBuf::from("model/densenet121.ot")
        );
    }

    #[test]
    fn missing_weights_fail_fast() {
        for variant in [ModelVariant::Efficientnet, ModelVariant::Densenet] {
            let config = ModelConfig {
                dir: PathBuf::from("/nonexistent/forreal-model-dir"),
                variant,
                device: DeviceChoice::Cpu,
            };
            match load_classifier(&config) {
                Err(InferenceError::WeightsNotFound(path)) => {
                    assert!(path.starts_with("/nonexistent/forreal-model-dir"));
                }
                Err(other) => panic!("unexpected error: {other}"),
                Ok(_) => panic!("classifier loaded without weights"),
            }
        }
    }

    #[test]
    fn non_finite_logits_are_rejected() {
        assert!(ensure_finite(&[0.25, -3.0]).is_ok());
        assert!(matches!(
            ensure_finite(&[0.0, f32::NAN]),
            Err(InferenceError::NonFinite(v)) if v.is_nan()
        ));
        assert!(matches!(
            ensure_finite(&[f32::NEG_INFINITY]),
            Err(InferenceError::NonFinite(v)) if v == f32::NEG_INFINITY
        ));
    }

    #[test]
    fn missing_weights_message_names_the_path() {
        let err = InferenceError::WeightsNotFound(PathBuf::from("model/best_model.pth"));
        assert_eq!(err.to_string(), "Model not found at model/best_model.pth");
    }
}
