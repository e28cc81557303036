use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Outcome of a single classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum Label {
    #[serde(rename = "REAL")]
    #[strum(serialize = "REAL")]
    Real,
    #[serde(rename = "AI")]
    #[strum(serialize = "AI")]
    Ai,
}

impl Label {
    /// Wire index of the label: 0 for AI, 1 for REAL.
    pub fn index(self) -> u8 {
        match self {
            Label::Ai => 0,
            Label::Real => 1,
        }
    }
}

/// Which trained network backs the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ModelVariant {
    /// EfficientNetV2-B0 with a two-logit softmax head.
    Efficientnet,
    /// DenseNet121 with a single-logit sigmoid head.
    Densenet,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PredictionResponse {
    pub label: Label,
    pub index: u8,
    pub probabilities: [f32; 2],
    pub confidence: f32,
    pub filename: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub variant: Option<ModelVariant>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
}
