use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use forreal_shared::{HealthResponse, PredictionResponse, StatusResponse};
use futures::TryStreamExt;
use log::{error, info, warn};

use crate::error::ApiError;
use crate::inference::{Classifier, PredictionResult};

pub const ALLOWED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "bmp"];

const UPLOAD_FIELD: &str = "file";

/// Per-process state handed to every handler. `classifier` stays `None` when
/// the weights failed to load.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Option<Arc<dyn Classifier>>,
    pub max_upload_bytes: usize,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(root)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/predict").route(web::post().to(predict)));
}

async fn root() -> HttpResponse {
    HttpResponse::Ok().json(StatusResponse {
        status: "ok".into(),
        message: "ForReal API is running".into(),
    })
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".into(),
        model_loaded: state.classifier.is_some(),
        variant: state.classifier.as_ref().map(|c| c.variant()),
    })
}

struct Upload {
    filename: String,
    data: Vec<u8>,
}

async fn predict(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let classifier = state
        .classifier
        .as_ref()
        .map(Arc::clone)
        .ok_or(ApiError::ModelUnavailable)?;

    let upload = read_upload(&mut payload, state.max_upload_bytes).await?;
    info!("Received {} ({} bytes)", upload.filename, upload.data.len());

    let Upload { filename, data } = upload;
    let result = web::block(move || -> Result<PredictionResult, String> {
        let image = image::load_from_memory(&data).map_err(|e| e.to_string())?;
        classifier.predict(&image).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| {
        error!("Inference worker for {} did not finish: {}", filename, e);
        ApiError::Prediction(e.to_string())
    })?
    .map_err(|msg| {
        error!("Prediction failed for {}: {}", filename, msg);
        ApiError::Prediction(msg)
    })?;

    Ok(HttpResponse::Ok().json(PredictionResponse {
        label: result.label,
        index: result.index,
        probabilities: result.probabilities,
        confidence: round2(result.confidence),
        filename,
    }))
}

async fn read_upload(payload: &mut Multipart, limit: usize) -> Result<Upload, ApiError> {
    while let Some(mut field) = payload.try_next().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            while field.try_next().await?.is_some() {}
            continue;
        }

        validate_content_type(field.content_type().map(|m| m.essence_str()))?;
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or_default()
            .to_string();
        validate_extension(&filename)?;

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if data.len() + chunk.len() > limit {
                warn!("Rejected {}: larger than {} bytes", filename, limit);
                return Err(ApiError::TooLarge);
            }
            data.extend_from_slice(&chunk);
        }
        return Ok(Upload { filename, data });
    }
    Err(ApiError::MissingFile)
}

fn validate_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    match content_type {
        Some(ct) if ct.starts_with("image/") => Ok(()),
        _ => Err(ApiError::NotAnImage),
    }
}

/// The extension is whatever follows the last dot, lowercased.
fn validate_extension(filename: &str) -> Result<(), ApiError> {
    let ext = filename.rsplit('.').next().unwrap_or_default().to_lowercase();
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(ApiError::DisallowedExtension)
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
