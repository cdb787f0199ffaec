//! Prediction handler
//!
//! `POST /predict` with `{ "features": [[[rainfall, temperature, humidity, pressure]; 24]; batch] }`.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use flood_risk_core::{FloodError, PredictionResult, RiskCategory};

use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub features: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    /// First window's probability (percentage, 2 decimals)
    pub probability: f64,
    /// First window's category
    pub category: RiskCategory,
    /// One entry per window, in request order
    pub predictions: Vec<PredictionResult>,
}

/// `null`, `[]`, `{}` and `""` all count as no features
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Decode the nested array; rank and type errors are shape errors
pub fn decode_features(value: Value) -> Result<Vec<Vec<Vec<f32>>>, FloodError> {
    serde_json::from_value(value).map_err(|e| {
        FloodError::InputShape(format!(
            "features must be a (batch, timesteps, features) numeric array: {}",
            e
        ))
    })
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> AppResult<Json<PredictResponse>> {
    let Json(req) = payload?;
    state.pipeline.ensure_ready()?;

    let features = match req.features {
        Some(value) if !is_blank(&value) => value,
        _ => return Err(AppError::BadRequest("No features provided".to_string())),
    };

    let batch = decode_features(features)?;
    let predictions = state.pipeline.predict_nested(&batch)?;

    let first = predictions
        .first()
        .copied()
        .ok_or_else(|| AppError::Internal("pipeline returned no predictions".to_string()))?;

    tracing::debug!(
        "Predicted {} window(s); first: {}% {}",
        predictions.len(),
        first.probability,
        first.category
    );

    Ok(Json(PredictResponse {
        probability: first.probability,
        category: first.category,
        predictions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_features() {
        assert!(is_blank(&Value::Null));
        assert!(is_blank(&json!([])));
        assert!(is_blank(&json!({})));
        assert!(!is_blank(&json!([[[1.0, 2.0, 3.0, 4.0]]])));
    }

    #[test]
    fn test_decode_rejects_wrong_rank() {
        let err = decode_features(json!([1.0, 2.0])).unwrap_err();
        assert!(matches!(err, FloodError::InputShape(_)));

        let ok = decode_features(json!([[[1.0, 2.0, 3.0, 4.0]]])).unwrap();
        assert_eq!(ok[0][0], vec![1.0, 2.0, 3.0, 4.0]);
    }
}
