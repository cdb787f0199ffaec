//! Gateway prediction handler
//!
//! `POST /api/predict/run` accepts named readings instead of a raw tensor and
//! never fails: when the model cannot answer, a rain-sum heuristic does.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use flood_risk_core::FeatureVector;

use crate::AppState;

/// Total rainfall over the window above which the heuristic reports risk
const FALLBACK_RAIN_THRESHOLD: f32 = 50.0;

const DEFAULT_RAINFALL: f32 = 0.0;
const DEFAULT_TEMPERATURE: f32 = 30.0;
const DEFAULT_HUMIDITY: f32 = 80.0;
const DEFAULT_PRESSURE: f32 = 1010.0;

#[derive(Debug, Serialize, PartialEq)]
pub struct GatewayResponse {
    /// 0 when the category is Aman, 1 otherwise
    pub result: u8,
    pub category: String,
    pub probability: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}

impl GatewayResponse {
    fn fallback(total_rain: f32) -> Self {
        let flood = total_rain > FALLBACK_RAIN_THRESHOLD;
        Self {
            result: u8::from(flood),
            category: if flood { "Siaga (Fallback)" } else { "Aman (Fallback)" }.to_string(),
            probability: if flood { 85.0 } else { 10.0 },
            note: Some("Model offline"),
        }
    }
}

/// Numeric field of a reading. Absent, null, zero, empty and non-numeric
/// values all count as missing; a numeric string like "0" does not.
fn field(reading: &Value, key: &str) -> Option<f32> {
    match reading.get(key)? {
        Value::Number(n) => n.as_f64().filter(|&v| v != 0.0).map(|v| v as f32),
        Value::String(s) => s.trim().parse::<f32>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Readings of the first batch entry, or an empty list
fn first_entry(body: &Value) -> &[Value] {
    body.get("features")
        .and_then(|f| f.get(0))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Map a named reading to a feature vector, filling missing fields
fn reading_to_vector(reading: &Value) -> FeatureVector {
    FeatureVector::new(
        field(reading, "rainfall").unwrap_or(DEFAULT_RAINFALL),
        field(reading, "temp").unwrap_or(DEFAULT_TEMPERATURE),
        field(reading, "humidity").unwrap_or(DEFAULT_HUMIDITY),
        field(reading, "pressure").unwrap_or(DEFAULT_PRESSURE),
    )
}

fn total_rainfall(readings: &[Value]) -> f32 {
    readings.iter().filter_map(|r| field(r, "rainfall")).sum()
}

pub async fn run(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Json<GatewayResponse> {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            tracing::warn!("Gateway received an unreadable body: {}", rejection.body_text());
            Value::Null
        }
    };
    let readings = first_entry(&body);

    let outcome = if readings.is_empty() {
        Err("no readings provided".to_string())
    } else {
        let window: Vec<FeatureVector> = readings.iter().map(reading_to_vector).collect();
        state
            .pipeline
            .predict(&[window])
            .map_err(|e| e.to_string())
            .and_then(|results| {
                results
                    .into_iter()
                    .next()
                    .ok_or_else(|| "pipeline returned no predictions".to_string())
            })
    };

    let response = match outcome {
        Ok(prediction) => GatewayResponse {
            result: u8::from(prediction.category.is_elevated()),
            category: prediction.category.to_string(),
            probability: prediction.probability,
            note: None,
        },
        Err(reason) => {
            tracing::warn!("Gateway falling back to rain heuristic: {}", reason);
            GatewayResponse::fallback(total_rainfall(readings))
        }
    };

    Json(response)
}
