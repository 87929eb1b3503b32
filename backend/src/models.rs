use moto_inference::PredictionRecord;
use serde::Serialize;

use crate::inference::Prediction;

pub const CURRENCY: &str = "LKR";

#[derive(Debug, Serialize, Clone)]
pub struct PredictionResult {
    pub price: f64,
    pub currency: String,
    pub formatted_price: String,
    pub display: String,
    pub input: PredictionRecord,
    pub model_name: String,
    pub run_id: Option<String>,
    /// Set when the prediction succeeded but could not be recorded.
    pub tracking_warning: Option<String>,
    pub timestamp: String,
}

impl PredictionResult {
    pub fn new(
        prediction: Prediction,
        input: PredictionRecord,
        model_name: String,
        run_id: Option<String>,
        tracking_warning: Option<String>,
    ) -> Self {
        let formatted_price = format_lkr(prediction.price);
        PredictionResult {
            price: prediction.price,
            currency: CURRENCY.to_string(),
            display: format!("Estimated Price: {formatted_price}"),
            formatted_price,
            input,
            model_name,
            run_id,
            tracking_warning,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Whole rupees with comma thousands separators, e.g. `LKR 1,250,000`.
pub fn format_lkr(price: f64) -> String {
    // adding 0.0 turns -0.0 into 0.0
    let digits = format!("{:.0}", price.max(0.0).round() + 0.0);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{CURRENCY} {grouped}")
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: String,
    pub execution_time_ms: Option<u64>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            execution_time_ms: None,
        }
    }

    pub fn error(message: &str) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            execution_time_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_thousands() {
        assert_eq!(format_lkr(0.0), "LKR 0");
        assert_eq!(format_lkr(999.0), "LKR 999");
        assert_eq!(format_lkr(350000.0), "LKR 350,000");
        assert_eq!(format_lkr(1234567.0), "LKR 1,234,567");
    }

    #[test]
    fn rounds_to_whole_rupees() {
        assert_eq!(format_lkr(349999.5), "LKR 350,000");
        assert_eq!(format_lkr(1000.4), "LKR 1,000");
    }

    #[test]
    fn prices_beyond_u64_keep_every_digit() {
        assert_eq!(format_lkr(1e20), "LKR 100,000,000,000,000,000,000");
        assert_eq!(format_lkr(-0.0), "LKR 0");
    }

    #[test]
    fn error_envelope_has_no_data() {
        let response = ApiResponse::<()>::error("Prediction failed: boom");
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.error.as_deref(), Some("Prediction failed: boom"));
    }
}
