use serde::{Deserialize, Serialize};

use crate::nutrients::Nutrients;
use crate::scans::repo_types::ScanEntry;

#[derive(Debug, Deserialize)]
pub struct LogScanRequest {
    pub food_id: Option<i64>,
    pub food_name: Option<String>,
    pub meal_type: Option<String>,
    pub portion_amount: Option<f64>,
    pub portion_unit: Option<String>,
    /// Caller-supplied facts, e.g. the recognizer's snapshot. Credited as-is.
    pub nutrition: Option<Nutrients>,
    pub ai_confidence: Option<f64>,
    pub image_ref: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListScansQuery {
    pub date: Option<String>,
    pub meal_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub success: bool,
    pub scan: ScanEntry,
}

#[derive(Debug, Serialize)]
pub struct ScanListResponse {
    pub success: bool,
    pub count: usize,
    pub scans: Vec<ScanEntry>,
}

#[derive(Debug, Serialize)]
pub struct DeletedScanResponse {
    pub success: bool,
    pub message: &'static str,
}
