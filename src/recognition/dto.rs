use serde::{Deserialize, Serialize};

use crate::foods::resolver::ResolvedNutrition;
use crate::nutrients::Nutrients;

/// Recognizer's nutrition guess for one detection. No fiber.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NutritionSnapshot {
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fat: f64,
}

impl NutritionSnapshot {
    pub fn to_nutrients(self) -> Nutrients {
        Nutrients::new(self.calories, self.protein, self.carbs, self.fat, 0.0)
    }
}

/// Best-effort output of the recognition service for one image region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub food_name: String,
    pub confidence: f64, // percent, 0..=100
    #[serde(default)]
    pub portion: String,
    #[serde(default)]
    pub nutrition: NutritionSnapshot,
}

// --- recognizer wire format ---

#[derive(Debug, Deserialize)]
pub(crate) struct DetectReply {
    #[serde(default)]
    pub success: bool,
    pub detection: Option<DetectionResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DetectMultipleReply {
    #[serde(default)]
    pub detections: Vec<DetectionResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HealthReply {
    pub status: String,
}

// --- our responses ---

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolvedNutrition>,
    pub image_ref: String,
}

#[derive(Debug, Serialize)]
pub struct ResolvedDetection {
    pub detection: DetectionResult,
    pub resolution: ResolvedNutrition,
}

#[derive(Debug, Serialize)]
pub struct DetectMultipleResponse {
    pub success: bool,
    pub count: usize,
    pub detections: Vec<ResolvedDetection>,
    pub image_ref: String,
}
