use serde::{Deserialize, Serialize};

use crate::foods::repo_types::FoodRecord;

pub const MAX_SEARCH_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct FoodSearchQuery {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}
fn default_limit() -> i64 { 20 }

#[derive(Debug, Serialize)]
pub struct FoodSearchResponse {
    pub success: bool,
    pub foods: Vec<FoodRecord>,
}

#[derive(Debug, Serialize)]
pub struct FoodResponse {
    pub success: bool,
    pub food: FoodRecord,
}
