use serde::Serialize;
use tracing::debug;

use crate::error::AppError;
use crate::foods::repo::FoodCatalog;
use crate::nutrients::Nutrients;
use crate::recognition::dto::DetectionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    Catalog,
    Fallback,
}

/// Nutrition facts a label resolved to, ready to be credited to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedNutrition {
    pub food_id: Option<i64>,
    pub food_name: String,
    pub catalog_name: Option<String>,
    pub nutrients: Nutrients,
    pub default_portion: Option<String>,
    pub source: ResolutionSource,
}

/// Case-insensitive substring match of `label` against catalog names.
///
/// The first match in ascending id order wins. A miss is a normal outcome:
/// `fallback` is returned verbatim with no `food_id`.
pub async fn resolve(
    catalog: &dyn FoodCatalog,
    label: &str,
    fallback: Nutrients,
) -> Result<ResolvedNutrition, AppError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(AppError::validation("food label is required"));
    }

    let hit = catalog.search(label, 1).await?.into_iter().next();
    let resolved = match hit {
        Some(food) => ResolvedNutrition {
            food_id: Some(food.id),
            food_name: label.to_string(),
            nutrients: food.nutrients(),
            catalog_name: Some(food.name),
            default_portion: food.default_portion,
            source: ResolutionSource::Catalog,
        },
        None => ResolvedNutrition {
            food_id: None,
            food_name: label.to_string(),
            catalog_name: None,
            nutrients: fallback,
            default_portion: None,
            source: ResolutionSource::Fallback,
        },
    };
    debug!(label, food_id = ?resolved.food_id, source = ?resolved.source, "label resolved");
    Ok(resolved)
}

pub async fn resolve_detection(
    catalog: &dyn FoodCatalog,
    detection: &DetectionResult,
) -> Result<ResolvedNutrition, AppError> {
    let mut resolved = resolve(catalog, &detection.food_name, detection.nutrition.to_nutrients()).await?;
    if resolved.source == ResolutionSource::Fallback {
        resolved.default_portion = Some(detection.portion.clone());
    }
    Ok(resolved)
}
