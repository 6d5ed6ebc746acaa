use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::nutrients::Nutrients;

/// Reference catalog row. Owned by whoever curates `foods`; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FoodRecord {
    pub id: i64,
    pub name: String,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: f64,
    pub default_portion: Option<String>, // display string, e.g. "100g"
}

impl FoodRecord {
    pub fn nutrients(&self) -> Nutrients {
        Nutrients::new(self.calories, self.protein_g, self.carbs_g, self.fat_g, self.fiber_g)
    }
}
