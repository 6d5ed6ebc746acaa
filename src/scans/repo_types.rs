use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, Time};
use uuid::Uuid;

use crate::error::AppError;
use crate::nutrients::Nutrients;
use crate::timefmt::{clock_time, iso_date};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "Breakfast",
            MealType::Lunch => "Lunch",
            MealType::Dinner => "Dinner",
            MealType::Snack => "Snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            "snack" => Ok(MealType::Snack),
            _ => Err(AppError::validation(format!(
                "invalid meal_type {s:?}, expected Breakfast, Lunch, Dinner or Snack"
            ))),
        }
    }
}

/// A ledger row as handed to `Ledger::append`; identity is assigned there.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScanEntry {
    pub user_id: Uuid,
    pub food_id: Option<i64>,
    pub food_name: String,
    pub meal_type: Option<MealType>,
    pub portion_amount: Option<f64>,
    pub portion_unit: String,
    pub nutrients: Nutrients,
    pub image_ref: Option<String>,
    pub scan_date: Date,
    pub scan_time: Time,
    pub ai_confidence: Option<f64>,
}

impl NewScanEntry {
    pub fn into_entry(self, id: Uuid) -> ScanEntry {
        ScanEntry {
            id,
            user_id: self.user_id,
            food_id: self.food_id,
            food_name: self.food_name,
            meal_type: self.meal_type,
            portion_amount: self.portion_amount,
            portion_unit: self.portion_unit,
            calories: self.nutrients.calories,
            protein_g: self.nutrients.protein_g,
            carbs_g: self.nutrients.carbs_g,
            fat_g: self.nutrients.fat_g,
            fiber_g: self.nutrients.fiber_g,
            image_ref: self.image_ref,
            scan_date: self.scan_date,
            scan_time: self.scan_time,
            ai_confidence: self.ai_confidence,
        }
    }
}

/// One intake event. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub food_id: Option<i64>,
    pub food_name: String,
    pub meal_type: Option<MealType>,
    pub portion_amount: Option<f64>,
    pub portion_unit: String,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: f64,
    pub image_ref: Option<String>,
    #[serde(with = "iso_date")]
    pub scan_date: Date,
    #[serde(with = "clock_time")]
    pub scan_time: Time,
    pub ai_confidence: Option<f64>,
}

impl ScanEntry {
    pub fn nutrients(&self) -> Nutrients {
        Nutrients::new(self.calories, self.protein_g, self.carbs_g, self.fat_g, self.fiber_g)
    }
}

#[derive(Debug, FromRow)]
pub struct ScanRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub food_id: Option<i64>,
    pub food_name: String,
    pub meal_type: Option<String>,
    pub portion_amount: Option<f64>,
    pub portion_unit: String,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: f64,
    pub image_ref: Option<String>,
    pub scan_date: Date,
    pub scan_time: Time,
    pub ai_confidence: Option<f64>,
}

impl TryFrom<ScanRow> for ScanEntry {
    type Error = AppError;

    fn try_from(r: ScanRow) -> Result<Self, Self::Error> {
        let meal_type = r.meal_type.as_deref().map(str::parse::<MealType>).transpose()?;
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            food_id: r.food_id,
            food_name: r.food_name,
            meal_type,
            portion_amount: r.portion_amount,
            portion_unit: r.portion_unit,
            calories: r.calories,
            protein_g: r.protein_g,
            carbs_g: r.carbs_g,
            fat_g: r.fat_g,
            fiber_g: r.fiber_g,
            image_ref: r.image_ref,
            scan_date: r.scan_date,
            scan_time: r.scan_time,
            ai_confidence: r.ai_confidence,
        })
    }
}
