use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// The five credited nutrient values of a scan, also used as an aggregate delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrients {
    pub calories: f64,
    #[serde(alias = "protein")]
    pub protein_g: f64,
    #[serde(alias = "carbs")]
    pub carbs_g: f64,
    #[serde(alias = "fat")]
    pub fat_g: f64,
    #[serde(default, alias = "fiber")]
    pub fiber_g: f64,
}

impl Nutrients {
    pub const ZERO: Nutrients = Nutrients {
        calories: 0.0,
        protein_g: 0.0,
        carbs_g: 0.0,
        fat_g: 0.0,
        fiber_g: 0.0,
    };

    pub fn new(calories: f64, protein_g: f64, carbs_g: f64, fat_g: f64, fiber_g: f64) -> Self {
        Self {
            calories,
            protein_g,
            carbs_g,
            fat_g,
            fiber_g,
        }
    }

    fn fields(&self) -> [(&'static str, f64); 5] {
        [
            ("calories", self.calories),
            ("protein_g", self.protein_g),
            ("carbs_g", self.carbs_g),
            ("fat_g", self.fat_g),
            ("fiber_g", self.fiber_g),
        ]
    }

    /// Every credited value must be finite and non-negative.
    pub fn validate(&self) -> Result<(), AppError> {
        for (name, v) in self.fields() {
            if !v.is_finite() || v < 0.0 {
                return Err(AppError::validation(format!(
                    "{name} must be a finite, non-negative number"
                )));
            }
        }
        Ok(())
    }
}

impl std::ops::Add for Nutrients {
    type Output = Nutrients;

    fn add(self, rhs: Nutrients) -> Nutrients {
        Nutrients {
            calories: self.calories + rhs.calories,
            protein_g: self.protein_g + rhs.protein_g,
            carbs_g: self.carbs_g + rhs.carbs_g,
            fat_g: self.fat_g + rhs.fat_g,
            fiber_g: self.fiber_g + rhs.fiber_g,
        }
    }
}

impl std::iter::Sum for Nutrients {
    fn sum<I: Iterator<Item = Nutrients>>(iter: I) -> Nutrients {
        iter.fold(Nutrients::ZERO, |acc, n| acc + n)
    }
}
