use serde::Serialize;
use sqlx::FromRow;

use crate::nutrients::Nutrients;
use crate::scans::repo_types::ScanEntry;

/// Running totals for one (user, date). A derived cache of the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, FromRow)]
pub struct DailySummary {
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub total_fiber: f64,
    pub meal_count: i32,
}

/// Change applied to a summary by one ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryDelta {
    pub nutrients: Nutrients,
    pub meals: i32, // +1 on append, -1 on remove
}

impl SummaryDelta {
    pub fn credit(nutrients: Nutrients) -> Self {
        Self { nutrients, meals: 1 }
    }

    pub fn debit(nutrients: Nutrients) -> Self {
        Self { nutrients, meals: -1 }
    }
}

impl DailySummary {
    pub fn from_totals(totals: Nutrients, meal_count: i32) -> Self {
        Self {
            total_calories: totals.calories,
            total_protein: totals.protein_g,
            total_carbs: totals.carbs_g,
            total_fat: totals.fat_g,
            total_fiber: totals.fiber_g,
            meal_count,
        }
    }

    /// Recomputes a summary from the surviving ledger rows of one day.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a ScanEntry>) -> Self {
        let (totals, count) = entries
            .into_iter()
            .fold((Nutrients::ZERO, 0i32), |(sum, n), e| (sum + e.nutrients(), n + 1));
        Self::from_totals(totals, count)
    }

    pub fn totals(&self) -> Nutrients {
        Nutrients::new(
            self.total_calories,
            self.total_protein,
            self.total_carbs,
            self.total_fat,
            self.total_fiber,
        )
    }

    /// Same arithmetic as the SQL upsert/decrement in `summaries::repo`.
    ///
    /// Debits clamp every total at zero, and a day that drops to zero meals
    /// resets to exact zeros so no float residue survives.
    pub fn apply(&mut self, delta: SummaryDelta) {
        let d = delta.nutrients;
        if delta.meals >= 0 {
            self.total_calories += d.calories;
            self.total_protein += d.protein_g;
            self.total_carbs += d.carbs_g;
            self.total_fat += d.fat_g;
            self.total_fiber += d.fiber_g;
            self.meal_count += delta.meals;
        } else if self.meal_count + delta.meals <= 0 {
            *self = DailySummary::default();
        } else {
            self.total_calories = (self.total_calories - d.calories).max(0.0);
            self.total_protein = (self.total_protein - d.protein_g).max(0.0);
            self.total_carbs = (self.total_carbs - d.carbs_g).max(0.0);
            self.total_fat = (self.total_fat - d.fat_g).max(0.0);
            self.total_fiber = (self.total_fiber - d.fiber_g).max(0.0);
            self.meal_count += delta.meals;
        }
    }
}
