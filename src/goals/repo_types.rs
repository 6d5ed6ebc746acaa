use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

pub const DEFAULT_CALORIE_GOAL: i32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "metric",
            UnitSystem::Imperial => "imperial",
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitSystem {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(UnitSystem::Metric),
            "imperial" => Ok(UnitSystem::Imperial),
            _ => Err(AppError::validation(format!(
                "invalid unit_system {s:?}, expected metric or imperial"
            ))),
        }
    }
}

/// Per-user targets. Created with defaults the first time they are read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserGoals {
    pub daily_calorie_goal: i32,
    pub target_weight: Option<f64>,
    pub current_weight: Option<f64>,
    pub height: Option<f64>,
    pub unit_system: UnitSystem,
}

impl Default for UserGoals {
    fn default() -> Self {
        Self {
            daily_calorie_goal: DEFAULT_CALORIE_GOAL,
            target_weight: None,
            current_weight: None,
            height: None,
            unit_system: UnitSystem::Metric,
        }
    }
}

/// Fields to overwrite; `None` keeps the stored value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GoalsPatch {
    pub daily_calorie_goal: Option<i32>,
    pub target_weight: Option<f64>,
    pub current_weight: Option<f64>,
    pub height: Option<f64>,
    pub unit_system: Option<UnitSystem>,
}

impl GoalsPatch {
    /// Same semantics as the `COALESCE` update in the Postgres store.
    pub fn apply(&self, goals: &mut UserGoals) {
        if let Some(v) = self.daily_calorie_goal {
            goals.daily_calorie_goal = v;
        }
        goals.target_weight = self.target_weight.or(goals.target_weight);
        goals.current_weight = self.current_weight.or(goals.current_weight);
        goals.height = self.height.or(goals.height);
        if let Some(u) = self.unit_system {
            goals.unit_system = u;
        }
    }
}

#[derive(Debug, FromRow)]
pub struct GoalsRow {
    pub daily_calorie_goal: i32,
    pub target_weight: Option<f64>,
    pub current_weight: Option<f64>,
    pub height: Option<f64>,
    pub unit_system: String,
}

impl TryFrom<GoalsRow> for UserGoals {
    type Error = AppError;

    fn try_from(row: GoalsRow) -> Result<Self, Self::Error> {
        Ok(UserGoals {
            daily_calorie_goal: row.daily_calorie_goal,
            target_weight: row.target_weight,
            current_weight: row.current_weight,
            height: row.height,
            unit_system: row.unit_system.parse::<UnitSystem>()?,
        })
    }
}
