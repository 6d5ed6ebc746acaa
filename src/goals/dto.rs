use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::goals::repo_types::{GoalsPatch, UnitSystem, UserGoals};

const MAX_CALORIE_GOAL: i32 = 20_000;

#[derive(Debug, Default, Deserialize)]
pub struct UpdateGoalsRequest {
    pub daily_calorie_goal: Option<i32>,
    pub target_weight: Option<f64>,
    pub current_weight: Option<f64>,
    pub height: Option<f64>,
    pub unit_system: Option<String>,
}

impl UpdateGoalsRequest {
    pub fn into_patch(self) -> Result<GoalsPatch, AppError> {
        if let Some(goal) = self.daily_calorie_goal {
            if !(1..=MAX_CALORIE_GOAL).contains(&goal) {
                return Err(AppError::validation(format!(
                    "daily_calorie_goal must be between 1 and {MAX_CALORIE_GOAL}"
                )));
            }
        }
        for (name, v) in [
            ("target_weight", self.target_weight),
            ("current_weight", self.current_weight),
            ("height", self.height),
        ] {
            if let Some(v) = v {
                if !v.is_finite() || v <= 0.0 {
                    return Err(AppError::validation(format!("{name} must be greater than 0")));
                }
            }
        }
        let unit_system = self
            .unit_system
            .as_deref()
            .map(str::parse::<UnitSystem>)
            .transpose()?;

        Ok(GoalsPatch {
            daily_calorie_goal: self.daily_calorie_goal,
            target_weight: self.target_weight,
            current_weight: self.current_weight,
            height: self.height,
            unit_system,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct GoalsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub goals: UserGoals,
}
