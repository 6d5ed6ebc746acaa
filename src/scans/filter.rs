//! Composable predicates for history queries.

use sqlx::{Postgres, QueryBuilder};
use time::Date;

use crate::error::AppError;
use crate::scans::repo_types::{MealType, ScanEntry};
use crate::timefmt::parse_date;

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanFilter {
    pub date: Option<Date>,
    pub meal_type: Option<MealType>,
}

impl ScanFilter {
    /// Builds a filter from raw query values. `"All"` or blank meal type means no filter.
    pub fn parse(date: Option<&str>, meal_type: Option<&str>) -> Result<Self, AppError> {
        let date = date
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_date)
            .transpose()?;
        let meal_type = meal_type
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
            .map(str::parse::<MealType>)
            .transpose()?;
        Ok(Self { date, meal_type })
    }

    /// Appends one bound `AND` clause per active predicate.
    pub fn push_predicates(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(date) = self.date {
            qb.push(" AND scan_date = ").push_bind(date);
        }
        if let Some(meal_type) = self.meal_type {
            qb.push(" AND meal_type = ").push_bind(meal_type.as_str());
        }
    }

    pub fn matches(&self, entry: &ScanEntry) -> bool {
        self.date.map_or(true, |d| entry.scan_date == d)
            && self.meal_type.map_or(true, |m| entry.meal_type == Some(m))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: DEFAULT_PAGE_LIMIT, offset: 0 }
    }
}

impl Page {
    /// `limit` must be positive and is capped at `MAX_PAGE_LIMIT`; `offset` must not be negative.
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Result<Self, AppError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        let offset = offset.unwrap_or(0);
        if limit < 1 {
            return Err(AppError::validation("limit must be at least 1"));
        }
        if offset < 0 {
            return Err(AppError::validation("offset must not be negative"));
        }
        Ok(Self { limit: limit.min(MAX_PAGE_LIMIT), offset })
    }
}
