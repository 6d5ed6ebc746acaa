//! Wire formats for calendar dates and wall-clock times.

use time::{macros::format_description, Date, OffsetDateTime, Time, UtcOffset};

use crate::error::AppError;

time::serde::format_description!(pub iso_date, Date, "[year]-[month]-[day]");
time::serde::format_description!(pub clock_time, Time, "[hour]:[minute]:[second]");

/// `YYYY-MM-DD` from query strings.
pub fn parse_date(raw: &str) -> Result<Date, AppError> {
    let fmt = format_description!("[year]-[month]-[day]");
    Date::parse(raw.trim(), &fmt)
        .map_err(|_| AppError::validation(format!("invalid date {raw:?}, expected YYYY-MM-DD")))
}

/// Date and second-resolution time of `now` as seen from `offset`.
pub fn local_stamp(now: OffsetDateTime, offset: UtcOffset) -> (Date, Time) {
    let local = now.to_offset(offset);
    let time = local.time();
    let time = Time::from_hms(time.hour(), time.minute(), time.second()).unwrap_or(time);
    (local.date(), time)
}

pub fn today(offset: UtcOffset) -> Date {
    OffsetDateTime::now_utc().to_offset(offset).date()
}
