use chrono::NaiveDate;

use crate::error::CoreError;
use crate::rollup::days_between;

pub fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::validation("name", "must not be empty"));
    }
    Ok(())
}

pub fn validate_progress(progress: i32) -> Result<(), CoreError> {
    if !(0..=100).contains(&progress) {
        return Err(CoreError::validation(
            "progress",
            format!("{} is outside 0..=100", progress),
        ));
    }
    Ok(())
}

pub fn validate_sort_order(sort_order: i64) -> Result<(), CoreError> {
    if sort_order < 0 {
        return Err(CoreError::validation("sort_order", "must not be negative"));
    }
    Ok(())
}

/// The schedule-bearing fields of a leaf, as they will be stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleFields {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration_days: Option<f64>,
    pub is_milestone: bool,
}

/// Which parts of the schedule the caller touched in this request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleChange {
    pub dates_changed: bool,
    pub duration_supplied: bool,
}

impl ScheduleFields {
    /// Validates the merged schedule and fills in what can be derived.
    ///
    /// A milestone gets a single date mirrored into both ends and a pinned
    /// zero duration. When the dates move and no explicit duration was
    /// supplied, the duration is recomputed from the dates.
    pub fn normalize(mut self, change: ScheduleChange) -> Result<Self, CoreError> {
        if let Some(d) = self.duration_days {
            if !d.is_finite() || d < 0.0 {
                return Err(CoreError::validation(
                    "duration_days",
                    format!("{} is not a non-negative number of days", d),
                ));
            }
        }

        if self.is_milestone {
            match (self.start_date, self.end_date) {
                (Some(s), None) => self.end_date = Some(s),
                (None, Some(e)) => self.start_date = Some(e),
                (Some(s), Some(e)) if s != e => {
                    return Err(CoreError::validation(
                        "end_date",
                        "a milestone must start and end on the same date",
                    ));
                }
                _ => {}
            }
            if change.duration_supplied && self.duration_days.is_some_and(|d| d != 0.0) {
                return Err(CoreError::validation(
                    "duration_days",
                    "a milestone has zero duration",
                ));
            }
            self.duration_days = Some(0.0);
        }

        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => {
                if end < start {
                    return Err(CoreError::validation(
                        "end_date",
                        format!("{} precedes start date {}", end, start),
                    ));
                }
                let derive = self.duration_days.is_none()
                    || (change.dates_changed && !change.duration_supplied);
                if derive && !self.is_milestone {
                    self.duration_days = Some(days_between(start, end));
                }
            }
            (Some(_), None) => {
                return Err(CoreError::validation(
                    "end_date",
                    "start and end dates must both be set or both be empty",
                ));
            }
            (None, Some(_)) => {
                return Err(CoreError::validation(
                    "start_date",
                    "start and end dates must both be set or both be empty",
                ));
            }
            (None, None) => {}
        }

        Ok(self)
    }
}
