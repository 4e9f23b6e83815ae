//! Completion predicate for plan instance days.
//!
//! Every completeness check in the engine (schedule projection, iteration
//! completion, history) goes through [`is_day_complete`].

use chrono::{DateTime, Utc};

use crate::model::PlanInstanceDay;

/// Whether a day counts as done.
///
/// Rest days are complete only through their explicit flag. Workout days are
/// complete when the linked workout has been finished or the flag is set.
#[must_use]
pub fn is_day_complete(day: &PlanInstanceDay) -> bool {
    if day.is_rest_day {
        return day.is_complete;
    }
    day.is_complete
        || day
            .workout
            .as_ref()
            .is_some_and(|w| w.completed_at.is_some())
}

/// When the day was completed, or `None` if it is not complete.
///
/// Workout days use the workout's `completed_at`; rest days (and workout days
/// flagged complete without a finished workout) use the day's `updated_at`.
#[must_use]
pub fn completion_date(day: &PlanInstanceDay) -> Option<DateTime<Utc>> {
    if !is_day_complete(day) {
        return None;
    }
    if day.is_rest_day {
        return Some(day.updated_at);
    }
    Some(
        day.workout
            .as_ref()
            .and_then(|w| w.completed_at)
            .unwrap_or(day.updated_at),
    )
}
