use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ExerciseId, PlanId, UserId, WorkoutTemplateId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlanError {
    #[error("plan name cannot be empty")]
    EmptyName,

    #[error("plan must contain at least one day")]
    NoDays,

    #[error("plan days must be numbered 1..=n without gaps: expected day {expected}, found {found}")]
    NonSequentialDays { expected: u32, found: u32 },

    #[error("rest day {day_number} cannot reference a workout")]
    RestDayWithWorkout { day_number: u32 },

    #[error("workout day {day_number} has no workout template")]
    MissingWorkout { day_number: u32 },

    #[error("exercise {exercise_id} appears twice in template {template_id}")]
    DuplicateExercise {
        template_id: WorkoutTemplateId,
        exercise_id: ExerciseId,
    },
}

//
// ─── WORKOUT TEMPLATE ──────────────────────────────────────────────────────────
//

/// Exercise reference inside a template, positioned by `order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateExercise {
    pub exercise_id: ExerciseId,
    pub order: u32,
}

/// Ordered list of exercises performed on a workout day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutTemplate {
    id: WorkoutTemplateId,
    name: String,
    exercises: Vec<TemplateExercise>,
}

impl WorkoutTemplate {
    /// Build a template; exercises are kept sorted by `order`.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::DuplicateExercise` if an exercise is listed twice.
    pub fn new(
        id: WorkoutTemplateId,
        name: impl Into<String>,
        mut exercises: Vec<TemplateExercise>,
    ) -> Result<Self, PlanError> {
        exercises.sort_by_key(|e| e.order);
        for (i, exercise) in exercises.iter().enumerate() {
            if exercises[..i]
                .iter()
                .any(|prev| prev.exercise_id == exercise.exercise_id)
            {
                return Err(PlanError::DuplicateExercise {
                    template_id: id,
                    exercise_id: exercise.exercise_id,
                });
            }
        }
        Ok(Self {
            id,
            name: name.into(),
            exercises,
        })
    }

    #[must_use]
    pub fn id(&self) -> WorkoutTemplateId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn exercises(&self) -> &[TemplateExercise] {
        &self.exercises
    }
}

//
// ─── PLAN DAY ──────────────────────────────────────────────────────────────────
//

/// One day slot of a training plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDay {
    pub day_number: u32,
    pub is_rest_day: bool,
    pub workout: Option<WorkoutTemplate>,
}

impl PlanDay {
    #[must_use]
    pub fn rest(day_number: u32) -> Self {
        Self {
            day_number,
            is_rest_day: true,
            workout: None,
        }
    }

    #[must_use]
    pub fn workout(day_number: u32, template: WorkoutTemplate) -> Self {
        Self {
            day_number,
            is_rest_day: false,
            workout: Some(template),
        }
    }

    #[must_use]
    pub fn workout_template_id(&self) -> Option<WorkoutTemplateId> {
        self.workout.as_ref().map(WorkoutTemplate::id)
    }
}

//
// ─── TRAINING PLAN ─────────────────────────────────────────────────────────────
//

/// Reusable multi-day plan that a mesocycle repeats once per iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingPlan {
    id: PlanId,
    user_id: UserId,
    name: String,
    days: Vec<PlanDay>,
}

impl TrainingPlan {
    /// Creates a plan whose days are numbered densely from 1.
    ///
    /// Days may be passed in any order; they are stored sorted by `day_number`.
    ///
    /// # Errors
    ///
    /// Returns `PlanError` when the name is blank, no days are given, day numbers
    /// are not `1..=n`, or a day's rest flag disagrees with its template.
    pub fn new(
        id: PlanId,
        user_id: UserId,
        name: impl Into<String>,
        mut days: Vec<PlanDay>,
    ) -> Result<Self, PlanError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PlanError::EmptyName);
        }
        if days.is_empty() {
            return Err(PlanError::NoDays);
        }

        days.sort_by_key(|d| d.day_number);
        for (expected, day) in (1_u32..).zip(days.iter()) {
            if day.day_number != expected {
                return Err(PlanError::NonSequentialDays {
                    expected,
                    found: day.day_number,
                });
            }
            match (day.is_rest_day, day.workout.is_some()) {
                (true, true) => {
                    return Err(PlanError::RestDayWithWorkout {
                        day_number: day.day_number,
                    });
                }
                (false, false) => {
                    return Err(PlanError::MissingWorkout {
                        day_number: day.day_number,
                    });
                }
                _ => {}
            }
        }

        Ok(Self {
            id,
            user_id,
            name,
            days,
        })
    }

    #[must_use]
    pub fn id(&self) -> PlanId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Days ordered by `day_number`, starting at 1.
    #[must_use]
    pub fn days(&self) -> &[PlanDay] {
        &self.days
    }

    #[must_use]
    pub fn day(&self, day_number: u32) -> Option<&PlanDay> {
        let index = usize::try_from(day_number.checked_sub(1)?).ok()?;
        self.days.get(index)
    }

    #[must_use]
    pub fn day_count(&self) -> usize {
        self.days.len()
    }
}
