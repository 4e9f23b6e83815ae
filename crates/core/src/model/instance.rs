use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{
    ExerciseId, InstanceDayId, MesocycleId, PlanInstanceId, WorkoutInstanceId, WorkoutTemplateId,
};
use crate::model::status::Status;

/// One performed set. Contributes `weight × reps` to volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSet {
    pub exercise_id: ExerciseId,
    pub set_number: u32,
    pub weight: f64,
    pub reps: u32,
}

impl ExerciseSet {
    #[must_use]
    pub fn new(exercise_id: ExerciseId, set_number: u32, weight: f64, reps: u32) -> Self {
        Self {
            exercise_id,
            set_number,
            weight,
            reps,
        }
    }

    #[must_use]
    pub fn volume(&self) -> f64 {
        self.weight * f64::from(self.reps)
    }
}

/// A performed workout session attached to a plan instance day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutInstance {
    pub id: WorkoutInstanceId,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub sets: Vec<ExerciseSet>,
}

impl WorkoutInstance {
    #[must_use]
    pub fn new(id: WorkoutInstanceId, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at,
            completed_at: None,
            sets: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Concrete, persisted day of one iteration.
///
/// `is_rest_day` and `workout_template_id` are copied from the plan day with the
/// same `day_number` when the snapshot is assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanInstanceDay {
    pub id: InstanceDayId,
    pub day_number: u32,
    pub is_rest_day: bool,
    pub workout_template_id: Option<WorkoutTemplateId>,
    pub is_complete: bool,
    pub updated_at: DateTime<Utc>,
    pub workout: Option<WorkoutInstance>,
}

/// One concrete iteration of a mesocycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanInstance {
    pub id: PlanInstanceId,
    pub mesocycle_id: MesocycleId,
    pub iteration_number: u32,
    pub status: Status,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rir: u8,
    pub days: Vec<PlanInstanceDay>,
}

impl PlanInstance {
    #[must_use]
    pub fn day(&self, day_number: u32) -> Option<&PlanInstanceDay> {
        self.days.iter().find(|d| d.day_number == day_number)
    }

    #[must_use]
    pub fn day_mut(&mut self, day_number: u32) -> Option<&mut PlanInstanceDay> {
        self.days.iter_mut().find(|d| d.day_number == day_number)
    }

    /// Workouts of this iteration that have been completed.
    pub fn completed_workouts(&self) -> impl Iterator<Item = &WorkoutInstance> {
        self.days
            .iter()
            .filter_map(|d| d.workout.as_ref())
            .filter(|w| w.is_completed())
    }
}
