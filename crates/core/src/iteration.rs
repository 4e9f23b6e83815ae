//! Iteration lifecycle: status transitions, gating, and which iteration is current.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::completion::is_day_complete;
use crate::model::{
    InstanceDayId, MesocycleId, PlanInstance, PlanInstanceDay, PlanInstanceId, Status,
    TrainingPlan,
};

/// Highest reps-in-reserve target used at the start of a mesocycle.
pub const STARTING_RIR: u8 = 3;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IterationError {
    #[error("illegal status transition {from} -> {to}")]
    IllegalTransition { from: Status, to: Status },

    #[error("iteration {iteration} days {found:?} do not mirror plan days {expected:?}")]
    DayMismatch {
        iteration: u32,
        expected: Vec<u32>,
        found: Vec<u32>,
    },
}

//
// ─── STATUS TRANSITIONS ────────────────────────────────────────────────────────
//

impl Status {
    /// Only `NotStarted → InProgress` and `InProgress → Complete` are legal.
    #[must_use]
    pub fn can_transition_to(self, to: Status) -> bool {
        matches!(
            (self, to),
            (Status::NotStarted, Status::InProgress) | (Status::InProgress, Status::Complete)
        )
    }

    /// # Errors
    ///
    /// Returns `IterationError::IllegalTransition` for any other pair.
    pub fn transition(self, to: Status) -> Result<Status, IterationError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(IterationError::IllegalTransition { from: self, to })
        }
    }
}

//
// ─── PREDICATES ────────────────────────────────────────────────────────────────
//

/// An instance is complete once stamped, or once every one of its days is.
#[must_use]
pub fn is_instance_complete(instance: &PlanInstance) -> bool {
    instance.completed_at.is_some() || instance.days.iter().all(is_day_complete)
}

/// Whether `instance` may be started now.
///
/// Iterations run strictly in order: every lower-numbered sibling must be
/// complete first.
#[must_use]
pub fn can_start_iteration(instance: &PlanInstance, all: &[PlanInstance]) -> bool {
    if is_instance_complete(instance) || instance.status == Status::InProgress {
        return false;
    }
    if instance.iteration_number == 1 {
        return true;
    }
    all.iter()
        .filter(|other| other.iteration_number < instance.iteration_number)
        .all(is_instance_complete)
}

/// The iteration the user is working on: the first in progress, otherwise the
/// first not yet started.
#[must_use]
pub fn current_instance(all: &[PlanInstance]) -> Option<&PlanInstance> {
    all.iter()
        .find(|i| i.status == Status::InProgress)
        .or_else(|| all.iter().find(|i| i.status == Status::NotStarted))
}

/// The completed instance with the highest iteration number.
#[must_use]
pub fn latest_completed_instance(all: &[PlanInstance]) -> Option<&PlanInstance> {
    all.iter()
        .filter(|i| i.status == Status::Complete)
        .max_by_key(|i| i.iteration_number)
}

/// Status a mesocycle should carry given its materialized instances.
#[must_use]
pub fn mesocycle_status(all: &[PlanInstance], iterations: u32) -> Status {
    let last_done = all
        .iter()
        .any(|i| i.iteration_number == iterations && i.status == Status::Complete);
    if last_done {
        Status::Complete
    } else if all.iter().any(|i| i.status != Status::NotStarted) {
        Status::InProgress
    } else {
        Status::NotStarted
    }
}

/// Target reps-in-reserve for an iteration: tapers to 0 on the last one.
#[must_use]
pub fn default_rir(iteration_number: u32, iterations: u32) -> u8 {
    let remaining = iterations.saturating_sub(iteration_number);
    u8::try_from(remaining).map_or(STARTING_RIR, |r| r.min(STARTING_RIR))
}

/// Check that the instance holds exactly one day per plan day.
///
/// `plan_day_numbers` must be ascending, as `TrainingPlan::days` yields them.
///
/// # Errors
///
/// Returns `IterationError::DayMismatch` listing both day sets.
pub fn verify_day_mirror(
    instance: &PlanInstance,
    plan_day_numbers: impl IntoIterator<Item = u32>,
) -> Result<(), IterationError> {
    let expected: Vec<u32> = plan_day_numbers.into_iter().collect();
    let mut found: Vec<u32> = instance.days.iter().map(|d| d.day_number).collect();
    found.sort_unstable();
    if found == expected {
        Ok(())
    } else {
        Err(IterationError::DayMismatch {
            iteration: instance.iteration_number,
            expected,
            found,
        })
    }
}

/// Build a fresh `NotStarted` instance mirroring `plan`, one day per plan day.
///
/// `next_day_id` is called once per day in day order.
pub fn materialize_instance(
    plan: &TrainingPlan,
    id: PlanInstanceId,
    mesocycle_id: MesocycleId,
    iteration_number: u32,
    rir: u8,
    now: DateTime<Utc>,
    mut next_day_id: impl FnMut() -> InstanceDayId,
) -> PlanInstance {
    let days = plan
        .days()
        .iter()
        .map(|plan_day| PlanInstanceDay {
            id: next_day_id(),
            day_number: plan_day.day_number,
            is_rest_day: plan_day.is_rest_day,
            workout_template_id: plan_day.workout_template_id(),
            is_complete: false,
            updated_at: now,
            workout: None,
        })
        .collect();

    PlanInstance {
        id,
        mesocycle_id,
        iteration_number,
        status: Status::NotStarted,
        started_at: None,
        completed_at: None,
        rir,
        days,
    }
}

//
// ─── INSTANCE TRANSITIONS ──────────────────────────────────────────────────────
//

impl PlanInstance {
    /// Move a not-started instance into progress.
    ///
    /// # Errors
    ///
    /// Returns `IterationError::IllegalTransition` unless the instance is `NotStarted`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), IterationError> {
        self.status = self.status.transition(Status::InProgress)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// Mark the instance complete if all of its days are.
    ///
    /// A `NotStarted` instance passes through `InProgress` first. Returns
    /// whether the instance became complete on this call.
    ///
    /// # Errors
    ///
    /// Propagates `IterationError::IllegalTransition`; not expected in practice.
    pub fn refresh_completion(&mut self, now: DateTime<Utc>) -> Result<bool, IterationError> {
        if self.status == Status::Complete || !self.days.iter().all(is_day_complete) {
            return Ok(false);
        }
        if self.status == Status::NotStarted {
            self.start(now)?;
        }
        self.status = self.status.transition(Status::Complete)?;
        self.completed_at = Some(now);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ExerciseId, PlanDay, PlanId, TemplateExercise, UserId, WorkoutInstance,
        WorkoutInstanceId, WorkoutTemplate, WorkoutTemplateId,
    };
    use crate::time::fixed_now;

    fn plan() -> TrainingPlan {
        let template = WorkoutTemplate::new(
            WorkoutTemplateId::new(1),
            "Full body",
            vec![TemplateExercise {
                exercise_id: ExerciseId::new(1),
                order: 1,
            }],
        )
        .unwrap();
        TrainingPlan::new(
            PlanId::new(1),
            UserId::new(1),
            "Two day",
            vec![PlanDay::workout(1, template), PlanDay::rest(2)],
        )
        .unwrap()
    }

    fn instance(iteration: u32, status: Status) -> PlanInstance {
        let mut next = 0;
        let mut inst = materialize_instance(
            &plan(),
            PlanInstanceId::new(u64::from(iteration)),
            MesocycleId::new(1),
            iteration,
            3,
            fixed_now(),
            || {
                next += 1;
                InstanceDayId::new(u64::from(iteration) * 10 + next)
            },
        );
        inst.status = status;
        if status == Status::Complete {
            inst.completed_at = Some(fixed_now());
        }
        inst
    }

    fn finish_all_days(inst: &mut PlanInstance) {
        for day in &mut inst.days {
            if day.is_rest_day {
                day.is_complete = true;
            } else {
                let mut w = WorkoutInstance::new(WorkoutInstanceId::new(1), fixed_now());
                w.completed_at = Some(fixed_now());
                day.workout = Some(w);
            }
        }
    }

    #[test]
    fn transitions_never_skip_in_progress() {
        assert!(Status::NotStarted.can_transition_to(Status::InProgress));
        assert!(Status::InProgress.can_transition_to(Status::Complete));
        assert!(!Status::NotStarted.can_transition_to(Status::Complete));
        assert!(!Status::Complete.can_transition_to(Status::InProgress));
        assert_eq!(
            Status::Complete.transition(Status::NotStarted),
            Err(IterationError::IllegalTransition {
                from: Status::Complete,
                to: Status::NotStarted
            })
        );
    }

    #[test]
    fn instance_complete_by_stamp_or_days() {
        let mut inst = instance(1, Status::InProgress);
        assert!(!is_instance_complete(&inst));

        finish_all_days(&mut inst);
        assert!(is_instance_complete(&inst));

        let stamped = instance(2, Status::Complete);
        assert!(is_instance_complete(&stamped));
    }

    #[test]
    fn first_iteration_can_start() {
        let first = instance(1, Status::NotStarted);
        assert!(can_start_iteration(&first, std::slice::from_ref(&first)));
    }

    #[test]
    fn cannot_start_running_or_finished_iteration() {
        let running = instance(1, Status::InProgress);
        assert!(!can_start_iteration(&running, std::slice::from_ref(&running)));
        let done = instance(1, Status::Complete);
        assert!(!can_start_iteration(&done, std::slice::from_ref(&done)));
    }

    #[test]
    fn later_iteration_waits_for_lower_siblings() {
        let first = instance(1, Status::InProgress);
        let second = instance(2, Status::NotStarted);
        let all = vec![first, second.clone()];
        assert!(!can_start_iteration(&second, &all));

        let all = vec![instance(1, Status::Complete), second.clone()];
        assert!(can_start_iteration(&second, &all));
    }

    #[test]
    fn current_instance_prefers_in_progress() {
        let all = vec![
            instance(1, Status::Complete),
            instance(2, Status::NotStarted),
            instance(3, Status::InProgress),
        ];
        assert_eq!(current_instance(&all).unwrap().iteration_number, 3);

        let all = vec![instance(1, Status::Complete), instance(2, Status::NotStarted)];
        assert_eq!(current_instance(&all).unwrap().iteration_number, 2);

        let all = vec![instance(1, Status::Complete)];
        assert!(current_instance(&all).is_none());
        assert_eq!(latest_completed_instance(&all).unwrap().iteration_number, 1);
    }

    #[test]
    fn mesocycle_status_tracks_last_iteration() {
        assert_eq!(mesocycle_status(&[], 3), Status::NotStarted);
        assert_eq!(
            mesocycle_status(&[instance(1, Status::NotStarted)], 3),
            Status::NotStarted
        );
        assert_eq!(
            mesocycle_status(&[instance(1, Status::Complete)], 3),
            Status::InProgress
        );
        assert_eq!(
            mesocycle_status(&[instance(1, Status::Complete)], 1),
            Status::Complete
        );
    }

    #[test]
    fn default_rir_tapers_to_zero() {
        let rirs: Vec<_> = (1..=4).map(|i| default_rir(i, 4)).collect();
        assert_eq!(rirs, vec![3, 2, 1, 0]);
        let rirs: Vec<_> = (1..=6).map(|i| default_rir(i, 6)).collect();
        assert_eq!(rirs, vec![3, 3, 3, 2, 1, 0]);
    }

    #[test]
    fn verify_day_mirror_detects_missing_day() {
        let day_numbers = || plan().days().iter().map(|d| d.day_number).collect::<Vec<_>>();
        let mut inst = instance(1, Status::InProgress);
        assert!(verify_day_mirror(&inst, day_numbers()).is_ok());

        inst.days.pop();
        assert_eq!(
            verify_day_mirror(&inst, day_numbers()),
            Err(IterationError::DayMismatch {
                iteration: 1,
                expected: vec![1, 2],
                found: vec![1],
            })
        );
    }

    #[test]
    fn start_then_refresh_completes() {
        let mut inst = instance(1, Status::NotStarted);
        inst.start(fixed_now()).unwrap();
        assert_eq!(inst.status, Status::InProgress);
        assert!(inst.start(fixed_now()).is_err());

        assert!(!inst.refresh_completion(fixed_now()).unwrap());
        finish_all_days(&mut inst);
        assert!(inst.refresh_completion(fixed_now()).unwrap());
        assert_eq!(inst.status, Status::Complete);
        assert_eq!(inst.completed_at, Some(fixed_now()));
        assert!(!inst.refresh_completion(fixed_now()).unwrap());
    }

    #[test]
    fn refresh_passes_through_in_progress() {
        let mut inst = instance(1, Status::NotStarted);
        finish_all_days(&mut inst);
        assert!(inst.refresh_completion(fixed_now()).unwrap());
        assert_eq!(inst.status, Status::Complete);
        assert_eq!(inst.started_at, Some(fixed_now()));
    }
}
