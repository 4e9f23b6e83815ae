//! Shared error types for the services crate.

use thiserror::Error;

use meso_core::iteration::IterationError;
use meso_core::model::{InstanceDayId, MesocycleError, MesocycleId, PlanId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ScheduleService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScheduleError {
    /// Missing, or owned by another user.
    #[error("mesocycle {0} not found")]
    MesocycleNotFound(MesocycleId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("mesocycle {0} not found")]
    MesocycleNotFound(MesocycleId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `TrainingService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrainingError {
    #[error("mesocycle {0} not found")]
    MesocycleNotFound(MesocycleId),
    #[error("iteration {iteration} of mesocycle {mesocycle_id} not found")]
    IterationNotFound {
        mesocycle_id: MesocycleId,
        iteration: u32,
    },
    #[error("day {0} not found")]
    DayNotFound(InstanceDayId),
    #[error("iteration {iteration} is locked until earlier iterations are complete")]
    IterationLocked { iteration: u32 },
    #[error("iteration {iteration} has already been started")]
    AlreadyStarted { iteration: u32 },
    #[error("already complete")]
    AlreadyComplete,
    #[error("mesocycle is complete")]
    MesocycleComplete,
    #[error("day {0} is a rest day and has no workout")]
    RestDayHasNoWorkout(InstanceDayId),
    #[error("day {0} is not a rest day")]
    NotRestDay(InstanceDayId),
    #[error("no workout has been started for day {0}")]
    WorkoutNotStarted(InstanceDayId),
    #[error(transparent)]
    Transition(#[from] IterationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `PlanService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlanServiceError {
    /// Missing, or owned by another user.
    #[error("plan {0} not found")]
    PlanNotFound(PlanId),
    #[error("plan {0} is referenced by a mesocycle and cannot change")]
    PlanInUse(PlanId),
    #[error("mesocycle {0} already exists")]
    MesocycleExists(MesocycleId),
    #[error(transparent)]
    Mesocycle(#[from] MesocycleError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
