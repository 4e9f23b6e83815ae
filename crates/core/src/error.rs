use thiserror::Error;

use crate::iteration::IterationError;
use crate::model::{ExerciseError, MesocycleError, PlanError};

/// Any domain rule violation raised by the core crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Mesocycle(#[from] MesocycleError),
    #[error(transparent)]
    Exercise(#[from] ExerciseError),
    #[error(transparent)]
    Iteration(#[from] IterationError),
}
