use std::sync::Arc;

use meso_core::model::{Mesocycle, MesocycleId, UserId};
use meso_core::progress::{
    IterationProgress, IterationVolume, MuscleGroupSeries, Reduction, SeriesMetric,
    aggregate_iteration_volumes, aggregate_muscle_groups, exercises_with_completed_sets,
    mesocycle_detail, smooth_series,
};
use storage::repository::{ExerciseRepository, MesocycleRepository, StorageError};
use tracing::debug;

use crate::error::ProgressServiceError;

/// Read-only progress views over a user's training history.
#[derive(Clone)]
pub struct ProgressService {
    mesocycles: Arc<dyn MesocycleRepository>,
    exercises: Arc<dyn ExerciseRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        mesocycles: Arc<dyn MesocycleRepository>,
        exercises: Arc<dyn ExerciseRepository>,
    ) -> Self {
        Self {
            mesocycles,
            exercises,
        }
    }

    /// Volume per muscle group per completed workout, across all mesocycles.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn muscle_group_volume(
        &self,
        user_id: UserId,
    ) -> Result<MuscleGroupSeries, ProgressServiceError> {
        self.muscle_groups(user_id, SeriesMetric::Volume).await
    }

    /// Set count per muscle group per completed workout.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn muscle_group_sets(
        &self,
        user_id: UserId,
    ) -> Result<MuscleGroupSeries, ProgressServiceError> {
        self.muscle_groups(user_id, SeriesMetric::SetCount).await
    }

    /// Rolling average of `metric` per muscle group over the last few workouts,
    /// points ordered by workout date.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn muscle_group_trend(
        &self,
        user_id: UserId,
        metric: SeriesMetric,
    ) -> Result<MuscleGroupSeries, ProgressServiceError> {
        let series = self.muscle_groups(user_id, metric).await?;
        Ok(smooth_series(&series, Reduction::Average))
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::MesocycleNotFound` for missing or foreign mesocycles.
    pub async fn iteration_volumes(
        &self,
        user_id: UserId,
        mesocycle_id: MesocycleId,
    ) -> Result<Vec<IterationVolume>, ProgressServiceError> {
        let meso = self.load_owned(user_id, mesocycle_id).await?;
        Ok(aggregate_iteration_volumes(meso.instances()))
    }

    /// Per-iteration, per-exercise breakdown with change against the previous
    /// completed iteration.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::MesocycleNotFound` for missing or foreign mesocycles.
    pub async fn mesocycle_detail(
        &self,
        user_id: UserId,
        mesocycle_id: MesocycleId,
    ) -> Result<Vec<IterationProgress>, ProgressServiceError> {
        let meso = self.load_owned(user_id, mesocycle_id).await?;
        Ok(mesocycle_detail(meso.instances()))
    }

    async fn muscle_groups(
        &self,
        user_id: UserId,
        metric: SeriesMetric,
    ) -> Result<MuscleGroupSeries, ProgressServiceError> {
        let owned = self.mesocycles.list_mesocycles_for_user(user_id).await?;
        let catalog = self.exercises.list_exercises().await?;
        let grouped = exercises_with_completed_sets(&owned, &catalog);
        debug!(%user_id, ?metric, exercises = grouped.len(), "aggregating muscle groups");
        Ok(aggregate_muscle_groups(&grouped, metric))
    }

    async fn load_owned(
        &self,
        user_id: UserId,
        mesocycle_id: MesocycleId,
    ) -> Result<Mesocycle, ProgressServiceError> {
        match self.mesocycles.get_mesocycle(mesocycle_id).await {
            Ok(meso) if meso.is_owned_by(user_id) => Ok(meso),
            Ok(_) | Err(StorageError::NotFound) => {
                Err(ProgressServiceError::MesocycleNotFound(mesocycle_id))
            }
            Err(e) => Err(e.into()),
        }
    }
}
