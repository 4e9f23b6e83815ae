use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::plan_service::PlanService;
use crate::progress_service::ProgressService;
use crate::schedule_service::ScheduleService;
use crate::training_service::TrainingService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    schedule: Arc<ScheduleService>,
    training: Arc<TrainingService>,
    progress: Arc<ProgressService>,
    plans: Arc<PlanService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if connecting or migrating fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        history_days: i64,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, history_days))
    }

    /// Build services over an already constructed backend.
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, history_days: i64) -> Self {
        let schedule = ScheduleService::new(clock, Arc::clone(&storage.mesocycles))
            .with_history_days(history_days);
        let training = TrainingService::new(
            clock,
            Arc::clone(&storage.mesocycles),
            Arc::clone(&storage.workouts),
        );
        let progress = ProgressService::new(
            Arc::clone(&storage.mesocycles),
            Arc::clone(&storage.exercises),
        );
        let plans = PlanService::new(
            clock,
            Arc::clone(&storage.exercises),
            Arc::clone(&storage.plans),
            Arc::clone(&storage.mesocycles),
        );

        Self {
            schedule: Arc::new(schedule),
            training: Arc::new(training),
            progress: Arc::new(progress),
            plans: Arc::new(plans),
        }
    }

    #[must_use]
    pub fn schedule(&self) -> Arc<ScheduleService> {
        Arc::clone(&self.schedule)
    }

    #[must_use]
    pub fn training(&self) -> Arc<TrainingService> {
        Arc::clone(&self.training)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn plans(&self) -> Arc<PlanService> {
        Arc::clone(&self.plans)
    }
}
