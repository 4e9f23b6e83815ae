use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use meso_core::model::{MesocycleId, UserId};
use meso_core::schedule::{
    HISTORY_WINDOW_DAYS, ProjectionInput, ProjectionObserver, Schedule, ScheduleProjector,
    TracingObserver,
};
use storage::repository::MesocycleRepository;
use tracing::debug;

use crate::Clock;
use crate::error::ScheduleError;

/// Loads a user's mesocycles and projects the schedule for one of them.
#[derive(Clone)]
pub struct ScheduleService {
    clock: Clock,
    mesocycles: Arc<dyn MesocycleRepository>,
    observer: Arc<dyn ProjectionObserver>,
    history_window: Duration,
}

impl ScheduleService {
    #[must_use]
    pub fn new(clock: Clock, mesocycles: Arc<dyn MesocycleRepository>) -> Self {
        Self {
            clock,
            mesocycles,
            observer: Arc::new(TracingObserver),
            history_window: Duration::days(HISTORY_WINDOW_DAYS),
        }
    }

    /// Replace the default tracing observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProjectionObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn with_history_days(mut self, days: i64) -> Self {
        self.history_window = Duration::days(days);
        self
    }

    /// Project previous and upcoming days as of the service clock.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError::MesocycleNotFound` when the mesocycle does not
    /// exist or belongs to someone else, `ScheduleError::Storage` otherwise.
    pub async fn project_schedule(
        &self,
        user_id: UserId,
        mesocycle_id: MesocycleId,
    ) -> Result<Schedule, ScheduleError> {
        self.project_schedule_at(user_id, mesocycle_id, self.clock.now())
            .await
    }

    /// Same as [`ScheduleService::project_schedule`] with an explicit reference time.
    ///
    /// # Errors
    ///
    /// See [`ScheduleService::project_schedule`].
    pub async fn project_schedule_at(
        &self,
        user_id: UserId,
        mesocycle_id: MesocycleId,
        as_of: DateTime<Utc>,
    ) -> Result<Schedule, ScheduleError> {
        // History spans every mesocycle the user owns, so load them all.
        let owned = self.mesocycles.list_mesocycles_for_user(user_id).await?;
        let input = ProjectionInput::from_mesocycles(mesocycle_id, &owned)
            .ok_or(ScheduleError::MesocycleNotFound(mesocycle_id))?;

        let schedule = ScheduleProjector::new(self.observer.as_ref())
            .with_history_window(self.history_window)
            .project(&input, as_of);

        debug!(
            %user_id,
            %mesocycle_id,
            previous = schedule.previous_days.len(),
            upcoming = schedule.upcoming_days.len(),
            "projected schedule"
        );
        Ok(schedule)
    }
}
