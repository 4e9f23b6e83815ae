use std::sync::Arc;

use chrono::{DateTime, Utc};
use meso_core::completion::is_day_complete;
use meso_core::iteration::{
    can_start_iteration, default_rir, is_instance_complete, mesocycle_status,
};
use meso_core::model::{
    ExerciseSet, InstanceDayId, Mesocycle, MesocycleId, PlanInstance, PlanInstanceDay, Status,
    UserId, WorkoutInstance,
};
use storage::repository::{MesocycleRepository, StorageError, WorkoutRepository};
use tracing::info;

use crate::Clock;
use crate::error::TrainingError;

/// What a completion command changed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    pub instance: PlanInstance,
    /// The iteration became complete on this call.
    pub iteration_completed: bool,
    pub mesocycle_status: Status,
}

/// Lifecycle commands: materialize and start iterations, complete days, run
/// workouts.
///
/// Every completion re-evaluates iteration and mesocycle completion and
/// persists the resulting transitions.
#[derive(Clone)]
pub struct TrainingService {
    clock: Clock,
    mesocycles: Arc<dyn MesocycleRepository>,
    workouts: Arc<dyn WorkoutRepository>,
}

impl TrainingService {
    #[must_use]
    pub fn new(
        clock: Clock,
        mesocycles: Arc<dyn MesocycleRepository>,
        workouts: Arc<dyn WorkoutRepository>,
    ) -> Self {
        Self {
            clock,
            mesocycles,
            workouts,
        }
    }

    /// Materialize and start iteration 1.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::AlreadyStarted` if iteration 1 exists,
    /// `TrainingError::MesocycleNotFound` if the mesocycle is missing or foreign.
    pub async fn begin_mesocycle(
        &self,
        user_id: UserId,
        mesocycle_id: MesocycleId,
    ) -> Result<PlanInstance, TrainingError> {
        let meso = self.load_owned(user_id, mesocycle_id).await?;
        if meso.instance(1).is_some() {
            return Err(TrainingError::AlreadyStarted { iteration: 1 });
        }
        self.materialize_and_start(&meso, 1).await
    }

    /// Materialize and start the iteration after the last materialized one.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::IterationLocked` while the latest iteration is
    /// unfinished and `TrainingError::MesocycleComplete` once all iterations exist.
    pub async fn advance_iteration(
        &self,
        user_id: UserId,
        mesocycle_id: MesocycleId,
    ) -> Result<PlanInstance, TrainingError> {
        let meso = self.load_owned(user_id, mesocycle_id).await?;
        let Some(last) = meso.instances().last() else {
            return self.materialize_and_start(&meso, 1).await;
        };
        let next = last.iteration_number + 1;
        if next > meso.iterations() {
            return Err(TrainingError::MesocycleComplete);
        }
        if !is_instance_complete(last) {
            return Err(TrainingError::IterationLocked { iteration: next });
        }
        self.materialize_and_start(&meso, next).await
    }

    /// Start an already materialized iteration.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::IterationLocked` if an earlier iteration is not
    /// complete, `TrainingError::AlreadyStarted`/`AlreadyComplete` if it has moved on.
    pub async fn start_iteration(
        &self,
        user_id: UserId,
        mesocycle_id: MesocycleId,
        iteration: u32,
    ) -> Result<PlanInstance, TrainingError> {
        let meso = self.load_owned(user_id, mesocycle_id).await?;
        let mut instances = meso.instances().to_vec();
        let idx = instances
            .iter()
            .position(|i| i.iteration_number == iteration)
            .ok_or(TrainingError::IterationNotFound {
                mesocycle_id,
                iteration,
            })?;

        match instances[idx].status {
            Status::Complete => return Err(TrainingError::AlreadyComplete),
            Status::InProgress => return Err(TrainingError::AlreadyStarted { iteration }),
            Status::NotStarted => {}
        }
        if !can_start_iteration(&instances[idx], &instances) {
            return Err(TrainingError::IterationLocked { iteration });
        }

        let now = self.clock.now();
        instances[idx].start(now)?;
        self.mesocycles.update_instance(&instances[idx]).await?;
        info!(%mesocycle_id, iteration, "iteration started");
        self.sync_mesocycle_status(&meso, &instances).await?;
        Ok(instances.swap_remove(idx))
    }

    /// Mark a rest day done.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::NotRestDay` for workout days and
    /// `TrainingError::AlreadyComplete` if the day is already done.
    pub async fn complete_rest_day(
        &self,
        user_id: UserId,
        mesocycle_id: MesocycleId,
        day_id: InstanceDayId,
    ) -> Result<CompletionOutcome, TrainingError> {
        let meso = self.load_owned(user_id, mesocycle_id).await?;
        let instances = meso.instances();
        let (i, d) = locate_day(instances, day_id)?;
        ensure_unlocked(instances, i)?;

        let day = &instances[i].days[d];
        if !day.is_rest_day {
            return Err(TrainingError::NotRestDay(day_id));
        }
        if is_day_complete(day) {
            return Err(TrainingError::AlreadyComplete);
        }

        let now = self.clock.now();
        let mut done = day.clone();
        done.is_complete = true;
        done.updated_at = now;
        self.finish_day(&meso, &done, now).await
    }

    /// Open the workout for a training day, creating it on first use.
    ///
    /// Resuming an open workout returns it unchanged. Starting a workout in a
    /// not-started iteration starts that iteration.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::RestDayHasNoWorkout` for rest days and
    /// `TrainingError::AlreadyComplete` if the workout is finished.
    pub async fn start_workout(
        &self,
        user_id: UserId,
        mesocycle_id: MesocycleId,
        day_id: InstanceDayId,
    ) -> Result<WorkoutInstance, TrainingError> {
        let meso = self.load_owned(user_id, mesocycle_id).await?;
        let mut instances = meso.instances().to_vec();
        let (i, d) = locate_day(&instances, day_id)?;
        ensure_unlocked(&instances, i)?;

        let day = &instances[i].days[d];
        if day.is_rest_day {
            return Err(TrainingError::RestDayHasNoWorkout(day_id));
        }
        if is_day_complete(day) {
            return Err(TrainingError::AlreadyComplete);
        }
        if let Some(open) = &day.workout {
            return Ok(open.clone());
        }

        let now = self.clock.now();
        if instances[i].status == Status::NotStarted {
            instances[i].start(now)?;
            self.mesocycles.update_instance(&instances[i]).await?;
            info!(%mesocycle_id, iteration = instances[i].iteration_number, "iteration started");
            self.sync_mesocycle_status(&meso, &instances).await?;
        }

        let workout = self.workouts.start_workout(day_id, now).await?;
        info!(%mesocycle_id, %day_id, workout_id = %workout.id, "workout started");
        Ok(workout)
    }

    /// Record one performed set on the day's open workout.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::WorkoutNotStarted` if no workout is open for the
    /// day and `TrainingError::AlreadyComplete` if it is finished.
    pub async fn log_set(
        &self,
        user_id: UserId,
        mesocycle_id: MesocycleId,
        day_id: InstanceDayId,
        set: ExerciseSet,
    ) -> Result<(), TrainingError> {
        let meso = self.load_owned(user_id, mesocycle_id).await?;
        let instances = meso.instances();
        let (i, d) = locate_day(instances, day_id)?;
        let workout = open_workout(instances[i].days[d].workout.as_ref(), day_id)?;
        self.workouts.append_set(workout.id, &set).await?;
        Ok(())
    }

    /// Finish the day's workout, completing the day.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::WorkoutNotStarted` if no workout is open for the
    /// day and `TrainingError::AlreadyComplete` if it is finished.
    pub async fn complete_workout(
        &self,
        user_id: UserId,
        mesocycle_id: MesocycleId,
        day_id: InstanceDayId,
    ) -> Result<CompletionOutcome, TrainingError> {
        let meso = self.load_owned(user_id, mesocycle_id).await?;
        let instances = meso.instances();
        let (i, d) = locate_day(instances, day_id)?;
        let workout_id = open_workout(instances[i].days[d].workout.as_ref(), day_id)?.id;

        let now = self.clock.now();
        let finished = self.workouts.complete_workout(workout_id, now).await?;
        info!(
            %mesocycle_id,
            %day_id,
            %workout_id,
            sets = finished.sets.len(),
            "workout completed"
        );

        let mut done = instances[i].days[d].clone();
        done.workout = Some(finished);
        done.is_complete = true;
        done.updated_at = now;
        self.finish_day(&meso, &done, now).await
    }

    //
    // ─── HELPERS ───────────────────────────────────────────────────────────────
    //

    async fn load_owned(
        &self,
        user_id: UserId,
        mesocycle_id: MesocycleId,
    ) -> Result<Mesocycle, TrainingError> {
        match self.mesocycles.get_mesocycle(mesocycle_id).await {
            Ok(meso) if meso.is_owned_by(user_id) => Ok(meso),
            Ok(_) | Err(StorageError::NotFound) => {
                Err(TrainingError::MesocycleNotFound(mesocycle_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn materialize_and_start(
        &self,
        meso: &Mesocycle,
        iteration: u32,
    ) -> Result<PlanInstance, TrainingError> {
        if meso.status() == Status::Complete {
            return Err(TrainingError::MesocycleComplete);
        }
        let now = self.clock.now();
        let rir = default_rir(iteration, meso.iterations());
        let mut instance = match self
            .mesocycles
            .create_iteration_atomic(meso.plan(), meso.id(), iteration, rir, now)
            .await
        {
            Ok(instance) => instance,
            Err(StorageError::Conflict) => return Err(TrainingError::AlreadyStarted { iteration }),
            Err(e) => return Err(e.into()),
        };
        info!(mesocycle_id = %meso.id(), iteration, rir, "iteration created");

        instance.start(now)?;
        self.mesocycles.update_instance(&instance).await?;
        info!(mesocycle_id = %meso.id(), iteration, "iteration started");

        let mut instances = meso.instances().to_vec();
        instances.push(instance.clone());
        self.sync_mesocycle_status(meso, &instances).await?;
        Ok(instance)
    }

    /// Persist one completed day and roll completion upward.
    ///
    /// Completion is evaluated on a fresh read, so days finished by other
    /// commands since `meso` was loaded are counted.
    async fn finish_day(
        &self,
        meso: &Mesocycle,
        day: &PlanInstanceDay,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome, TrainingError> {
        self.mesocycles.update_day(day).await?;

        let fresh = self.mesocycles.get_mesocycle(meso.id()).await?;
        let mut instances = fresh.instances().to_vec();
        let (idx, _) = locate_day(&instances, day.id)?;
        let instance = &mut instances[idx];
        if instance.status == Status::NotStarted {
            instance.start(now)?;
        }
        let iteration_completed = instance.refresh_completion(now)?;
        self.mesocycles.update_instance(instance).await?;
        if iteration_completed {
            info!(
                mesocycle_id = %meso.id(),
                iteration = instance.iteration_number,
                "iteration completed"
            );
        }

        let mesocycle_status = self.sync_mesocycle_status(&fresh, &instances).await?;
        Ok(CompletionOutcome {
            instance: instances.swap_remove(idx),
            iteration_completed,
            mesocycle_status,
        })
    }

    async fn sync_mesocycle_status(
        &self,
        meso: &Mesocycle,
        instances: &[PlanInstance],
    ) -> Result<Status, TrainingError> {
        let status = mesocycle_status(instances, meso.iterations());
        if status != meso.status() {
            self.mesocycles
                .set_mesocycle_status(meso.id(), status)
                .await?;
            info!(
                mesocycle_id = %meso.id(),
                from = %meso.status(),
                to = %status,
                "mesocycle status changed"
            );
        }
        Ok(status)
    }
}

fn locate_day(
    instances: &[PlanInstance],
    day_id: InstanceDayId,
) -> Result<(usize, usize), TrainingError> {
    instances
        .iter()
        .enumerate()
        .find_map(|(i, instance)| {
            instance
                .days
                .iter()
                .position(|d| d.id == day_id)
                .map(|d| (i, d))
        })
        .ok_or(TrainingError::DayNotFound(day_id))
}

/// A not-started iteration only accepts work once every earlier one is complete.
fn ensure_unlocked(instances: &[PlanInstance], idx: usize) -> Result<(), TrainingError> {
    let instance = &instances[idx];
    if instance.status == Status::NotStarted && !can_start_iteration(instance, instances) {
        return Err(TrainingError::IterationLocked {
            iteration: instance.iteration_number,
        });
    }
    Ok(())
}

fn open_workout(
    workout: Option<&WorkoutInstance>,
    day_id: InstanceDayId,
) -> Result<&WorkoutInstance, TrainingError> {
    match workout {
        None => Err(TrainingError::WorkoutNotStarted(day_id)),
        Some(w) if w.is_completed() => Err(TrainingError::AlreadyComplete),
        Some(w) => Ok(w),
    }
}
