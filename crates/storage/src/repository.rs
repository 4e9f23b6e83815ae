use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meso_core::iteration::materialize_instance;
use meso_core::model::{
    Exercise, ExerciseId, ExerciseSet, InstanceDayId, Mesocycle, MesocycleId, PlanId,
    PlanInstance, PlanInstanceDay, PlanInstanceId, Status, TrainingPlan, UserId,
    WorkoutInstance, WorkoutInstanceId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait ExerciseRepository: Send + Sync {
    /// Persist or update a catalog exercise.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the exercise cannot be stored.
    async fn upsert_exercise(&self, exercise: &Exercise) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_exercise(&self, id: ExerciseId) -> Result<Exercise, StorageError>;

    /// Every exercise in the catalog, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_exercises(&self) -> Result<Vec<Exercise>, StorageError>;
}

#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Persist a plan together with its days and workout templates.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any part of the plan cannot be stored.
    async fn upsert_plan(&self, plan: &TrainingPlan) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_plan(&self, id: PlanId) -> Result<TrainingPlan, StorageError>;

    /// Whether any mesocycle is built on the plan.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn plan_in_use(&self, id: PlanId) -> Result<bool, StorageError>;
}

/// Mesocycles and their materialized iterations.
#[async_trait]
pub trait MesocycleRepository: Send + Sync {
    /// Insert a new mesocycle header (name, plan, iteration count, status).
    ///
    /// Instances are written through [`MesocycleRepository::create_iteration_atomic`]
    /// and [`MesocycleRepository::update_instance`], never through this call.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id is taken, `StorageError::NotFound`
    /// if the plan is unknown, or other storage errors.
    async fn insert_mesocycle(&self, mesocycle: &Mesocycle) -> Result<(), StorageError>;

    /// Full snapshot: plan, instances, days, workouts and sets.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, `StorageError::Serialization`
    /// if the stored rows do not form a valid mesocycle.
    async fn get_mesocycle(&self, id: MesocycleId) -> Result<Mesocycle, StorageError>;

    /// All mesocycles owned by `user_id`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_mesocycles_for_user(&self, user_id: UserId)
    -> Result<Vec<Mesocycle>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the mesocycle does not exist.
    async fn set_mesocycle_status(&self, id: MesocycleId, status: Status)
    -> Result<(), StorageError>;

    /// Create iteration `iteration_number` with one day per plan day, all in
    /// one unit of work.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the iteration already exists and
    /// `StorageError::NotFound` if the mesocycle does not.
    async fn create_iteration_atomic(
        &self,
        plan: &TrainingPlan,
        mesocycle_id: MesocycleId,
        iteration_number: u32,
        rir: u8,
        now: DateTime<Utc>,
    ) -> Result<PlanInstance, StorageError>;

    /// Write back instance status and timestamps. Days are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the instance is unknown.
    async fn update_instance(&self, instance: &PlanInstance) -> Result<(), StorageError>;

    /// Write back one day's completion flag and `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the day is unknown.
    async fn update_day(&self, day: &PlanInstanceDay) -> Result<(), StorageError>;
}

/// Workout sessions attached to plan instance days.
#[async_trait]
pub trait WorkoutRepository: Send + Sync {
    /// Open a workout for a day.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the day already has a workout and
    /// `StorageError::NotFound` if the day does not exist.
    async fn start_workout(
        &self,
        day_id: InstanceDayId,
        started_at: DateTime<Utc>,
    ) -> Result<WorkoutInstance, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the same set number is already
    /// logged for that exercise, `StorageError::NotFound` if the workout is unknown.
    async fn append_set(
        &self,
        workout_id: WorkoutInstanceId,
        set: &ExerciseSet,
    ) -> Result<(), StorageError>;

    /// Stamp `completed_at` and return the finished workout.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the workout is unknown.
    async fn complete_workout(
        &self,
        workout_id: WorkoutInstanceId,
        completed_at: DateTime<Utc>,
    ) -> Result<WorkoutInstance, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
struct MesocycleRow {
    user_id: UserId,
    name: String,
    plan_id: PlanId,
    iterations: u32,
    status: Status,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryState {
    exercises: HashMap<ExerciseId, Exercise>,
    plans: HashMap<PlanId, TrainingPlan>,
    mesocycles: HashMap<MesocycleId, MesocycleRow>,
    instances: HashMap<MesocycleId, Vec<PlanInstance>>,
    next_id: u64,
}

impl MemoryState {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn assemble(&self, id: MesocycleId) -> Result<Mesocycle, StorageError> {
        let row = self.mesocycles.get(&id).ok_or(StorageError::NotFound)?;
        let plan = self
            .plans
            .get(&row.plan_id)
            .cloned()
            .ok_or(StorageError::NotFound)?;
        let instances = self.instances.get(&id).cloned().unwrap_or_default();
        Mesocycle::from_persisted(
            id,
            row.user_id,
            row.name.clone(),
            plan,
            row.iterations,
            row.status,
            row.created_at,
            instances,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn workout_mut(&mut self, id: WorkoutInstanceId) -> Option<&mut WorkoutInstance> {
        self.instances
            .values_mut()
            .flatten()
            .flat_map(|i| i.days.iter_mut())
            .filter_map(|d| d.workout.as_mut())
            .find(|w| w.id == id)
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl ExerciseRepository for InMemoryRepository {
    async fn upsert_exercise(&self, exercise: &Exercise) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.exercises.insert(exercise.id(), exercise.clone());
        Ok(())
    }

    async fn get_exercise(&self, id: ExerciseId) -> Result<Exercise, StorageError> {
        let guard = self.lock()?;
        guard.exercises.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_exercises(&self) -> Result<Vec<Exercise>, StorageError> {
        let guard = self.lock()?;
        let mut all: Vec<Exercise> = guard.exercises.values().cloned().collect();
        all.sort_by_key(Exercise::id);
        Ok(all)
    }
}

#[async_trait]
impl PlanRepository for InMemoryRepository {
    async fn upsert_plan(&self, plan: &TrainingPlan) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.plans.insert(plan.id(), plan.clone());
        Ok(())
    }

    async fn get_plan(&self, id: PlanId) -> Result<TrainingPlan, StorageError> {
        let guard = self.lock()?;
        guard.plans.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn plan_in_use(&self, id: PlanId) -> Result<bool, StorageError> {
        let guard = self.lock()?;
        Ok(guard.mesocycles.values().any(|row| row.plan_id == id))
    }
}

#[async_trait]
impl MesocycleRepository for InMemoryRepository {
    async fn insert_mesocycle(&self, mesocycle: &Mesocycle) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard.mesocycles.contains_key(&mesocycle.id()) {
            return Err(StorageError::Conflict);
        }
        if !guard.plans.contains_key(&mesocycle.plan().id()) {
            return Err(StorageError::NotFound);
        }
        guard.mesocycles.insert(
            mesocycle.id(),
            MesocycleRow {
                user_id: mesocycle.user_id(),
                name: mesocycle.name().to_owned(),
                plan_id: mesocycle.plan().id(),
                iterations: mesocycle.iterations(),
                status: mesocycle.status(),
                created_at: mesocycle.created_at(),
            },
        );
        Ok(())
    }

    async fn get_mesocycle(&self, id: MesocycleId) -> Result<Mesocycle, StorageError> {
        self.lock()?.assemble(id)
    }

    async fn list_mesocycles_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Mesocycle>, StorageError> {
        let guard = self.lock()?;
        let mut ids: Vec<MesocycleId> = guard
            .mesocycles
            .iter()
            .filter(|(_, row)| row.user_id == user_id)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids.into_iter().map(|id| guard.assemble(id)).collect()
    }

    async fn set_mesocycle_status(
        &self,
        id: MesocycleId,
        status: Status,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let row = guard.mesocycles.get_mut(&id).ok_or(StorageError::NotFound)?;
        row.status = status;
        Ok(())
    }

    async fn create_iteration_atomic(
        &self,
        plan: &TrainingPlan,
        mesocycle_id: MesocycleId,
        iteration_number: u32,
        rir: u8,
        now: DateTime<Utc>,
    ) -> Result<PlanInstance, StorageError> {
        let mut guard = self.lock()?;
        if !guard.mesocycles.contains_key(&mesocycle_id) {
            return Err(StorageError::NotFound);
        }
        let exists = guard
            .instances
            .get(&mesocycle_id)
            .is_some_and(|all| all.iter().any(|i| i.iteration_number == iteration_number));
        if exists {
            return Err(StorageError::Conflict);
        }

        let instance_id = PlanInstanceId::new(guard.allocate());
        let state = &mut *guard;
        let instance = materialize_instance(
            plan,
            instance_id,
            mesocycle_id,
            iteration_number,
            rir,
            now,
            || InstanceDayId::new(state.allocate()),
        );
        guard
            .instances
            .entry(mesocycle_id)
            .or_default()
            .push(instance.clone());
        Ok(instance)
    }

    async fn update_instance(&self, instance: &PlanInstance) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let stored = guard
            .instances
            .get_mut(&instance.mesocycle_id)
            .and_then(|all| all.iter_mut().find(|i| i.id == instance.id))
            .ok_or(StorageError::NotFound)?;

        stored.status = instance.status;
        stored.started_at = instance.started_at;
        stored.completed_at = instance.completed_at;
        Ok(())
    }

    async fn update_day(&self, day: &PlanInstanceDay) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let target = guard
            .instances
            .values_mut()
            .flatten()
            .flat_map(|i| i.days.iter_mut())
            .find(|d| d.id == day.id)
            .ok_or(StorageError::NotFound)?;
        target.is_complete = day.is_complete;
        target.updated_at = day.updated_at;
        Ok(())
    }
}

#[async_trait]
impl WorkoutRepository for InMemoryRepository {
    async fn start_workout(
        &self,
        day_id: InstanceDayId,
        started_at: DateTime<Utc>,
    ) -> Result<WorkoutInstance, StorageError> {
        let mut guard = self.lock()?;
        let workout_id = WorkoutInstanceId::new(guard.allocate());
        let day = guard
            .instances
            .values_mut()
            .flatten()
            .flat_map(|i| i.days.iter_mut())
            .find(|d| d.id == day_id)
            .ok_or(StorageError::NotFound)?;
        if day.workout.is_some() {
            return Err(StorageError::Conflict);
        }
        let workout = WorkoutInstance::new(workout_id, started_at);
        day.workout = Some(workout.clone());
        Ok(workout)
    }

    async fn append_set(
        &self,
        workout_id: WorkoutInstanceId,
        set: &ExerciseSet,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let workout = guard.workout_mut(workout_id).ok_or(StorageError::NotFound)?;
        let duplicate = workout
            .sets
            .iter()
            .any(|s| s.exercise_id == set.exercise_id && s.set_number == set.set_number);
        if duplicate {
            return Err(StorageError::Conflict);
        }
        workout.sets.push(*set);
        Ok(())
    }

    async fn complete_workout(
        &self,
        workout_id: WorkoutInstanceId,
        completed_at: DateTime<Utc>,
    ) -> Result<WorkoutInstance, StorageError> {
        let mut guard = self.lock()?;
        let workout = guard.workout_mut(workout_id).ok_or(StorageError::NotFound)?;
        workout.completed_at = Some(completed_at);
        Ok(workout.clone())
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub exercises: Arc<dyn ExerciseRepository>,
    pub plans: Arc<dyn PlanRepository>,
    pub mesocycles: Arc<dyn MesocycleRepository>,
    pub workouts: Arc<dyn WorkoutRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            exercises: Arc::new(repo.clone()),
            plans: Arc::new(repo.clone()),
            mesocycles: Arc::new(repo.clone()),
            workouts: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meso_core::model::{PlanDay, WorkoutTemplate, WorkoutTemplateId};
    use meso_core::time::fixed_now;

    fn plan() -> TrainingPlan {
        let template =
            WorkoutTemplate::new(WorkoutTemplateId::new(1), "Full body", Vec::new()).unwrap();
        TrainingPlan::new(
            PlanId::new(1),
            UserId::new(1),
            "Two day",
            vec![PlanDay::workout(1, template), PlanDay::rest(2)],
        )
        .unwrap()
    }

    async fn seeded() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        repo.upsert_plan(&plan()).await.unwrap();
        let meso = Mesocycle::new(
            MesocycleId::new(1),
            UserId::new(1),
            "Block",
            plan(),
            3,
            fixed_now(),
        )
        .unwrap();
        repo.insert_mesocycle(&meso).await.unwrap();
        repo
    }

    #[tokio::test]
    async fn iteration_creation_is_idempotent_guarded() {
        let repo = seeded().await;
        let first = repo
            .create_iteration_atomic(&plan(), MesocycleId::new(1), 1, 2, fixed_now())
            .await
            .unwrap();
        assert_eq!(first.days.len(), 2);
        assert_eq!(first.rir, 2);
        assert_eq!(first.status, Status::NotStarted);

        let again = repo
            .create_iteration_atomic(&plan(), MesocycleId::new(1), 1, 2, fixed_now())
            .await;
        assert!(matches!(again, Err(StorageError::Conflict)));

        let meso = repo.get_mesocycle(MesocycleId::new(1)).await.unwrap();
        assert_eq!(meso.instances().len(), 1);
    }

    #[tokio::test]
    async fn iteration_for_unknown_mesocycle_is_not_found() {
        let repo = seeded().await;
        let res = repo
            .create_iteration_atomic(&plan(), MesocycleId::new(9), 1, 3, fixed_now())
            .await;
        assert!(matches!(res, Err(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn workouts_attach_once_and_collect_sets() {
        let repo = seeded().await;
        let inst = repo
            .create_iteration_atomic(&plan(), MesocycleId::new(1), 1, 3, fixed_now())
            .await
            .unwrap();
        let day_id = inst.days[0].id;

        let workout = repo.start_workout(day_id, fixed_now()).await.unwrap();
        assert!(matches!(
            repo.start_workout(day_id, fixed_now()).await,
            Err(StorageError::Conflict)
        ));

        let set = ExerciseSet::new(ExerciseId::new(1), 1, 60.0, 10);
        repo.append_set(workout.id, &set).await.unwrap();
        assert!(matches!(
            repo.append_set(workout.id, &set).await,
            Err(StorageError::Conflict)
        ));

        let done = repo.complete_workout(workout.id, fixed_now()).await.unwrap();
        assert_eq!(done.sets, vec![set]);
        assert_eq!(done.completed_at, Some(fixed_now()));
    }

    #[tokio::test]
    async fn mesocycle_ids_are_never_overwritten() {
        let repo = seeded().await;
        let takeover = Mesocycle::new(
            MesocycleId::new(1),
            UserId::new(2),
            "Takeover",
            plan(),
            5,
            fixed_now(),
        )
        .unwrap();
        assert!(matches!(
            repo.insert_mesocycle(&takeover).await,
            Err(StorageError::Conflict)
        ));

        let kept = repo.get_mesocycle(MesocycleId::new(1)).await.unwrap();
        assert_eq!(kept.user_id(), UserId::new(1));
        assert_eq!(kept.iterations(), 3);
        assert!(repo.plan_in_use(PlanId::new(1)).await.unwrap());
        assert!(!repo.plan_in_use(PlanId::new(2)).await.unwrap());
    }

    #[tokio::test]
    async fn stale_instance_header_keeps_completed_days() {
        let repo = seeded().await;
        let mut stale = repo
            .create_iteration_atomic(&plan(), MesocycleId::new(1), 1, 2, fixed_now())
            .await
            .unwrap();

        let mut rest = stale.days[1].clone();
        rest.is_complete = true;
        repo.update_day(&rest).await.unwrap();

        stale.start(fixed_now()).unwrap();
        repo.update_instance(&stale).await.unwrap();

        let meso = repo.get_mesocycle(MesocycleId::new(1)).await.unwrap();
        let stored = &meso.instances()[0];
        assert_eq!(stored.status, Status::InProgress);
        assert!(stored.days[1].is_complete);
        assert!(!stored.days[0].is_complete);
    }

    #[tokio::test]
    async fn lists_only_the_owners_mesocycles() {
        let repo = seeded().await;
        let other = Mesocycle::new(
            MesocycleId::new(2),
            UserId::new(2),
            "Someone else",
            plan(),
            2,
            fixed_now(),
        )
        .unwrap();
        repo.insert_mesocycle(&other).await.unwrap();

        let mine = repo.list_mesocycles_for_user(UserId::new(1)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id(), MesocycleId::new(1));
    }
}
