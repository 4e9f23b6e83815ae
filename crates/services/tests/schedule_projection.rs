use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meso_core::model::{
    Mesocycle, MesocycleId, PlanDay, PlanId, PlanInstance, PlanInstanceDay, Status, TrainingPlan,
    UserId,
};
use meso_core::schedule::{InconsistentState, ProjectionObserver, UpcomingBranch};
use meso_core::time::fixed_now;
use services::{Clock, ScheduleError, ScheduleService, TrainingService};
use storage::repository::{
    InMemoryRepository, MesocycleRepository, PlanRepository, Storage, StorageError,
};

const USER: UserId = UserId::new(3);

#[derive(Default)]
struct Recorder {
    branches: Mutex<Vec<UpcomingBranch>>,
    inconsistent: Mutex<Vec<InconsistentState>>,
}

impl ProjectionObserver for Recorder {
    fn upcoming_projected(&self, _mesocycle_id: MesocycleId, branch: UpcomingBranch, _days: usize) {
        self.branches.lock().unwrap().push(branch);
    }

    fn inconsistent_state(&self, _mesocycle_id: MesocycleId, state: &InconsistentState) {
        self.inconsistent.lock().unwrap().push(state.clone());
    }
}

fn plan(days: u32) -> TrainingPlan {
    TrainingPlan::new(
        PlanId::new(1),
        USER,
        "Rest cycle",
        (1..=days).map(PlanDay::rest).collect(),
    )
    .unwrap()
}

#[tokio::test]
async fn observer_sees_branch_decisions() {
    let repo = InMemoryRepository::new();
    repo.upsert_plan(&plan(2)).await.unwrap();
    let meso = Mesocycle::new(MesocycleId::new(1), USER, "Block", plan(2), 2, fixed_now()).unwrap();
    repo.insert_mesocycle(&meso).await.unwrap();

    let recorder = Arc::new(Recorder::default());
    let service = ScheduleService::new(Clock::fixed(fixed_now()), Arc::new(repo.clone()))
        .with_observer(recorder.clone());
    service
        .project_schedule(USER, meso.id())
        .await
        .unwrap();

    let training = TrainingService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );
    training.begin_mesocycle(USER, meso.id()).await.unwrap();
    let schedule = service
        .project_schedule(USER, meso.id())
        .await
        .unwrap();
    assert_eq!(schedule.upcoming_days.len(), 4);
    assert_eq!(
        schedule.upcoming_days.iter().filter(|d| d.is_virtual()).count(),
        2
    );

    assert_eq!(
        *recorder.branches.lock().unwrap(),
        vec![
            UpcomingBranch::NotStarted,
            UpcomingBranch::ActiveIteration { iteration: 1 }
        ]
    );
    assert!(recorder.inconsistent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn drifted_plan_yields_empty_upcoming_and_a_report() {
    let repo = InMemoryRepository::new();
    repo.upsert_plan(&plan(2)).await.unwrap();
    let meso = Mesocycle::new(MesocycleId::new(1), USER, "Block", plan(2), 2, fixed_now()).unwrap();
    repo.insert_mesocycle(&meso).await.unwrap();
    repo.create_iteration_atomic(&plan(2), meso.id(), 1, 1, fixed_now())
        .await
        .unwrap();

    // The plan gains a day after iteration 1 was materialized.
    repo.upsert_plan(&plan(3)).await.unwrap();

    let recorder = Arc::new(Recorder::default());
    let service = ScheduleService::new(Clock::fixed(fixed_now()), Arc::new(repo))
        .with_observer(recorder.clone());
    let schedule = service
        .project_schedule(USER, meso.id())
        .await
        .unwrap();

    assert!(schedule.upcoming_days.is_empty());
    let reports = recorder.inconsistent.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert!(matches!(reports[0], InconsistentState::DayMismatch(_)));
}

struct Unavailable;

#[async_trait]
impl MesocycleRepository for Unavailable {
    async fn insert_mesocycle(&self, _mesocycle: &Mesocycle) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn get_mesocycle(&self, _id: MesocycleId) -> Result<Mesocycle, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn list_mesocycles_for_user(
        &self,
        _user_id: UserId,
    ) -> Result<Vec<Mesocycle>, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn set_mesocycle_status(
        &self,
        _id: MesocycleId,
        _status: Status,
    ) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn create_iteration_atomic(
        &self,
        _plan: &TrainingPlan,
        _mesocycle_id: MesocycleId,
        _iteration_number: u32,
        _rir: u8,
        _now: DateTime<Utc>,
    ) -> Result<PlanInstance, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn update_instance(&self, _instance: &PlanInstance) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn update_day(&self, _day: &PlanInstanceDay) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }
}

#[tokio::test]
async fn storage_failures_propagate() {
    let service = ScheduleService::new(Clock::fixed(fixed_now()), Arc::new(Unavailable));
    let err = service
        .project_schedule(USER, MesocycleId::new(1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ScheduleError::Storage(StorageError::Connection(_))
    ));
}

#[tokio::test]
async fn sqlite_backed_projection_matches_in_memory() {
    let storage = Storage::sqlite("sqlite:file:memdb_services_schedule?mode=memory&cache=shared")
        .await
        .expect("sqlite");
    storage.plans.upsert_plan(&plan(2)).await.unwrap();
    let meso = Mesocycle::new(MesocycleId::new(1), USER, "Block", plan(2), 3, fixed_now()).unwrap();
    storage.mesocycles.insert_mesocycle(&meso).await.unwrap();

    let training = TrainingService::new(
        Clock::fixed(fixed_now()),
        Arc::clone(&storage.mesocycles),
        Arc::clone(&storage.workouts),
    );
    let first = training.begin_mesocycle(USER, meso.id()).await.unwrap();
    training
        .complete_rest_day(USER, meso.id(), first.days[0].id)
        .await
        .unwrap();

    let service = ScheduleService::new(Clock::fixed(fixed_now()), Arc::clone(&storage.mesocycles));
    let schedule = service
        .project_schedule(USER, meso.id())
        .await
        .unwrap();

    assert_eq!(schedule.previous_days.len(), 1);
    assert_eq!(schedule.previous_days[0].day_id, first.days[0].id);
    let upcoming: Vec<(u32, u32, bool)> = schedule
        .upcoming_days
        .iter()
        .map(|d| (d.iteration_number(), d.day_number(), d.is_virtual()))
        .collect();
    assert_eq!(
        upcoming,
        vec![
            (1, 2, false),
            (2, 1, true),
            (2, 2, true),
            (3, 1, true),
            (3, 2, true)
        ]
    );
}
