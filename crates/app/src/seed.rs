use chrono::{DateTime, Duration, Utc};
use meso_core::model::{
    Exercise, ExerciseId, ExerciseSet, MesocycleId, PlanDay, PlanId, TemplateExercise,
    TrainingPlan, UserId, WorkoutTemplate, WorkoutTemplateId,
};
use services::{AppServices, Clock};
use storage::{Storage, StorageError};
use tracing::info;

pub const SEED_MESOCYCLE: MesocycleId = MesocycleId::new(1);
const SEED_PLAN: PlanId = PlanId::new(1);
const SEED_ITERATIONS: u32 = 4;

const CATALOG: [(u64, &str, &str); 5] = [
    (1, "Bench press", "Chest"),
    (2, "Overhead press", "Shoulders"),
    (3, "Pull-up", "Back"),
    (4, "Back squat", "Quads"),
    (5, "Romanian deadlift", "Hamstrings"),
];

fn template(
    id: u64,
    name: &str,
    exercises: &[u64],
) -> Result<WorkoutTemplate, Box<dyn std::error::Error>> {
    let entries = exercises
        .iter()
        .zip(1..)
        .map(|(&exercise, order)| TemplateExercise {
            exercise_id: ExerciseId::new(exercise),
            order,
        })
        .collect();
    Ok(WorkoutTemplate::new(WorkoutTemplateId::new(id), name, entries)?)
}

fn demo_plan(user_id: UserId) -> Result<TrainingPlan, Box<dyn std::error::Error>> {
    let upper = template(1, "Upper", &[1, 2, 3])?;
    let lower = template(2, "Lower", &[4, 5])?;
    Ok(TrainingPlan::new(
        SEED_PLAN,
        user_id,
        "Upper / Lower / Rest",
        vec![
            PlanDay::workout(1, upper),
            PlanDay::workout(2, lower),
            PlanDay::rest(3),
        ],
    )?)
}

/// Services pinned `hours` after `base`, so seeded history has distinct timestamps.
fn at(storage: &Storage, base: DateTime<Utc>, hours: i64, history_days: i64) -> AppServices {
    AppServices::from_storage(storage, Clock::fixed(base + Duration::hours(hours)), history_days)
}

/// Load a demo catalog, plan and mesocycle with its first iteration completed.
///
/// Does nothing if the demo mesocycle already exists.
///
/// # Errors
///
/// Returns the first storage or lifecycle error encountered.
pub async fn seed_demo(
    storage: &Storage,
    user_id: UserId,
    now: DateTime<Utc>,
    history_days: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    match storage.mesocycles.get_mesocycle(SEED_MESOCYCLE).await {
        Ok(_) => {
            info!(mesocycle_id = %SEED_MESOCYCLE, "demo data already present");
            return Ok(());
        }
        Err(StorageError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }

    let base = now - Duration::days(3);
    let plans = at(storage, base, 0, history_days).plans();
    for (id, name, category) in CATALOG {
        plans
            .register_exercise(&Exercise::new(ExerciseId::new(id), name, category)?)
            .await?;
    }
    let plan = demo_plan(user_id)?;
    plans.save_plan(&plan).await?;
    plans
        .create_mesocycle(
            SEED_MESOCYCLE,
            user_id,
            "Demo hypertrophy block",
            plan.id(),
            SEED_ITERATIONS,
        )
        .await?;

    let first = at(storage, base, 1, history_days)
        .training()
        .begin_mesocycle(user_id, SEED_MESOCYCLE)
        .await?;

    for (offset, day) in (0_i64..).zip(&first.days) {
        let services = at(storage, base, 24 * offset + 2, history_days);
        let training = services.training();
        if day.is_rest_day {
            training
                .complete_rest_day(user_id, SEED_MESOCYCLE, day.id)
                .await?;
            continue;
        }
        training
            .start_workout(user_id, SEED_MESOCYCLE, day.id)
            .await?;
        let exercises = plan
            .day(day.day_number)
            .and_then(|d| d.workout.as_ref())
            .map(|t| t.exercises().to_vec())
            .unwrap_or_default();
        for entry in exercises {
            for set_number in 1..=3 {
                let set = ExerciseSet::new(entry.exercise_id, set_number, 60.0, 10);
                training
                    .log_set(user_id, SEED_MESOCYCLE, day.id, set)
                    .await?;
            }
        }
        at(storage, base, 24 * offset + 3, history_days)
            .training()
            .complete_workout(user_id, SEED_MESOCYCLE, day.id)
            .await?;
    }

    info!(mesocycle_id = %SEED_MESOCYCLE, %user_id, "demo data seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meso_core::model::Status;
    use meso_core::time::fixed_now;

    #[tokio::test]
    async fn seed_completes_first_iteration_once() {
        let storage = Storage::in_memory();
        let user = UserId::new(1);
        seed_demo(&storage, user, fixed_now(), 365).await.unwrap();
        seed_demo(&storage, user, fixed_now(), 365).await.unwrap();

        let meso = storage.mesocycles.get_mesocycle(SEED_MESOCYCLE).await.unwrap();
        assert_eq!(meso.status(), Status::InProgress);
        assert_eq!(meso.instances().len(), 1);
        assert_eq!(meso.instances()[0].status, Status::Complete);

        let services = AppServices::from_storage(&storage, Clock::fixed(fixed_now()), 365);
        let volumes = services
            .progress()
            .iteration_volumes(user, SEED_MESOCYCLE)
            .await
            .unwrap();
        assert_eq!(volumes.len(), 1);
        assert!((volumes[0].total_volume - 9000.0).abs() < f64::EPSILON);

        let schedule = services
            .schedule()
            .project_schedule(user, SEED_MESOCYCLE)
            .await
            .unwrap();
        assert_eq!(schedule.previous_days.len(), 3);
        assert_eq!(schedule.upcoming_days.len(), 9);
        assert!(schedule.upcoming_days.iter().all(|d| d.is_virtual()));
    }
}
