use meso_core::model::{
    Exercise, ExerciseId, ExerciseSet, InstanceDayId, MesocycleId, PlanId, PlanInstanceId, Status,
    UserId, WorkoutInstance, WorkoutInstanceId, WorkoutTemplateId,
};
use sqlx::Row;
use sqlx::error::ErrorKind;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Constraint violations become `Conflict`/`NotFound`; everything else is a
/// connection-level failure.
pub(crate) fn db(e: sqlx::Error) -> StorageError {
    match e.as_database_error().map(|d| d.kind()) {
        Some(ErrorKind::UniqueViolation) => StorageError::Conflict,
        Some(ErrorKind::ForeignKeyViolation) => StorageError::NotFound,
        _ => StorageError::Connection(e.to_string()),
    }
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn bool_from_i64(v: i64) -> bool {
    v != 0
}

pub(crate) fn parse_status(s: &str) -> Result<Status, StorageError> {
    Status::parse(s).map_err(ser)
}

macro_rules! id_from_i64 {
    ($($fn_name:ident => $ty:ident, $field:literal;)+) => {
        $(
            pub(crate) fn $fn_name(v: i64) -> Result<$ty, StorageError> {
                Ok($ty::new(i64_to_u64($field, v)?))
            }
        )+
    };
}

id_from_i64! {
    exercise_id_from_i64 => ExerciseId, "exercise_id";
    plan_id_from_i64 => PlanId, "plan_id";
    template_id_from_i64 => WorkoutTemplateId, "workout_template_id";
    user_id_from_i64 => UserId, "user_id";
    mesocycle_id_from_i64 => MesocycleId, "mesocycle_id";
    instance_id_from_i64 => PlanInstanceId, "plan_instance_id";
    day_id_from_i64 => InstanceDayId, "day_id";
    workout_id_from_i64 => WorkoutInstanceId, "workout_instance_id";
}

pub(crate) fn map_exercise_row(row: &SqliteRow) -> Result<Exercise, StorageError> {
    Exercise::new(
        exercise_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<String, _>("category").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_set_row(row: &SqliteRow) -> Result<ExerciseSet, StorageError> {
    Ok(ExerciseSet::new(
        exercise_id_from_i64(row.try_get("exercise_id").map_err(ser)?)?,
        u32_from_i64("set_number", row.try_get("set_number").map_err(ser)?)?,
        row.try_get("weight").map_err(ser)?,
        u32_from_i64("reps", row.try_get("reps").map_err(ser)?)?,
    ))
}

/// Workout without its sets; callers attach those separately.
pub(crate) fn map_workout_row(row: &SqliteRow) -> Result<WorkoutInstance, StorageError> {
    let mut workout = WorkoutInstance::new(
        workout_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get("started_at").map_err(ser)?,
    );
    workout.completed_at = row.try_get("completed_at").map_err(ser)?;
    Ok(workout)
}
