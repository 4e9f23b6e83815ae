use chrono::{DateTime, Utc};
use meso_core::model::{ExerciseSet, InstanceDayId, WorkoutInstance, WorkoutInstanceId};

use super::SqliteRepository;
use super::mapping::{db, id_to_i64, map_set_row, map_workout_row, workout_id_from_i64};
use crate::repository::{StorageError, WorkoutRepository};

#[async_trait::async_trait]
impl WorkoutRepository for SqliteRepository {
    async fn start_workout(
        &self,
        day_id: InstanceDayId,
        started_at: DateTime<Utc>,
    ) -> Result<WorkoutInstance, StorageError> {
        // A missing day surfaces as a foreign key violation, a second workout
        // for the same day as a unique violation.
        let res = sqlx::query(
            r"
            INSERT INTO workout_instances (day_id, started_at, completed_at)
            VALUES (?1, ?2, NULL)
            ",
        )
        .bind(id_to_i64("day_id", day_id.value())?)
        .bind(started_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(WorkoutInstance::new(
            workout_id_from_i64(res.last_insert_rowid())?,
            started_at,
        ))
    }

    async fn append_set(
        &self,
        workout_id: WorkoutInstanceId,
        set: &ExerciseSet,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO exercise_sets (workout_instance_id, exercise_id, set_number, weight, reps)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_to_i64("workout_instance_id", workout_id.value())?)
        .bind(id_to_i64("exercise_id", set.exercise_id.value())?)
        .bind(i64::from(set.set_number))
        .bind(set.weight)
        .bind(i64::from(set.reps))
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(())
    }

    async fn complete_workout(
        &self,
        workout_id: WorkoutInstanceId,
        completed_at: DateTime<Utc>,
    ) -> Result<WorkoutInstance, StorageError> {
        let id = id_to_i64("workout_instance_id", workout_id.value())?;
        let mut tx = self.pool.begin().await.map_err(db)?;

        let res = sqlx::query("UPDATE workout_instances SET completed_at = ?1 WHERE id = ?2")
            .bind(completed_at)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        let row = sqlx::query(
            "SELECT id, started_at, completed_at FROM workout_instances WHERE id = ?1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db)?;
        let mut workout = map_workout_row(&row)?;

        let set_rows = sqlx::query(
            r"
            SELECT exercise_id, set_number, weight, reps
            FROM exercise_sets
            WHERE workout_instance_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db)?;
        for row in set_rows {
            workout.sets.push(map_set_row(&row)?);
        }

        tx.commit().await.map_err(db)?;
        Ok(workout)
    }
}
