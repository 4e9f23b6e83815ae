use meso_core::model::{Exercise, ExerciseId};

use super::SqliteRepository;
use super::mapping::{db, id_to_i64, map_exercise_row};
use crate::repository::{ExerciseRepository, StorageError};

#[async_trait::async_trait]
impl ExerciseRepository for SqliteRepository {
    async fn upsert_exercise(&self, exercise: &Exercise) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO exercises (id, name, category)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category
            ",
        )
        .bind(id_to_i64("exercise_id", exercise.id().value())?)
        .bind(exercise.name().to_owned())
        .bind(exercise.category().to_owned())
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(())
    }

    async fn get_exercise(&self, id: ExerciseId) -> Result<Exercise, StorageError> {
        let row = sqlx::query("SELECT id, name, category FROM exercises WHERE id = ?1")
            .bind(id_to_i64("exercise_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        map_exercise_row(&row)
    }

    async fn list_exercises(&self) -> Result<Vec<Exercise>, StorageError> {
        let rows = sqlx::query("SELECT id, name, category FROM exercises ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_exercise_row(&row)?);
        }
        Ok(out)
    }
}
