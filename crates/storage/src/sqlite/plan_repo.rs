use std::collections::HashMap;

use meso_core::model::{
    PlanDay, PlanId, TemplateExercise, TrainingPlan, WorkoutTemplate, WorkoutTemplateId,
};
use sqlx::{Row, SqliteConnection};

use super::SqliteRepository;
use super::mapping::{
    bool_from_i64, db, exercise_id_from_i64, id_to_i64, plan_id_from_i64, ser,
    template_id_from_i64, u32_from_i64, user_id_from_i64,
};
use crate::repository::{PlanRepository, StorageError};

#[async_trait::async_trait]
impl PlanRepository for SqliteRepository {
    async fn upsert_plan(&self, plan: &TrainingPlan) -> Result<(), StorageError> {
        let plan_id = id_to_i64("plan_id", plan.id().value())?;
        let mut tx = self.pool.begin().await.map_err(db)?;

        sqlx::query(
            r"
            INSERT INTO plans (id, user_id, name)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                name = excluded.name
            ",
        )
        .bind(plan_id)
        .bind(id_to_i64("user_id", plan.user_id().value())?)
        .bind(plan.name())
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        for template in plan.days().iter().filter_map(|d| d.workout.as_ref()) {
            upsert_template(&mut tx, template).await?;
        }

        sqlx::query("DELETE FROM plan_days WHERE plan_id = ?1")
            .bind(plan_id)
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        for day in plan.days() {
            let template_id = day
                .workout_template_id()
                .map(|id| id_to_i64("workout_template_id", id.value()))
                .transpose()?;
            sqlx::query(
                r"
                INSERT INTO plan_days (plan_id, day_number, is_rest_day, workout_template_id)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(plan_id)
            .bind(i64::from(day.day_number))
            .bind(i64::from(day.is_rest_day))
            .bind(template_id)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;
        Ok(())
    }

    async fn get_plan(&self, id: PlanId) -> Result<TrainingPlan, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(db)?;
        load_plan(&mut conn, id).await
    }

    async fn plan_in_use(&self, id: PlanId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM mesocycles WHERE plan_id = ?1 LIMIT 1")
            .bind(id_to_i64("plan_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        Ok(row.is_some())
    }
}

async fn upsert_template(
    conn: &mut SqliteConnection,
    template: &WorkoutTemplate,
) -> Result<(), StorageError> {
    let template_id = id_to_i64("workout_template_id", template.id().value())?;

    sqlx::query(
        r"
        INSERT INTO workout_templates (id, name)
        VALUES (?1, ?2)
        ON CONFLICT(id) DO UPDATE SET name = excluded.name
        ",
    )
    .bind(template_id)
    .bind(template.name())
    .execute(&mut *conn)
    .await
    .map_err(db)?;

    sqlx::query("DELETE FROM template_exercises WHERE template_id = ?1")
        .bind(template_id)
        .execute(&mut *conn)
        .await
        .map_err(db)?;

    for entry in template.exercises() {
        sqlx::query(
            r"
            INSERT INTO template_exercises (template_id, exercise_id, position)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(template_id)
        .bind(id_to_i64("exercise_id", entry.exercise_id.value())?)
        .bind(i64::from(entry.order))
        .execute(&mut *conn)
        .await
        .map_err(db)?;
    }
    Ok(())
}

/// Read a plan with its days and templates on an existing connection.
pub(super) async fn load_plan(
    conn: &mut SqliteConnection,
    id: PlanId,
) -> Result<TrainingPlan, StorageError> {
    let plan_id = id_to_i64("plan_id", id.value())?;

    let header = sqlx::query("SELECT id, user_id, name FROM plans WHERE id = ?1")
        .bind(plan_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db)?
        .ok_or(StorageError::NotFound)?;

    let template_rows = sqlx::query(
        r"
        SELECT t.id, t.name, te.exercise_id, te.position
        FROM workout_templates t
        LEFT JOIN template_exercises te ON te.template_id = t.id
        WHERE t.id IN (
            SELECT workout_template_id FROM plan_days
            WHERE plan_id = ?1 AND workout_template_id IS NOT NULL
        )
        ORDER BY t.id, te.position
        ",
    )
    .bind(plan_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db)?;

    let mut templates: HashMap<WorkoutTemplateId, (String, Vec<TemplateExercise>)> =
        HashMap::new();
    for row in template_rows {
        let template_id = template_id_from_i64(row.try_get("id").map_err(ser)?)?;
        let entry = templates
            .entry(template_id)
            .or_insert_with(|| (String::new(), Vec::new()));
        entry.0 = row.try_get("name").map_err(ser)?;
        if let Some(exercise_id) = row.try_get::<Option<i64>, _>("exercise_id").map_err(ser)? {
            let position: i64 = row.try_get("position").map_err(ser)?;
            entry.1.push(TemplateExercise {
                exercise_id: exercise_id_from_i64(exercise_id)?,
                order: u32_from_i64("position", position)?,
            });
        }
    }

    let day_rows = sqlx::query(
        r"
        SELECT day_number, is_rest_day, workout_template_id
        FROM plan_days
        WHERE plan_id = ?1
        ORDER BY day_number ASC
        ",
    )
    .bind(plan_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db)?;

    let mut days = Vec::with_capacity(day_rows.len());
    for row in day_rows {
        let day_number = u32_from_i64("day_number", row.try_get("day_number").map_err(ser)?)?;
        let is_rest_day = bool_from_i64(row.try_get("is_rest_day").map_err(ser)?);
        let template = match row
            .try_get::<Option<i64>, _>("workout_template_id")
            .map_err(ser)?
        {
            Some(raw) => {
                let template_id = template_id_from_i64(raw)?;
                let (name, exercises) = templates
                    .get(&template_id)
                    .cloned()
                    .ok_or_else(|| ser(format!("missing workout template {template_id}")))?;
                Some(WorkoutTemplate::new(template_id, name, exercises).map_err(ser)?)
            }
            None => None,
        };
        days.push(PlanDay {
            day_number,
            is_rest_day,
            workout: template,
        });
    }

    TrainingPlan::new(
        plan_id_from_i64(header.try_get("id").map_err(ser)?)?,
        user_id_from_i64(header.try_get("user_id").map_err(ser)?)?,
        header.try_get::<String, _>("name").map_err(ser)?,
        days,
    )
    .map_err(ser)
}
