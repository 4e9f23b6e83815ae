use std::collections::HashMap;

use chrono::{DateTime, Utc};
use meso_core::iteration::materialize_instance;
use meso_core::model::{
    ExerciseSet, InstanceDayId, Mesocycle, MesocycleId, PlanInstance, PlanInstanceDay,
    PlanInstanceId, Status, TrainingPlan, UserId, WorkoutInstance, WorkoutInstanceId,
};
use sqlx::{Row, SqliteConnection};

use super::SqliteRepository;
use super::mapping::{
    bool_from_i64, day_id_from_i64, db, id_to_i64, instance_id_from_i64, map_set_row,
    map_workout_row, mesocycle_id_from_i64, parse_status, plan_id_from_i64, ser, u32_from_i64,
    user_id_from_i64, workout_id_from_i64,
};
use super::plan_repo::load_plan;
use crate::repository::{MesocycleRepository, StorageError};

#[async_trait::async_trait]
impl MesocycleRepository for SqliteRepository {
    async fn insert_mesocycle(&self, mesocycle: &Mesocycle) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO mesocycles (id, user_id, name, plan_id, iterations, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(id_to_i64("mesocycle_id", mesocycle.id().value())?)
        .bind(id_to_i64("user_id", mesocycle.user_id().value())?)
        .bind(mesocycle.name().to_owned())
        .bind(id_to_i64("plan_id", mesocycle.plan().id().value())?)
        .bind(i64::from(mesocycle.iterations()))
        .bind(mesocycle.status().as_str())
        .bind(mesocycle.created_at())
        .execute(&self.pool)
        .await
        .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(())
    }

    async fn get_mesocycle(&self, id: MesocycleId) -> Result<Mesocycle, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(db)?;
        load_mesocycle(&mut conn, id).await
    }

    async fn list_mesocycles_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Mesocycle>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(db)?;
        let rows = sqlx::query("SELECT id FROM mesocycles WHERE user_id = ?1 ORDER BY id ASC")
            .bind(id_to_i64("user_id", user_id.value())?)
            .fetch_all(&mut *conn)
            .await
            .map_err(db)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id = mesocycle_id_from_i64(row.try_get("id").map_err(ser)?)?;
            out.push(load_mesocycle(&mut conn, id).await?);
        }
        Ok(out)
    }

    async fn set_mesocycle_status(
        &self,
        id: MesocycleId,
        status: Status,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE mesocycles SET status = ?1 WHERE id = ?2")
            .bind(status.as_str())
            .bind(id_to_i64("mesocycle_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
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
        let meso = id_to_i64("mesocycle_id", mesocycle_id.value())?;
        let mut tx = self.pool.begin().await.map_err(db)?;

        sqlx::query("SELECT 1 FROM mesocycles WHERE id = ?1")
            .bind(meso)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;

        let existing = sqlx::query(
            "SELECT 1 FROM plan_instances WHERE mesocycle_id = ?1 AND iteration_number = ?2",
        )
        .bind(meso)
        .bind(i64::from(iteration_number))
        .fetch_optional(&mut *tx)
        .await
        .map_err(db)?;
        if existing.is_some() {
            return Err(StorageError::Conflict);
        }

        // Ids are assigned by the inserts below.
        let mut instance = materialize_instance(
            plan,
            PlanInstanceId::new(0),
            mesocycle_id,
            iteration_number,
            rir,
            now,
            || InstanceDayId::new(0),
        );

        let res = sqlx::query(
            r"
            INSERT INTO plan_instances (
                mesocycle_id, iteration_number, status, started_at, completed_at, rir
            )
            VALUES (?1, ?2, ?3, NULL, NULL, ?4)
            ",
        )
        .bind(meso)
        .bind(i64::from(iteration_number))
        .bind(instance.status.as_str())
        .bind(i64::from(rir))
        .execute(&mut *tx)
        .await
        .map_err(db)?;
        instance.id = instance_id_from_i64(res.last_insert_rowid())?;
        let instance_row = res.last_insert_rowid();

        for day in &mut instance.days {
            let res = sqlx::query(
                r"
                INSERT INTO plan_instance_days (plan_instance_id, day_number, is_complete, updated_at)
                VALUES (?1, ?2, 0, ?3)
                ",
            )
            .bind(instance_row)
            .bind(i64::from(day.day_number))
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
            day.id = day_id_from_i64(res.last_insert_rowid())?;
        }

        tx.commit().await.map_err(db)?;
        Ok(instance)
    }

    async fn update_instance(&self, instance: &PlanInstance) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE plan_instances
            SET status = ?1, started_at = ?2, completed_at = ?3
            WHERE id = ?4
            ",
        )
        .bind(instance.status.as_str())
        .bind(instance.started_at)
        .bind(instance.completed_at)
        .bind(id_to_i64("plan_instance_id", instance.id.value())?)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn update_day(&self, day: &PlanInstanceDay) -> Result<(), StorageError> {
        let res = sqlx::query(
            "UPDATE plan_instance_days SET is_complete = ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(i64::from(day.is_complete))
        .bind(day.updated_at)
        .bind(id_to_i64("day_id", day.id.value())?)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

/// Assemble the full mesocycle snapshot on one connection.
async fn load_mesocycle(
    conn: &mut SqliteConnection,
    id: MesocycleId,
) -> Result<Mesocycle, StorageError> {
    let meso = id_to_i64("mesocycle_id", id.value())?;

    let header = sqlx::query(
        r"
        SELECT id, user_id, name, plan_id, iterations, status, created_at
        FROM mesocycles WHERE id = ?1
        ",
    )
    .bind(meso)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db)?
    .ok_or(StorageError::NotFound)?;

    let plan = load_plan(conn, plan_id_from_i64(header.try_get("plan_id").map_err(ser)?)?).await?;

    let set_rows = sqlx::query(
        r"
        SELECT s.workout_instance_id, s.exercise_id, s.set_number, s.weight, s.reps
        FROM exercise_sets s
        JOIN workout_instances w ON w.id = s.workout_instance_id
        JOIN plan_instance_days d ON d.id = w.day_id
        JOIN plan_instances i ON i.id = d.plan_instance_id
        WHERE i.mesocycle_id = ?1
        ORDER BY s.id ASC
        ",
    )
    .bind(meso)
    .fetch_all(&mut *conn)
    .await
    .map_err(db)?;

    let mut sets: HashMap<WorkoutInstanceId, Vec<ExerciseSet>> = HashMap::new();
    for row in set_rows {
        let workout_id = workout_id_from_i64(row.try_get("workout_instance_id").map_err(ser)?)?;
        sets.entry(workout_id).or_default().push(map_set_row(&row)?);
    }

    let workout_rows = sqlx::query(
        r"
        SELECT w.id, w.day_id, w.started_at, w.completed_at
        FROM workout_instances w
        JOIN plan_instance_days d ON d.id = w.day_id
        JOIN plan_instances i ON i.id = d.plan_instance_id
        WHERE i.mesocycle_id = ?1
        ",
    )
    .bind(meso)
    .fetch_all(&mut *conn)
    .await
    .map_err(db)?;

    let mut workouts: HashMap<InstanceDayId, WorkoutInstance> = HashMap::new();
    for row in workout_rows {
        let mut workout = map_workout_row(&row)?;
        workout.sets = sets.remove(&workout.id).unwrap_or_default();
        workouts.insert(day_id_from_i64(row.try_get("day_id").map_err(ser)?)?, workout);
    }

    let day_rows = sqlx::query(
        r"
        SELECT d.id, d.plan_instance_id, d.day_number, d.is_complete, d.updated_at
        FROM plan_instance_days d
        JOIN plan_instances i ON i.id = d.plan_instance_id
        WHERE i.mesocycle_id = ?1
        ORDER BY d.plan_instance_id ASC, d.day_number ASC
        ",
    )
    .bind(meso)
    .fetch_all(&mut *conn)
    .await
    .map_err(db)?;

    let mut days: HashMap<PlanInstanceId, Vec<PlanInstanceDay>> = HashMap::new();
    for row in day_rows {
        let day_id = day_id_from_i64(row.try_get("id").map_err(ser)?)?;
        let day_number = u32_from_i64("day_number", row.try_get("day_number").map_err(ser)?)?;
        let plan_day = plan.day(day_number);
        days.entry(instance_id_from_i64(row.try_get("plan_instance_id").map_err(ser)?)?)
            .or_default()
            .push(PlanInstanceDay {
                id: day_id,
                day_number,
                is_rest_day: plan_day.is_some_and(|d| d.is_rest_day),
                workout_template_id: plan_day.and_then(|d| d.workout_template_id()),
                is_complete: bool_from_i64(row.try_get("is_complete").map_err(ser)?),
                updated_at: row.try_get("updated_at").map_err(ser)?,
                workout: workouts.remove(&day_id),
            });
    }

    let instance_rows = sqlx::query(
        r"
        SELECT id, iteration_number, status, started_at, completed_at, rir
        FROM plan_instances
        WHERE mesocycle_id = ?1
        ORDER BY iteration_number ASC
        ",
    )
    .bind(meso)
    .fetch_all(&mut *conn)
    .await
    .map_err(db)?;

    let mut instances = Vec::with_capacity(instance_rows.len());
    for row in instance_rows {
        let instance_id = instance_id_from_i64(row.try_get("id").map_err(ser)?)?;
        let status: String = row.try_get("status").map_err(ser)?;
        let rir: i64 = row.try_get("rir").map_err(ser)?;
        instances.push(PlanInstance {
            id: instance_id,
            mesocycle_id: id,
            iteration_number: u32_from_i64(
                "iteration_number",
                row.try_get("iteration_number").map_err(ser)?,
            )?,
            status: parse_status(&status)?,
            started_at: row.try_get("started_at").map_err(ser)?,
            completed_at: row.try_get("completed_at").map_err(ser)?,
            rir: u8::try_from(rir).map_err(|_| ser(format!("invalid rir: {rir}")))?,
            days: days.remove(&instance_id).unwrap_or_default(),
        });
    }

    let status: String = header.try_get("status").map_err(ser)?;
    Mesocycle::from_persisted(
        id,
        user_id_from_i64(header.try_get("user_id").map_err(ser)?)?,
        header.try_get::<String, _>("name").map_err(ser)?,
        plan,
        u32_from_i64("iterations", header.try_get("iterations").map_err(ser)?)?,
        parse_status(&status)?,
        header.try_get("created_at").map_err(ser)?,
        instances,
    )
    .map_err(ser)
}
