use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use super::SqliteInitError;

const TABLES: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS exercises (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS workout_templates (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS template_exercises (
            template_id INTEGER NOT NULL,
            exercise_id INTEGER NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            PRIMARY KEY (template_id, exercise_id),
            FOREIGN KEY (template_id) REFERENCES workout_templates(id) ON DELETE CASCADE,
            FOREIGN KEY (exercise_id) REFERENCES exercises(id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS plans (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS plan_days (
            plan_id INTEGER NOT NULL,
            day_number INTEGER NOT NULL CHECK (day_number >= 1),
            is_rest_day INTEGER NOT NULL CHECK (is_rest_day IN (0, 1)),
            workout_template_id INTEGER,
            PRIMARY KEY (plan_id, day_number),
            FOREIGN KEY (plan_id) REFERENCES plans(id) ON DELETE CASCADE,
            FOREIGN KEY (workout_template_id) REFERENCES workout_templates(id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS mesocycles (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            plan_id INTEGER NOT NULL,
            iterations INTEGER NOT NULL CHECK (iterations >= 1),
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (plan_id) REFERENCES plans(id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS plan_instances (
            id INTEGER PRIMARY KEY,
            mesocycle_id INTEGER NOT NULL,
            iteration_number INTEGER NOT NULL CHECK (iteration_number >= 1),
            status TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT,
            rir INTEGER NOT NULL CHECK (rir >= 0),
            UNIQUE (mesocycle_id, iteration_number),
            FOREIGN KEY (mesocycle_id) REFERENCES mesocycles(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS plan_instance_days (
            id INTEGER PRIMARY KEY,
            plan_instance_id INTEGER NOT NULL,
            day_number INTEGER NOT NULL CHECK (day_number >= 1),
            is_complete INTEGER NOT NULL CHECK (is_complete IN (0, 1)),
            updated_at TEXT NOT NULL,
            UNIQUE (plan_instance_id, day_number),
            FOREIGN KEY (plan_instance_id) REFERENCES plan_instances(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS workout_instances (
            id INTEGER PRIMARY KEY,
            day_id INTEGER NOT NULL UNIQUE,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            FOREIGN KEY (day_id) REFERENCES plan_instance_days(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS exercise_sets (
            id INTEGER PRIMARY KEY,
            workout_instance_id INTEGER NOT NULL,
            exercise_id INTEGER NOT NULL,
            set_number INTEGER NOT NULL CHECK (set_number >= 1),
            weight REAL NOT NULL,
            reps INTEGER NOT NULL CHECK (reps >= 0),
            UNIQUE (workout_instance_id, exercise_id, set_number),
            FOREIGN KEY (workout_instance_id) REFERENCES workout_instances(id) ON DELETE CASCADE,
            FOREIGN KEY (exercise_id) REFERENCES exercises(id)
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_mesocycles_user
            ON mesocycles(user_id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_workout_instances_completed
            ON workout_instances(completed_at);
    ",
];

/// Runs the consolidated schema migration.
///
/// Creates catalog, plan, mesocycle, iteration, and workout tables.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in TABLES {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(version = 1, "applied schema migration");
    }

    Ok(())
}
