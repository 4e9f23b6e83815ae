use std::sync::Arc;

use meso_core::model::{Exercise, Mesocycle, MesocycleId, PlanId, TrainingPlan, UserId};
use storage::repository::{
    ExerciseRepository, MesocycleRepository, PlanRepository, StorageError,
};
use tracing::info;

use crate::Clock;
use crate::error::PlanServiceError;

/// Catalog, plan and mesocycle setup.
#[derive(Clone)]
pub struct PlanService {
    clock: Clock,
    exercises: Arc<dyn ExerciseRepository>,
    plans: Arc<dyn PlanRepository>,
    mesocycles: Arc<dyn MesocycleRepository>,
}

impl PlanService {
    #[must_use]
    pub fn new(
        clock: Clock,
        exercises: Arc<dyn ExerciseRepository>,
        plans: Arc<dyn PlanRepository>,
        mesocycles: Arc<dyn MesocycleRepository>,
    ) -> Self {
        Self {
            clock,
            exercises,
            plans,
            mesocycles,
        }
    }

    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` if persistence fails.
    pub async fn register_exercise(&self, exercise: &Exercise) -> Result<(), PlanServiceError> {
        self.exercises.upsert_exercise(exercise).await?;
        Ok(())
    }

    /// Persist a validated plan with its templates.
    ///
    /// A stored plan can be replaced only by its owner and only while no
    /// mesocycle is built on it.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::PlanNotFound` if the id belongs to another
    /// user, `PlanServiceError::PlanInUse` once a mesocycle references it, and
    /// `PlanServiceError::Storage` if persistence fails, including a template
    /// that references an unregistered exercise.
    pub async fn save_plan(&self, plan: &TrainingPlan) -> Result<(), PlanServiceError> {
        match self.plans.get_plan(plan.id()).await {
            Ok(stored) if stored.user_id() != plan.user_id() => {
                return Err(PlanServiceError::PlanNotFound(plan.id()));
            }
            Ok(_) => {
                if self.plans.plan_in_use(plan.id()).await? {
                    return Err(PlanServiceError::PlanInUse(plan.id()));
                }
            }
            Err(StorageError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        self.plans.upsert_plan(plan).await?;
        info!(plan_id = %plan.id(), days = plan.day_count(), "plan saved");
        Ok(())
    }

    /// Create a not-started mesocycle over one of the user's stored plans.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::PlanNotFound` if the plan is missing or
    /// foreign, `PlanServiceError::MesocycleExists` if the id is taken, and
    /// `PlanServiceError::Mesocycle` for invalid names or iteration counts.
    pub async fn create_mesocycle(
        &self,
        id: MesocycleId,
        user_id: UserId,
        name: &str,
        plan_id: PlanId,
        iterations: u32,
    ) -> Result<Mesocycle, PlanServiceError> {
        let plan = match self.plans.get_plan(plan_id).await {
            Ok(plan) if plan.user_id() == user_id => plan,
            Ok(_) | Err(StorageError::NotFound) => {
                return Err(PlanServiceError::PlanNotFound(plan_id));
            }
            Err(e) => return Err(e.into()),
        };
        let meso = Mesocycle::new(id, user_id, name, plan, iterations, self.clock.now())?;
        match self.mesocycles.insert_mesocycle(&meso).await {
            Ok(()) => {}
            Err(StorageError::Conflict) => return Err(PlanServiceError::MesocycleExists(id)),
            Err(e) => return Err(e.into()),
        }
        info!(mesocycle_id = %id, %user_id, iterations, "mesocycle created");
        Ok(meso)
    }
}
