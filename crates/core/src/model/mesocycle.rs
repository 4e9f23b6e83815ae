use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{MesocycleId, UserId};
use crate::model::instance::PlanInstance;
use crate::model::plan::TrainingPlan;
use crate::model::status::Status;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MesocycleError {
    #[error("mesocycle name cannot be empty")]
    EmptyName,

    #[error("mesocycle must have at least one iteration")]
    ZeroIterations,

    #[error("iteration {iteration} is outside 1..={max}")]
    IterationOutOfRange { iteration: u32, max: u32 },

    #[error("iteration {iteration} is materialized more than once")]
    DuplicateIteration { iteration: u32 },

    #[error("iterations must be materialized in order: expected {expected}, found {found}")]
    NonSequentialIteration { expected: u32, found: u32 },
}

//
// ─── MESOCYCLE ─────────────────────────────────────────────────────────────────
//

/// A training block: one plan repeated for `iterations` iterations.
///
/// Instances are materialized lazily, so `instances()` may hold anywhere from
/// zero to `iterations` entries, always numbered `1..=k` with no gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesocycle {
    id: MesocycleId,
    user_id: UserId,
    name: String,
    plan: TrainingPlan,
    iterations: u32,
    status: Status,
    created_at: DateTime<Utc>,
    instances: Vec<PlanInstance>,
}

impl Mesocycle {
    /// Creates a brand-new mesocycle with no materialized iterations.
    ///
    /// # Errors
    ///
    /// Returns `MesocycleError::EmptyName` or `MesocycleError::ZeroIterations`.
    pub fn new(
        id: MesocycleId,
        user_id: UserId,
        name: impl Into<String>,
        plan: TrainingPlan,
        iterations: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, MesocycleError> {
        Self::from_persisted(
            id,
            user_id,
            name,
            plan,
            iterations,
            Status::NotStarted,
            created_at,
            Vec::new(),
        )
    }

    /// Rehydrate a mesocycle snapshot from storage.
    ///
    /// Instances are sorted by iteration number.
    ///
    /// # Errors
    ///
    /// Returns `MesocycleError` when the iteration numbers are out of range,
    /// duplicated, or not dense from 1.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: MesocycleId,
        user_id: UserId,
        name: impl Into<String>,
        plan: TrainingPlan,
        iterations: u32,
        status: Status,
        created_at: DateTime<Utc>,
        mut instances: Vec<PlanInstance>,
    ) -> Result<Self, MesocycleError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MesocycleError::EmptyName);
        }
        if iterations == 0 {
            return Err(MesocycleError::ZeroIterations);
        }

        instances.sort_by_key(|i| i.iteration_number);
        for (expected, instance) in (1_u32..).zip(instances.iter()) {
            let found = instance.iteration_number;
            if found == 0 || found > iterations {
                return Err(MesocycleError::IterationOutOfRange {
                    iteration: found,
                    max: iterations,
                });
            }
            if found < expected {
                return Err(MesocycleError::DuplicateIteration { iteration: found });
            }
            if found > expected {
                return Err(MesocycleError::NonSequentialIteration { expected, found });
            }
        }

        Ok(Self {
            id,
            user_id,
            name,
            plan,
            iterations,
            status,
            created_at,
            instances,
        })
    }

    #[must_use]
    pub fn id(&self) -> MesocycleId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn plan(&self) -> &TrainingPlan {
        &self.plan
    }

    /// Target iteration count `N`.
    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn instances(&self) -> &[PlanInstance] {
        &self.instances
    }

    #[must_use]
    pub fn instance(&self, iteration_number: u32) -> Option<&PlanInstance> {
        self.instances
            .iter()
            .find(|i| i.iteration_number == iteration_number)
    }

    /// Whether `owner` may see this mesocycle.
    #[must_use]
    pub fn is_owned_by(&self, owner: UserId) -> bool {
        self.user_id == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::{PlanId, PlanInstanceId};
    use crate::model::plan::PlanDay;
    use crate::time::fixed_now;

    fn plan() -> TrainingPlan {
        TrainingPlan::new(PlanId::new(1), UserId::new(1), "Rest only", vec![PlanDay::rest(1)])
            .unwrap()
    }

    fn instance(iteration_number: u32) -> PlanInstance {
        PlanInstance {
            id: PlanInstanceId::new(u64::from(iteration_number)),
            mesocycle_id: MesocycleId::new(1),
            iteration_number,
            status: Status::NotStarted,
            started_at: None,
            completed_at: None,
            rir: 3,
            days: Vec::new(),
        }
    }

    fn rehydrate(iterations: u32, instances: Vec<PlanInstance>) -> Result<Mesocycle, MesocycleError> {
        Mesocycle::from_persisted(
            MesocycleId::new(1),
            UserId::new(1),
            "Block A",
            plan(),
            iterations,
            Status::InProgress,
            fixed_now(),
            instances,
        )
    }

    #[test]
    fn new_mesocycle_starts_empty() {
        let meso = Mesocycle::new(
            MesocycleId::new(1),
            UserId::new(9),
            "Block A",
            plan(),
            4,
            fixed_now(),
        )
        .unwrap();
        assert_eq!(meso.status(), Status::NotStarted);
        assert!(meso.instances().is_empty());
        assert!(meso.is_owned_by(UserId::new(9)));
        assert!(!meso.is_owned_by(UserId::new(1)));
    }

    #[test]
    fn rejects_zero_iterations() {
        assert_eq!(rehydrate(0, vec![]), Err(MesocycleError::ZeroIterations));
    }

    #[test]
    fn sorts_instances_and_checks_density() {
        let meso = rehydrate(3, vec![instance(2), instance(1)]).unwrap();
        let numbers: Vec<_> = meso.instances().iter().map(|i| i.iteration_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert!(meso.instance(2).is_some());
        assert!(meso.instance(3).is_none());

        assert_eq!(
            rehydrate(3, vec![instance(1), instance(3)]),
            Err(MesocycleError::NonSequentialIteration {
                expected: 2,
                found: 3
            })
        );
        assert_eq!(
            rehydrate(3, vec![instance(1), instance(1)]),
            Err(MesocycleError::DuplicateIteration { iteration: 1 })
        );
        assert_eq!(
            rehydrate(1, vec![instance(1), instance(2)]),
            Err(MesocycleError::IterationOutOfRange {
                iteration: 2,
                max: 1
            })
        );
    }
}
