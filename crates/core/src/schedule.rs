//! Schedule projection: recent history across all of a user's mesocycles, and
//! the forward schedule of one mesocycle including iterations that have not
//! been materialized yet.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::completion::{completion_date, is_day_complete};
use crate::iteration::{IterationError, current_instance, latest_completed_instance, verify_day_mirror};
use crate::model::{
    InstanceDayId, Mesocycle, MesocycleId, PlanInstance, PlanInstanceDay, PlanInstanceId, Status,
    WorkoutInstanceId, WorkoutTemplateId,
};

/// Trailing window, in days, for the recent-activity history.
pub const HISTORY_WINDOW_DAYS: i64 = 365;

/// Wire id carried by virtual days, which have no database identity.
pub const VIRTUAL_DAY_ID: i64 = -1;

//
// ─── INPUT ─────────────────────────────────────────────────────────────────────
//

/// Shape of one plan day as the projector needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanDayShape {
    pub day_number: u32,
    pub is_rest_day: bool,
    pub workout_template_id: Option<WorkoutTemplateId>,
}

/// Normalized view of one mesocycle, detached from storage relations.
#[derive(Debug, Clone, PartialEq)]
pub struct MesocycleSnapshot {
    pub id: MesocycleId,
    pub iterations: u32,
    pub status: Status,
    /// Plan days in ascending `day_number` order.
    pub plan_days: Vec<PlanDayShape>,
    /// Materialized instances in ascending iteration order.
    pub instances: Vec<PlanInstance>,
}

impl MesocycleSnapshot {
    #[must_use]
    pub fn from_mesocycle(mesocycle: &Mesocycle) -> Self {
        Self {
            id: mesocycle.id(),
            iterations: mesocycle.iterations(),
            status: mesocycle.status(),
            plan_days: mesocycle
                .plan()
                .days()
                .iter()
                .map(|d| PlanDayShape {
                    day_number: d.day_number,
                    is_rest_day: d.is_rest_day,
                    workout_template_id: d.workout_template_id(),
                })
                .collect(),
            instances: mesocycle.instances().to_vec(),
        }
    }

    fn instance_for(&self, iteration_number: u32) -> Option<&PlanInstance> {
        self.instances
            .iter()
            .find(|i| i.iteration_number == iteration_number)
    }

    fn verify(&self) -> Result<(), IterationError> {
        for instance in &self.instances {
            verify_day_mirror(instance, self.plan_days.iter().map(|d| d.day_number))?;
        }
        Ok(())
    }
}

/// Everything one projection request needs, built once per request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionInput {
    /// The mesocycle whose upcoming schedule is projected.
    pub target: MesocycleSnapshot,
    /// Every mesocycle of the user (the target included), for history.
    pub history: Vec<MesocycleSnapshot>,
}

impl ProjectionInput {
    /// Build the input from all of a user's mesocycles.
    ///
    /// Returns `None` if `target` is not among them.
    #[must_use]
    pub fn from_mesocycles(target: MesocycleId, mesocycles: &[Mesocycle]) -> Option<Self> {
        let history: Vec<MesocycleSnapshot> =
            mesocycles.iter().map(MesocycleSnapshot::from_mesocycle).collect();
        let target = history.iter().find(|m| m.id == target)?.clone();
        Some(Self { target, history })
    }
}

//
// ─── OUTPUT ────────────────────────────────────────────────────────────────────
//

/// A completed day surfaced in the recent-activity history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryDay {
    pub mesocycle_id: MesocycleId,
    pub instance_id: PlanInstanceId,
    pub iteration_number: u32,
    pub day_id: InstanceDayId,
    pub day_number: u32,
    pub is_rest_day: bool,
    pub workout_instance_id: Option<WorkoutInstanceId>,
    pub completed_at: DateTime<Utc>,
}

/// A persisted day of the active iteration that is still to be done.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealDay {
    pub mesocycle_id: MesocycleId,
    pub instance_id: PlanInstanceId,
    pub iteration_number: u32,
    pub day: PlanInstanceDay,
}

/// A placeholder for a day of an iteration that has not been materialized.
///
/// Never complete and never linked to a workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VirtualDay {
    pub mesocycle_id: MesocycleId,
    pub iteration_number: u32,
    pub day_number: u32,
    pub is_rest_day: bool,
    pub workout_template_id: Option<WorkoutTemplateId>,
}

/// One entry of the upcoming schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleDay {
    Real(RealDay),
    Virtual(VirtualDay),
}

impl ScheduleDay {
    #[must_use]
    pub fn iteration_number(&self) -> u32 {
        match self {
            ScheduleDay::Real(d) => d.iteration_number,
            ScheduleDay::Virtual(d) => d.iteration_number,
        }
    }

    #[must_use]
    pub fn day_number(&self) -> u32 {
        match self {
            ScheduleDay::Real(d) => d.day.day_number,
            ScheduleDay::Virtual(d) => d.day_number,
        }
    }

    #[must_use]
    pub fn is_rest_day(&self) -> bool {
        match self {
            ScheduleDay::Real(d) => d.day.is_rest_day,
            ScheduleDay::Virtual(d) => d.is_rest_day,
        }
    }

    #[must_use]
    pub fn is_virtual(&self) -> bool {
        matches!(self, ScheduleDay::Virtual(_))
    }

    /// Persisted id, if the day exists in storage.
    #[must_use]
    pub fn day_id(&self) -> Option<InstanceDayId> {
        match self {
            ScheduleDay::Real(d) => Some(d.day.id),
            ScheduleDay::Virtual(_) => None,
        }
    }

    /// Id for transport: the persisted id, or [`VIRTUAL_DAY_ID`].
    #[must_use]
    pub fn wire_id(&self) -> i64 {
        self.day_id()
            .and_then(|id| i64::try_from(id.value()).ok())
            .unwrap_or(VIRTUAL_DAY_ID)
    }

    fn sort_key(&self) -> (u32, u32) {
        (self.iteration_number(), self.day_number())
    }
}

/// Result of a projection request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub previous_days: Vec<HistoryDay>,
    pub upcoming_days: Vec<ScheduleDay>,
}

//
// ─── OBSERVER ──────────────────────────────────────────────────────────────────
//

/// Which branch produced the upcoming schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpcomingBranch {
    /// Mesocycle is marked complete.
    MesocycleComplete,
    /// An iteration is in progress or waiting to start.
    ActiveIteration { iteration: u32 },
    /// The latest completed iteration is followed by unmaterialized ones.
    AfterCompleted { iteration: u32 },
    /// The final iteration is complete even though the mesocycle is not marked so.
    AllIterationsDone,
    /// Nothing has been materialized yet.
    NotStarted,
}

/// Snapshot states the projector cannot map to a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InconsistentState {
    /// Instances exist but none is current and none is complete.
    NoMatchingInstance,
    /// An instance's days do not mirror the plan.
    DayMismatch(IterationError),
}

/// Receives projection telemetry. Injected per projector, never global.
pub trait ProjectionObserver: Send + Sync {
    fn upcoming_projected(&self, _mesocycle_id: MesocycleId, _branch: UpcomingBranch, _days: usize) {}

    fn history_collected(&self, _days: usize) {}

    fn inconsistent_state(&self, mesocycle_id: MesocycleId, state: &InconsistentState);
}

/// Observer that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ProjectionObserver for TracingObserver {
    fn upcoming_projected(&self, mesocycle_id: MesocycleId, branch: UpcomingBranch, days: usize) {
        debug!(%mesocycle_id, ?branch, days, "upcoming schedule projected");
    }

    fn history_collected(&self, days: usize) {
        debug!(days, "history collected");
    }

    fn inconsistent_state(&self, mesocycle_id: MesocycleId, state: &InconsistentState) {
        warn!(%mesocycle_id, ?state, "inconsistent mesocycle state; upcoming schedule left empty");
    }
}

//
// ─── PROJECTOR ─────────────────────────────────────────────────────────────────
//

/// Pure projector over a request snapshot.
pub struct ScheduleProjector<'a> {
    observer: &'a dyn ProjectionObserver,
    history_window: Duration,
}

impl<'a> ScheduleProjector<'a> {
    #[must_use]
    pub fn new(observer: &'a dyn ProjectionObserver) -> Self {
        Self {
            observer,
            history_window: Duration::days(HISTORY_WINDOW_DAYS),
        }
    }

    #[must_use]
    pub fn with_history_window(mut self, window: Duration) -> Self {
        self.history_window = window;
        self
    }

    /// Project history and upcoming days as of `as_of`.
    #[must_use]
    pub fn project(&self, input: &ProjectionInput, as_of: DateTime<Utc>) -> Schedule {
        Schedule {
            previous_days: self.previous_days(&input.history, as_of),
            upcoming_days: self.upcoming_days(&input.target),
        }
    }

    /// Completed days of every mesocycle within the trailing window, newest first.
    ///
    /// Days with equal completion dates keep their snapshot order.
    #[must_use]
    pub fn previous_days(
        &self,
        history: &[MesocycleSnapshot],
        as_of: DateTime<Utc>,
    ) -> Vec<HistoryDay> {
        let window_start = as_of - self.history_window;
        let mut days = Vec::new();

        for mesocycle in history {
            for instance in &mesocycle.instances {
                for day in &instance.days {
                    let Some(completed_at) = completion_date(day) else {
                        continue;
                    };
                    if completed_at < window_start || completed_at > as_of {
                        continue;
                    }
                    days.push(HistoryDay {
                        mesocycle_id: mesocycle.id,
                        instance_id: instance.id,
                        iteration_number: instance.iteration_number,
                        day_id: day.id,
                        day_number: day.day_number,
                        is_rest_day: day.is_rest_day,
                        workout_instance_id: day.workout.as_ref().map(|w| w.id),
                        completed_at,
                    });
                }
            }
        }

        days.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        self.observer.history_collected(days.len());
        days
    }

    /// Remaining days of the mesocycle, ordered by `(iteration, day)`.
    #[must_use]
    pub fn upcoming_days(&self, mesocycle: &MesocycleSnapshot) -> Vec<ScheduleDay> {
        if mesocycle.status == Status::Complete {
            self.observer
                .upcoming_projected(mesocycle.id, UpcomingBranch::MesocycleComplete, 0);
            return Vec::new();
        }

        if let Err(mismatch) = mesocycle.verify() {
            self.observer
                .inconsistent_state(mesocycle.id, &InconsistentState::DayMismatch(mismatch));
            return Vec::new();
        }

        let (branch, mut days) = if let Some(current) = current_instance(&mesocycle.instances) {
            let mut days: Vec<ScheduleDay> = current
                .days
                .iter()
                .filter(|day| !is_day_complete(day))
                .map(|day| {
                    ScheduleDay::Real(RealDay {
                        mesocycle_id: mesocycle.id,
                        instance_id: current.id,
                        iteration_number: current.iteration_number,
                        day: day.clone(),
                    })
                })
                .collect();
            let unmaterialized = (current.iteration_number + 1..=mesocycle.iterations)
                .filter(|n| mesocycle.instance_for(*n).is_none());
            days.extend(virtual_days(mesocycle, unmaterialized));
            (
                UpcomingBranch::ActiveIteration {
                    iteration: current.iteration_number,
                },
                days,
            )
        } else {
            match latest_completed_instance(&mesocycle.instances) {
                Some(done) if done.iteration_number < mesocycle.iterations => (
                    UpcomingBranch::AfterCompleted {
                        iteration: done.iteration_number,
                    },
                    virtual_days(mesocycle, done.iteration_number + 1..=mesocycle.iterations),
                ),
                Some(_) => (UpcomingBranch::AllIterationsDone, Vec::new()),
                None if mesocycle.instances.is_empty() => (
                    UpcomingBranch::NotStarted,
                    virtual_days(mesocycle, 1..=mesocycle.iterations),
                ),
                None => {
                    self.observer
                        .inconsistent_state(mesocycle.id, &InconsistentState::NoMatchingInstance);
                    return Vec::new();
                }
            }
        };

        days.sort_by_key(ScheduleDay::sort_key);
        self.observer
            .upcoming_projected(mesocycle.id, branch, days.len());
        days
    }
}

/// One virtual day per plan day for each iteration in `iterations`.
#[must_use]
pub fn virtual_days(
    mesocycle: &MesocycleSnapshot,
    iterations: impl IntoIterator<Item = u32>,
) -> Vec<ScheduleDay> {
    iterations
        .into_iter()
        .flat_map(|iteration_number| {
            mesocycle.plan_days.iter().map(move |plan_day| {
                ScheduleDay::Virtual(VirtualDay {
                    mesocycle_id: mesocycle.id,
                    iteration_number,
                    day_number: plan_day.day_number,
                    is_rest_day: plan_day.is_rest_day,
                    workout_template_id: plan_day.workout_template_id,
                })
            })
        })
        .collect()
}
