//! Progress aggregation: volume and set series per muscle group, per-iteration
//! totals, and iteration-over-iteration change per exercise.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::iteration::is_instance_complete;
use crate::model::{
    Exercise, ExerciseId, ExerciseSet, Mesocycle, PlanInstance, Status, WorkoutInstanceId,
};

/// Trailing points (including the current one) covered by [`rolling_window`].
pub const ROLLING_WINDOW: usize = 4;

//
// ─── INPUT ─────────────────────────────────────────────────────────────────────
//

/// Workout a completed set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkoutRef {
    pub id: WorkoutInstanceId,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A set row joined with its workout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompletedSet {
    pub exercise_id: ExerciseId,
    pub set_number: u32,
    pub weight: f64,
    pub reps: u32,
    pub workout: WorkoutRef,
}

impl CompletedSet {
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.weight * f64::from(self.reps)
    }
}

/// An exercise together with every completed set recorded for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseWithSets {
    pub exercise: Exercise,
    pub sets: Vec<CompletedSet>,
}

/// Gather sets of completed workouts across mesocycles, grouped by exercise.
///
/// Exercises appear in order of first encounter; sets for exercises missing
/// from `catalog` are dropped.
#[must_use]
pub fn exercises_with_completed_sets(
    mesocycles: &[Mesocycle],
    catalog: &[Exercise],
) -> Vec<ExerciseWithSets> {
    let by_id: HashMap<ExerciseId, &Exercise> = catalog.iter().map(|e| (e.id(), e)).collect();
    let mut out: Vec<ExerciseWithSets> = Vec::new();
    let mut slots: HashMap<ExerciseId, usize> = HashMap::new();

    let workouts = mesocycles
        .iter()
        .flat_map(|m| m.instances())
        .flat_map(|i| i.completed_workouts());

    for workout in workouts {
        let reference = WorkoutRef {
            id: workout.id,
            started_at: workout.started_at,
            completed_at: workout.completed_at,
        };
        for set in &workout.sets {
            let Some(exercise) = by_id.get(&set.exercise_id) else {
                continue;
            };
            let slot = *slots.entry(set.exercise_id).or_insert_with(|| {
                out.push(ExerciseWithSets {
                    exercise: (*exercise).clone(),
                    sets: Vec::new(),
                });
                out.len() - 1
            });
            out[slot].sets.push(CompletedSet {
                exercise_id: set.exercise_id,
                set_number: set.set_number,
                weight: set.weight,
                reps: set.reps,
                workout: reference,
            });
        }
    }
    out
}

//
// ─── MUSCLE GROUP SERIES ───────────────────────────────────────────────────────
//

/// What a series point measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesMetric {
    /// Sum of `weight × reps`.
    Volume,
    /// Number of sets.
    SetCount,
}

impl SeriesMetric {
    fn contribution(self, set: &CompletedSet) -> f64 {
        match self {
            SeriesMetric::Volume => set.volume(),
            SeriesMetric::SetCount => 1.0,
        }
    }
}

/// One (category, workout) point; `date` is the workout's start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub workout_instance_id: WorkoutInstanceId,
    pub value: f64,
    pub date: DateTime<Utc>,
}

/// Per-category series keyed by muscle group name.
///
/// Points keep the order in which their workouts were first encountered;
/// callers sort by date when they need a time axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MuscleGroupSeries {
    categories: BTreeMap<String, Vec<SeriesPoint>>,
}

impl MuscleGroupSeries {
    #[must_use]
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    #[must_use]
    pub fn points(&self, category: &str) -> &[SeriesPoint] {
        self.categories.get(category).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn total(&self, category: &str) -> f64 {
        self.points(category).iter().map(|p| p.value).sum()
    }

    /// Total per category.
    #[must_use]
    pub fn totals(&self) -> BTreeMap<String, f64> {
        self.categories
            .iter()
            .map(|(name, points)| (name.clone(), points.iter().map(|p| p.value).sum()))
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Fold completed sets into one series per exercise category.
#[must_use]
pub fn aggregate_muscle_groups(
    exercises: &[ExerciseWithSets],
    metric: SeriesMetric,
) -> MuscleGroupSeries {
    let mut series = MuscleGroupSeries::default();
    let mut slots: HashMap<(String, WorkoutInstanceId), usize> = HashMap::new();

    for entry in exercises {
        let category = entry.exercise.category();
        for set in &entry.sets {
            let points = series.categories.entry(category.to_owned()).or_default();
            let slot = *slots
                .entry((category.to_owned(), set.workout.id))
                .or_insert_with(|| {
                    points.push(SeriesPoint {
                        workout_instance_id: set.workout.id,
                        value: 0.0,
                        date: set.workout.started_at,
                    });
                    points.len() - 1
                });
            points[slot].value += metric.contribution(set);
        }
    }
    series
}

/// Volume series per muscle group.
#[must_use]
pub fn aggregate_volume(exercises: &[ExerciseWithSets]) -> MuscleGroupSeries {
    aggregate_muscle_groups(exercises, SeriesMetric::Volume)
}

//
// ─── ITERATION TOTALS ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationVolume {
    pub iteration_number: u32,
    pub total_volume: f64,
}

fn completed_set_volume(instance: &PlanInstance) -> f64 {
    instance
        .completed_workouts()
        .flat_map(|w| w.sets.iter())
        .map(ExerciseSet::volume)
        .sum()
}

/// Total volume of each materialized iteration, ascending by iteration.
///
/// Only completed workouts count; an iteration without any totals 0.
#[must_use]
pub fn aggregate_iteration_volumes(instances: &[PlanInstance]) -> Vec<IterationVolume> {
    let mut totals: Vec<IterationVolume> = instances
        .iter()
        .map(|instance| IterationVolume {
            iteration_number: instance.iteration_number,
            total_volume: completed_set_volume(instance),
        })
        .collect();
    totals.sort_by_key(|t| t.iteration_number);
    totals
}

/// Percent change from `previous` to `current`; 0 when there is no baseline.
#[must_use]
pub fn compute_volume_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous * 100.0
}

//
// ─── PER-EXERCISE PROGRESS ─────────────────────────────────────────────────────
//

/// One exercise within one iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseProgress {
    pub exercise_id: ExerciseId,
    pub volume: f64,
    /// Percent change against the nearest earlier completed iteration.
    pub volume_change: f64,
    /// The earlier completed iteration exists but did not include this exercise.
    pub is_new: bool,
    pub sets: Vec<ExerciseSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationProgress {
    pub iteration_number: u32,
    pub status: Status,
    pub rir: u8,
    pub total_volume: f64,
    pub exercises: Vec<ExerciseProgress>,
}

fn exercise_breakdown(instance: &PlanInstance) -> Vec<(ExerciseId, Vec<ExerciseSet>)> {
    let mut groups: Vec<(ExerciseId, Vec<ExerciseSet>)> = Vec::new();
    let mut days: Vec<_> = instance.days.iter().collect();
    days.sort_by_key(|d| d.day_number);

    let workouts = days
        .into_iter()
        .filter_map(|d| d.workout.as_ref())
        .filter(|w| w.is_completed());
    for workout in workouts {
        for set in &workout.sets {
            match groups.iter_mut().find(|(id, _)| *id == set.exercise_id) {
                Some((_, sets)) => sets.push(*set),
                None => groups.push((set.exercise_id, vec![*set])),
            }
        }
    }
    groups
}

/// Per-iteration, per-exercise volumes with change against the previous
/// completed iteration. Incomplete iterations are reported but never used as
/// a baseline.
#[must_use]
pub fn mesocycle_detail(instances: &[PlanInstance]) -> Vec<IterationProgress> {
    let mut ordered: Vec<&PlanInstance> = instances.iter().collect();
    ordered.sort_by_key(|i| i.iteration_number);

    let mut baseline: Option<HashMap<ExerciseId, f64>> = None;
    let mut out = Vec::with_capacity(ordered.len());

    for instance in ordered {
        let mut volumes = HashMap::new();
        let exercises: Vec<ExerciseProgress> = exercise_breakdown(instance)
            .into_iter()
            .map(|(exercise_id, sets)| {
                let volume: f64 = sets.iter().map(ExerciseSet::volume).sum();
                volumes.insert(exercise_id, volume);
                let previous = baseline.as_ref().and_then(|b| b.get(&exercise_id)).copied();
                ExerciseProgress {
                    exercise_id,
                    volume,
                    volume_change: compute_volume_change(volume, previous.unwrap_or(0.0)),
                    is_new: baseline.is_some() && previous.is_none(),
                    sets,
                }
            })
            .collect();

        out.push(IterationProgress {
            iteration_number: instance.iteration_number,
            status: instance.status,
            rir: instance.rir,
            total_volume: exercises.iter().map(|e| e.volume).sum(),
            exercises,
        });

        if is_instance_complete(instance) {
            baseline = Some(volumes);
        }
    }
    out
}

//
// ─── SMOOTHING ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Average,
    Sum,
}

/// Trailing window over `[max(0, i - 3), i]` for each point.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rolling_window(values: &[f64], reduction: Reduction) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let window = &values[i.saturating_sub(ROLLING_WINDOW - 1)..=i];
            let sum: f64 = window.iter().sum();
            match reduction {
                Reduction::Sum => sum,
                Reduction::Average => sum / window.len() as f64,
            }
        })
        .collect()
}

/// Per-category trend: points ordered by date, each value replaced by its
/// [`rolling_window`] reduction.
#[must_use]
pub fn smooth_series(series: &MuscleGroupSeries, reduction: Reduction) -> MuscleGroupSeries {
    let categories = series
        .categories
        .iter()
        .map(|(name, points)| {
            let mut ordered = points.clone();
            ordered.sort_by_key(|p| p.date);
            let values: Vec<f64> = ordered.iter().map(|p| p.value).collect();
            for (point, value) in ordered.iter_mut().zip(rolling_window(&values, reduction)) {
                point.value = value;
            }
            (name.clone(), ordered)
        })
        .collect();
    MuscleGroupSeries { categories }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iteration::materialize_instance;
    use crate::model::{
        InstanceDayId, MesocycleId, PlanDay, PlanId, PlanInstanceId, TemplateExercise,
        TrainingPlan, UserId, WorkoutInstance, WorkoutTemplate, WorkoutTemplateId,
    };
    use crate::time::fixed_now;
    use chrono::Duration;

    const BENCH: ExerciseId = ExerciseId::new(1);
    const SQUAT: ExerciseId = ExerciseId::new(2);
    const FLY: ExerciseId = ExerciseId::new(3);

    fn exercise(id: ExerciseId, category: &str) -> Exercise {
        Exercise::new(id, format!("Exercise {id}"), category).unwrap()
    }

    fn workout(id: u64, offset_days: i64) -> WorkoutRef {
        WorkoutRef {
            id: WorkoutInstanceId::new(id),
            started_at: fixed_now() + Duration::days(offset_days),
            completed_at: Some(fixed_now() + Duration::days(offset_days)),
        }
    }

    fn set(exercise_id: ExerciseId, weight: f64, reps: u32, workout: WorkoutRef) -> CompletedSet {
        CompletedSet {
            exercise_id,
            set_number: 1,
            weight,
            reps,
            workout,
        }
    }

    fn plan() -> TrainingPlan {
        let template = WorkoutTemplate::new(
            WorkoutTemplateId::new(1),
            "Upper",
            vec![
                TemplateExercise {
                    exercise_id: BENCH,
                    order: 1,
                },
                TemplateExercise {
                    exercise_id: FLY,
                    order: 2,
                },
            ],
        )
        .unwrap();
        TrainingPlan::new(
            PlanId::new(1),
            UserId::new(1),
            "Upper/Rest",
            vec![PlanDay::workout(1, template), PlanDay::rest(2)],
        )
        .unwrap()
    }

    fn iteration(number: u32, complete: bool, sets: &[ExerciseSet]) -> PlanInstance {
        let mut day_id = 0;
        let mut inst = materialize_instance(
            &plan(),
            PlanInstanceId::new(u64::from(number)),
            MesocycleId::new(1),
            number,
            3,
            fixed_now(),
            || {
                day_id += 1;
                InstanceDayId::new(u64::from(number) * 10 + day_id)
            },
        );
        let mut w = WorkoutInstance::new(WorkoutInstanceId::new(u64::from(number)), fixed_now());
        w.completed_at = Some(fixed_now());
        w.sets = sets.to_vec();
        inst.day_mut(1).unwrap().workout = Some(w);
        if complete {
            inst.day_mut(2).unwrap().is_complete = true;
            inst.status = Status::Complete;
            inst.completed_at = Some(fixed_now());
        } else {
            inst.status = Status::InProgress;
        }
        inst
    }

    #[test]
    fn percent_change_boundaries() {
        assert_eq!(compute_volume_change(123.0, 0.0), 0.0);
        assert_eq!(compute_volume_change(0.0, 0.0), 0.0);
        assert_eq!(compute_volume_change(100.0, 50.0), 100.0);
        assert_eq!(compute_volume_change(50.0, 100.0), -50.0);
    }

    #[test]
    fn muscle_group_volume_keys_by_category_and_workout() {
        let w1 = workout(1, 0);
        let w2 = workout(2, 2);
        let input = vec![
            ExerciseWithSets {
                exercise: exercise(BENCH, "Chest"),
                sets: vec![set(BENCH, 100.0, 5, w1), set(BENCH, 100.0, 5, w1), set(BENCH, 105.0, 5, w2)],
            },
            ExerciseWithSets {
                exercise: exercise(FLY, "Chest"),
                sets: vec![set(FLY, 20.0, 10, w1)],
            },
            ExerciseWithSets {
                exercise: exercise(SQUAT, "Legs"),
                sets: vec![set(SQUAT, 140.0, 5, w2)],
            },
        ];

        let series = aggregate_volume(&input);
        let chest = series.points("Chest");
        assert_eq!(chest.len(), 2);
        assert_eq!(chest[0].workout_instance_id, WorkoutInstanceId::new(1));
        assert_eq!(chest[0].value, 1200.0);
        assert_eq!(chest[0].date, w1.started_at);
        assert_eq!(chest[1].value, 525.0);
        assert_eq!(series.total("Legs"), 700.0);
        assert_eq!(series.categories().collect::<Vec<_>>(), vec!["Chest", "Legs"]);

        let counts = aggregate_muscle_groups(&input, SeriesMetric::SetCount);
        assert_eq!(counts.points("Chest")[0].value, 3.0);
        assert_eq!(counts.total("Chest"), 4.0);
    }

    #[test]
    fn category_totals_ignore_input_order() {
        let w1 = workout(1, 0);
        let w2 = workout(2, 1);
        let mut input = vec![
            ExerciseWithSets {
                exercise: exercise(BENCH, "Chest"),
                sets: vec![set(BENCH, 80.0, 8, w2), set(BENCH, 80.0, 8, w1)],
            },
            ExerciseWithSets {
                exercise: exercise(SQUAT, "Legs"),
                sets: vec![set(SQUAT, 120.0, 6, w1)],
            },
        ];
        let forward = aggregate_volume(&input).totals();
        input.reverse();
        for entry in &mut input {
            entry.sets.reverse();
        }
        assert_eq!(aggregate_volume(&input).totals(), forward);
        assert_eq!(aggregate_volume(&input), aggregate_volume(&input));
    }

    #[test]
    fn iteration_volumes_count_only_completed_workouts() {
        let first = iteration(1, true, &[ExerciseSet::new(BENCH, 1, 100.0, 10)]);
        let mut second = iteration(2, false, &[ExerciseSet::new(BENCH, 1, 100.0, 12)]);
        second.day_mut(1).unwrap().workout.as_mut().unwrap().completed_at = None;

        let totals = aggregate_iteration_volumes(&[second, first]);
        assert_eq!(
            totals,
            vec![
                IterationVolume {
                    iteration_number: 1,
                    total_volume: 1000.0
                },
                IterationVolume {
                    iteration_number: 2,
                    total_volume: 0.0
                },
            ]
        );
    }

    #[test]
    fn exercise_change_uses_previous_completed_iteration() {
        let instances = vec![
            iteration(1, true, &[ExerciseSet::new(BENCH, 1, 100.0, 8)]),
            iteration(2, true, &[ExerciseSet::new(BENCH, 1, 100.0, 10)]),
            iteration(
                3,
                true,
                &[
                    ExerciseSet::new(BENCH, 1, 100.0, 12),
                    ExerciseSet::new(FLY, 1, 50.0, 10),
                ],
            ),
        ];
        let progress = mesocycle_detail(&instances);

        assert_eq!(progress[0].exercises[0].volume_change, 0.0);
        assert!(!progress[0].exercises[0].is_new);

        let third = &progress[2];
        assert_eq!(third.total_volume, 1700.0);
        let bench = &third.exercises[0];
        assert_eq!(bench.exercise_id, BENCH);
        assert_eq!(bench.volume, 1200.0);
        assert!((bench.volume_change - 20.0).abs() < 1e-9);

        let fly = &third.exercises[1];
        assert_eq!(fly.volume, 500.0);
        assert_eq!(fly.volume_change, 0.0);
        assert!(fly.is_new);
    }

    #[test]
    fn incomplete_iterations_are_skipped_as_baseline() {
        let instances = vec![
            iteration(1, true, &[ExerciseSet::new(BENCH, 1, 100.0, 5)]),
            iteration(2, false, &[ExerciseSet::new(BENCH, 1, 100.0, 20)]),
            iteration(3, false, &[ExerciseSet::new(BENCH, 1, 100.0, 10)]),
        ];
        let progress = mesocycle_detail(&instances);
        assert!((progress[2].exercises[0].volume_change - 100.0).abs() < 1e-9);
        assert!((progress[1].exercises[0].volume_change - 300.0).abs() < 1e-9);
    }

    #[test]
    fn rolling_window_is_trailing() {
        let values = [4.0, 8.0, 6.0, 2.0, 10.0];
        assert_eq!(
            rolling_window(&values, Reduction::Sum),
            vec![4.0, 12.0, 18.0, 20.0, 26.0]
        );
        assert_eq!(
            rolling_window(&values, Reduction::Average),
            vec![4.0, 6.0, 6.0, 5.0, 6.5]
        );
        assert!(rolling_window(&[], Reduction::Average).is_empty());
    }

    #[test]
    fn trend_orders_points_by_date_before_smoothing() {
        let chest = exercise(BENCH, "Chest");
        let legs = exercise(SQUAT, "Legs");
        let (late, early, middle) = (workout(1, 2), workout(2, 0), workout(3, 1));
        let grouped = vec![
            ExerciseWithSets {
                exercise: chest,
                sets: vec![
                    set(BENCH, 100.0, 6, late),
                    set(BENCH, 100.0, 2, early),
                    set(BENCH, 100.0, 4, middle),
                ],
            },
            ExerciseWithSets {
                exercise: legs,
                sets: vec![set(SQUAT, 50.0, 10, early)],
            },
        ];

        let trend = smooth_series(&aggregate_volume(&grouped), Reduction::Average);
        let chest: Vec<(WorkoutInstanceId, f64)> = trend
            .points("Chest")
            .iter()
            .map(|p| (p.workout_instance_id, p.value))
            .collect();
        assert_eq!(
            chest,
            vec![(early.id, 200.0), (middle.id, 300.0), (late.id, 400.0)]
        );
        assert_eq!(trend.total("Legs"), 500.0);
    }
}
