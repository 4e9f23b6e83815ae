mod exercise;
mod ids;
mod instance;
mod mesocycle;
mod plan;
mod status;

pub use ids::{
    ExerciseId, InstanceDayId, MesocycleId, ParseIdError, PlanId, PlanInstanceId, UserId,
    WorkoutInstanceId, WorkoutTemplateId,
};

pub use exercise::{Exercise, ExerciseError};
pub use instance::{ExerciseSet, PlanInstance, PlanInstanceDay, WorkoutInstance};
pub use mesocycle::{Mesocycle, MesocycleError};
pub use plan::{PlanDay, PlanError, TemplateExercise, TrainingPlan, WorkoutTemplate};
pub use status::{ParseStatusError, Status};
