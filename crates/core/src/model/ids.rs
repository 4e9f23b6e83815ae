use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the underlying u64 value
            #[must_use]
            pub const fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<u64>().map(Self::new).map_err(|_| ParseIdError {
                    kind: stringify!($name),
                })
            }
        }
    };
}

define_id!(
    /// Owner of plans and mesocycles.
    UserId
);
define_id!(
    /// Unique identifier for a TrainingPlan
    PlanId
);
define_id!(
    /// Unique identifier for a WorkoutTemplate
    WorkoutTemplateId
);
define_id!(
    /// Unique identifier for an Exercise
    ExerciseId
);
define_id!(
    /// Unique identifier for a Mesocycle
    MesocycleId
);
define_id!(
    /// Unique identifier for a PlanInstance (one iteration of a mesocycle)
    PlanInstanceId
);
define_id!(
    /// Unique identifier for a persisted PlanInstanceDay
    InstanceDayId
);
define_id!(
    /// Unique identifier for a performed WorkoutInstance
    WorkoutInstanceId
);

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesocycle_id_display() {
        let id = MesocycleId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(format!("{id:?}"), "MesocycleId(42)");
    }

    #[test]
    fn test_plan_id_from_str() {
        let id: PlanId = "123".parse().unwrap();
        assert_eq!(id, PlanId::new(123));
    }

    #[test]
    fn test_exercise_id_from_str_invalid() {
        let err = "bench".parse::<ExerciseId>().unwrap_err();
        assert_eq!(err.to_string(), "failed to parse ExerciseId from string");
    }

    #[test]
    fn test_ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&WorkoutInstanceId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: WorkoutInstanceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, WorkoutInstanceId::new(7));
    }
}
