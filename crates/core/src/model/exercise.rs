use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::ExerciseId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExerciseError {
    #[error("exercise name cannot be empty")]
    EmptyName,
    #[error("exercise category cannot be empty")]
    EmptyCategory,
}

/// Catalog entry for a movement. `category` is the muscle group it trains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    id: ExerciseId,
    name: String,
    category: String,
}

impl Exercise {
    /// # Errors
    ///
    /// Returns `ExerciseError` if name or category is blank.
    pub fn new(
        id: ExerciseId,
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Result<Self, ExerciseError> {
        let name = name.into();
        let category = category.into();
        if name.trim().is_empty() {
            return Err(ExerciseError::EmptyName);
        }
        if category.trim().is_empty() {
            return Err(ExerciseError::EmptyCategory);
        }
        Ok(Self { id, name, category })
    }

    #[must_use]
    pub fn id(&self) -> ExerciseId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_fields() {
        assert_eq!(
            Exercise::new(ExerciseId::new(1), "", "Chest"),
            Err(ExerciseError::EmptyName)
        );
        assert_eq!(
            Exercise::new(ExerciseId::new(1), "Bench Press", " "),
            Err(ExerciseError::EmptyCategory)
        );
    }
}
