//! Persistence for plans, mesocycles and workouts: async repository traits
//! with in-memory and `SQLite` backends.

pub mod repository;
pub mod sqlite;

pub use repository::{Storage, StorageError};
