//! Domain model and pure engines for mesocycle training blocks.
//!
//! Nothing in this crate performs I/O; storage and orchestration live in the
//! `storage` and `services` crates.

#![forbid(unsafe_code)]

pub mod completion;
pub mod error;
pub mod iteration;
pub mod model;
pub mod progress;
pub mod schedule;
pub mod time;

pub use error::Error;
pub use time::Clock;
