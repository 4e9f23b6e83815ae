#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod plan_service;
pub mod progress_service;
pub mod schedule_service;
pub mod training_service;

pub use meso_core::Clock;

pub use app_services::AppServices;
pub use error::{
    AppServicesError, PlanServiceError, ProgressServiceError, ScheduleError, TrainingError,
};
pub use plan_service::PlanService;
pub use progress_service::ProgressService;
pub use schedule_service::ScheduleService;
pub use training_service::{CompletionOutcome, TrainingService};
