//! # PostPilot Scheduler
//! Turns config schedule entries into armed timers: rule parsing, task
//! binding, and the timer registry that fires action invocations.

pub mod binder;
pub mod rules;
pub mod scheduler;

pub use binder::{BoundTask, bind_tasks};
pub use rules::{ScheduleRule, parse_rules};
pub use scheduler::Scheduler;
