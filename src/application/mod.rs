pub mod coordinator;
pub mod report;

pub use coordinator::{Command, Coordinator, CoordinatorError, CoordinatorHandle};
pub use report::{CycleReport, PairReport, SkipReason};
