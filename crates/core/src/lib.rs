//! Shared types, configuration, and the pure scheduling logic:
//! tag parsing, the time-window evaluator, and the decision engine.

pub mod config;
pub mod decision;
pub mod error;
pub mod resource;
pub mod schedule;

pub use config::{AccountConfig, EngineConfig, TagKeys, VerificationConfig};
pub use decision::{decide, Action, ScheduleDecision};
pub use error::{ConfigError, ScheduleError};
pub use resource::{
    ExpectedState, GroupCapacity, ObservedState, PowerState, ResourceKind, ResourceRecord,
};
pub use schedule::{evaluate_window, LocalNow, ScheduleTagSet, ScheduleTags, TimeOfDay, WindowVerdict};
