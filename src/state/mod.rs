//! State management module
//!
//! This module handles conversation state, wizard scenarios and sessions

pub mod context;
pub mod scenarios;
pub mod storage;

// Re-export commonly used state components
pub use context::ConversationContext;
pub use scenarios::{Scenario, ScenarioManager, ScenarioStep, StepValidation, InputType, CheckInStep, CHECKIN_SCENARIO};
pub use storage::StateStorage;
