//! Conversation scenarios implementation
//!
//! Defines the check-in wizard as a scenario with a fixed sequence of steps,
//! the transitions allowed between them and the rules for typed input.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::utils::errors::{CbxError, Result};
use super::context::ConversationContext;

pub const CHECKIN_SCENARIO: &str = "checkin";

/// Represents a conversation scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub initial_step: String,
    pub steps: HashMap<String, ScenarioStep>,
    /// Maximum duration for this scenario (in seconds)
    pub max_duration: Option<u64>,
}

/// Represents a step within a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub id: String,
    pub name: String,
    /// Steps reachable from this one, including going back
    pub next_steps: Vec<String>,
    /// Rules for text typed while at this step
    pub validation: Option<StepValidation>,
}

/// Validation rules for a scenario step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepValidation {
    pub input_type: InputType,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Pattern to match (regex)
    pub pattern: Option<String>,
    /// i18n key shown when validation fails
    pub error_key: String,
}

/// Types of input expected in a step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InputType {
    Text,
    /// Positive amount with at most two decimals
    Money,
    /// Two `YYYY-MM-DD` dates separated by whitespace
    DateRange,
    /// Flight number followed by `YYYY-MM-DD HH:MM`
    Flight,
    Choice(Vec<String>),
}

/// The check-in wizard steps in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInStep {
    Dates,
    Arrival,
    Property,
    Payment,
    Complete,
}

impl CheckInStep {
    /// Steps that ask the attendee something
    pub const INTERACTIVE: [CheckInStep; 4] = [
        CheckInStep::Dates,
        CheckInStep::Arrival,
        CheckInStep::Property,
        CheckInStep::Payment,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            CheckInStep::Dates => "dates",
            CheckInStep::Arrival => "arrival",
            CheckInStep::Property => "property",
            CheckInStep::Payment => "payment",
            CheckInStep::Complete => "complete",
        }
    }

    /// Zero-based position; `Complete` sits after the last interactive step
    pub fn index(&self) -> usize {
        match self {
            CheckInStep::Dates => 0,
            CheckInStep::Arrival => 1,
            CheckInStep::Property => 2,
            CheckInStep::Payment => 3,
            CheckInStep::Complete => 4,
        }
    }

    pub fn next(&self) -> Option<CheckInStep> {
        match self {
            CheckInStep::Dates => Some(CheckInStep::Arrival),
            CheckInStep::Arrival => Some(CheckInStep::Property),
            CheckInStep::Property => Some(CheckInStep::Payment),
            CheckInStep::Payment => Some(CheckInStep::Complete),
            CheckInStep::Complete => None,
        }
    }

    pub fn previous(&self) -> Option<CheckInStep> {
        match self {
            CheckInStep::Dates => None,
            CheckInStep::Arrival => Some(CheckInStep::Dates),
            CheckInStep::Property => Some(CheckInStep::Arrival),
            CheckInStep::Payment => Some(CheckInStep::Property),
            CheckInStep::Complete => Some(CheckInStep::Payment),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckInStep::Complete)
    }
}

impl fmt::Display for CheckInStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for CheckInStep {
    type Err = CbxError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dates" => Ok(CheckInStep::Dates),
            "arrival" => Ok(CheckInStep::Arrival),
            "property" => Ok(CheckInStep::Property),
            "payment" => Ok(CheckInStep::Payment),
            "complete" => Ok(CheckInStep::Complete),
            other => Err(CbxError::InvalidInput(format!("Unknown check-in step: {}", other))),
        }
    }
}

/// Scenario manager for handling conversation scenarios
#[derive(Debug, Clone)]
pub struct ScenarioManager {
    scenarios: HashMap<String, Scenario>,
}

impl ScenarioManager {
    pub fn new() -> Self {
        let mut manager = Self {
            scenarios: HashMap::new(),
        };

        manager.register_scenario(create_checkin_scenario());
        manager
    }

    pub fn register_scenario(&mut self, scenario: Scenario) {
        self.scenarios.insert(scenario.id.clone(), scenario);
    }

    pub fn get_scenario(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.get(id)
    }

    /// Start a scenario for a user
    pub fn start_scenario(&self, context: &mut ConversationContext, scenario_id: &str) -> Result<()> {
        let scenario = self.get_scenario(scenario_id)
            .ok_or_else(|| CbxError::InvalidInput(format!("Unknown scenario: {}", scenario_id)))?;

        context.start_scenario(scenario_id, &scenario.initial_step)?;

        if let Some(max_duration) = scenario.max_duration {
            let expiry = chrono::Utc::now() + chrono::Duration::seconds(max_duration as i64);
            context.set_expiry(expiry);
        }

        Ok(())
    }

    /// Move to the next step in a scenario
    pub fn next_step(&self, context: &mut ConversationContext, next_step: &str) -> Result<()> {
        let current_step = self.get_current_step(context)?;

        if !current_step.next_steps.iter().any(|s| s == next_step) {
            return Err(CbxError::InvalidStateTransition {
                from: current_step.id.clone(),
                to: next_step.to_string(),
            });
        }

        context.next_step(next_step)
    }

    /// Validate user input for the current step
    pub fn validate_input(&self, context: &ConversationContext, input: &str) -> Result<()> {
        let step = self.get_current_step(context)?;

        if let Some(validation) = &step.validation {
            validate_input_against_rules(input, validation)?;
        }

        Ok(())
    }

    pub fn get_current_step(&self, context: &ConversationContext) -> Result<&ScenarioStep> {
        let scenario_id = context.scenario.as_ref()
            .ok_or_else(|| CbxError::InvalidInput("No active scenario".to_string()))?;

        let step_id = context.step.as_ref()
            .ok_or_else(|| CbxError::InvalidInput("No active step".to_string()))?;

        let scenario = self.get_scenario(scenario_id)
            .ok_or_else(|| CbxError::InvalidInput(format!("Unknown scenario: {}", scenario_id)))?;

        scenario.steps.get(step_id)
            .ok_or_else(|| CbxError::InvalidInput(format!("Unknown step: {}", step_id)))
    }
}

impl Default for ScenarioManager {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_input_against_rules(input: &str, validation: &StepValidation) -> Result<()> {
    let input = input.trim();
    let invalid = || CbxError::InvalidInput(validation.error_key.clone());

    if let Some(min_length) = validation.min_length {
        if input.chars().count() < min_length {
            return Err(invalid());
        }
    }

    if let Some(max_length) = validation.max_length {
        if input.chars().count() > max_length {
            return Err(invalid());
        }
    }

    if let Some(pattern) = &validation.pattern {
        let regex = regex::Regex::new(pattern)
            .map_err(|_| CbxError::Config("Invalid regex pattern".to_string()))?;

        if !regex.is_match(input) {
            return Err(invalid());
        }
    }

    match &validation.input_type {
        InputType::Money => {
            let amount = rust_decimal::Decimal::from_str(input).map_err(|_| invalid())?;
            if amount <= rust_decimal::Decimal::ZERO || amount.scale() > 2 {
                return Err(invalid());
            }
        }
        InputType::DateRange => {
            let parts: Vec<&str> = input.split_whitespace().collect();
            if parts.len() != 2 {
                return Err(invalid());
            }
            for part in parts {
                chrono::NaiveDate::parse_from_str(part, "%Y-%m-%d").map_err(|_| invalid())?;
            }
        }
        InputType::Flight => {
            let mut parts = input.split_whitespace();
            let (Some(_), Some(date), Some(time), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
                return Err(invalid());
            };
            chrono::NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M")
                .map_err(|_| invalid())?;
        }
        InputType::Choice(choices) => {
            if !choices.iter().any(|c| c == input) {
                return Err(invalid());
            }
        }
        InputType::Text => {}
    }

    Ok(())
}

/// Create the attendee check-in scenario
fn create_checkin_scenario() -> Scenario {
    let mut steps = HashMap::new();

    steps.insert(CheckInStep::Dates.id().to_string(), ScenarioStep {
        id: CheckInStep::Dates.id().to_string(),
        name: "Stay dates".to_string(),
        next_steps: vec![CheckInStep::Arrival.id().to_string()],
        validation: Some(StepValidation {
            input_type: InputType::DateRange,
            min_length: Some(21),
            max_length: Some(40),
            pattern: Some(r"^\d{4}-\d{2}-\d{2}\s+\d{4}-\d{2}-\d{2}$".to_string()),
            error_key: "checkin.dates.invalid".to_string(),
        }),
    });

    // Transport is picked with buttons; typed text here is the flight
    steps.insert(CheckInStep::Arrival.id().to_string(), ScenarioStep {
        id: CheckInStep::Arrival.id().to_string(),
        name: "Arrival".to_string(),
        next_steps: vec![
            CheckInStep::Property.id().to_string(),
            CheckInStep::Dates.id().to_string(),
        ],
        validation: Some(StepValidation {
            input_type: InputType::Flight,
            min_length: Some(3),
            max_length: Some(40),
            pattern: Some(r"^[A-Za-z0-9]{2,8}\s+\d{4}-\d{2}-\d{2}\s+\d{1,2}:\d{2}$".to_string()),
            error_key: "checkin.arrival.flight_invalid".to_string(),
        }),
    });

    steps.insert(CheckInStep::Property.id().to_string(), ScenarioStep {
        id: CheckInStep::Property.id().to_string(),
        name: "Property".to_string(),
        next_steps: vec![
            CheckInStep::Payment.id().to_string(),
            CheckInStep::Arrival.id().to_string(),
        ],
        validation: None,
    });

    // Typed text here is a partial payment amount
    steps.insert(CheckInStep::Payment.id().to_string(), ScenarioStep {
        id: CheckInStep::Payment.id().to_string(),
        name: "Payment".to_string(),
        next_steps: vec![
            CheckInStep::Complete.id().to_string(),
            CheckInStep::Property.id().to_string(),
        ],
        validation: Some(StepValidation {
            input_type: InputType::Money,
            min_length: Some(1),
            max_length: Some(12),
            pattern: None,
            error_key: "checkin.payment.amount_invalid".to_string(),
        }),
    });

    steps.insert(CheckInStep::Complete.id().to_string(), ScenarioStep {
        id: CheckInStep::Complete.id().to_string(),
        name: "Complete".to_string(),
        next_steps: vec![CheckInStep::Payment.id().to_string()],
        validation: None,
    });

    Scenario {
        id: CHECKIN_SCENARIO.to_string(),
        name: "Check-in".to_string(),
        initial_step: CheckInStep::Dates.id().to_string(),
        steps,
        max_duration: Some(24 * 3600),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn started() -> (ScenarioManager, ConversationContext) {
        let manager = ScenarioManager::new();
        let mut context = ConversationContext::new(42);
        manager.start_scenario(&mut context, CHECKIN_SCENARIO).unwrap();
        (manager, context)
    }

    #[test]
    fn test_step_order() {
        let mut step = CheckInStep::Dates;
        let mut seen = vec![step];
        while let Some(next) = step.next() {
            assert_eq!(next.previous(), Some(step));
            seen.push(next);
            step = next;
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(seen.iter().map(|s| s.index()).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_step_ids_parse() {
        for step in CheckInStep::INTERACTIVE {
            assert_eq!(step.id().parse::<CheckInStep>().unwrap(), step);
        }
        assert!("welcome".parse::<CheckInStep>().is_err());
    }

    #[test]
    fn test_forward_and_back_transitions() {
        let (manager, mut context) = started();
        assert!(context.is_at(CHECKIN_SCENARIO, "dates"));

        manager.next_step(&mut context, "arrival").unwrap();
        manager.next_step(&mut context, "dates").unwrap();
        manager.next_step(&mut context, "arrival").unwrap();
        manager.next_step(&mut context, "property").unwrap();
        manager.next_step(&mut context, "payment").unwrap();
        manager.next_step(&mut context, "complete").unwrap();
        assert!(context.is_at_step("complete"));
    }

    #[test]
    fn test_skipping_steps_rejected() {
        let (manager, mut context) = started();
        let result = manager.next_step(&mut context, "payment");
        assert_matches!(result, Err(CbxError::InvalidStateTransition { .. }));
        assert!(context.is_at_step("dates"));
    }

    #[test]
    fn test_dates_input_validation() {
        let (manager, context) = started();
        assert!(manager.validate_input(&context, "2026-03-12 2026-03-16").is_ok());
        assert!(manager.validate_input(&context, "2026-03-12").is_err());
        assert!(manager.validate_input(&context, "2026-02-30 2026-03-16").is_err());
        assert!(manager.validate_input(&context, "tomorrow please").is_err());
    }

    #[test]
    fn test_flight_input_validation() {
        let (manager, mut context) = started();
        manager.next_step(&mut context, "arrival").unwrap();
        assert!(manager.validate_input(&context, "AA1234 2026-03-12 14:05").is_ok());
        assert!(manager.validate_input(&context, "AA1234 2026-03-12").is_err());
        assert!(manager.validate_input(&context, "AA1234 2026-03-12 25:00").is_err());
    }

    #[test]
    fn test_amount_input_validation() {
        let (manager, mut context) = started();
        for step in ["arrival", "property", "payment"] {
            manager.next_step(&mut context, step).unwrap();
        }
        assert!(manager.validate_input(&context, "120.50").is_ok());
        assert_matches!(manager.validate_input(&context, "-5"), Err(CbxError::InvalidInput(key)) if key == "checkin.payment.amount_invalid");
        assert!(manager.validate_input(&context, "0").is_err());
        assert!(manager.validate_input(&context, "10.123").is_err());
    }

    #[test]
    fn test_property_step_accepts_no_text_rules() {
        let (manager, mut context) = started();
        manager.next_step(&mut context, "arrival").unwrap();
        manager.next_step(&mut context, "property").unwrap();
        assert!(manager.get_current_step(&context).unwrap().validation.is_none());
        assert!(manager.validate_input(&context, "anything at all").is_ok());
    }
}
