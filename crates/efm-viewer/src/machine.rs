//! Finite state machine descriptors for toggled UI pieces.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewerError};

pub const TOGGLE: &str = "TOGGLE";

/// One state: its transitions and the attributes it exposes to templates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MachineState {
    #[serde(default)]
    pub on: BTreeMap<String, String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

impl MachineState {
    pub fn on(mut self, event: &str, target: &str) -> Self {
        self.on.insert(event.to_string(), target.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMachine {
    pub current_state: String,
    pub states: BTreeMap<String, MachineState>,
}

impl StateMachine {
    pub fn new(initial: &str, states: BTreeMap<String, MachineState>) -> Result<Self> {
        let machine = Self {
            current_state: initial.to_string(),
            states,
        };
        machine.validate()?;
        Ok(machine)
    }

    /// The strip dropdown: `inactive` and `active`, flipped by `TOGGLE`.
    pub fn menu_bar() -> Self {
        let states = BTreeMap::from([
            (
                "inactive".to_string(),
                MachineState::default()
                    .on(TOGGLE, "active")
                    .attr("className", " ")
                    .attr("ariaExpanded", "false"),
            ),
            (
                "active".to_string(),
                MachineState::default()
                    .on(TOGGLE, "inactive")
                    .attr("className", "is-active")
                    .attr("ariaExpanded", "true"),
            ),
        ]);
        Self {
            current_state: "inactive".to_string(),
            states,
        }
    }

    /// Every transition target and the current state must be declared.
    pub fn validate(&self) -> Result<()> {
        if !self.states.contains_key(&self.current_state) {
            return Err(ViewerError::InvalidMachine(format!(
                "current state '{}' is not declared",
                self.current_state
            )));
        }
        for (name, state) in &self.states {
            for (event, target) in &state.on {
                if !self.states.contains_key(target) {
                    return Err(ViewerError::InvalidMachine(format!(
                        "'{name}' --{event}--> '{target}' targets an undeclared state"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Next state for `event` from `state`. Unknown events and states stay put.
    pub fn transition<'a>(&'a self, state: &'a str, event: &str) -> &'a str {
        self.states
            .get(state)
            .and_then(|declared| declared.on.get(event))
            .map(String::as_str)
            .unwrap_or(state)
    }

    /// Applies `event` to the current state.
    pub fn fire(&mut self, event: &str) -> &str {
        let next = self.transition(&self.current_state, event).to_string();
        self.current_state = next;
        &self.current_state
    }

    pub fn state(&self) -> &str {
        &self.current_state
    }

    pub fn attr(&self, name: &str) -> &str {
        self.states
            .get(&self.current_state)
            .and_then(|state| state.attrs.get(name))
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_bar_toggles_between_two_states() {
        let mut machine = StateMachine::menu_bar();
        assert!(machine.validate().is_ok());
        assert_eq!(machine.attr("ariaExpanded"), "false");
        assert_eq!(machine.fire(TOGGLE), "active");
        assert_eq!(machine.attr("className"), "is-active");
        assert_eq!(machine.attr("ariaExpanded"), "true");
        assert_eq!(machine.fire(TOGGLE), "inactive");
    }

    #[test]
    fn test_unknown_event_keeps_state() {
        let mut machine = StateMachine::menu_bar();
        assert_eq!(machine.transition("inactive", "OPEN"), "inactive");
        assert_eq!(machine.transition("missing", TOGGLE), "missing");
        assert_eq!(machine.fire("CLOSE"), "inactive");
    }

    #[test]
    fn test_undeclared_target_is_rejected() {
        let states = BTreeMap::from([(
            "idle".to_string(),
            MachineState::default().on("GO", "running"),
        )]);
        assert!(matches!(
            StateMachine::new("idle", states.clone()),
            Err(ViewerError::InvalidMachine(_))
        ));
        assert!(StateMachine::new("nowhere", BTreeMap::new()).is_err());
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = serde_json::to_value(StateMachine::menu_bar()).unwrap();
        assert_eq!(value["currentState"], "inactive");
        assert_eq!(value["states"]["active"]["on"]["TOGGLE"], "inactive");
        let back: StateMachine = serde_json::from_value(value).unwrap();
        assert_eq!(back, StateMachine::menu_bar());
    }
}
