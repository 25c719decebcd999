//! The agent registry — tagged data, not subclasses.
//!
//! A registry maps agent names to their definitions. The turn state machine
//! is one generic loop parameterized by the active definition, so adding an
//! agent means adding an entry here, not a new implementation.

use crate::prompts;
use pili_core::agent::AgentDefinition;
use pili_core::error::Error;
use std::collections::HashMap;

/// The set of agents available to a turn, with a configured default.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, AgentDefinition>,
    /// Insertion order, for the default-agent fallback.
    order: Vec<String>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. Duplicate names are rejected.
    pub fn insert(&mut self, definition: AgentDefinition) -> Result<(), Error> {
        if self.agents.contains_key(&definition.name) {
            return Err(Error::Config {
                message: format!("Duplicate agent name: {}", definition.name),
            });
        }
        self.order.push(definition.name.clone());
        self.agents.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents.get(name)
    }

    /// The agent that starts each turn: "orchestrator" when registered,
    /// otherwise the first agent inserted.
    pub fn default_agent(&self) -> Option<&str> {
        if self.agents.contains_key("orchestrator") {
            return Some("orchestrator");
        }
        self.order.first().map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Check that every handoff target names a registered agent.
    pub fn validate(&self) -> Result<(), Error> {
        if self.agents.is_empty() {
            return Err(Error::Config {
                message: "Agent registry is empty".into(),
            });
        }
        for agent in self.agents.values() {
            for target in &agent.handoff_targets {
                if !self.agents.contains_key(target) {
                    return Err(Error::Config {
                        message: format!(
                            "Agent '{}' hands off to unknown agent '{}'",
                            agent.name, target
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The built-in Pili graph: orchestrator routing between logger and coach.
pub fn fitness_registry() -> AgentRegistry {
    let mut registry = AgentRegistry::new();

    // insert() only fails on duplicate names, which these are not.
    let _ = registry.insert(
        AgentDefinition::new("orchestrator", prompts::ORCHESTRATOR_PROMPT)
            .with_tools(["quick_response"])
            .with_handoffs(["logger", "coach"]),
    );
    let _ = registry.insert(
        AgentDefinition::new("logger", prompts::LOGGER_PROMPT)
            .with_handoffs(["coach", "orchestrator"]),
    );
    let _ = registry.insert(
        AgentDefinition::new("coach", prompts::COACH_PROMPT)
            .with_handoffs(["logger", "orchestrator"]),
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fitness_registry_is_valid() {
        let registry = fitness_registry();
        assert_eq!(registry.len(), 3);
        assert!(registry.validate().is_ok());
        assert_eq!(registry.default_agent(), Some("orchestrator"));
    }

    #[test]
    fn default_falls_back_to_first_inserted() {
        let mut registry = AgentRegistry::new();
        registry
            .insert(AgentDefinition::new("logger", "log things"))
            .unwrap();
        registry
            .insert(AgentDefinition::new("coach", "coach things"))
            .unwrap();
        assert_eq!(registry.default_agent(), Some("logger"));
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut registry = AgentRegistry::new();
        registry
            .insert(AgentDefinition::new("logger", "one"))
            .unwrap();
        assert!(registry.insert(AgentDefinition::new("logger", "two")).is_err());
    }

    #[test]
    fn unknown_handoff_target_fails_validation() {
        let mut registry = AgentRegistry::new();
        registry
            .insert(AgentDefinition::new("logger", "log").with_handoffs(["ghost"]))
            .unwrap();
        assert!(registry.validate().is_err());
    }

    #[test]
    fn empty_registry_invalid() {
        assert!(AgentRegistry::new().validate().is_err());
    }
}
