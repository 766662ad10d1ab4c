use serde::{Deserialize, Serialize};

use crate::components::component_model::ComponentDefinition;
use crate::components::registry::ComponentRegistry;
use crate::error::RegistryError;
use crate::steps::registry::StepRegistry;
use crate::steps::step_model::StepDefinition;

/// Serializable view of both registries for external tooling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    pub steps: Vec<StepDefinition>,
    pub components: Vec<ComponentDefinition>,
}

impl RegistrySnapshot {
    pub fn from_registries(steps: &StepRegistry, components: &ComponentRegistry) -> Result<Self, RegistryError> {
        Ok(Self {
            steps: steps.entries()?.to_vec(),
            components: components.components()?.cloned().collect(),
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Registries rebuilt from the snapshot, without touching the filesystem.
    pub fn into_registries(self) -> (StepRegistry, ComponentRegistry) {
        (
            StepRegistry::seeded(self.steps),
            ComponentRegistry::seeded(self.components),
        )
    }
}
