pub mod args;
pub mod dispatch;

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::{AssistantError, Result};

/// Every function the assistant model is allowed to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssistantFunction {
    CreateEntity,
    CreateProject,
    CreateService,
    CreateModule,
    InstallPlugins,
}

/// How one call maps onto handler invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Cardinality {
    /// One call, one argument set, one handler invocation.
    Single,
    /// One invocation per element of the array at `field`; each invocation
    /// sees the element under `item` plus every other argument unchanged.
    FanOut {
        field: &'static str,
        item: &'static str,
    },
}

impl AssistantFunction {
    pub const ALL: [AssistantFunction; 5] = [
        Self::CreateEntity,
        Self::CreateProject,
        Self::CreateService,
        Self::CreateModule,
        Self::InstallPlugins,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateEntity => "createEntity",
            Self::CreateProject => "createProject",
            Self::CreateService => "createService",
            Self::CreateModule => "createModule",
            Self::InstallPlugins => "installPlugins",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::CreateEntity => {
                "Create a data entity in a service, together with one field per entry in `fields`."
            }
            Self::CreateProject => "Create a new project in the current workspace.",
            Self::CreateService => {
                "Create a service with default settings in an existing project."
            }
            Self::CreateModule => "Create a module in a service.",
            Self::InstallPlugins => {
                "Install the latest version of each listed plugin into a service."
            }
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        match self {
            Self::InstallPlugins => Cardinality::FanOut {
                field: "pluginIds",
                item: "pluginId",
            },
            _ => Cardinality::Single,
        }
    }

    /// JSON Schema describing the function's arguments.
    pub fn parameters_schema(&self) -> serde_json::Value {
        match self {
            Self::CreateEntity => serde_json::json!({
                "type": "object",
                "required": ["name", "serviceId", "fields"],
                "properties": {
                    "name": { "type": "string", "description": "Display name of the entity" },
                    "serviceId": { "type": "string", "description": "Service that owns the entity" },
                    "fields": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Display names of the fields to create"
                    }
                }
            }),
            Self::CreateProject => serde_json::json!({
                "type": "object",
                "required": ["projectName"],
                "properties": {
                    "projectName": { "type": "string", "description": "Name of the new project" }
                }
            }),
            Self::CreateService => serde_json::json!({
                "type": "object",
                "required": ["serviceName", "projectId", "adminUIPath", "serverPath"],
                "properties": {
                    "serviceName": { "type": "string" },
                    "serviceDescription": { "type": "string" },
                    "projectId": { "type": "string" },
                    "adminUIPath": { "type": "string", "description": "Folder for the generated admin UI" },
                    "serverPath": { "type": "string", "description": "Folder for the generated server" }
                }
            }),
            Self::CreateModule => serde_json::json!({
                "type": "object",
                "required": ["moduleName", "moduleDescription", "serviceId"],
                "properties": {
                    "moduleName": { "type": "string" },
                    "moduleDescription": { "type": "string" },
                    "serviceId": { "type": "string" }
                }
            }),
            Self::InstallPlugins => serde_json::json!({
                "type": "object",
                "required": ["pluginIds", "serviceId"],
                "properties": {
                    "pluginIds": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Catalog ids of the plugins to install"
                    },
                    "serviceId": { "type": "string" }
                }
            }),
        }
    }
}

impl fmt::Display for AssistantFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AssistantFunction {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| AssistantError::UnknownFunction(s.to_string()))
    }
}

impl Serialize for AssistantFunction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// What the language-model client needs to advertise one function.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
    pub cardinality: Cardinality,
}

/// The fixed function catalog.  Stateless; safe to share across turns.
pub struct FunctionRegistry;

impl FunctionRegistry {
    pub fn resolve(name: &str) -> Result<AssistantFunction> {
        name.parse()
    }

    /// Every function, sorted by name.
    pub fn definitions() -> Vec<FunctionDefinition> {
        let mut defs: Vec<_> = AssistantFunction::ALL
            .iter()
            .map(|f| FunctionDefinition {
                name: f.name(),
                description: f.description(),
                parameters: f.parameters_schema(),
                cardinality: f.cardinality(),
            })
            .collect();
        defs.sort_by_key(|d| d.name);
        defs
    }

    pub fn len() -> usize {
        AssistantFunction::ALL.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_resolve() {
        for f in AssistantFunction::ALL {
            assert_eq!(FunctionRegistry::resolve(f.name()).unwrap(), f);
        }
    }

    #[test]
    fn resolve_unknown_name() {
        let err = FunctionRegistry::resolve("dropDatabase").unwrap_err();
        assert!(matches!(err, AssistantError::UnknownFunction(ref n) if n == "dropDatabase"));
        assert!(FunctionRegistry::resolve("CreateEntity").is_err());
    }

    #[test]
    fn only_install_plugins_fans_out() {
        assert_eq!(
            AssistantFunction::InstallPlugins.cardinality(),
            Cardinality::FanOut {
                field: "pluginIds",
                item: "pluginId"
            }
        );
        for f in AssistantFunction::ALL {
            if f != AssistantFunction::InstallPlugins {
                assert_eq!(f.cardinality(), Cardinality::Single);
            }
        }
    }

    #[test]
    fn fan_out_field_is_a_required_array() {
        for f in AssistantFunction::ALL {
            if let Cardinality::FanOut { field, .. } = f.cardinality() {
                let schema = f.parameters_schema();
                assert_eq!(schema["properties"][field]["type"], "array");
                let required = schema["required"].as_array().unwrap();
                assert!(required.iter().any(|r| r == field));
            }
        }
    }

    #[test]
    fn definitions_are_sorted_and_complete() {
        let defs = FunctionRegistry::definitions();
        assert_eq!(defs.len(), FunctionRegistry::len());
        let names: Vec<_> = defs.iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "createEntity",
                "createModule",
                "createProject",
                "createService",
                "installPlugins"
            ]
        );
    }

    #[test]
    fn definition_serializes_cardinality_tag() {
        let def = FunctionRegistry::definitions()
            .into_iter()
            .find(|d| d.name == "installPlugins")
            .unwrap();
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["cardinality"]["mode"], "fanOut");
        assert_eq!(json["cardinality"]["field"], "pluginIds");
        assert_eq!(json["parameters"]["type"], "object");
    }
}
