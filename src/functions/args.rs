//! Typed arguments for each function, decoded from the model's JSON.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::{AssistantFunction, Cardinality};
use crate::error::{AssistantError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntityArgs {
    pub name: String,
    pub service_id: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectArgs {
    pub project_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceArgs {
    pub service_name: String,
    #[serde(default)]
    pub service_description: String,
    pub project_id: String,
    #[serde(rename = "adminUIPath")]
    pub admin_ui_path: String,
    pub server_path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateModuleArgs {
    pub module_name: String,
    pub module_description: String,
    pub service_id: String,
}

/// One element of an `installPlugins` fan-out.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallPluginArgs {
    pub plugin_id: String,
    pub service_id: String,
}

/// A single handler invocation with its decoded arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    CreateEntity(CreateEntityArgs),
    CreateProject(CreateProjectArgs),
    CreateService(CreateServiceArgs),
    CreateModule(CreateModuleArgs),
    InstallPlugin(InstallPluginArgs),
}

/// Parse the raw argument string into a JSON object.
pub fn parse_object(function: AssistantFunction, arguments_json: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(arguments_json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(AssistantError::malformed(
            function.name(),
            format!("expected a JSON object, got {}", json_kind(&other)),
        )),
        Err(e) => Err(AssistantError::malformed(function.name(), format!("invalid JSON: {e}"))),
    }
}

/// Split one call's arguments into per-invocation argument objects according
/// to the function's cardinality.
pub fn expand(function: AssistantFunction, args: Map<String, Value>) -> Result<Vec<Map<String, Value>>> {
    match function.cardinality() {
        Cardinality::Single => Ok(vec![args]),
        Cardinality::FanOut { field, item } => {
            let mut shared = args;
            let elements = match shared.remove(field) {
                Some(Value::Array(elements)) => elements,
                Some(other) => {
                    return Err(AssistantError::malformed(
                        function.name(),
                        format!("`{field}` must be an array, got {}", json_kind(&other)),
                    ));
                }
                None => {
                    return Err(AssistantError::malformed(
                        function.name(),
                        format!("missing field `{field}`"),
                    ));
                }
            };
            Ok(elements
                .into_iter()
                .map(|element| {
                    let mut per_item = shared.clone();
                    per_item.insert(item.to_string(), element);
                    per_item
                })
                .collect())
        }
    }
}

/// Decode one invocation's arguments into its typed form.
pub fn decode(function: AssistantFunction, args: Map<String, Value>) -> Result<Invocation> {
    let value = Value::Object(args);
    Ok(match function {
        AssistantFunction::CreateEntity => Invocation::CreateEntity(typed(function, value)?),
        AssistantFunction::CreateProject => Invocation::CreateProject(typed(function, value)?),
        AssistantFunction::CreateService => Invocation::CreateService(typed(function, value)?),
        AssistantFunction::CreateModule => Invocation::CreateModule(typed(function, value)?),
        AssistantFunction::InstallPlugins => Invocation::InstallPlugin(typed(function, value)?),
    })
}

fn typed<T: DeserializeOwned>(function: AssistantFunction, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| AssistantError::malformed(function.name(), e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn rejects_invalid_json() {
        let err = parse_object(AssistantFunction::CreateProject, "{not json").unwrap_err();
        assert!(matches!(err, AssistantError::MalformedArguments { .. }));
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn rejects_non_object_json() {
        let err = parse_object(AssistantFunction::CreateProject, "[1, 2]").unwrap_err();
        assert!(err.to_string().contains("got an array"));
    }

    #[test]
    fn single_passes_arguments_through() {
        let args = object(json!({"projectName": "Shop"}));
        let expanded = expand(AssistantFunction::CreateProject, args.clone()).unwrap();
        assert_eq!(expanded, vec![args]);
    }

    #[test]
    fn fan_out_keeps_scalars_constant() {
        let args = object(json!({"pluginIds": ["a", "b", "c"], "serviceId": "svc"}));
        let expanded = expand(AssistantFunction::InstallPlugins, args).unwrap();
        assert_eq!(expanded.len(), 3);
        for (element, id) in expanded.iter().zip(["a", "b", "c"]) {
            assert_eq!(element["pluginId"], id);
            assert_eq!(element["serviceId"], "svc");
            assert!(!element.contains_key("pluginIds"));
        }
    }

    #[test]
    fn fan_out_of_empty_array_is_empty() {
        let args = object(json!({"pluginIds": [], "serviceId": "svc"}));
        assert!(expand(AssistantFunction::InstallPlugins, args).unwrap().is_empty());
    }

    #[test]
    fn fan_out_requires_array_field() {
        let missing = object(json!({"serviceId": "svc"}));
        let err = expand(AssistantFunction::InstallPlugins, missing).unwrap_err();
        assert!(err.to_string().contains("missing field `pluginIds`"));

        let scalar = object(json!({"pluginIds": "a", "serviceId": "svc"}));
        let err = expand(AssistantFunction::InstallPlugins, scalar).unwrap_err();
        assert!(err.to_string().contains("must be an array"));
    }

    #[test]
    fn decode_reports_missing_required_field() {
        let args = object(json!({"name": "Order", "fields": []}));
        let err = decode(AssistantFunction::CreateEntity, args).unwrap_err();
        assert!(matches!(err, AssistantError::MalformedArguments { ref function, .. } if function == "createEntity"));
        assert!(err.to_string().contains("serviceId"));
    }

    #[test]
    fn decode_service_uses_wire_names() {
        let args = object(json!({
            "serviceName": "Orders",
            "projectId": "p1",
            "adminUIPath": "/admin-ui",
            "serverPath": "/server"
        }));
        let Invocation::CreateService(service) = decode(AssistantFunction::CreateService, args).unwrap()
        else {
            panic!("wrong invocation");
        };
        assert_eq!(service.admin_ui_path, "/admin-ui");
        assert_eq!(service.server_path, "/server");
        assert!(service.service_description.is_empty());
    }

    #[test]
    fn decode_rejects_non_string_plugin_id() {
        let args = object(json!({"pluginId": 7, "serviceId": "svc"}));
        assert!(decode(AssistantFunction::InstallPlugins, args).is_err());
    }
}
