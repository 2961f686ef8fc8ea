use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::args::{self, Invocation};
use super::{Cardinality, FunctionRegistry};
use crate::collaborators::{
    plural, system_name, Collaborators, NewEntity, NewField, NewModule, NewPluginInstallation,
    NewProject, NewService,
};
use crate::context::{AssistantContext, MessageLoggerContext, Scope};
use crate::error::{AssistantError, Result};

/// Version string recorded on every installation made by the assistant.
const LATEST_VERSION: &str = "latest";

/// One function call as received from the language-model client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCallRequest {
    pub call_id: String,
    pub function_name: String,
    pub arguments_json: String,
    pub context: AssistantContext,
    pub logger_context: MessageLoggerContext,
}

/// Outcome of one dispatch, ready to be handed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResult {
    pub call_id: String,
    pub function: String,
    pub output: serde_json::Value,
}

impl FunctionResult {
    /// Structured error payload for callers that report failures back to
    /// the model instead of aborting the turn.
    pub fn from_error(call_id: &str, function: &str, err: &AssistantError) -> Self {
        Self {
            call_id: call_id.to_string(),
            function: function.to_string(),
            output: serde_json::json!({ "error": err.to_string() }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.output.get("error").is_some()
    }

    /// The string sent back to the model as the function's result.
    pub fn to_tool_output(&self) -> String {
        self.output.to_string()
    }
}

/// Maps a named function call onto the domain collaborators.
///
/// Batch elements run one after another in array order.  The first failure
/// stops the batch; work already done is left in place.
pub struct FunctionDispatcher {
    collaborators: Collaborators,
}

impl FunctionDispatcher {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    pub async fn dispatch(&self, request: &FunctionCallRequest) -> Result<FunctionResult> {
        self.execute_function(
            &request.call_id,
            &request.function_name,
            &request.arguments_json,
            &request.context,
            &request.logger_context,
        )
        .await
    }

    pub async fn execute_function(
        &self,
        call_id: &str,
        function_name: &str,
        arguments_json: &str,
        context: &AssistantContext,
        logger_context: &MessageLoggerContext,
    ) -> Result<FunctionResult> {
        let function = FunctionRegistry::resolve(function_name).inspect_err(|_| {
            warn!(call_id, function = function_name, "unknown function requested");
        })?;
        let raw = args::parse_object(function, arguments_json)?;

        // Decode every invocation up front so bad input never leaves a
        // half-applied batch behind.
        let invocations = args::expand(function, raw)?
            .into_iter()
            .map(|a| args::decode(function, a))
            .collect::<Result<Vec<_>>>()?;

        let scope = Scope::for_call(context, logger_context);
        debug!(
            call_id,
            %function,
            thread_id = %logger_context.thread_id,
            invocations = invocations.len(),
            "dispatching function call"
        );

        let mut outputs = Vec::with_capacity(invocations.len());
        for invocation in invocations {
            outputs.push(self.invoke(invocation, &scope).await?);
        }

        let output = match function.cardinality() {
            Cardinality::Single => outputs.pop().unwrap_or(serde_json::Value::Null),
            Cardinality::FanOut { .. } => serde_json::Value::Array(outputs),
        };

        info!(call_id, %function, workspace_id = %scope.workspace_id, "function executed");
        Ok(FunctionResult {
            call_id: call_id.to_string(),
            function: function.name().to_string(),
            output,
        })
    }

    async fn invoke(&self, invocation: Invocation, scope: &Scope) -> Result<serde_json::Value> {
        let c = &self.collaborators;
        let value = match invocation {
            Invocation::CreateEntity(a) => {
                let name = derived_name("createEntity", &a.name)?;
                let scope = scope.with_service(&a.service_id);
                let entity = c
                    .entities
                    .create_one_entity(
                        &scope,
                        NewEntity {
                            service_id: a.service_id,
                            name,
                            plural_display_name: plural(&a.name),
                            display_name: a.name,
                        },
                    )
                    .await?;

                let mut fields = Vec::with_capacity(a.fields.len());
                for display_name in a.fields {
                    let field = c
                        .entities
                        .create_field_by_display_name(&scope, &entity.id, NewField { display_name })
                        .await?;
                    fields.push(field);
                }
                serde_json::json!({ "entity": entity, "fields": fields })
            }
            Invocation::CreateProject(a) => {
                let project = c
                    .projects
                    .create_project(scope, NewProject { name: a.project_name })
                    .await?;
                serde_json::to_value(project)?
            }
            Invocation::CreateService(a) => {
                let scope = scope.with_project(&a.project_id);
                let service = c
                    .services
                    .create_service_with_default_settings(
                        &scope,
                        NewService {
                            project_id: a.project_id,
                            name: a.service_name,
                            description: a.service_description,
                            admin_ui_path: a.admin_ui_path,
                            server_path: a.server_path,
                        },
                    )
                    .await?;
                serde_json::to_value(service)?
            }
            Invocation::CreateModule(a) => {
                let name = derived_name("createModule", &a.module_name)?;
                let scope = scope.with_service(&a.service_id);
                let module = c
                    .modules
                    .create(
                        &scope,
                        NewModule {
                            service_id: a.service_id,
                            name,
                            display_name: a.module_name,
                            description: a.module_description,
                        },
                    )
                    .await?;
                serde_json::to_value(module)?
            }
            Invocation::InstallPlugin(a) => {
                let scope = scope.with_service(&a.service_id);
                let plugin = c
                    .plugin_catalog
                    .get_plugin_with_latest_version(&a.plugin_id)
                    .await?;
                let (settings, configurations) = plugin
                    .latest_version()
                    .map(|v| (v.settings.clone(), v.configurations.clone()))
                    .unwrap_or_default();
                let installed = c
                    .plugin_installations
                    .create(
                        &scope,
                        NewPluginInstallation {
                            service_id: a.service_id,
                            plugin_id: a.plugin_id,
                            display_name: plugin.name,
                            npm: plugin.npm,
                            version: LATEST_VERSION.to_string(),
                            enabled: true,
                            settings,
                            configurations,
                        },
                    )
                    .await?;
                serde_json::to_value(installed)?
            }
        };
        Ok(value)
    }
}

/// System name for a display name, rejected when nothing usable is left.
fn derived_name(function: &str, display_name: &str) -> Result<String> {
    let name = system_name(display_name);
    if name.is_empty() {
        return Err(AssistantError::malformed(
            function,
            format!("'{display_name}' contains no letters or digits to name it by"),
        ));
    }
    Ok(name)
}
