//! Per-turn identity passed in by the caller and never mutated here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub name: String,
    #[serde(rename = "allowLLMFeatures")]
    pub allow_llm_features: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub is_owner: bool,
    pub workspace: Workspace,
}

/// The calling principal and the workspace it acts in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantContext {
    pub user: User,
}

impl AssistantContext {
    pub fn workspace_id(&self) -> &str {
        &self.user.workspace.id
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// Read straight from the context on every call.
    pub fn llm_features_allowed(&self) -> bool {
        self.user.workspace.allow_llm_features
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Where in the workspace the conversation is happening.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContext {
    pub workspace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
}

/// Ties a function execution back to the message that triggered it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageLoggerContext {
    pub message_context: MessageContext,
    pub thread_id: String,
    pub user_id: String,
    pub role: Role,
}

/// Resource scope handed explicitly to every domain call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Scope {
    pub workspace_id: String,
    pub project_id: Option<String>,
    pub service_id: Option<String>,
    pub user_id: String,
}

impl Scope {
    /// Build the scope for one dispatch.  The workspace and user always come
    /// from the authenticated context; project and service come from the
    /// conversation's message context.
    pub fn for_call(context: &AssistantContext, logger: &MessageLoggerContext) -> Self {
        Self {
            workspace_id: context.workspace_id().to_string(),
            project_id: logger.message_context.project_id.clone(),
            service_id: logger.message_context.service_id.clone(),
            user_id: context.user_id().to_string(),
        }
    }

    /// Narrow the scope to a project named by the function arguments.
    pub fn with_project(&self, project_id: &str) -> Self {
        Self {
            project_id: Some(project_id.to_string()),
            ..self.clone()
        }
    }

    /// Narrow the scope to a service named by the function arguments.
    pub fn with_service(&self, service_id: &str) -> Self {
        Self {
            service_id: Some(service_id.to_string()),
            ..self.clone()
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn scope_takes_workspace_from_context() {
        let mut logger = logger_context();
        logger.message_context.workspace_id = "other".into();
        let scope = Scope::for_call(&context(true), &logger);
        assert_eq!(scope.workspace_id, WORKSPACE_ID);
        assert_eq!(scope.project_id.as_deref(), Some(PROJECT_ID));
        assert_eq!(scope.service_id.as_deref(), Some(SERVICE_ID));
        assert_eq!(scope.user_id, USER_ID);
    }

    #[test]
    fn narrowing_overrides_only_one_field() {
        let scope = Scope::for_call(&context(true), &logger_context());
        let narrowed = scope.with_service("svc-2");
        assert_eq!(narrowed.service_id.as_deref(), Some("svc-2"));
        assert_eq!(narrowed.project_id, scope.project_id);
        assert_eq!(scope.with_project("p-2").project_id.as_deref(), Some("p-2"));
    }

    #[test]
    fn context_deserializes_from_camel_case() {
        let json = serde_json::json!({
            "user": {
                "id": "u1",
                "isOwner": false,
                "workspace": {
                    "id": "w1",
                    "name": "Acme",
                    "allowLLMFeatures": true,
                    "createdAt": "2024-01-01T00:00:00Z",
                    "updatedAt": "2024-01-01T00:00:00Z"
                }
            }
        });
        let ctx: AssistantContext = serde_json::from_value(json).unwrap();
        assert_eq!(ctx.workspace_id(), "w1");
        assert!(ctx.llm_features_allowed());
        assert!(!ctx.user.is_owner);
    }

    #[test]
    fn role_is_lowercase_on_the_wire() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        let r: Role = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(r, Role::System);
    }
}
