//! In-process collaborators backed by plain maps.
//!
//! Every call is appended to an ordered log before it runs, so callers can
//! check exactly what was invoked and in which order.  A call can be made to
//! fail with [`InMemoryWorkspace::fail_on`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    Collaborators, Entity, EntityCollaborator, Field, InstalledPlugin, Module, ModuleCollaborator, NewEntity,
    NewField, NewModule, NewPluginInstallation, NewProject, NewService, PluginCatalogCollaborator,
    PluginDescriptor, PluginInstallationCollaborator, Project, ProjectCollaborator, Service,
    ServiceCollaborator,
};
use crate::billing::{BillingCollaborator, Entitlement};
use crate::context::Scope;
use crate::error::{AssistantError, Result};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// One recorded collaborator call: operation name and its main subject
/// (the name or id it was called with).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: &'static str,
    pub subject: String,
    pub scope: Scope,
}

#[derive(Default)]
struct State {
    entities: Vec<Entity>,
    fields: Vec<Field>,
    projects: Vec<Project>,
    services: Vec<Service>,
    modules: Vec<Module>,
    installations: Vec<InstalledPlugin>,
}

/// All domain collaborators over one in-memory workspace.
#[derive(Default)]
pub struct InMemoryWorkspace {
    state: Mutex<State>,
    catalog: Mutex<HashMap<String, PluginDescriptor>>,
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<HashSet<(&'static str, String)>>,
}

impl InMemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a plugin resolvable through the catalog.
    pub fn add_plugin(&self, plugin: PluginDescriptor) {
        lock(&self.catalog).insert(plugin.plugin_id.clone(), plugin);
    }

    /// Fail every later `operation` call whose subject equals `subject`.
    pub fn fail_on(&self, operation: &'static str, subject: impl Into<String>) {
        lock(&self.failures).insert((operation, subject.into()));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Subjects of every call to `operation`, in call order.
    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.operation == operation)
            .map(|c| c.subject.clone())
            .collect()
    }

    pub fn entities(&self) -> Vec<Entity> {
        lock(&self.state).entities.clone()
    }

    pub fn fields(&self) -> Vec<Field> {
        lock(&self.state).fields.clone()
    }

    pub fn installations(&self) -> Vec<InstalledPlugin> {
        lock(&self.state).installations.clone()
    }

    fn record(&self, operation: &'static str, subject: &str, scope: &Scope) -> Result<()> {
        lock(&self.calls).push(RecordedCall {
            operation,
            subject: subject.to_string(),
            scope: scope.clone(),
        });
        if lock(&self.failures).contains(&(operation, subject.to_string())) {
            return Err(AssistantError::collaborator(
                operation,
                format!("injected failure for '{subject}'"),
            ));
        }
        Ok(())
    }
}

impl Collaborators {
    /// Every collaborator backed by the same in-memory workspace.
    pub fn from_workspace(workspace: &Arc<InMemoryWorkspace>) -> Self {
        Self {
            entities: workspace.clone(),
            projects: workspace.clone(),
            services: workspace.clone(),
            modules: workspace.clone(),
            plugin_catalog: workspace.clone(),
            plugin_installations: workspace.clone(),
        }
    }
}

#[async_trait]
impl EntityCollaborator for InMemoryWorkspace {
    async fn create_one_entity(&self, scope: &Scope, spec: NewEntity) -> Result<Entity> {
        self.record("createOneEntity", &spec.display_name, scope)?;
        let entity = Entity {
            id: new_id(),
            service_id: spec.service_id,
            name: spec.name,
            display_name: spec.display_name,
            plural_display_name: spec.plural_display_name,
        };
        lock(&self.state).entities.push(entity.clone());
        Ok(entity)
    }

    async fn create_field_by_display_name(
        &self,
        scope: &Scope,
        entity_id: &str,
        spec: NewField,
    ) -> Result<Field> {
        self.record("createFieldByDisplayName", &spec.display_name, scope)?;
        let mut state = lock(&self.state);
        if !state.entities.iter().any(|e| e.id == entity_id) {
            return Err(AssistantError::collaborator(
                "createFieldByDisplayName",
                format!("entity {entity_id} not found"),
            ));
        }
        let field = Field {
            id: new_id(),
            entity_id: entity_id.to_string(),
            display_name: spec.display_name,
        };
        state.fields.push(field.clone());
        Ok(field)
    }
}

#[async_trait]
impl ProjectCollaborator for InMemoryWorkspace {
    async fn create_project(&self, scope: &Scope, spec: NewProject) -> Result<Project> {
        self.record("createProject", &spec.name, scope)?;
        let project = Project {
            id: new_id(),
            workspace_id: scope.workspace_id.clone(),
            name: spec.name,
        };
        lock(&self.state).projects.push(project.clone());
        Ok(project)
    }
}

#[async_trait]
impl ServiceCollaborator for InMemoryWorkspace {
    async fn create_service_with_default_settings(
        &self,
        scope: &Scope,
        spec: NewService,
    ) -> Result<Service> {
        self.record("createServiceWithDefaultSettings", &spec.name, scope)?;
        let service = Service {
            id: new_id(),
            project_id: spec.project_id,
            name: spec.name,
            description: spec.description,
            admin_ui_path: spec.admin_ui_path,
            server_path: spec.server_path,
        };
        lock(&self.state).services.push(service.clone());
        Ok(service)
    }
}

#[async_trait]
impl ModuleCollaborator for InMemoryWorkspace {
    async fn create(&self, scope: &Scope, spec: NewModule) -> Result<Module> {
        self.record("createModule", &spec.display_name, scope)?;
        let module = Module {
            id: new_id(),
            service_id: spec.service_id,
            name: spec.name,
            display_name: spec.display_name,
            description: spec.description,
        };
        lock(&self.state).modules.push(module.clone());
        Ok(module)
    }
}

#[async_trait]
impl PluginCatalogCollaborator for InMemoryWorkspace {
    async fn get_plugin_with_latest_version(&self, plugin_id: &str) -> Result<PluginDescriptor> {
        self.record("getPluginWithLatestVersion", plugin_id, &Scope::default())?;
        lock(&self.catalog).get(plugin_id).cloned().ok_or_else(|| {
            AssistantError::collaborator(
                "getPluginWithLatestVersion",
                format!("plugin {plugin_id} not found"),
            )
        })
    }
}

#[async_trait]
impl PluginInstallationCollaborator for InMemoryWorkspace {
    async fn create(&self, scope: &Scope, spec: NewPluginInstallation) -> Result<InstalledPlugin> {
        self.record("installPlugin", &spec.plugin_id, scope)?;
        let installed = InstalledPlugin {
            id: new_id(),
            plugin_id: spec.plugin_id,
            service_id: spec.service_id,
            display_name: spec.display_name,
            npm: spec.npm,
            version: spec.version,
            enabled: spec.enabled,
        };
        lock(&self.state).installations.push(installed.clone());
        Ok(installed)
    }
}

/// Billing backend that counts usage per (workspace, feature).
#[derive(Default)]
pub struct InMemoryBilling {
    usage: Mutex<HashMap<(String, String), u64>>,
    limits: Mutex<HashMap<(String, String), u64>>,
    calls: Mutex<Vec<(&'static str, String, String)>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl InMemoryBilling {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_limit(&self, workspace_id: &str, feature_id: &str, limit: u64) {
        lock(&self.limits).insert((workspace_id.to_string(), feature_id.to_string()), limit);
    }

    pub fn usage(&self, workspace_id: &str, feature_id: &str) -> u64 {
        lock(&self.usage)
            .get(&(workspace_id.to_string(), feature_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn fail_on(&self, operation: &'static str) {
        lock(&self.failing).insert(operation);
    }

    /// `(operation, workspace_id, feature_id)` in call order.
    pub fn calls(&self) -> Vec<(&'static str, String, String)> {
        lock(&self.calls).clone()
    }

    fn record(&self, operation: &'static str, workspace_id: &str, feature_id: &str) -> Result<()> {
        lock(&self.calls).push((operation, workspace_id.to_string(), feature_id.to_string()));
        if lock(&self.failing).contains(operation) {
            return Err(AssistantError::collaborator(operation, "billing backend unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl BillingCollaborator for InMemoryBilling {
    async fn get_metered_entitlement(
        &self,
        workspace_id: &str,
        feature_id: &str,
    ) -> Result<Entitlement> {
        self.record("getMeteredEntitlement", workspace_id, feature_id)?;
        let key = (workspace_id.to_string(), feature_id.to_string());
        let usage_limit = lock(&self.limits).get(&key).copied();
        let current_usage = lock(&self.usage).get(&key).copied().unwrap_or(0);
        Ok(Entitlement {
            feature_id: feature_id.to_string(),
            has_access: usage_limit.is_none_or(|limit| current_usage < limit),
            usage_limit,
            current_usage,
        })
    }

    async fn report_usage(&self, workspace_id: &str, feature_id: &str) -> Result<()> {
        self.record("reportUsage", workspace_id, feature_id)?;
        *lock(&self.usage)
            .entry((workspace_id.to_string(), feature_id.to_string()))
            .or_insert(0) += 1;
        Ok(())
    }
}
