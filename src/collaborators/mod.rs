//! Interfaces to the services that own the actual domain data.
//!
//! Every call takes an explicit [`Scope`]; nothing is read from ambient state.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::Scope;
use crate::error::Result;

// -- Domain records ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub service_id: String,
    pub name: String,
    pub display_name: String,
    pub plural_display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    pub entity_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "adminUIPath")]
    pub admin_ui_path: String,
    pub server_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: String,
    pub service_id: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginVersion {
    pub id: String,
    pub version: String,
    pub is_latest: bool,
    #[serde(default)]
    pub settings: serde_json::Value,
    #[serde(default)]
    pub configurations: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    pub plugin_id: String,
    pub name: String,
    pub npm: String,
    #[serde(default)]
    pub versions: Vec<PluginVersion>,
}

impl PluginDescriptor {
    pub fn latest_version(&self) -> Option<&PluginVersion> {
        self.versions.iter().find(|v| v.is_latest)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledPlugin {
    pub id: String,
    pub plugin_id: String,
    pub service_id: String,
    pub display_name: String,
    pub npm: String,
    pub version: String,
    pub enabled: bool,
}

// -- Create requests -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct NewEntity {
    pub service_id: String,
    pub name: String,
    pub display_name: String,
    pub plural_display_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewField {
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProject {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewService {
    pub project_id: String,
    pub name: String,
    pub description: String,
    pub admin_ui_path: String,
    pub server_path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewModule {
    pub service_id: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPluginInstallation {
    pub service_id: String,
    pub plugin_id: String,
    pub display_name: String,
    pub npm: String,
    pub version: String,
    pub enabled: bool,
    pub settings: serde_json::Value,
    pub configurations: serde_json::Value,
}

// -- Collaborator traits -------------------------------------------------------

#[async_trait]
pub trait EntityCollaborator: Send + Sync {
    async fn create_one_entity(&self, scope: &Scope, spec: NewEntity) -> Result<Entity>;

    async fn create_field_by_display_name(
        &self,
        scope: &Scope,
        entity_id: &str,
        spec: NewField,
    ) -> Result<Field>;
}

#[async_trait]
pub trait ProjectCollaborator: Send + Sync {
    async fn create_project(&self, scope: &Scope, spec: NewProject) -> Result<Project>;
}

#[async_trait]
pub trait ServiceCollaborator: Send + Sync {
    async fn create_service_with_default_settings(
        &self,
        scope: &Scope,
        spec: NewService,
    ) -> Result<Service>;
}

#[async_trait]
pub trait ModuleCollaborator: Send + Sync {
    async fn create(&self, scope: &Scope, spec: NewModule) -> Result<Module>;
}

#[async_trait]
pub trait PluginCatalogCollaborator: Send + Sync {
    async fn get_plugin_with_latest_version(&self, plugin_id: &str) -> Result<PluginDescriptor>;
}

#[async_trait]
pub trait PluginInstallationCollaborator: Send + Sync {
    async fn create(&self, scope: &Scope, spec: NewPluginInstallation) -> Result<InstalledPlugin>;
}

/// Domain services the dispatcher may call into.
#[derive(Clone)]
pub struct Collaborators {
    pub entities: Arc<dyn EntityCollaborator>,
    pub projects: Arc<dyn ProjectCollaborator>,
    pub services: Arc<dyn ServiceCollaborator>,
    pub modules: Arc<dyn ModuleCollaborator>,
    pub plugin_catalog: Arc<dyn PluginCatalogCollaborator>,
    pub plugin_installations: Arc<dyn PluginInstallationCollaborator>,
}

/// PascalCase system name derived from a display name
/// ("order item" -> "OrderItem").  Letters and digits of any script are kept;
/// the result is empty when the display name has none.
pub fn system_name(display_name: &str) -> String {
    display_name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect()
}

/// Naive English plural used when the model does not supply one.
pub fn plural(display_name: &str) -> String {
    let trimmed = display_name.trim_end();
    if trimmed.is_empty() {
        return String::new();
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.ends_with('s') || lower.ends_with('x') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{trimmed}es")
    } else if lower.ends_with('y')
        && !matches!(lower.chars().rev().nth(1), Some('a' | 'e' | 'i' | 'o' | 'u'))
    {
        format!("{}ies", &trimmed[..trimmed.len() - 1])
    } else {
        format!("{trimmed}s")
    }
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + c.as_str(),
    }
}
