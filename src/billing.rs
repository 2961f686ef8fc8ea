use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context::AssistantContext;
use crate::error::{AssistantError, Result};

/// A workspace's metered allowance for one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub feature_id: String,
    pub has_access: bool,
    /// `None` means unmetered.
    #[serde(default)]
    pub usage_limit: Option<u64>,
    #[serde(default)]
    pub current_usage: u64,
}

impl Entitlement {
    pub fn remaining(&self) -> Option<u64> {
        self.usage_limit
            .map(|limit| limit.saturating_sub(self.current_usage))
    }
}

#[async_trait]
pub trait BillingCollaborator: Send + Sync {
    async fn get_metered_entitlement(
        &self,
        workspace_id: &str,
        feature_id: &str,
    ) -> Result<Entitlement>;

    async fn report_usage(&self, workspace_id: &str, feature_id: &str) -> Result<()>;
}

/// Guards every assistant turn: rejects workspaces without AI features and
/// meters one request per turn against the billing backend.
///
/// Quota is not enforced here; the billing backend owns that decision.
pub struct EntitlementGate {
    billing: Arc<dyn BillingCollaborator>,
    feature_id: String,
    assistant_enabled: bool,
    billing_enabled: bool,
}

impl EntitlementGate {
    pub fn new(billing: Arc<dyn BillingCollaborator>, config: &Config) -> Self {
        Self {
            billing,
            feature_id: config.billing.feature_id.clone(),
            assistant_enabled: config.assistant_enabled,
            billing_enabled: config.billing.enabled,
        }
    }

    pub fn feature_id(&self) -> &str {
        &self.feature_id
    }

    pub async fn validate_and_report_usage(&self, context: &AssistantContext) -> Result<()> {
        let workspace_id = context.workspace_id();

        if !self.assistant_enabled || !context.llm_features_allowed() {
            warn!(workspace_id, "assistant request rejected: AI features disabled");
            return Err(AssistantError::FeatureDisabled);
        }

        if !self.billing_enabled {
            debug!(workspace_id, "billing disabled, skipping usage report");
            return Ok(());
        }

        let entitlement = self
            .billing
            .get_metered_entitlement(workspace_id, &self.feature_id)
            .await?;

        if let Some(remaining) = entitlement.remaining() {
            debug!(
                workspace_id,
                feature = %self.feature_id,
                remaining,
                has_access = entitlement.has_access,
                "metered entitlement"
            );
        }

        self.billing
            .report_usage(workspace_id, &self.feature_id)
            .await?;

        info!(workspace_id, feature = %self.feature_id, "assistant usage reported");
        Ok(())
    }
}
