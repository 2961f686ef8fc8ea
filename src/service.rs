use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::billing::{BillingCollaborator, EntitlementGate};
use crate::collaborators::Collaborators;
use crate::config::Config;
use crate::context::{AssistantContext, MessageLoggerContext};
use crate::error::Result;
use crate::functions::dispatch::{FunctionDispatcher, FunctionResult};
use crate::stream::{PubSubTransport, StreamPublisher};

/// A function call as it arrives inside a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnFunctionCall {
    pub call_id: String,
    pub name: String,
    /// JSON-encoded argument object, exactly as the model produced it.
    pub arguments: String,
}

/// One request/response cycle of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub message_id: String,
    pub context: AssistantContext,
    pub logger_context: MessageLoggerContext,
    #[serde(default)]
    pub function_call: Option<TurnFunctionCall>,
    #[serde(default)]
    pub deltas: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub function_result: Option<FunctionResult>,
    pub text: String,
}

/// Entitlement gate, function dispatcher and stream publisher behind the
/// three operations the turn-processing flow calls.
pub struct AssistantService {
    gate: EntitlementGate,
    dispatcher: FunctionDispatcher,
    publisher: StreamPublisher,
}

impl AssistantService {
    pub fn new(
        config: &Config,
        billing: Arc<dyn BillingCollaborator>,
        collaborators: Collaborators,
        transport: Arc<dyn PubSubTransport>,
    ) -> Self {
        Self {
            gate: EntitlementGate::new(billing, config),
            dispatcher: FunctionDispatcher::new(collaborators),
            publisher: StreamPublisher::new(transport, config.stream.topic.clone()),
        }
    }

    pub async fn validate_and_report_usage(&self, context: &AssistantContext) -> Result<()> {
        self.gate.validate_and_report_usage(context).await
    }

    pub async fn execute_function(
        &self,
        call_id: &str,
        function_name: &str,
        arguments_json: &str,
        context: &AssistantContext,
        logger_context: &MessageLoggerContext,
    ) -> Result<FunctionResult> {
        self.dispatcher
            .execute_function(call_id, function_name, arguments_json, context, logger_context)
            .await
    }

    pub async fn on_message_updated(
        &self,
        thread_id: &str,
        message_id: &str,
        text_delta: &str,
        snapshot: &str,
        completed: bool,
    ) {
        self.publisher
            .on_message_updated(thread_id, message_id, text_delta, snapshot, completed)
            .await
    }

    pub fn publisher(&self) -> &StreamPublisher {
        &self.publisher
    }

    /// Gate the turn, run its function call if any, then stream its text.
    /// Any gate or dispatch error ends the turn before streaming starts.
    pub async fn run_turn(&self, turn: &Turn) -> Result<TurnOutcome> {
        let thread_id = &turn.logger_context.thread_id;
        self.validate_and_report_usage(&turn.context).await?;

        let function_result = match &turn.function_call {
            Some(call) => Some(
                self.execute_function(
                    &call.call_id,
                    &call.name,
                    &call.arguments,
                    &turn.context,
                    &turn.logger_context,
                )
                .await?,
            ),
            None => None,
        };

        let mut stream = self.publisher.begin(thread_id.as_str(), turn.message_id.as_str());
        for delta in &turn.deltas {
            stream.push(delta).await;
        }
        let text = stream.finish().await;

        info!(
            thread_id = %thread_id,
            message_id = %turn.message_id,
            function = turn.function_call.as_ref().map(|c| c.name.as_str()).unwrap_or("-"),
            "turn completed"
        );
        Ok(TurnOutcome { function_result, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::memory::{InMemoryBilling, InMemoryWorkspace};
    use crate::context::fixtures::{context, logger_context, THREAD_ID, WORKSPACE_ID};
    use crate::error::AssistantError;
    use crate::stream::{BroadcastTransport, MessageUpdateEvent, Published};
    use tokio::sync::broadcast;

    struct Harness {
        service: AssistantService,
        billing: Arc<InMemoryBilling>,
        workspace: Arc<InMemoryWorkspace>,
        rx: broadcast::Receiver<Published>,
    }

    fn harness() -> Harness {
        let billing = Arc::new(InMemoryBilling::new());
        let workspace = Arc::new(InMemoryWorkspace::new());
        let transport = Arc::new(BroadcastTransport::new(64));
        let rx = transport.subscribe();
        let collaborators = Collaborators::from_workspace(&workspace);
        let service = AssistantService::new(&Config::default(), billing.clone(), collaborators, transport);
        Harness {
            service,
            billing,
            workspace,
            rx,
        }
    }

    fn events(rx: &mut broadcast::Receiver<Published>) -> Vec<MessageUpdateEvent> {
        let mut out = Vec::new();
        while let Ok(p) = rx.try_recv() {
            out.push(serde_json::from_str(&p.payload).unwrap());
        }
        out
    }

    fn turn(allow: bool, function_call: Option<TurnFunctionCall>) -> Turn {
        Turn {
            message_id: "msg-1".into(),
            context: context(allow),
            logger_context: logger_context(),
            function_call,
            deltas: vec!["Creating ".into(), "your project.".into()],
        }
    }

    #[tokio::test]
    async fn facade_publishes_on_configured_topic() {
        let mut h = harness();
        h.service
            .on_message_updated("t1", "m1", "Hello", "Hello", false)
            .await;
        let p = h.rx.try_recv().unwrap();
        assert_eq!(p.topic, "assistantMessageUpdated");
        assert_eq!(h.service.publisher().topic(), "assistantMessageUpdated");
    }

    #[tokio::test]
    async fn full_turn_gates_dispatches_and_streams() {
        let mut h = harness();
        let call = TurnFunctionCall {
            call_id: "call-1".into(),
            name: "createProject".into(),
            arguments: r#"{"projectName":"Shop"}"#.into(),
        };

        let outcome = h.service.run_turn(&turn(true, Some(call))).await.unwrap();

        assert_eq!(h.billing.usage(WORKSPACE_ID, "jovu-requests"), 1);
        assert_eq!(h.workspace.calls_to("createProject"), vec!["Shop"]);
        assert_eq!(outcome.function_result.unwrap().call_id, "call-1");
        assert_eq!(outcome.text, "Creating your project.");

        let events = events(&mut h.rx);
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.thread_id == THREAD_ID && e.id == "msg-1"));
        assert!(events.last().unwrap().completed);
    }

    #[tokio::test]
    async fn disabled_workspace_stops_turn_before_anything_happens() {
        let mut h = harness();
        let call = TurnFunctionCall {
            call_id: "call-1".into(),
            name: "createProject".into(),
            arguments: r#"{"projectName":"Shop"}"#.into(),
        };

        let err = h.service.run_turn(&turn(false, Some(call))).await.unwrap_err();

        assert!(matches!(err, AssistantError::FeatureDisabled));
        assert!(h.billing.calls().is_empty());
        assert!(h.workspace.calls().is_empty());
        assert!(events(&mut h.rx).is_empty());
    }

    #[tokio::test]
    async fn dispatch_error_surfaces_and_skips_streaming() {
        let mut h = harness();
        let call = TurnFunctionCall {
            call_id: "call-1".into(),
            name: "launchRocket".into(),
            arguments: "{}".into(),
        };

        let err = h.service.run_turn(&turn(true, Some(call))).await.unwrap_err();

        assert!(matches!(err, AssistantError::UnknownFunction(_)));
        assert_eq!(h.billing.usage(WORKSPACE_ID, "jovu-requests"), 1);
        assert!(events(&mut h.rx).is_empty());
    }

    #[tokio::test]
    async fn text_only_turn() {
        let mut h = harness();
        let outcome = h.service.run_turn(&turn(true, None)).await.unwrap();
        assert!(outcome.function_result.is_none());
        assert!(h.workspace.calls().is_empty());
        assert_eq!(events(&mut h.rx).len(), 3);
    }

    #[test]
    fn turn_deserializes_without_optional_parts() {
        let json = serde_json::json!({
            "messageId": "m",
            "context": serde_json::to_value(context(true)).unwrap(),
            "loggerContext": serde_json::to_value(logger_context()).unwrap(),
        });
        let turn: Turn = serde_json::from_value(json).unwrap();
        assert!(turn.function_call.is_none());
        assert!(turn.deltas.is_empty());
    }
}
