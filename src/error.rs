use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("AI-powered features are disabled for this workspace")]
    FeatureDisabled,

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("malformed arguments for {function}: {reason}")]
    MalformedArguments { function: String, reason: String },

    #[error("{operation} failed: {message}")]
    Collaborator { operation: String, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("publish error: {0}")]
    Publish(String),
}

impl AssistantError {
    pub fn malformed(function: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedArguments {
            function: function.into(),
            reason: reason.into(),
        }
    }

    pub fn collaborator(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether the message can be shown to the end user as-is.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::FeatureDisabled | Self::UnknownFunction(_) | Self::MalformedArguments { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AssistantError>;
