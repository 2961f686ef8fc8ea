pub mod billing;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod error;
pub mod functions;
pub mod service;
pub mod stream;

pub use error::{AssistantError, Result};
