pub mod fhir;
pub mod orchestrator;
pub mod queue;
pub mod service;
pub mod types;

pub use fhir::{detect_fhir_resources, validate_fhir_resources};
pub use orchestrator::Orchestrator;
pub use queue::GenerationQueue;
pub use service::GenerationService;
pub use types::{
    GeneratedAppRecord, GeneratedCode, GeneratedFile, GenerationStatus, GenerationSummary,
    StatusUpdate,
};

use crate::core::validation::ValidationResult;

pub const MIN_PROMPT_CHARS: usize = 20;
pub const MAX_PROMPT_CHARS: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("generation {0} not found")]
    NotFound(String),
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: GenerationStatus,
        to: GenerationStatus,
    },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Forward-only lifecycle of a generation job. Self-transitions and anything
/// leaving a terminal state are rejected.
pub fn is_valid_status_transition(from: GenerationStatus, to: GenerationStatus) -> bool {
    match from {
        GenerationStatus::Pending => {
            matches!(to, GenerationStatus::Analyzing | GenerationStatus::Failed)
        }
        GenerationStatus::Analyzing => {
            matches!(to, GenerationStatus::Generating | GenerationStatus::Failed)
        }
        GenerationStatus::Generating => {
            matches!(to, GenerationStatus::Deploying | GenerationStatus::Failed)
        }
        GenerationStatus::Deploying => {
            matches!(to, GenerationStatus::Completed | GenerationStatus::Failed)
        }
        GenerationStatus::Completed | GenerationStatus::Failed => false,
    }
}

/// Check a generation request, collecting every violated rule.
pub fn validate_generated_app_input(prompt: &str, user_id: &str) -> ValidationResult {
    let mut errors = Vec::new();
    let trimmed = prompt.trim();

    if trimmed.is_empty() {
        errors.push("Prompt is required".to_string());
    } else {
        let len = trimmed.chars().count();
        if len < MIN_PROMPT_CHARS {
            errors.push(format!(
                "Prompt must be at least {} characters",
                MIN_PROMPT_CHARS
            ));
        }
        if len > MAX_PROMPT_CHARS {
            errors.push(format!(
                "Prompt must be at most {} characters",
                MAX_PROMPT_CHARS
            ));
        }
    }

    if user_id.trim().is_empty() {
        errors.push("User ID is required".to_string());
    }

    ValidationResult::from_errors(errors)
}
