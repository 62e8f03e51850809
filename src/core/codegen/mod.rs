//! Turns a prompt and a FHIR resource list into a Next.js code bundle via
//! the configured LLM.

pub mod parser;
pub mod templates;

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::core::generation::GeneratedCode;
use crate::core::llm::{ChatMessage, LlmManager};

pub use parser::{CodeParseError, CodeValidation, parse_generated_code, validate_generated_code};
pub use templates::{StarterTemplate, best_matching_template, find_template};

#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error("LLM request failed: {0}")]
    Llm(anyhow::Error),
    #[error(transparent)]
    Parse(#[from] CodeParseError),
    #[error("Generated code failed validation: {}", .0.join("; "))]
    Lint(Vec<String>),
}

pub fn build_system_prompt<S: AsRef<str>>(fhir_resources: &[S]) -> String {
    let resources = fhir_resources
        .iter()
        .map(|r| r.as_ref())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are an expert healthcare application developer. You build FHIR R4 applications on the Medplum platform.

Generate a complete Next.js 14 application using the App Router, TypeScript and Tailwind CSS.
Use @medplum/react hooks and components for data access and @medplum/fhirtypes for resource types.

The application must work with these FHIR resources: {resources}

Rules:
- Every file is TypeScript (.ts or .tsx).
- Pages live under app/, reusable components under components/, API routes under app/api/.
- Read and write clinical data only through Medplum; never invent a separate backend.
- Keep the UI accessible and responsive.

Respond with JSON only, no prose, in exactly this shape:
{{
  "appName": "lowercase-hyphenated-name",
  "description": "One sentence describing the app",
  "components": [{{ "name": "ComponentName", "path": "components/ComponentName.tsx", "code": "..." }}],
  "pages": [{{ "name": "PageName", "path": "app/page.tsx", "code": "..." }}],
  "apiRoutes": [{{ "name": "RouteName", "path": "app/api/route-name/route.ts", "code": "..." }}]
}}"#
    )
}

pub fn build_user_message(prompt: &str, template: Option<&StarterTemplate>) -> String {
    let mut message = format!("Build this application:\n\n{}", prompt);
    if let Some(template) = template {
        message.push_str(&format!(
            "\n\nUse the \"{}\" starter as a reference for structure and style:\n",
            template.name
        ));
        for file in template.files {
            message.push_str(&format!("\n// {}\n{}", file.path, file.code));
        }
    }
    message
}

#[derive(Clone)]
pub struct CodeGenerator {
    llm: Arc<RwLock<LlmManager>>,
}

impl CodeGenerator {
    pub fn new(llm: Arc<RwLock<LlmManager>>) -> Self {
        Self { llm }
    }

    /// Ask the model for an app, then parse and lint its reply. Lint errors
    /// fail the generation; lint warnings are only logged.
    pub async fn generate_app_code(
        &self,
        prompt: &str,
        fhir_resources: &[String],
        template: Option<&StarterTemplate>,
    ) -> Result<GeneratedCode, CodegenError> {
        let messages = vec![
            ChatMessage::system(build_system_prompt(fhir_resources)),
            ChatMessage::user(build_user_message(prompt, template)),
        ];

        let reply = {
            let llm = self.llm.read().await;
            llm.generate_with_selected(&messages)
                .await
                .map_err(CodegenError::Llm)?
        };

        let code = parse_generated_code(&reply)?;
        let validation = validate_generated_code(&code);
        for warning in &validation.warnings {
            warn!("Generated app '{}': {}", code.app_name, warning);
        }
        if !validation.valid {
            return Err(CodegenError::Lint(validation.errors));
        }

        info!(
            "Generated app '{}' with {} files",
            code.app_name,
            code.file_count()
        );
        Ok(code)
    }
}
