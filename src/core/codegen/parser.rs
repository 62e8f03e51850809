use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::core::generation::{GeneratedCode, GeneratedFile};

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("valid fence regex"));
static BRACE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("valid brace regex"));
static APP_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("valid app name regex"));

const REQUIRED_KEYS: [&str; 3] = ["appName", "components", "pages"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeParseError {
    #[error("No JSON found in model response")]
    NoJson,
    #[error("Invalid JSON in model response: {0}")]
    InvalidJson(String),
    #[error("Generated code is missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("Generated code has an unexpected shape: {0}")]
    InvalidShape(String),
}

/// Lint outcome for a parsed bundle. Errors are fatal, warnings are not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CodeValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

fn extract_json_text(text: &str) -> Option<&str> {
    if let Some(inner) = FENCED_BLOCK.captures(text).and_then(|c| c.get(1)) {
        return Some(inner.as_str().trim());
    }
    BRACE_SPAN.find(text).map(|m| m.as_str())
}

/// Pull a code bundle out of free-form model output.
///
/// A fenced block wins over bare braces; inside the chosen text the JSON
/// must parse and carry `appName`, `components` and `pages`.
pub fn parse_generated_code(text: &str) -> Result<GeneratedCode, CodeParseError> {
    let json_text = extract_json_text(text).ok_or(CodeParseError::NoJson)?;
    let value: Value = serde_json::from_str(json_text)
        .map_err(|e| CodeParseError::InvalidJson(e.to_string()))?;

    let Some(object) = value.as_object() else {
        return Err(CodeParseError::InvalidShape(
            "top-level value is not an object".to_string(),
        ));
    };
    let missing: Vec<String> = REQUIRED_KEYS
        .iter()
        .filter(|key| !object.contains_key(**key))
        .map(|key| key.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(CodeParseError::MissingFields(missing));
    }

    serde_json::from_value(value).map_err(|e| CodeParseError::InvalidShape(e.to_string()))
}

fn check_file(kind: &str, index: usize, file: &GeneratedFile, errors: &mut Vec<String>) {
    let label = if file.name.is_empty() {
        format!("{} #{}", kind, index + 1)
    } else {
        format!("{} '{}'", kind, file.name)
    };
    if file.name.trim().is_empty() {
        errors.push(format!("{} is missing a name", label));
    }
    if file.path.trim().is_empty() {
        errors.push(format!("{} is missing a path", label));
    } else if file.path.contains(char::is_whitespace) {
        errors.push(format!("{} path must not contain spaces: {}", label, file.path));
    }
    if file.code.trim().is_empty() {
        errors.push(format!("{} is missing code", label));
    }
}

/// Lint a parsed bundle before it is stored.
pub fn validate_generated_code(code: &GeneratedCode) -> CodeValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !APP_NAME.is_match(&code.app_name) {
        errors.push(format!(
            "appName must contain only lowercase letters, digits and hyphens: '{}'",
            code.app_name
        ));
    }
    if code.description.trim().is_empty() {
        errors.push("description is required".to_string());
    }
    if code.components.is_empty() && code.pages.is_empty() {
        errors.push("at least one component or page is required".to_string());
    }

    for (i, file) in code.components.iter().enumerate() {
        check_file("component", i, file, &mut errors);
        if file.path.ends_with(".js") || file.path.ends_with(".jsx") {
            warnings.push(format!(
                "component '{}' uses JavaScript; TypeScript (.tsx) is expected",
                file.name
            ));
        }
    }
    for (i, file) in code.pages.iter().enumerate() {
        check_file("page", i, file, &mut errors);
    }
    for (i, file) in code.api_routes.iter().enumerate() {
        check_file("api route", i, file, &mut errors);
    }

    CodeValidation {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}
