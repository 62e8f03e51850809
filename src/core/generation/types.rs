use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    Pending,
    Analyzing,
    Generating,
    Deploying,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub const ALL: [GenerationStatus; 6] = [
        GenerationStatus::Pending,
        GenerationStatus::Analyzing,
        GenerationStatus::Generating,
        GenerationStatus::Deploying,
        GenerationStatus::Completed,
        GenerationStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GenerationStatus::Pending => "PENDING",
            GenerationStatus::Analyzing => "ANALYZING",
            GenerationStatus::Generating => "GENERATING",
            GenerationStatus::Deploying => "DEPLOYING",
            GenerationStatus::Completed => "COMPLETED",
            GenerationStatus::Failed => "FAILED",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(GenerationStatus::Pending),
            "ANALYZING" => Some(GenerationStatus::Analyzing),
            "GENERATING" => Some(GenerationStatus::Generating),
            "DEPLOYING" => Some(GenerationStatus::Deploying),
            "COMPLETED" => Some(GenerationStatus::Completed),
            "FAILED" => Some(GenerationStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file of a generated app. Fields default to empty so that the linter,
/// not the deserializer, reports incomplete entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCode {
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub components: Vec<GeneratedFile>,
    #[serde(default)]
    pub pages: Vec<GeneratedFile>,
    #[serde(default)]
    pub api_routes: Vec<GeneratedFile>,
}

impl GeneratedCode {
    pub fn file_count(&self) -> usize {
        self.components.len() + self.pages.len() + self.api_routes.len()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAppRecord {
    pub id: String,
    pub prompt: String,
    pub user_id: String,
    pub status: GenerationStatus,
    pub fhir_resources: Vec<String>,
    pub template_id: Option<String>,
    pub generated_code: Option<GeneratedCode>,
    pub github_repo_url: Option<String>,
    pub sandbox_url: Option<String>,
    pub medplum_project_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl GeneratedAppRecord {
    pub fn summary(&self) -> GenerationSummary {
        GenerationSummary {
            id: self.id.clone(),
            status: self.status,
            fhir_resources: self.fhir_resources.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSummary {
    pub id: String,
    pub status: GenerationStatus,
    pub fhir_resources: Vec<String>,
}

/// Optional fields merged into a job alongside a status write. `None` keeps
/// the persisted value.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub error_message: Option<String>,
    pub sandbox_url: Option<String>,
    pub github_repo_url: Option<String>,
    pub medplum_project_id: Option<String>,
    pub generated_code: Option<GeneratedCode>,
}

impl StatusUpdate {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_code(code: GeneratedCode) -> Self {
        Self {
            generated_code: Some(code),
            ..Self::default()
        }
    }
}
