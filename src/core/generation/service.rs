use tracing::{info, warn};

use super::{
    GeneratedAppRecord, GenerationError, GenerationStatus, GenerationSummary, StatusUpdate,
    detect_fhir_resources, is_valid_status_transition, validate_generated_app_input,
};
use crate::core::store::Store;

/// Persistence-facing operations on generation jobs.
#[derive(Clone)]
pub struct GenerationService {
    store: Store,
}

impl GenerationService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Validate, detect resources and persist a PENDING job.
    pub async fn create_generation(
        &self,
        prompt: &str,
        user_id: &str,
        template_id: Option<&str>,
    ) -> Result<GenerationSummary, GenerationError> {
        let validation = validate_generated_app_input(prompt, user_id);
        if !validation.valid {
            return Err(GenerationError::Validation(validation.errors));
        }

        let prompt = prompt.trim();
        let resources = detect_fhir_resources(prompt);
        let record = self
            .store
            .create_generated_app(prompt, user_id, &resources, template_id)
            .await?;

        info!(
            "Created generation {} for user {} ({} FHIR resources)",
            record.id,
            user_id,
            record.fhir_resources.len()
        );
        Ok(record.summary())
    }

    pub async fn get_status(&self, id: &str) -> Result<GeneratedAppRecord, GenerationError> {
        self.store
            .get_generated_app(id)
            .await?
            .ok_or_else(|| GenerationError::NotFound(id.to_string()))
    }

    /// Move a job to `new_status`, merging the optional fields of `update`.
    ///
    /// The write only lands if the job is still in the status it was read
    /// in, so two writers racing on the same job cannot both succeed.
    pub async fn update_status(
        &self,
        id: &str,
        new_status: GenerationStatus,
        update: StatusUpdate,
    ) -> Result<GeneratedAppRecord, GenerationError> {
        let current = self.get_status(id).await?;
        if !is_valid_status_transition(current.status, new_status) {
            return Err(GenerationError::InvalidTransition {
                from: current.status,
                to: new_status,
            });
        }

        let applied = self
            .store
            .transition_generated_app(id, current.status, new_status, &update)
            .await?;
        if !applied {
            let latest = self.get_status(id).await?;
            warn!(
                "Generation {} moved to {} concurrently; {} -> {} not applied",
                id, latest.status, current.status, new_status
            );
            return Err(GenerationError::InvalidTransition {
                from: latest.status,
                to: new_status,
            });
        }

        self.get_status(id).await
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<GeneratedAppRecord>, GenerationError> {
        Ok(self.store.list_generated_apps_for_user(user_id).await?)
    }
}
