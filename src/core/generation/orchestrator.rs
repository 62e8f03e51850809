use anyhow::Result;
use tracing::{error, info, warn};

use super::queue::GenerationQueue;
use super::{GenerationError, GenerationService, GenerationStatus, GenerationSummary, StatusUpdate};
use crate::core::codegen::{CodeGenerator, StarterTemplate, best_matching_template, find_template};

/// Drives a job through analyze -> generate -> deploy -> complete.
#[derive(Clone)]
pub struct Orchestrator {
    service: GenerationService,
    generator: CodeGenerator,
    queue: GenerationQueue,
}

impl Orchestrator {
    pub fn new(service: GenerationService, generator: CodeGenerator, queue: GenerationQueue) -> Self {
        Self {
            service,
            generator,
            queue,
        }
    }

    pub fn service(&self) -> &GenerationService {
        &self.service
    }

    pub async fn start_generation(
        &self,
        prompt: &str,
        user_id: &str,
        template_id: Option<&str>,
    ) -> Result<GenerationSummary, GenerationError> {
        self.service
            .create_generation(prompt, user_id, template_id)
            .await
    }

    /// Create the job and hand it to the queue. The caller gets the PENDING
    /// summary back without waiting for any processing.
    pub async fn run_generation(
        &self,
        prompt: &str,
        user_id: &str,
        template_id: Option<&str>,
    ) -> Result<GenerationSummary, GenerationError> {
        let summary = self.start_generation(prompt, user_id, template_id).await?;
        if let Err(e) = self.queue.enqueue(&summary.id) {
            error!("Failed to enqueue generation {}: {}", summary.id, e);
            self.fail(&summary.id, &e.to_string()).await;
            return Err(e.into());
        }
        Ok(summary)
    }

    /// Run one job to a terminal state. Never returns an error: failures are
    /// written to the job as FAILED.
    pub async fn process_generation(&self, job_id: &str) {
        let job = match self.service.get_status(job_id).await {
            Ok(job) => job,
            Err(GenerationError::NotFound(_)) => {
                warn!("Generation {} not found, skipping", job_id);
                return;
            }
            Err(e) => {
                error!("Failed to load generation {}: {}", job_id, e);
                return;
            }
        };

        match self
            .service
            .update_status(job_id, GenerationStatus::Analyzing, StatusUpdate::default())
            .await
        {
            Ok(_) => {}
            Err(GenerationError::InvalidTransition { from, .. }) => {
                info!("Generation {} is {}, not PENDING; skipping", job_id, from);
                return;
            }
            Err(e) => {
                error!("Failed to claim generation {}: {}", job_id, e);
                self.fail(job_id, &e.to_string()).await;
                return;
            }
        }

        let template = resolve_template(job.template_id.as_deref(), &job.fhir_resources);
        if let Err(e) = self.run_steps(job_id, &job.prompt, &job.fhir_resources, template).await {
            error!("Generation {} failed: {}", job_id, e);
            self.fail(job_id, &e.to_string()).await;
        }
    }

    async fn run_steps(
        &self,
        job_id: &str,
        prompt: &str,
        fhir_resources: &[String],
        template: Option<&StarterTemplate>,
    ) -> Result<()> {
        self.service
            .update_status(job_id, GenerationStatus::Generating, StatusUpdate::default())
            .await?;

        let code = self
            .generator
            .generate_app_code(prompt, fhir_resources, template)
            .await?;

        // Deployment is not wired up yet; the bundle is stored as-is.
        self.service
            .update_status(job_id, GenerationStatus::Deploying, StatusUpdate::with_code(code))
            .await?;

        self.service
            .update_status(job_id, GenerationStatus::Completed, StatusUpdate::default())
            .await?;
        info!("Generation {} completed", job_id);
        Ok(())
    }

    async fn fail(&self, job_id: &str, message: &str) {
        match self.service.get_status(job_id).await {
            Ok(job) if job.status.is_terminal() => {}
            Ok(_) => {
                if let Err(e) = self
                    .service
                    .update_status(job_id, GenerationStatus::Failed, StatusUpdate::failed(message))
                    .await
                {
                    error!("Failed to mark generation {} as FAILED: {}", job_id, e);
                }
            }
            Err(e) => error!("Failed to reload generation {}: {}", job_id, e),
        }
    }
}

/// An explicit, known template wins; otherwise pick by resource overlap.
fn resolve_template(
    template_id: Option<&str>,
    fhir_resources: &[String],
) -> Option<&'static StarterTemplate> {
    if let Some(id) = template_id {
        match find_template(id) {
            Some(template) => return Some(template),
            None => warn!("Unknown template '{}', falling back to best match", id),
        }
    }
    best_matching_template(fhir_resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::testing::{RequestLog, scripted_manager};
    use crate::core::store::test_store;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    const PROMPT: &str = "Build a medication tracker for elderly patients";

    const GOOD_REPLY: &str = r#"```json
{
  "appName": "med-tracker",
  "description": "Tracks medications",
  "components": [{ "name": "MedList", "path": "components/MedList.tsx", "code": "export function MedList() {}" }],
  "pages": [{ "name": "Home", "path": "app/page.tsx", "code": "export default function Page() {}" }],
  "apiRoutes": []
}
```"#;

    fn orchestrator(replies: Vec<Result<String, String>>) -> (Orchestrator, RequestLog) {
        let (manager, requests) = scripted_manager(replies);
        let service = GenerationService::new(test_store());
        let generator = CodeGenerator::new(Arc::new(RwLock::new(manager)));
        let (queue, _receiver) = GenerationQueue::channel();
        (Orchestrator::new(service, generator, queue), requests)
    }

    #[tokio::test]
    async fn successful_run_completes_with_code() {
        let (orchestrator, requests) = orchestrator(vec![Ok(GOOD_REPLY.to_string())]);
        let summary = orchestrator.start_generation(PROMPT, "u1", None).await.unwrap();
        assert_eq!(summary.status, GenerationStatus::Pending);

        orchestrator.process_generation(&summary.id).await;

        let job = orchestrator.service().get_status(&summary.id).await.unwrap();
        assert_eq!(job.status, GenerationStatus::Completed);
        assert_eq!(job.generated_code.unwrap().app_name, "med-tracker");
        assert!(job.error_message.is_none());

        // The medication template was picked by overlap and sent along.
        let sent = requests.lock().unwrap();
        assert!(sent[0][1].content.contains("components/MedicationList.tsx"));
    }

    #[tokio::test]
    async fn explicit_template_is_used() {
        let (orchestrator, requests) = orchestrator(vec![Ok(GOOD_REPLY.to_string())]);
        let id = orchestrator
            .start_generation(PROMPT, "u1", Some("lab-results-dashboard"))
            .await
            .unwrap()
            .id;
        orchestrator.process_generation(&id).await;
        let sent = requests.lock().unwrap();
        assert!(sent[0][1].content.contains("components/ReportTable.tsx"));
    }

    #[tokio::test]
    async fn llm_failure_marks_job_failed() {
        let (orchestrator, _) = orchestrator(vec![Err("upstream unavailable".to_string())]);
        let id = orchestrator.start_generation(PROMPT, "u1", None).await.unwrap().id;
        orchestrator.process_generation(&id).await;

        let job = orchestrator.service().get_status(&id).await.unwrap();
        assert_eq!(job.status, GenerationStatus::Failed);
        assert!(job.error_message.unwrap().contains("upstream unavailable"));
        assert!(job.generated_code.is_none());
    }

    #[tokio::test]
    async fn unparseable_reply_marks_job_failed() {
        let (orchestrator, _) = orchestrator(vec![Ok("no json here".to_string())]);
        let id = orchestrator.start_generation(PROMPT, "u1", None).await.unwrap().id;
        orchestrator.process_generation(&id).await;

        let job = orchestrator.service().get_status(&id).await.unwrap();
        assert_eq!(job.status, GenerationStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("No JSON found in model response"));
    }

    #[tokio::test]
    async fn already_claimed_job_is_not_processed_again() {
        let (orchestrator, requests) = orchestrator(vec![
            Ok(GOOD_REPLY.to_string()),
            Ok(GOOD_REPLY.to_string()),
        ]);
        let id = orchestrator.start_generation(PROMPT, "u1", None).await.unwrap().id;
        orchestrator.process_generation(&id).await;
        orchestrator.process_generation(&id).await;

        assert_eq!(requests.lock().unwrap().len(), 1);
        let job = orchestrator.service().get_status(&id).await.unwrap();
        assert_eq!(job.status, GenerationStatus::Completed);
    }

    #[tokio::test]
    async fn closed_queue_fails_the_new_job() {
        let (manager, _) = scripted_manager(vec![]);
        let service = GenerationService::new(test_store());
        let generator = CodeGenerator::new(Arc::new(RwLock::new(manager)));
        let (queue, receiver) = GenerationQueue::channel();
        drop(receiver);
        let orchestrator = Orchestrator::new(service, generator, queue);

        assert!(orchestrator.run_generation(PROMPT, "u1", None).await.is_err());

        let jobs = orchestrator.service().list_for_user("u1").await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, GenerationStatus::Failed);
        assert_eq!(jobs[0].error_message.as_deref(), Some("Generation queue is closed"));
    }

    #[tokio::test]
    async fn missing_job_is_ignored() {
        let (orchestrator, requests) = orchestrator(vec![]);
        orchestrator.process_generation("does-not-exist").await;
        assert!(requests.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_template_falls_back_to_best_match() {
        let resources = vec!["Patient".to_string(), "Observation".to_string()];
        assert_eq!(
            resolve_template(Some("nope"), &resources).unwrap().id,
            "lab-results-dashboard"
        );
        assert!(resolve_template(None, &["Patient".to_string()]).is_none());
    }
}
