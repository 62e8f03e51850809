use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::Orchestrator;
use crate::core::lifecycle::LifecycleComponent;

pub type GenerationReceiver = mpsc::UnboundedReceiver<String>;

/// Sending half of the generation job queue.
#[derive(Clone)]
pub struct GenerationQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl GenerationQueue {
    pub fn channel() -> (Self, GenerationReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, job_id: &str) -> Result<()> {
        self.tx
            .send(job_id.to_string())
            .map_err(|_| anyhow::anyhow!("Generation queue is closed"))
    }
}

/// Drains the queue, running each job on its own task. At most
/// `max_concurrent` jobs run at once and a job id already in flight is
/// dropped rather than started twice.
pub struct GenerationWorker {
    receiver: Option<GenerationReceiver>,
    orchestrator: Orchestrator,
    semaphore: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    handle: Option<JoinHandle<()>>,
}

impl GenerationWorker {
    pub fn new(receiver: GenerationReceiver, orchestrator: Orchestrator, max_concurrent: usize) -> Self {
        Self {
            receiver: Some(receiver),
            orchestrator,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            handle: None,
        }
    }

    async fn run(
        mut receiver: GenerationReceiver,
        orchestrator: Orchestrator,
        semaphore: Arc<Semaphore>,
        in_flight: Arc<Mutex<HashSet<String>>>,
    ) {
        while let Some(job_id) = receiver.recv().await {
            if !in_flight.lock().await.insert(job_id.clone()) {
                warn!("Generation {} is already being processed", job_id);
                continue;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let orchestrator = orchestrator.clone();
            let in_flight = in_flight.clone();
            tokio::spawn(async move {
                orchestrator.process_generation(&job_id).await;
                in_flight.lock().await.remove(&job_id);
                drop(permit);
            });
        }
        info!("Generation queue closed");
    }
}

#[async_trait]
impl LifecycleComponent for GenerationWorker {
    async fn on_start(&mut self) -> Result<()> {
        let Some(receiver) = self.receiver.take() else {
            return Ok(());
        };
        info!(
            "Generation worker started ({} concurrent jobs)",
            self.semaphore.available_permits()
        );
        self.handle = Some(tokio::spawn(Self::run(
            receiver,
            self.orchestrator.clone(),
            self.semaphore.clone(),
            self.in_flight.clone(),
        )));
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.semaphore.close();
        info!("Generation worker stopped");
        Ok(())
    }
}
