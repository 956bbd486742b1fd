//! Orchestrates one generation request: compose, complete, parse, materialize.
//!
//! Only one generation (or clear) runs at a time. The chain runs in its own
//! task that owns the single-slot guard, so a dropped HTTP request does not
//! cancel work that is already talking to the model.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use backon::{ConstantBuilder, Retryable};
use db::{
    ProjectStore, StoreError,
    models::project::{
        AttemptOutcome, FileMapping, ProjectSnapshot, ProjectStateError, PromptHistoryEntry,
        PromptKind,
    },
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::{
    ai_client::{AiGatewayError, CompletionProvider},
    archive::{ArchiveError, build_zip},
    backend_detection::{ProjectKind, detect_project_kind, matched_keywords},
    config::{FailedAttemptPolicy, GenerationConfig},
    prompt_composer::{PromptError, PromptRequest, compose},
    response_parser::{self, ParseError},
};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Please provide a prompt to generate your website.")]
    EmptyPrompt,
    #[error("Prompt is too large: {size} characters (limit {limit})")]
    PromptTooLarge { size: usize, limit: usize },
    #[error("AI service unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("AI service rate limit reached, please try again later")]
    UpstreamRateLimited,
    #[error("Could not parse the response from the AI. No files were created.")]
    MalformedResponse,
    #[error("The AI response is missing required files: {}", missing.join(", "))]
    IncompleteGeneration { missing: Vec<String> },
    #[error("Failed to write generated files: {0}")]
    DiskWriteError(#[from] StoreError),
    #[error("A generation is already in progress")]
    AlreadyGenerating,
    #[error("No website to download. Generate a website first.")]
    NothingToExport,
    #[error("No website to refine. Generate a website first.")]
    NothingToRefine,
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AiGatewayError> for GenerationError {
    fn from(e: AiGatewayError) -> Self {
        match e {
            AiGatewayError::RateLimited => Self::UpstreamRateLimited,
            AiGatewayError::EmptyResponse => Self::MalformedResponse,
            AiGatewayError::MissingApiKey { .. } | AiGatewayError::InvalidApiKey => {
                Self::Configuration(e.to_string())
            }
            AiGatewayError::Transport(_)
            | AiGatewayError::Timeout
            | AiGatewayError::Http { .. }
            | AiGatewayError::Serde(_) => Self::UpstreamUnavailable(e.to_string()),
        }
    }
}

impl From<ParseError> for GenerationError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::MalformedResponse => Self::MalformedResponse,
            ParseError::IncompleteGeneration { missing } => Self::IncompleteGeneration { missing },
        }
    }
}

impl From<PromptError> for GenerationError {
    fn from(e: PromptError) -> Self {
        match e {
            PromptError::PromptTooLarge { size, limit } => Self::PromptTooLarge { size, limit },
        }
    }
}

impl From<ProjectStateError> for GenerationError {
    fn from(_: ProjectStateError) -> Self {
        Self::AlreadyGenerating
    }
}

impl From<ArchiveError> for GenerationError {
    fn from(e: ArchiveError) -> Self {
        Self::Internal(format!("failed to build archive: {e}"))
    }
}

/// Result of a successful generate or refine
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    /// Every file now in the output directory
    pub files: Vec<String>,
    pub mode: PromptKind,
    pub kind: ProjectKind,
    pub attempts: u32,
    /// Page the preview should open
    pub main_html: Option<String>,
    pub generation: u64,
}

#[derive(Clone)]
pub struct GenerationService {
    provider: Arc<dyn CompletionProvider>,
    store: ProjectStore,
    config: GenerationConfig,
    slot: Arc<Mutex<()>>,
}

struct Job {
    prompt: String,
    mode: PromptKind,
    kind: ProjectKind,
    files: FileMapping,
    history: Vec<PromptHistoryEntry>,
}

impl GenerationService {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        store: ProjectStore,
        config: GenerationConfig,
    ) -> Self {
        Self {
            provider,
            store,
            config,
            slot: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// Start or continue the project. Refines when files already exist.
    pub async fn generate(&self, prompt: &str) -> Result<GenerationOutcome, GenerationError> {
        self.submit(prompt, None).await
    }

    pub async fn refine(&self, prompt: &str) -> Result<GenerationOutcome, GenerationError> {
        self.submit(prompt, Some(PromptKind::Refinement)).await
    }

    /// Wipe history, files and the output directory.
    pub async fn clear_all(&self) -> Result<(), GenerationError> {
        let _guard = self
            .slot
            .clone()
            .try_lock_owned()
            .map_err(|_| GenerationError::AlreadyGenerating)?;

        let mut project = self.store.project().write().await;
        self.store.output().clear().await?;
        project.clear()?;
        info!("Cleared project and output directory");
        Ok(())
    }

    /// ZIP archive of the materialized site.
    pub async fn export_zip(&self) -> Result<Vec<u8>, GenerationError> {
        if !self.store.project().read().await.has_files() {
            return Err(GenerationError::NothingToExport);
        }

        let files = self
            .store
            .output()
            .snapshot()
            .await
            .map_err(|e| GenerationError::Internal(e.to_string()))?;
        if files.is_empty() {
            return Err(GenerationError::NothingToExport);
        }

        let count = files.len();
        let bytes = tokio::task::spawn_blocking(move || build_zip(files))
            .await
            .map_err(|e| GenerationError::Internal(e.to_string()))??;
        info!(files = count, bytes = bytes.len(), "Built project archive");
        Ok(bytes)
    }

    pub async fn snapshot(&self) -> ProjectSnapshot {
        self.store.project().read().await.snapshot()
    }

    async fn submit(
        &self,
        prompt: &str,
        forced: Option<PromptKind>,
    ) -> Result<GenerationOutcome, GenerationError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let guard = self
            .slot
            .clone()
            .try_lock_owned()
            .map_err(|_| GenerationError::AlreadyGenerating)?;

        let job = {
            let mut project = self.store.project().write().await;
            let mode = match forced {
                Some(PromptKind::Refinement) if !project.has_files() => {
                    return Err(GenerationError::NothingToRefine);
                }
                Some(mode) => mode,
                None if project.has_files() => PromptKind::Refinement,
                None => PromptKind::Initial,
            };
            project.begin_generation()?;

            let mut kind = std::iter::once(prompt)
                .chain(project.history().iter().map(|entry| entry.text.as_str()))
                .map(detect_project_kind)
                .find(|kind| *kind == ProjectKind::FullStack)
                .unwrap_or(ProjectKind::Static);
            // A refinement must not drop a backend the current site already has.
            if mode == PromptKind::Refinement
                && response_parser::missing_files(project.files(), ProjectKind::FullStack)
                    .is_empty()
            {
                kind = ProjectKind::FullStack;
            }

            Job {
                prompt: prompt.to_string(),
                mode,
                kind,
                files: project.files().clone(),
                history: project.history().to_vec(),
            }
        };

        let service = self.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            service.run(job).await
        });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("Generation task failed: {}", e);
                let message = format!("generation task failed: {e}");
                self.store
                    .project()
                    .write()
                    .await
                    .fail_generation(None, message.clone());
                Err(GenerationError::Internal(message))
            }
        }
    }

    async fn run(&self, job: Job) -> Result<GenerationOutcome, GenerationError> {
        info!(
            provider = self.provider.name(),
            mode = %job.mode,
            kind = %job.kind,
            keywords = ?matched_keywords(&job.prompt),
            "Starting generation"
        );

        let attempts = AtomicU32::new(0);
        let result = match self.generate_with_retry(&job, &attempts).await {
            Ok(files) => self
                .store
                .output()
                .replace_all(&files)
                .await
                .map(|_| files)
                .map_err(GenerationError::from),
            Err(e) => Err(e),
        };
        let attempts = attempts.load(Ordering::Relaxed);

        let mut project = self.store.project().write().await;
        match result {
            Ok(files) => {
                let outcome = GenerationOutcome {
                    files: files.filenames(),
                    mode: job.mode,
                    kind: job.kind,
                    attempts,
                    main_html: files.main_html().map(str::to_string),
                    generation: project.generation() + 1,
                };
                project.complete_generation(
                    PromptHistoryEntry::new(job.prompt, job.mode, AttemptOutcome::Succeeded),
                    files,
                );
                info!(
                    files = outcome.files.len(),
                    attempts,
                    generation = outcome.generation,
                    "Generation finished"
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!(attempts, "Generation failed: {}", e);
                let entry = match self.config.failed_attempt_policy {
                    FailedAttemptPolicy::Record => Some(PromptHistoryEntry::new(
                        job.prompt,
                        job.mode,
                        AttemptOutcome::Failed,
                    )),
                    FailedAttemptPolicy::Discard => None,
                };
                project.fail_generation(entry, e.to_string());
                Err(e)
            }
        }
    }

    /// Retry only while the model keeps leaving out required files. Each retry
    /// names the files the previous answer forgot.
    async fn generate_with_retry(
        &self,
        job: &Job,
        attempts: &AtomicU32,
    ) -> Result<FileMapping, GenerationError> {
        let missing: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let retries = self.config.max_attempts.max(1) - 1;

        (|| async {
            let amendment = missing.lock().await.clone();
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            let result = self.attempt(job, &amendment, attempt).await;
            if let Err(GenerationError::IncompleteGeneration { missing: forgot }) = &result {
                *missing.lock().await = forgot.clone();
            }
            result
        })
        .retry(
            ConstantBuilder::default()
                .with_delay(Duration::ZERO)
                .with_max_times(retries as usize),
        )
        .when(|e: &GenerationError| matches!(e, GenerationError::IncompleteGeneration { .. }))
        .notify(|e, _| warn!("Incomplete generation, asking again: {}", e))
        .await
    }

    async fn attempt(
        &self,
        job: &Job,
        missing: &[String],
        attempt: u32,
    ) -> Result<FileMapping, GenerationError> {
        let request = match job.mode {
            PromptKind::Initial => PromptRequest::initial(&job.prompt, job.kind),
            PromptKind::Refinement => {
                PromptRequest::refinement(&job.prompt, job.kind, &job.files, &job.history)
            }
        }
        .with_missing(missing);

        let composed = compose(&request, self.config.max_prompt_chars)?;
        info!(attempt, chars = composed.len(), "Requesting completion");

        let text = self.provider.complete(&composed).await?;
        let files = response_parser::parse_and_validate(&text, job.kind)?;
        Ok(files)
    }
}
