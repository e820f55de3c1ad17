//! Multi-step procedures built from [`TrainingApi`] calls: wiping the stored
//! utterances and rebuilding an app's intents and utterances from a corpus.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    api::{BatchResult, Page, TrainingApi},
    corpus::Corpus,
    error::{WitError, WitResult},
    pacing::Pacing,
};

/// Most utterances fetched by a single bulk deletion.
pub const MAX_UTTERANCES: u32 = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Deletes every stored utterance (up to [`MAX_UTTERANCES`]) in one request.
///
/// Nothing stored means no delete request and `{sent: true, n: 0}`.
/// Deletion is keyed by text, so utterances sharing a text go together.
pub async fn delete_all_utterances<A: TrainingApi + ?Sized>(api: &A) -> WitResult<BatchResult> {
    let texts: Vec<String> = api
        .list_utterances(Page::first(MAX_UTTERANCES))
        .await?
        .into_iter()
        .map(|utterance| utterance.text)
        .collect();
    debug!(count = texts.len(), "fetched utterances to delete");

    if texts.is_empty() {
        return Ok(BatchResult::empty());
    }

    api.delete_utterances(&texts).await
}

/// What a failing step does to the rest of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnError {
    /// Record the failure and move on to the next item.
    Continue,
    /// Stop the workflow and return the failure.
    Abort,
}

/// Per-step error handling of [`Trainer::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingPolicy {
    pub purge_utterances: OnError,
    pub delete_intents: OnError,
    pub create_intents: OnError,
    pub upload: OnError,
}

impl Default for TrainingPolicy {
    fn default() -> Self {
        Self {
            purge_utterances: OnError::Continue,
            delete_intents: OnError::Continue,
            create_intents: OnError::Continue,
            upload: OnError::Abort,
        }
    }
}

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("failed to delete existing utterances")]
    PurgeUtterances(#[source] WitError),

    #[error("failed to list existing intents")]
    ListIntents(#[source] WitError),

    #[error("failed to delete intent {name}")]
    DeleteIntent {
        name: String,
        #[source]
        source: WitError,
    },

    #[error("failed to create intent {name}")]
    CreateIntent {
        name: String,
        #[source]
        source: WitError,
    },

    #[error("batch {batch} of {total} failed to upload")]
    UploadBatch {
        batch: usize,
        total: usize,
        #[source]
        source: WitError,
    },
}

/// A run stopped by a step under [`OnError::Abort`]. `report` holds what
/// was done before the stop, including failures tolerated earlier.
#[derive(Error, Debug)]
#[error("training aborted")]
pub struct TrainingAborted {
    #[source]
    pub cause: TrainingError,
    pub report: TrainingReport,
}

/// Progress of a [`Trainer::run`].
#[derive(Debug, Default)]
pub struct TrainingReport {
    pub utterances_purged: usize,
    pub intents_deleted: Vec<String>,
    pub intents_created: Vec<String>,
    /// Intents the API reported as already existing.
    pub intents_existing: Vec<String>,
    /// Sizes of the batches that were uploaded, in order.
    pub batches_uploaded: Vec<usize>,
    /// Failures tolerated under [`OnError::Continue`].
    pub failures: Vec<TrainingError>,
}

impl TrainingReport {
    pub fn utterances_uploaded(&self) -> usize {
        self.batches_uploaded.iter().sum()
    }
}

/// Resets an app and retrains it from a [`Corpus`].
///
/// Steps, in order: delete all utterances, delete every intent, create the
/// corpus intents, upload the corpus utterances in batches.
#[derive(Debug, Clone)]
pub struct Trainer {
    batch_size: usize,
    intent_pacing: Pacing,
    batch_pacing: Pacing,
    policy: TrainingPolicy,
}

impl Default for Trainer {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            intent_pacing: Pacing::fixed_secs(1),
            batch_pacing: Pacing::fixed_secs(2),
            policy: TrainingPolicy::default(),
        }
    }
}

impl Trainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Pause between intent deletions and between intent creations.
    pub fn intent_pacing(mut self, pacing: Pacing) -> Self {
        self.intent_pacing = pacing;
        self
    }

    /// Pause between utterance batches.
    pub fn batch_pacing(mut self, pacing: Pacing) -> Self {
        self.batch_pacing = pacing;
        self
    }

    pub fn policy(mut self, policy: TrainingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn run<A: TrainingApi + ?Sized>(
        &self,
        api: &A,
        corpus: &Corpus,
    ) -> Result<TrainingReport, TrainingAborted> {
        let mut report = TrainingReport::default();

        if let Err(cause) = self.run_steps(api, corpus, &mut report).await {
            warn!(error = %cause, tolerated = report.failures.len(), "training aborted");
            return Err(TrainingAborted { cause, report });
        }

        info!(
            intents = report.intents_created.len() + report.intents_existing.len(),
            utterances = report.utterances_uploaded(),
            failures = report.failures.len(),
            "training completed"
        );
        Ok(report)
    }

    async fn run_steps<A: TrainingApi + ?Sized>(
        &self,
        api: &A,
        corpus: &Corpus,
        report: &mut TrainingReport,
    ) -> Result<(), TrainingError> {
        self.purge_utterances(api, report).await?;
        self.delete_intents(api, report).await?;
        self.create_intents(api, corpus, report).await?;
        self.upload_utterances(api, corpus, report).await
    }

    async fn purge_utterances<A: TrainingApi + ?Sized>(
        &self,
        api: &A,
        report: &mut TrainingReport,
    ) -> Result<(), TrainingError> {
        info!("deleting all utterances");
        match delete_all_utterances(api).await {
            Ok(result) => {
                info!(count = result.n, "deleted utterances");
                report.utterances_purged = result.n;
                Ok(())
            }
            Err(e) => tolerate(
                self.policy.purge_utterances,
                TrainingError::PurgeUtterances(e),
                report,
            ),
        }
    }

    async fn delete_intents<A: TrainingApi + ?Sized>(
        &self,
        api: &A,
        report: &mut TrainingReport,
    ) -> Result<(), TrainingError> {
        info!("deleting all intents");
        let intents = match api.list_intents().await {
            Ok(intents) => intents,
            Err(e) => {
                return tolerate(
                    self.policy.delete_intents,
                    TrainingError::ListIntents(e),
                    report,
                )
            }
        };

        for (step, intent) in intents.iter().enumerate() {
            if step > 0 {
                self.intent_pacing.pause(step - 1).await;
            }
            match api.delete_intent(&intent.name).await {
                Ok(_) => {
                    info!(intent = %intent.name, "deleted intent");
                    report.intents_deleted.push(intent.name.clone());
                }
                Err(source) => tolerate(
                    self.policy.delete_intents,
                    TrainingError::DeleteIntent {
                        name: intent.name.clone(),
                        source,
                    },
                    report,
                )?,
            }
        }
        Ok(())
    }

    async fn create_intents<A: TrainingApi + ?Sized>(
        &self,
        api: &A,
        corpus: &Corpus,
        report: &mut TrainingReport,
    ) -> Result<(), TrainingError> {
        info!("creating intents");
        for (step, name) in corpus.intent_names().into_iter().enumerate() {
            if step > 0 {
                self.intent_pacing.pause(step - 1).await;
            }
            match api.create_intent(&name).await {
                Ok(_) => {
                    info!(intent = %name, "created intent");
                    report.intents_created.push(name);
                }
                Err(e) if e.is_already_exists() => {
                    info!(intent = %name, "intent exists");
                    report.intents_existing.push(name);
                }
                Err(source) => tolerate(
                    self.policy.create_intents,
                    TrainingError::CreateIntent { name, source },
                    report,
                )?,
            }
        }
        Ok(())
    }

    async fn upload_utterances<A: TrainingApi + ?Sized>(
        &self,
        api: &A,
        corpus: &Corpus,
        report: &mut TrainingReport,
    ) -> Result<(), TrainingError> {
        let utterances = corpus.utterances();
        let total = utterances.len().div_ceil(self.batch_size);
        info!(utterances = utterances.len(), batches = total, "uploading utterances");

        for (index, batch) in utterances.chunks(self.batch_size).enumerate() {
            if index > 0 {
                self.batch_pacing.pause(index - 1).await;
            }
            match api.upload_utterances(batch).await {
                Ok(_) => {
                    info!(batch = index + 1, size = batch.len(), "uploaded batch");
                    report.batches_uploaded.push(batch.len());
                }
                Err(source) => tolerate(
                    self.policy.upload,
                    TrainingError::UploadBatch {
                        batch: index + 1,
                        total,
                        source,
                    },
                    report,
                )?,
            }
        }
        Ok(())
    }
}

fn tolerate(
    on_error: OnError,
    error: TrainingError,
    report: &mut TrainingReport,
) -> Result<(), TrainingError> {
    match on_error {
        OnError::Abort => Err(error),
        OnError::Continue => {
            warn!(error = %error, cause = %error_cause(&error), "continuing after failure");
            report.failures.push(error);
            Ok(())
        }
    }
}

fn error_cause(error: &TrainingError) -> String {
    std::error::Error::source(error)
        .map(ToString::to_string)
        .unwrap_or_default()
}
