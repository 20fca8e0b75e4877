use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::error::{LifecycleError, QueueError, TranslationError};
use crate::ledger::Ledger;
use crate::lifecycle::{CompletionOutcome, FileTranslation, FileTranslations};
use crate::localization::Lang;
use crate::notify::{FileSource, MessageRef, Notifier};
use crate::rate_limiters::TranslationRateLimiter;
use crate::subtitle;
use crate::translator::{BatchTranslationClient, TranslationBackend, TranslationOrchestrator};
use crate::utils::MessageFormatter;

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// one confirmed file, waiting for a worker
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub file_translation_id: i32,
    pub chat_id: i64,
    pub progress_message: Option<MessageRef>,
    pub lang: Lang,
}

#[derive(Debug)]
pub enum JobOutcome {
    Completed(FileTranslation),
    Failed(String),
    /// someone else claimed the record, or it was cancelled first
    Skipped,
}

/// everything a worker needs, built once in main
pub struct JobDeps {
    pub file_translations: Arc<FileTranslations>,
    pub ledger: Arc<Ledger>,
    pub notifier: Arc<dyn Notifier>,
    pub files: Arc<dyn FileSource>,
    pub backend: Arc<dyn TranslationBackend>,
    pub rate_limiter: Arc<TranslationRateLimiter>,
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

/// submitting side of the job queue; cheap to clone into handlers
#[derive(Clone)]
pub struct TranslationQueue {
    sender: mpsc::Sender<TranslationRequest>,
}

impl TranslationQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TranslationRequest>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// returns immediately; never waits for the job to run
    pub fn submit(&self, request: TranslationRequest) -> Result<(), QueueError> {
        self.sender.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// a rejected request leaves its progress message untouched
    pub async fn submit_announced(
        &self,
        request: TranslationRequest,
        notifier: &dyn Notifier,
    ) -> Result<(), QueueError> {
        let progress_message = request.progress_message;
        let lang = request.lang;
        self.submit(request)?;

        if let Some(message) = progress_message {
            if let Err(e) = notifier.edit_message(message, lang.translation_queued()).await {
                warn!("Could not mark message {} as queued: {}", message.message_id, e);
            }
        }
        Ok(())
    }
}

pub struct TranslationWorker {
    id: usize,
    deps: Arc<JobDeps>,
    receiver: Arc<Mutex<mpsc::Receiver<TranslationRequest>>>,
    shutdown: Arc<AtomicBool>,
}

impl TranslationWorker {
    pub fn new(
        id: usize,
        deps: Arc<JobDeps>,
        receiver: Arc<Mutex<mpsc::Receiver<TranslationRequest>>>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            deps,
            receiver,
            shutdown,
        }
    }

    /// consumes requests until every queue handle is dropped
    pub async fn run(self) {
        info!("Translation worker {} started", self.id);
        loop {
            let next = { self.receiver.lock().await.recv().await };
            let Some(request) = next else {
                break;
            };
            if self.shutdown.load(Ordering::Relaxed) {
                info!(
                    "Worker {} dropping file translation {} during shutdown",
                    self.id, request.file_translation_id
                );
                continue;
            }

            let id = request.file_translation_id;
            match process_file(&self.deps, &request, self.shutdown.clone()).await {
                Ok(JobOutcome::Completed(record)) => info!(
                    "Worker {} completed file translation {} ({} lines billed)",
                    self.id,
                    id,
                    record.billed_lines.unwrap_or(0)
                ),
                Ok(JobOutcome::Failed(reason)) => {
                    warn!("Worker {} failed file translation {}: {}", self.id, id, reason)
                }
                Ok(JobOutcome::Skipped) => info!("Worker {} skipped file translation {}", self.id, id),
                Err(e) => error!("Worker {} lost file translation {}: {}", self.id, id, e),
            }
        }
        info!("Translation worker {} stopped", self.id);
    }
}

/// runs one file end to end: claim, download, translate, deliver, charge
pub async fn process_file(
    deps: &JobDeps,
    request: &TranslationRequest,
    cancel: Arc<AtomicBool>,
) -> Result<JobOutcome, LifecycleError> {
    let id = request.file_translation_id;
    let lang = request.lang;

    let record = match deps.file_translations.start_processing(id).await {
        Ok(record) => record,
        Err(LifecycleError::AlreadyStarted(_)) | Err(LifecycleError::InvalidTransition { .. }) => {
            return Ok(JobOutcome::Skipped);
        }
        Err(e) => return Err(e),
    };

    let progress_message = match request.progress_message {
        Some(message) => Some(message),
        None => match deps
            .notifier
            .send_message(request.chat_id, lang.translation_queued())
            .await
        {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Could not post progress message for {}: {}", id, e);
                None
            }
        },
    };

    let bytes = match deps.files.download(&record.input_file_ref).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return fail_job(deps, request, progress_message, &format!("download failed: {}", e)).await;
        }
    };

    let text = subtitle::decode_lossy(&bytes);
    let records = match subtitle::parse(&text) {
        Ok(records) => records,
        Err(e) => {
            return fail_job(deps, request, progress_message, &format!("invalid subtitle: {}", e)).await;
        }
    };

    let client = BatchTranslationClient::new(deps.backend.clone())
        .with_rate_limiter(deps.rate_limiter.clone())
        .with_base_delay(deps.retry_base_delay_ms);
    let mut orchestrator =
        TranslationOrchestrator::new(client, deps.max_retries).with_cancellation(cancel);

    let notifier = deps.notifier.clone();
    let mut last_reported: Option<f64> = None;
    let progress = move |percent: f64| {
        let notifier = notifier.clone();
        // same text twice is rejected by telegram
        let changed = last_reported.map_or(true, |last| percent.round() != last.round());
        last_reported = Some(percent);
        let text = lang.translation_progress(&MessageFormatter::progress_bar(percent), percent);
        async move {
            match progress_message {
                Some(message) if changed => notifier.edit_message(message, &text).await,
                _ => Ok(()),
            }
        }
    };

    let translated = match orchestrator
        .translate_all(&records, deps.batch_size, progress)
        .await
    {
        Ok(translated) => translated,
        Err(TranslationError::Cancelled) => {
            return fail_job(deps, request, progress_message, "interrupted by shutdown").await;
        }
        Err(e) => {
            return fail_job(deps, request, progress_message, &format!("translation failed: {}", e)).await;
        }
    };

    let summary = match orchestrator.summary() {
        Ok(summary) => summary,
        Err(e) => return fail_job(deps, request, progress_message, &e.to_string()).await,
    };
    if summary.billable_units == 0 {
        return fail_job(deps, request, progress_message, "no caption could be translated").await;
    }
    let total_cost = match orchestrator.compute_cost(record.price_unit) {
        Ok(cost) => cost,
        Err(e) => return fail_job(deps, request, progress_message, &e.to_string()).await,
    };

    let output = subtitle::compose(&translated);
    let output_name = MessageFormatter::translated_file_name(record.file_name.as_deref());
    let caption = lang.document_caption(&MessageFormatter::escape_html(&output_name));
    let output_file_ref = match deps
        .notifier
        .send_document(request.chat_id, &output_name, output.into_bytes(), &caption)
        .await
    {
        Ok(file_ref) => Some(file_ref),
        Err(e) => {
            return fail_job(deps, request, progress_message, &format!("delivery failed: {}", e)).await;
        }
    };

    let outcome = CompletionOutcome {
        output_file_ref,
        billed_lines: summary.billable_units as i32,
        total_cost,
        api_cost: summary.api_cost,
        total_tokens: summary.total_tokens as i64,
        partial: summary.partial,
    };

    let completed = match deps.file_translations.complete(id, &outcome).await {
        Ok(record) => record,
        Err(e) => {
            // the file is already with the user; leave no record in PROCESSING
            error!("Failed to record completion of {}: {}", id, e);
            if let Err(fail_err) = deps.file_translations.fail(id, "could not record completion").await {
                error!("Failed to mark {} as failed: {}", id, fail_err);
            }
            return Err(e);
        }
    };

    let balance = match deps.ledger.get_balance(completed.user_id).await {
        Ok(balance) => Some(MessageFormatter::format_money(balance)),
        Err(e) => {
            error!("Failed to read balance for user {}: {}", completed.user_id, e);
            None
        }
    };
    let text = lang.translation_complete(
        outcome.billed_lines,
        record.total_lines,
        &MessageFormatter::format_money(total_cost),
        balance.as_deref(),
        outcome.partial,
    );
    deliver_status(deps, request.chat_id, progress_message, &text).await;

    Ok(JobOutcome::Completed(completed))
}

async fn fail_job(
    deps: &JobDeps,
    request: &TranslationRequest,
    progress_message: Option<MessageRef>,
    reason: &str,
) -> Result<JobOutcome, LifecycleError> {
    deps.file_translations
        .fail(request.file_translation_id, reason)
        .await?;
    deliver_status(
        deps,
        request.chat_id,
        progress_message,
        request.lang.translation_failed(),
    )
    .await;
    Ok(JobOutcome::Failed(reason.to_string()))
}

/// final status replaces the progress message when there is one
async fn deliver_status(deps: &JobDeps, chat_id: i64, progress_message: Option<MessageRef>, text: &str) {
    let result = match progress_message {
        Some(message) => deps.notifier.edit_message(message, text).await,
        None => deps.notifier.send_message(chat_id, text).await.map(|_| ()),
    };
    if let Err(e) = result {
        warn!("Could not deliver status to chat {}: {}", chat_id, e);
    }
}
