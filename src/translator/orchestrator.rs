use log::{info, warn};
use rust_decimal::Decimal;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::client::BatchTranslationClient;
use crate::error::TranslationError;
use crate::subtitle::{self, CaptionRecord};

/// result of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationSummary {
    pub records: usize,
    pub billable_units: usize,
    pub unrecovered_batches: usize,
    pub api_cost: Decimal,
    pub total_tokens: u64,
    pub partial: bool,
}

#[derive(Debug, Clone)]
pub struct TranslatedDocument {
    pub content: String,
    pub records: Vec<CaptionRecord>,
    pub summary: TranslationSummary,
}

/// state of one orchestration run; not shared between runs
#[derive(Debug, Default)]
struct TranslationJob {
    source_records: usize,
    accumulated_unit_count: usize,
    unrecovered_batches: usize,
    finished: bool,
}

/// splits captions into batches, translates them in order and reports progress
pub struct TranslationOrchestrator {
    client: BatchTranslationClient,
    max_retries: u32,
    cancel: Option<Arc<AtomicBool>>,
    job: TranslationJob,
}

impl TranslationOrchestrator {
    pub fn new(client: BatchTranslationClient, max_retries: u32) -> Self {
        Self {
            client,
            max_retries,
            cancel: None,
            job: TranslationJob::default(),
        }
    }

    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// translates every record; output record `i` comes from input record `i`
    pub async fn translate_all<F, Fut, E>(
        &mut self,
        records: &[CaptionRecord],
        batch_size: usize,
        mut progress: F,
    ) -> Result<Vec<CaptionRecord>, TranslationError>
    where
        F: FnMut(f64) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        if batch_size == 0 {
            return Err(TranslationError::InvalidBatchSize);
        }

        self.job = TranslationJob {
            source_records: records.len(),
            ..TranslationJob::default()
        };

        report(&mut progress, 0.0).await;

        let total_batches = records.len().div_ceil(batch_size);
        let mut translated = Vec::with_capacity(records.len());

        for (done, batch) in records.chunks(batch_size).enumerate() {
            if self.is_cancelled() {
                info!("Translation cancelled after {}/{} batches", done, total_batches);
                return Err(TranslationError::Cancelled);
            }

            let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
            let outcome = self.client.translate_batch(&texts, self.max_retries).await;

            if outcome.recovered {
                self.job.accumulated_unit_count += batch.len();
            } else {
                self.job.unrecovered_batches += 1;
                warn!(
                    "Batch {}/{} left untranslated (captions {}..={})",
                    done + 1,
                    total_batches,
                    batch[0].index,
                    batch[batch.len() - 1].index
                );
            }

            translated.extend(
                batch
                    .iter()
                    .zip(outcome.texts)
                    .map(|(record, text)| record.with_text(text)),
            );

            let percent = 100.0 * (done + 1) as f64 / total_batches as f64;
            report(&mut progress, percent).await;
        }

        if records.is_empty() {
            report(&mut progress, 100.0).await;
        }

        self.job.finished = true;
        Ok(translated)
    }

    /// parse, translate and compose in one go
    pub async fn translate_document<F, Fut, E>(
        &mut self,
        text: &str,
        batch_size: usize,
        progress: F,
    ) -> Result<TranslatedDocument, TranslationError>
    where
        F: FnMut(f64) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let records = subtitle::parse(text)?;
        let translated = self.translate_all(&records, batch_size, progress).await?;
        let summary = self.summary()?;

        Ok(TranslatedDocument {
            content: subtitle::compose(&translated),
            records: translated,
            summary,
        })
    }

    /// billable units times price; only once every batch has finished
    pub fn compute_cost(&self, unit_price: Decimal) -> Result<Decimal, TranslationError> {
        if !self.job.finished {
            return Err(TranslationError::Unfinished);
        }
        Ok(Decimal::from(self.job.accumulated_unit_count as u64) * unit_price)
    }

    pub fn summary(&self) -> Result<TranslationSummary, TranslationError> {
        if !self.job.finished {
            return Err(TranslationError::Unfinished);
        }
        Ok(TranslationSummary {
            records: self.job.source_records,
            billable_units: self.job.accumulated_unit_count,
            unrecovered_batches: self.job.unrecovered_batches,
            api_cost: self.client.total_price(),
            total_tokens: self.client.total_tokens(),
            partial: self.job.unrecovered_batches > 0,
        })
    }
}

async fn report<F, Fut, E>(progress: &mut F, percent: f64)
where
    F: FnMut(f64) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    if let Err(e) = progress(percent).await {
        warn!("Progress callback failed at {:.1}%: {}", percent, e);
    }
}
