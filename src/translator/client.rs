use log::{error, info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::backend::TranslationBackend;
use crate::error::TranslationError;
use crate::rate_limiters::TranslationRateLimiter;

pub const DELIMITER: &str = "[DELIMITER]";
pub const BASE_DELAY_MS: u64 = 1000;

/// translated texts for one batch, aligned index-for-index with the input
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub texts: Vec<String>,
    pub recovered: bool,
}

/// exponential backoff: base, 2x base, 4x base... plus up to 25% jitter
pub fn calculate_delay(base_delay_ms: u64, attempt: u32) -> Duration {
    let base_delay = base_delay_ms.saturating_mul(1 << attempt.min(16));
    let jitter = fastrand::u64(0..=base_delay / 4);
    Duration::from_millis(base_delay + jitter)
}

/// joins caption texts into one query; the delimiter is scrubbed from content first
pub fn pack(texts: &[String]) -> String {
    texts
        .iter()
        .map(|t| t.replace(DELIMITER, ""))
        .collect::<Vec<_>>()
        .join(&format!("\n{}\n", DELIMITER))
}

/// splits an answer back into exactly `expected` segments
pub fn unpack(answer: &str, expected: usize) -> Result<Vec<String>, TranslationError> {
    let mut segments: Vec<String> = answer.split(DELIMITER).map(clean_segment).collect();

    // models sometimes close with a stray delimiter
    if segments.len() == expected + 1 && segments.last().is_some_and(|s| s.is_empty()) {
        segments.pop();
    }

    if segments.len() != expected {
        return Err(TranslationError::Alignment {
            expected,
            got: segments.len(),
        });
    }
    Ok(segments)
}

fn clean_segment(segment: &str) -> String {
    let stripped = segment.replace("<output>", "").replace("</output>", "");
    // a blank line would split the caption block when composed
    stripped
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// sends batches to a backend, retrying and accumulating usage
pub struct BatchTranslationClient {
    backend: Arc<dyn TranslationBackend>,
    rate_limiter: Option<Arc<TranslationRateLimiter>>,
    base_delay_ms: u64,
    total_price: Decimal,
    total_tokens: u64,
}

impl BatchTranslationClient {
    pub fn new(backend: Arc<dyn TranslationBackend>) -> Self {
        Self {
            backend,
            rate_limiter: None,
            base_delay_ms: BASE_DELAY_MS,
            total_price: Decimal::ZERO,
            total_tokens: 0,
        }
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<TranslationRateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn with_base_delay(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn total_price(&self) -> Decimal {
        self.total_price
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    /// never fails: an exhausted batch comes back as empty strings, flagged unrecovered
    pub async fn translate_batch(&mut self, texts: &[String], max_retries: u32) -> BatchOutcome {
        if texts.is_empty() {
            return BatchOutcome {
                texts: Vec::new(),
                recovered: true,
            };
        }

        let query = pack(texts);

        for attempt in 0..=max_retries {
            match self.attempt(&query, texts.len()).await {
                Ok(translated) => {
                    if attempt > 0 {
                        info!(
                            "Batch of {} captions succeeded on attempt {}",
                            texts.len(),
                            attempt + 1
                        );
                    }
                    return BatchOutcome {
                        texts: translated,
                        recovered: true,
                    };
                }
                Err(e) if attempt < max_retries => {
                    let delay = calculate_delay(self.base_delay_ms, attempt);
                    warn!(
                        "Translation batch failed (attempt {}/{}): {}. Retrying in {}ms",
                        attempt + 1,
                        max_retries + 1,
                        e,
                        delay.as_millis()
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        "Translation batch of {} captions gave up after {} attempts: {}",
                        texts.len(),
                        max_retries + 1,
                        e
                    );
                }
            }
        }

        BatchOutcome {
            texts: vec![String::new(); texts.len()],
            recovered: false,
        }
    }

    async fn attempt(&mut self, query: &str, expected: usize) -> Result<Vec<String>, TranslationError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.wait_for_api_call().await;
        }

        let answer = self.backend.translate(query).await?;
        // the api bills every answered call, aligned or not
        self.total_price += answer.usage.total_price;
        self.total_tokens += answer.usage.total_tokens;

        unpack(&answer.answer, expected)
    }
}
