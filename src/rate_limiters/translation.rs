use log::info;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// rate limiter for translation api calls, shared by every worker
pub struct TranslationRateLimiter {
    last_call: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

impl TranslationRateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: Arc::new(Mutex::new(None)),
            min_interval,
        }
    }

    pub async fn wait_for_api_call(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(last_instant) = *last {
            let elapsed = last_instant.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                info!("Translation rate limiter: waiting for {:?}", wait_time);
                sleep(wait_time).await;
            }
        }
        *last = Some(Instant::now());
    }
}
