use chrono::{DateTime, Local};
use log::{Level, Log, Metadata, Record, SetLoggerError};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::notify::Notifier;
use crate::utils::MessageFormatter;

/// reports waiting to be forwarded; later ones are dropped when full
pub const REPORT_BUFFER: usize = 100;
/// keeps a report under telegram's message limit once wrapped in html
const MAX_REPORT_CHARS: usize = 3500;

/// env_logger output, plus every error record queued for the report chats
pub struct ErrorReportLogger {
    inner: env_logger::Logger,
    reports: mpsc::Sender<String>,
}

impl ErrorReportLogger {
    pub fn new(inner: env_logger::Logger, reports: mpsc::Sender<String>) -> Self {
        Self { inner, reports }
    }

    /// installs the logger globally; returns the receiving end of the report queue
    pub fn init(inner: env_logger::Logger) -> Result<mpsc::Receiver<String>, SetLoggerError> {
        let (sender, receiver) = mpsc::channel(REPORT_BUFFER);
        let max_level = inner.filter();
        log::set_boxed_logger(Box::new(Self::new(inner, sender)))?;
        log::set_max_level(max_level);
        Ok(receiver)
    }

    pub fn format_report(now: DateTime<Local>, target: &str, level: Level, message: &str) -> String {
        let message: String = message.chars().take(MAX_REPORT_CHARS).collect();
        format!(
            "{} - {} - {}\n\n<pre>{}</pre>",
            now.format("%Y-%m-%d %H:%M:%S"),
            MessageFormatter::escape_html(target),
            level,
            MessageFormatter::escape_html(&message)
        )
    }
}

impl Log for ErrorReportLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.inner.matches(record) {
            return;
        }
        self.inner.log(record);

        if record.level() == Level::Error {
            let report = Self::format_report(
                Local::now(),
                record.target(),
                record.level(),
                &record.args().to_string(),
            );
            // a full or closed queue only loses the report, never the log line
            let _ = self.reports.try_send(report);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// sends queued reports to every chat until the logger goes away
pub async fn forward_reports(
    notifier: Arc<dyn Notifier>,
    chat_ids: Vec<i64>,
    mut reports: mpsc::Receiver<String>,
) {
    while let Some(report) = reports.recv().await {
        for chat_id in &chat_ids {
            if let Err(e) = notifier.send_message(*chat_id, &report).await {
                // warn, not error: an error here would queue another report
                log::warn!("Could not deliver error report to {}: {}", chat_id, e);
            }
        }
    }
}
