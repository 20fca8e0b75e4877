use clap::Parser;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use teloxide::Bot;
use tokio::sync::Mutex;

use subtitle_bot::accounts::AccountResolver;
use subtitle_bot::bot::{BotContext, TelegramBot};
use subtitle_bot::config::{self, AppConfig};
use subtitle_bot::db;
use subtitle_bot::jobs::{JobDeps, TranslationQueue, TranslationWorker, DEFAULT_QUEUE_CAPACITY};
use subtitle_bot::ledger::Ledger;
use subtitle_bot::log_reporter::{self, ErrorReportLogger};
use subtitle_bot::lifecycle::FileTranslations;
use subtitle_bot::migrations::MigrationManager;
use subtitle_bot::notify::{Notifier, TelegramFileSource, TelegramNotifier};
use subtitle_bot::payments::{Payments, ZibalGateway};
use subtitle_bot::rate_limiters::{TelegramRateLimiter, TranslationRateLimiter};
use subtitle_bot::translator::HttpTranslationBackend;

#[derive(Parser)]
#[command(name = "subtitle-bot")]
#[command(about = "A Telegram bot that translates .srt subtitle files")]
struct Args {
    /// number of translation workers, overrides WORKER_COUNT
    #[arg(long)]
    workers: Option<usize>,

    /// how many confirmed files may wait for a worker
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // initialize rustls crypto provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    config::load_dotenv();

    let reports = ErrorReportLogger::init(
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .build(),
    )?;

    let args = Args::parse();
    let config = AppConfig::from_env()?;

    let pool = db::create_pool(&config.database_url)?;
    MigrationManager::run_migrations(&pool).await?;

    let file_translations = Arc::new(FileTranslations::new(pool.clone()));
    file_translations.fail_stale_processing().await?;

    let bot = Bot::new(&config.bot_token);
    let ledger = Arc::new(Ledger::new(pool.clone()));
    let accounts = Arc::new(AccountResolver::new(pool.clone(), config.welcome_bonus));
    let gateway = Arc::new(ZibalGateway::new(
        &config.payment.base_url,
        &config.payment.merchant_id,
        &config.payment.callback_url,
    )?);
    let payments = Arc::new(Payments::new(pool.clone(), gateway));

    let backend = Arc::new(HttpTranslationBackend::new(
        &config.translation.api_url,
        &config.translation.api_key,
    )?);
    let files = Arc::new(TelegramFileSource::new(bot.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(
        bot.clone(),
        Arc::new(TelegramRateLimiter::new()),
    ));

    if config.report_chat_ids.is_empty() {
        drop(reports);
    } else {
        info!("Forwarding error logs to {} chats", config.report_chat_ids.len());
        tokio::spawn(log_reporter::forward_reports(
            notifier.clone(),
            config.report_chat_ids.clone(),
            reports,
        ));
    }

    let deps = Arc::new(JobDeps {
        file_translations: file_translations.clone(),
        ledger: ledger.clone(),
        notifier: notifier.clone(),
        files: files.clone(),
        backend,
        rate_limiter: Arc::new(TranslationRateLimiter::new(config.translation.min_interval)),
        batch_size: config.translation.batch_size,
        max_retries: config.translation.max_retries,
        retry_base_delay_ms: subtitle_bot::translator::client::BASE_DELAY_MS,
    });

    let (queue, receiver) = TranslationQueue::new(args.queue_capacity);
    let receiver = Arc::new(Mutex::new(receiver));
    let shutdown = Arc::new(AtomicBool::new(false));

    let worker_count = args.workers.unwrap_or(config.worker_count).max(1);
    let workers: Vec<_> = (0..worker_count)
        .map(|id| {
            let worker = TranslationWorker::new(id, deps.clone(), receiver.clone(), shutdown.clone());
            tokio::spawn(worker.run())
        })
        .collect();
    info!("Started {} translation workers", worker_count);

    let ctx = BotContext {
        bot: Arc::new(bot),
        accounts,
        ledger,
        file_translations,
        payments,
        files,
        notifier,
        queue,
        price_per_line: config.price_per_line,
        admin_ids: config.admin_ids.clone().into(),
    };

    info!("Starting bot...");
    TelegramBot::new(ctx).run().await;

    // dispatcher returned on ctrl-c; in-flight jobs stop at the next batch
    info!("Shutting down translation workers...");
    shutdown.store(true, Ordering::Relaxed);
    for worker in workers {
        worker.await?;
    }

    Ok(())
}
