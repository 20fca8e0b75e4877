use clap::Parser;
use log::info;
use rust_decimal::Decimal;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use subtitle_bot::config::{
    self, DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_MIN_INTERVAL_MS, DEFAULT_PRICE_PER_LINE,
};
use subtitle_bot::rate_limiters::TranslationRateLimiter;
use subtitle_bot::subtitle;
use subtitle_bot::translator::{BatchTranslationClient, HttpTranslationBackend, TranslationOrchestrator};
use subtitle_bot::utils::MessageFormatter;

#[derive(Parser)]
#[command(name = "translate_srt")]
#[command(about = "Translate a local .srt file through the translation API")]
struct Cli {
    /// subtitle file to translate
    input: PathBuf,

    /// where to write the result, defaults to <input>.translated.srt
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// captions per API call
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// attempts per batch before it is left untranslated
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// tomans per translated caption
    #[arg(long, default_value_t = Decimal::from(DEFAULT_PRICE_PER_LINE))]
    price_per_line: Decimal,
}

fn cost_line(cost: Decimal, price_per_line: Decimal) -> String {
    format!(
        "Cost: {} tomans ({} per caption)",
        MessageFormatter::format_money(cost),
        MessageFormatter::format_money(price_per_line)
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    config::load_dotenv();

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    let api_url = std::env::var("TRANSLATION_API_URL")
        .map_err(|_| "TRANSLATION_API_URL environment variable is required")?;
    let api_key = std::env::var("TRANSLATION_API_KEY")
        .map_err(|_| "TRANSLATION_API_KEY environment variable is required")?;

    let bytes = std::fs::read(&cli.input)?;
    let records = subtitle::parse(&subtitle::decode_lossy(&bytes))?;
    info!("Read {} captions from {}", records.len(), cli.input.display());

    let backend = Arc::new(HttpTranslationBackend::new(&api_url, &api_key)?);
    let client = BatchTranslationClient::new(backend).with_rate_limiter(Arc::new(
        TranslationRateLimiter::new(Duration::from_millis(DEFAULT_MIN_INTERVAL_MS)),
    ));
    let mut orchestrator = TranslationOrchestrator::new(client, cli.max_retries);

    let translated = orchestrator
        .translate_all(&records, cli.batch_size, |percent| async move {
            println!("progress: {:.1}%", percent);
            Ok::<(), std::convert::Infallible>(())
        })
        .await?;
    let summary = orchestrator.summary()?;
    let cost = orchestrator.compute_cost(cli.price_per_line)?;

    let output = cli
        .output
        .unwrap_or_else(|| cli.input.with_extension("translated.srt"));
    std::fs::write(&output, subtitle::compose(&translated))?;

    println!("Wrote {}", output.display());
    println!(
        "Translated {}/{} captions, {} batches left untranslated",
        summary.billable_units, summary.records, summary.unrecovered_batches
    );
    println!("{}", cost_line(cost, cli.price_per_line));
    println!("API cost: {} ({} tokens)", summary.api_cost, summary.total_tokens);
    Ok(())
}
