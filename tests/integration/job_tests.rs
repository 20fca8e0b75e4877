use rust_decimal::Decimal;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use subtitle_bot::jobs::{process_file, JobDeps, JobOutcome, TranslationRequest};
use subtitle_bot::ledger::Ledger;
use subtitle_bot::lifecycle::{FileStatus, FileTranslations};
use subtitle_bot::localization::Lang;
use subtitle_bot::rate_limiters::TranslationRateLimiter;
use subtitle_bot::translator::TranslationBackend;

use super::{
    mock_bot::{MockFileSource, MockNotifier, MockTranslationBackend},
    test_utils::{sample_srt, submission, submit, TestAssertions, TestUserBuilder},
    TestDatabase,
};

const CHAT_ID: i64 = 4242;

struct Harness {
    deps: JobDeps,
    notifier: Arc<MockNotifier>,
    files: Arc<MockFileSource>,
    ledger: Arc<Ledger>,
    lifecycle: Arc<FileTranslations>,
}

fn harness(db: &TestDatabase, backend: MockTranslationBackend, notifier: MockNotifier, batch_size: usize) -> Harness {
    let notifier = Arc::new(notifier);
    let files = Arc::new(MockFileSource::new());
    let ledger = Arc::new(Ledger::new(db.pool.clone()));
    let lifecycle = Arc::new(FileTranslations::new(db.pool.clone()));
    let backend: Arc<dyn TranslationBackend> = Arc::new(backend);

    let deps = JobDeps {
        file_translations: lifecycle.clone(),
        ledger: ledger.clone(),
        notifier: notifier.clone(),
        files: files.clone(),
        backend,
        rate_limiter: Arc::new(TranslationRateLimiter::new(Duration::ZERO)),
        batch_size,
        max_retries: 1,
        retry_base_delay_ms: 1,
    };
    Harness {
        deps,
        notifier,
        files,
        ledger,
        lifecycle,
    }
}

fn request(id: i32) -> TranslationRequest {
    TranslationRequest {
        file_translation_id: id,
        chat_id: CHAT_ID,
        progress_message: None,
        lang: Lang::En,
    }
}

fn not_cancelled() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

#[tokio::test]
async fn test_full_translation_is_delivered_and_charged() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let user = TestUserBuilder::new(400).bonus(10_000).create(&db).await;
    let h = harness(&db, MockTranslationBackend::new(), MockNotifier::new(), 4);

    let record = submit(&db, &submission(user.id, "full", 10)).await;
    h.files.insert(&record.input_file_ref, &sample_srt(10));

    let outcome = process_file(&h.deps, &request(record.id), not_cancelled())
        .await
        .expect("job failed");
    let completed = match outcome {
        JobOutcome::Completed(record) => record,
        other => panic!("expected completion, got {:?}", other),
    };

    assert_eq!(completed.status, FileStatus::Completed);
    assert_eq!(completed.billed_lines, Some(10));
    assert_eq!(completed.total_cost, Some(Decimal::from(2_000)));
    assert!(!completed.partial);
    assert_eq!(completed.total_tokens, Some(3 * 42));
    assert_eq!(h.ledger.get_balance(user.id).await.unwrap(), Decimal::from(8_000));

    let documents = h.notifier.get_documents();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].file_name, "movie.translated.srt");
    assert!(documents[0].content.starts_with("1\n00:00:01,000 --> 00:00:01,500\nT:Line 1\n"));
    assert!(documents[0].content.contains("T:Line 10"));
    assert_eq!(completed.output_file_ref.as_deref(), Some("output-1"));

    let last = h.notifier.last_text_for_chat(CHAT_ID).unwrap();
    assert!(last.contains("10/10"), "unexpected final status: {}", last);
    assert!(last.contains("8,000"));

    db.cleanup().await.expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_failed_batch_is_left_blank_and_not_billed() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let user = TestUserBuilder::new(401).bonus(10_000).create(&db).await;
    let h = harness(&db, MockTranslationBackend::failing_on("Line 5"), MockNotifier::new(), 2);

    let record = submit(&db, &submission(user.id, "partial", 10)).await;
    h.files.insert(&record.input_file_ref, &sample_srt(10));

    let outcome = process_file(&h.deps, &request(record.id), not_cancelled())
        .await
        .expect("job failed");
    let JobOutcome::Completed(completed) = outcome else {
        panic!("expected completion");
    };

    assert!(completed.partial);
    assert_eq!(completed.billed_lines, Some(8));
    assert_eq!(completed.total_cost, Some(Decimal::from(1_600)));
    assert_eq!(h.ledger.get_balance(user.id).await.unwrap(), Decimal::from(8_400));

    let content = &h.notifier.get_documents()[0].content;
    assert!(content.contains("T:Line 4"));
    assert!(!content.contains("Line 5"));
    assert!(!content.contains("Line 6"));
    assert!(content.contains("T:Line 7"));

    let last = h.notifier.last_text_for_chat(CHAT_ID).unwrap();
    assert!(last.contains("8/10"));
    assert!(last.contains("not charged"));

    db.cleanup().await.expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_delivery_failure_fails_without_charge() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let user = TestUserBuilder::new(402).bonus(10_000).create(&db).await;
    let h = harness(&db, MockTranslationBackend::new(), MockNotifier::failing_documents(), 5);

    let record = submit(&db, &submission(user.id, "undeliverable", 5)).await;
    h.files.insert(&record.input_file_ref, &sample_srt(5));

    let outcome = process_file(&h.deps, &request(record.id), not_cancelled())
        .await
        .expect("job failed");
    assert!(matches!(outcome, JobOutcome::Failed(ref reason) if reason.starts_with("delivery failed")));

    let stored = h.lifecycle.get(record.id).await.unwrap();
    assert_eq!(stored.status, FileStatus::Failed);
    assert_eq!(h.ledger.get_balance(user.id).await.unwrap(), Decimal::from(10_000));
    TestAssertions::assert_transaction_count(&db, user.id, 1).await;
    assert!(h
        .notifier
        .last_text_for_chat(CHAT_ID)
        .unwrap()
        .contains("Nothing was charged"));

    db.cleanup().await.expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_nothing_translated_means_failed() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let user = TestUserBuilder::new(403).bonus(10_000).create(&db).await;
    // one batch holds every caption, and it always fails
    let h = harness(&db, MockTranslationBackend::failing_on("Line"), MockNotifier::new(), 10);

    let record = submit(&db, &submission(user.id, "hopeless", 3)).await;
    h.files.insert(&record.input_file_ref, &sample_srt(3));

    let outcome = process_file(&h.deps, &request(record.id), not_cancelled())
        .await
        .expect("job failed");
    assert!(matches!(outcome, JobOutcome::Failed(_)));
    assert!(h.notifier.get_documents().is_empty());
    assert_eq!(h.lifecycle.get(record.id).await.unwrap().status, FileStatus::Failed);
    assert_eq!(h.ledger.get_balance(user.id).await.unwrap(), Decimal::from(10_000));

    db.cleanup().await.expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_cancelled_record_is_skipped() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let user = TestUserBuilder::new(404).create(&db).await;
    let backend = MockTranslationBackend::new();
    let h = harness(&db, backend, MockNotifier::new(), 5);

    let record = submit(&db, &submission(user.id, "cancelled", 5)).await;
    h.lifecycle.cancel(record.id, user.id).await.unwrap();

    let outcome = process_file(&h.deps, &request(record.id), not_cancelled())
        .await
        .expect("job failed");
    assert!(matches!(outcome, JobOutcome::Skipped));
    assert!(h.notifier.get_sent_messages().is_empty());
    assert_eq!(h.lifecycle.get(record.id).await.unwrap().status, FileStatus::Cancelled);

    db.cleanup().await.expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_shutdown_interrupts_job() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let user = TestUserBuilder::new(405).bonus(10_000).create(&db).await;
    let h = harness(&db, MockTranslationBackend::new(), MockNotifier::new(), 2);

    let record = submit(&db, &submission(user.id, "interrupted", 6)).await;
    h.files.insert(&record.input_file_ref, &sample_srt(6));

    let outcome = process_file(&h.deps, &request(record.id), Arc::new(AtomicBool::new(true)))
        .await
        .expect("job failed");
    assert!(matches!(outcome, JobOutcome::Failed(ref reason) if reason == "interrupted by shutdown"));
    assert_eq!(h.ledger.get_balance(user.id).await.unwrap(), Decimal::from(10_000));

    db.cleanup().await.expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_missing_input_file_fails() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let user = TestUserBuilder::new(406).create(&db).await;
    let h = harness(&db, MockTranslationBackend::new(), MockNotifier::new(), 5);

    let record = submit(&db, &submission(user.id, "gone", 5)).await;

    let outcome = process_file(&h.deps, &request(record.id), not_cancelled())
        .await
        .expect("job failed");
    assert!(matches!(outcome, JobOutcome::Failed(ref reason) if reason.starts_with("download failed")));
    let stored = h.lifecycle.get(record.id).await.unwrap();
    assert_eq!(stored.status, FileStatus::Failed);

    db.cleanup().await.expect("Failed to cleanup test database");
}
