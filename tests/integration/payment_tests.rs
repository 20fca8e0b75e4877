use rust_decimal::Decimal;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use subtitle_bot::error::PaymentError;
use subtitle_bot::handlers::PaymentHandler;
use subtitle_bot::ledger::Ledger;
use subtitle_bot::payments::{PaymentCallback, Payments, ReceiptStatus};

use super::{
    mock_bot::{MockNotifier, MockPaymentGateway},
    test_utils::{TestAssertions, TestUserBuilder},
    TestDatabase,
};

fn callback(track_id: &str, status: &str, success: &str) -> PaymentCallback {
    PaymentCallback::from_query(&format!(
        "trackId={}&status={}&success={}&orderId=o",
        track_id, status, success
    ))
}

#[tokio::test]
async fn test_verified_payment_credits_once() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let user = TestUserBuilder::new(300).language("fa").create(&db).await;
    let gateway = Arc::new(MockPaymentGateway::new());
    let payments = Payments::new(db.pool.clone(), gateway.clone());
    let ledger = Ledger::new(db.pool.clone());
    let notifier = MockNotifier::new();

    let link = payments
        .create_receipt(user.id, Decimal::from(50_000))
        .await
        .expect("receipt failed");
    assert_eq!(*gateway.requested_rials.lock().unwrap(), vec![500_000]);
    assert_eq!(link.url, format!("https://pay.example/start/{}", link.track_id));

    let receipt = payments.get_receipt(link.receipt_id).await.unwrap().unwrap();
    assert_eq!(receipt.status, ReceiptStatus::Pending);
    // nothing is credited until the gateway confirms
    assert_eq!(ledger.get_balance(user.id).await.unwrap(), Decimal::ZERO);

    let paid = callback(&link.track_id, "2", "1");
    let confirmed = PaymentHandler::confirm_and_notify(&payments, &ledger, &notifier, &paid)
        .await
        .expect("confirmation failed");
    assert_eq!(confirmed.amount, Decimal::from(50_000));
    assert_eq!(confirmed.telegram_user_id, 300);
    assert_eq!(ledger.get_balance(user.id).await.unwrap(), Decimal::from(50_000));
    assert!(notifier.chat_received_message_containing(300, "50,000"));

    // the gateway may call back twice; the second one credits nothing
    assert!(matches!(
        payments.confirm(&paid).await,
        Err(PaymentError::UnknownReceipt(_))
    ));
    TestAssertions::assert_transaction_count(&db, user.id, 1).await;

    let receipt = payments.get_receipt(link.receipt_id).await.unwrap().unwrap();
    assert_eq!(receipt.status, ReceiptStatus::Success);

    db.cleanup().await.expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_unsuccessful_callback_marks_receipt_failed() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let user = TestUserBuilder::new(301).create(&db).await;
    let gateway = Arc::new(MockPaymentGateway::new());
    let payments = Payments::new(db.pool.clone(), gateway.clone());

    let link = payments.create_receipt(user.id, Decimal::from(20_000)).await.unwrap();
    assert!(matches!(
        payments.confirm(&callback(&link.track_id, "3", "0")).await,
        Err(PaymentError::Unsuccessful(_))
    ));
    assert_eq!(gateway.verify_calls.load(Ordering::Relaxed), 0);

    let receipt = payments.get_receipt(link.receipt_id).await.unwrap().unwrap();
    assert_eq!(receipt.status, ReceiptStatus::Failed);
    TestAssertions::assert_transaction_count(&db, user.id, 0).await;

    db.cleanup().await.expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_failed_verification_credits_nothing() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let user = TestUserBuilder::new(302).create(&db).await;
    let gateway = Arc::new(MockPaymentGateway::rejecting_verification());
    let payments = Payments::new(db.pool.clone(), gateway);

    let link = payments.create_receipt(user.id, Decimal::from(20_000)).await.unwrap();
    assert!(matches!(
        payments.confirm(&callback(&link.track_id, "2", "1")).await,
        Err(PaymentError::VerificationFailed(_))
    ));

    let receipt = payments.get_receipt(link.receipt_id).await.unwrap().unwrap();
    assert_eq!(receipt.status, ReceiptStatus::Failed);
    TestAssertions::assert_transaction_count(&db, user.id, 0).await;

    db.cleanup().await.expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_callback_validation() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let gateway = Arc::new(MockPaymentGateway::new());
    let payments = Payments::new(db.pool.clone(), gateway);

    assert!(matches!(
        payments.confirm(&PaymentCallback::from_query("status=2&success=1")).await,
        Err(PaymentError::MissingParameter("trackId"))
    ));
    assert!(matches!(
        payments.confirm(&callback("no-such-track", "2", "1")).await,
        Err(PaymentError::UnknownReceipt(_))
    ));
    assert!(matches!(
        payments.create_receipt(1, Decimal::ZERO).await,
        Err(PaymentError::InvalidAmount)
    ));

    db.cleanup().await.expect("Failed to cleanup test database");
}
