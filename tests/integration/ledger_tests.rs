use rust_decimal::Decimal;
use subtitle_bot::accounts::AccountResolver;
use subtitle_bot::error::LedgerError;
use subtitle_bot::ledger::{CreditGroup, Direction, Ledger};

use super::{test_utils::{TestAssertions, TestUserBuilder}, TestDatabase};

#[tokio::test]
async fn test_balance_is_credits_minus_charges() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let user = TestUserBuilder::new(100).create(&db).await;
    let ledger = Ledger::new(db.pool.clone());

    assert_eq!(ledger.get_balance(user.id).await.unwrap(), Decimal::ZERO);

    ledger
        .record_credit(user.id, Decimal::from(100_000), "top up", CreditGroup::None)
        .await
        .expect("credit failed");
    ledger
        .record_charge(user.id, Decimal::from(30_000), "translation")
        .await
        .expect("charge failed");

    assert_eq!(ledger.get_balance(user.id).await.unwrap(), Decimal::from(70_000));
    TestAssertions::assert_transaction_count(&db, user.id, 2).await;

    db.cleanup().await.expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_ledger_does_not_block_negative_balance() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let user = TestUserBuilder::new(101).create(&db).await;
    let ledger = Ledger::new(db.pool.clone());

    ledger
        .record_charge(user.id, Decimal::from(500), "overdraft")
        .await
        .expect("charge failed");
    assert_eq!(ledger.get_balance(user.id).await.unwrap(), Decimal::from(-500));

    match ledger.ensure_funds(user.id, Decimal::from(1)).await {
        Err(LedgerError::InsufficientFunds { balance, required, .. }) => {
            assert_eq!(balance, Decimal::from(-500));
            assert_eq!(required, Decimal::from(1));
        }
        other => panic!("expected insufficient funds, got {:?}", other),
    }

    db.cleanup().await.expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_invalid_amounts_write_nothing() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let user = TestUserBuilder::new(102).create(&db).await;
    let ledger = Ledger::new(db.pool.clone());

    assert!(matches!(
        ledger.record_charge(user.id, Decimal::ZERO, "nothing").await,
        Err(LedgerError::NonPositiveAmount(_))
    ));
    assert!(matches!(
        ledger.grant(user.id, Decimal::from(-10), "negative").await,
        Err(LedgerError::NonPositiveAmount(_))
    ));
    TestAssertions::assert_transaction_count(&db, user.id, 0).await;

    db.cleanup().await.expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_welcome_bonus_is_granted_once_under_an_invoice() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let builder = TestUserBuilder::new(103).username("alice").bonus(10_000);
    let user = builder.create(&db).await;
    let ledger = Ledger::new(db.pool.clone());

    // second contact updates the profile without another bonus
    let resolver = AccountResolver::new(db.pool.clone(), Decimal::from(10_000));
    let (again, created) = resolver.resolve(&builder.identity()).await.unwrap();
    assert!(!created);
    assert_eq!(again.id, user.id);

    assert_eq!(ledger.get_balance(user.id).await.unwrap(), Decimal::from(10_000));

    let client = db.pool.get().await.unwrap();
    let row = client
        .query_one(
            "SELECT COUNT(*) FROM invoice_transactions it
             JOIN invoices i ON i.id = it.invoice_id
             WHERE i.user_id = $1",
            &[&user.id],
        )
        .await
        .unwrap();
    assert_eq!(row.get::<_, i64>(0), 1);

    db.cleanup().await.expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_history_lists_latest_first() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let user = TestUserBuilder::new(104).create(&db).await;
    let ledger = Ledger::new(db.pool.clone());

    ledger.grant(user.id, Decimal::from(5_000), "first").await.unwrap();
    ledger.record_charge(user.id, Decimal::from(400), "second").await.unwrap();
    ledger.grant(user.id, Decimal::from(1_000), "third").await.unwrap();

    let history = ledger.history(user.id, 2).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].description, "third");
    assert_eq!(history[0].direction, Direction::Credit);
    assert_eq!(history[1].description, "second");
    assert_eq!(history[1].direction, Direction::Debit);
    assert_eq!(history[1].amount, Decimal::from(400));

    db.cleanup().await.expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_user_count_covers_every_account() {
    let Some(db) = TestDatabase::create_fresh().await else {
        return;
    };
    let resolver = AccountResolver::new(db.pool.clone(), Decimal::ZERO);
    assert_eq!(resolver.count_users().await.unwrap(), 0);

    let first = TestUserBuilder::new(140);
    first.create(&db).await;
    TestUserBuilder::new(141).create(&db).await;
    // resolving a known user again adds nobody
    resolver.resolve(&first.identity()).await.unwrap();

    assert_eq!(resolver.count_users().await.unwrap(), 2);

    db.cleanup().await.expect("Failed to cleanup test database");
}
