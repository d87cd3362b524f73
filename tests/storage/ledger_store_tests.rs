//! LedgerStore interface tests.
//!
//! These tests verify the contract of the LedgerStore trait: versioned
//! reads, conflict detection, and all-or-nothing commits. Each storage
//! implementation should run these tests.

use chrono::{Duration, Utc};
use uuid::Uuid;

use karat::interfaces::ledger_store::{
    LedgerStore, RewardFilter, StorageError, WriteOp,
};
use karat::records::{
    LedgerTransaction, Reward, RewardCategory, Sweepstakes, SweepstakesStatus, TransactionKind,
    User,
};
use karat::tier::Tier;

fn make_user(email_tag: &str) -> User {
    User::new(&format!("{email_tag}@example.com"), "Test", "User")
}

fn make_reward(points_cost: u64) -> Reward {
    Reward::new("Hat", "A branded hat", points_cost, RewardCategory::Freebie)
}

fn make_sweepstakes(days_from_now: i64) -> Sweepstakes {
    let start = Utc::now() + Duration::days(days_from_now);
    Sweepstakes::new("Draw", "A draw", start, start + Duration::days(7))
}

// =============================================================================
// Insert/get tests
// =============================================================================

pub async fn test_insert_and_get_user<S: LedgerStore>(store: &S) {
    let user = make_user(&format!("insert-get-{}", Uuid::new_v4()));
    let id = user.id;

    store.insert_user(user.clone()).await.expect("insert should succeed");

    let fetched = store.get_user(id).await.expect("get should succeed");
    assert_eq!(fetched.record, user);
    assert_eq!(fetched.version, 1, "fresh records start at version 1");
}

pub async fn test_duplicate_email_rejected<S: LedgerStore>(store: &S) {
    let tag = format!("dup-{}", Uuid::new_v4());
    let first = make_user(&tag);
    let second = make_user(&tag);

    store.insert_user(first).await.expect("first insert should succeed");
    let result = store.insert_user(second).await;
    assert!(
        matches!(result, Err(StorageError::AlreadyExists { .. })),
        "duplicate email must be rejected, got {result:?}"
    );
}

pub async fn test_get_user_by_email<S: LedgerStore>(store: &S) {
    let tag = format!("by-email-{}", Uuid::new_v4());
    let user = make_user(&tag);
    store.insert_user(user.clone()).await.expect("insert should succeed");

    let found = store
        .get_user_by_email(&user.email)
        .await
        .expect("lookup should succeed");
    assert_eq!(found.map(|v| v.record.id), Some(user.id));

    let missing = store
        .get_user_by_email("nobody@example.com")
        .await
        .expect("lookup should succeed");
    assert!(missing.is_none());
}

pub async fn test_missing_user_not_found<S: LedgerStore>(store: &S) {
    let result = store.get_user(Uuid::new_v4()).await;
    assert!(matches!(result, Err(StorageError::NotFound { .. })));
}

// =============================================================================
// Versioning tests
// =============================================================================

pub async fn test_put_increments_version<S: LedgerStore>(store: &S) {
    let user = make_user(&format!("version-{}", Uuid::new_v4()));
    let id = user.id;
    store.insert_user(user).await.expect("insert should succeed");

    let mut fetched = store.get_user(id).await.expect("get should succeed");
    fetched.record.loyalty_points = 500;
    store
        .commit(vec![WriteOp::PutUser {
            user: fetched.record,
            expected_version: fetched.version,
        }])
        .await
        .expect("commit should succeed");

    let after = store.get_user(id).await.expect("get should succeed");
    assert_eq!(after.record.loyalty_points, 500);
    assert_eq!(after.version, 2, "version must increment on write");
}

pub async fn test_stale_version_conflicts<S: LedgerStore>(store: &S) {
    let user = make_user(&format!("stale-{}", Uuid::new_v4()));
    let id = user.id;
    store.insert_user(user).await.expect("insert should succeed");

    let first = store.get_user(id).await.expect("get should succeed");
    let second = first.clone();

    // First writer wins.
    store
        .commit(vec![WriteOp::PutUser {
            user: first.record,
            expected_version: first.version,
        }])
        .await
        .expect("first commit should succeed");

    // Second writer holds a stale version.
    let result = store
        .commit(vec![WriteOp::PutUser {
            user: second.record,
            expected_version: second.version,
        }])
        .await;
    assert!(
        matches!(result, Err(StorageError::VersionConflict { .. })),
        "stale write must conflict, got {result:?}"
    );
}

// =============================================================================
// Commit atomicity tests
// =============================================================================

pub async fn test_commit_is_all_or_nothing<S: LedgerStore>(store: &S) {
    let user = make_user(&format!("atomic-{}", Uuid::new_v4()));
    let user_id = user.id;
    let sweepstakes = make_sweepstakes(-1);
    let sweepstakes_id = sweepstakes.id;
    store.insert_user(user).await.expect("insert should succeed");
    store
        .insert_sweepstakes(sweepstakes)
        .await
        .expect("insert should succeed");

    let mut user = store.get_user(user_id).await.expect("get should succeed");
    let sweepstakes = store
        .get_sweepstakes(sweepstakes_id)
        .await
        .expect("get should succeed");

    user.record.loyalty_points = 999;
    let result = store
        .commit(vec![
            WriteOp::PutUser {
                user: user.record,
                expected_version: user.version,
            },
            WriteOp::PutSweepstakes {
                sweepstakes: sweepstakes.record,
                // Deliberately stale.
                expected_version: sweepstakes.version + 7,
            },
        ])
        .await;
    assert!(result.is_err(), "batch with a stale op must fail");

    let after = store.get_user(user_id).await.expect("get should succeed");
    assert_eq!(
        after.record.loyalty_points, 0,
        "no write from a failed batch may be visible"
    );
    assert_eq!(after.version, 1);
}

pub async fn test_commit_duplicate_transaction_rejected<S: LedgerStore>(store: &S) {
    let user = make_user(&format!("dup-tx-{}", Uuid::new_v4()));
    let user_id = user.id;
    store.insert_user(user).await.expect("insert should succeed");

    let transaction = LedgerTransaction::new(user_id, TransactionKind::Purchase, 10.0);
    store
        .insert_transaction(transaction.clone())
        .await
        .expect("insert should succeed");

    let result = store
        .commit(vec![WriteOp::InsertTransaction { transaction }])
        .await;
    assert!(matches!(result, Err(StorageError::AlreadyExists { .. })));
}

// =============================================================================
// Query tests
// =============================================================================

pub async fn test_find_transaction_by_payment_id<S: LedgerStore>(store: &S) {
    let user = make_user(&format!("payment-id-{}", Uuid::new_v4()));
    let user_id = user.id;
    store.insert_user(user).await.expect("insert should succeed");

    let payment_id = format!("pay_{}", Uuid::new_v4().simple());
    let transaction = LedgerTransaction::new(user_id, TransactionKind::Purchase, 25.0)
        .with_payment(karat::records::PaymentMethod::Stripe, Some(payment_id.clone()));
    store
        .insert_transaction(transaction.clone())
        .await
        .expect("insert should succeed");

    let found = store
        .find_transaction_by_payment_id(&payment_id)
        .await
        .expect("lookup should succeed");
    assert_eq!(found.map(|v| v.record.id), Some(transaction.id));

    let missing = store
        .find_transaction_by_payment_id("pay_unknown")
        .await
        .expect("lookup should succeed");
    assert!(missing.is_none());
}

pub async fn test_list_transactions_newest_first<S: LedgerStore>(store: &S) {
    let user = make_user(&format!("list-tx-{}", Uuid::new_v4()));
    let user_id = user.id;
    store.insert_user(user).await.expect("insert should succeed");

    for i in 0..5 {
        let mut transaction =
            LedgerTransaction::new(user_id, TransactionKind::Purchase, f64::from(i));
        transaction.created_at = Utc::now() + Duration::seconds(i64::from(i));
        store
            .insert_transaction(transaction)
            .await
            .expect("insert should succeed");
    }

    let listed = store
        .list_transactions_for_user(user_id, 3)
        .await
        .expect("list should succeed");
    assert_eq!(listed.len(), 3, "limit must apply");
    assert_eq!(listed[0].amount, 4.0, "newest first");
    assert!(listed[0].created_at >= listed[1].created_at);
    assert!(listed[1].created_at >= listed[2].created_at);
}

pub async fn test_list_rewards_filters_and_sorts<S: LedgerStore>(store: &S) {
    let mut cheap = make_reward(100);
    cheap.tier = Some(Tier::Gold);
    let mut pricey = make_reward(900);
    pricey.tier = None;
    let mut inactive = make_reward(50);
    inactive.is_active = false;
    let mut wrong_tier = make_reward(200);
    wrong_tier.tier = Some(Tier::Diamond);

    for reward in [&cheap, &pricey, &inactive, &wrong_tier] {
        store
            .insert_reward(reward.clone())
            .await
            .expect("insert should succeed");
    }

    let listed = store
        .list_rewards(RewardFilter {
            active_only: true,
            tier: Some(Tier::Gold),
            category: None,
        })
        .await
        .expect("list should succeed");

    let ids: Vec<Uuid> = listed.iter().map(|r| r.id).collect();
    assert!(ids.contains(&cheap.id), "tier-matching reward included");
    assert!(ids.contains(&pricey.id), "tierless reward included");
    assert!(!ids.contains(&inactive.id), "inactive reward excluded");
    assert!(!ids.contains(&wrong_tier.id), "other-tier reward excluded");

    let costs: Vec<u64> = listed.iter().map(|r| r.points_cost).collect();
    let mut sorted = costs.clone();
    sorted.sort_unstable();
    assert_eq!(costs, sorted, "cheapest first");
}

pub async fn test_list_sweepstakes_by_status<S: LedgerStore>(store: &S) {
    let upcoming = make_sweepstakes(3);
    let active = {
        let mut s = make_sweepstakes(-1);
        assert_eq!(s.status, SweepstakesStatus::Active);
        s.title = "Active draw".to_string();
        s
    };
    store
        .insert_sweepstakes(upcoming.clone())
        .await
        .expect("insert should succeed");
    store
        .insert_sweepstakes(active.clone())
        .await
        .expect("insert should succeed");

    let listed = store
        .list_sweepstakes(Some(SweepstakesStatus::Upcoming))
        .await
        .expect("list should succeed");
    assert!(listed.iter().any(|s| s.id == upcoming.id));
    assert!(!listed.iter().any(|s| s.id == active.id));

    let all = store
        .list_sweepstakes(None)
        .await
        .expect("list should succeed");
    for pair in all.windows(2) {
        assert!(
            pair[0].start_date >= pair[1].start_date,
            "newest start date first"
        );
    }
}

/// Run the full LedgerStore contract against a store.
#[macro_export]
macro_rules! run_ledger_store_tests {
    ($store:expr) => {
        use $crate::storage::ledger_store_tests::*;

        test_insert_and_get_user($store).await;
        println!("  test_insert_and_get_user: PASSED");

        test_duplicate_email_rejected($store).await;
        println!("  test_duplicate_email_rejected: PASSED");

        test_get_user_by_email($store).await;
        println!("  test_get_user_by_email: PASSED");

        test_missing_user_not_found($store).await;
        println!("  test_missing_user_not_found: PASSED");

        test_put_increments_version($store).await;
        println!("  test_put_increments_version: PASSED");

        test_stale_version_conflicts($store).await;
        println!("  test_stale_version_conflicts: PASSED");

        test_commit_is_all_or_nothing($store).await;
        println!("  test_commit_is_all_or_nothing: PASSED");

        test_commit_duplicate_transaction_rejected($store).await;
        println!("  test_commit_duplicate_transaction_rejected: PASSED");

        test_find_transaction_by_payment_id($store).await;
        println!("  test_find_transaction_by_payment_id: PASSED");

        test_list_transactions_newest_first($store).await;
        println!("  test_list_transactions_newest_first: PASSED");

        test_list_rewards_filters_and_sorts($store).await;
        println!("  test_list_rewards_filters_and_sorts: PASSED");

        test_list_sweepstakes_by_status($store).await;
        println!("  test_list_sweepstakes_by_status: PASSED");
    };
}
