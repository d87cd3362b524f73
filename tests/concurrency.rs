//! Contention scenarios: concurrent spends of the same balance must
//! never both succeed, and concurrent writers must never lose updates.

mod common;

use std::sync::Arc;

use common::{active_sweepstakes, reward, store, user_with_points};
use futures::future::join_all;

use karat::interfaces::LedgerStore;
use karat::records::{EntryMethod, TransactionKind};
use karat::services::{PointsService, RewardService, SweepstakesService};
use karat::LoyaltyError;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redeems_exact_balance_one_success() {
    let store = store();
    let rewards = Arc::new(RewardService::new(store.clone()));

    // Exactly enough points for one redemption.
    let user = user_with_points(500);
    let user_id = user.id;
    store.insert_user(user).await.unwrap();

    let item = reward(500, None);
    let reward_id = item.id;
    store.insert_reward(item).await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let rewards = rewards.clone();
            tokio::spawn(async move { rewards.redeem(user_id, reward_id).await })
        })
        .collect();

    let mut successes = 0;
    let mut insufficient = 0;
    for result in join_all(tasks).await {
        match result.expect("task must not panic") {
            Ok(_) => successes += 1,
            Err(LoyaltyError::InsufficientPoints { .. }) => insufficient += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1, "exactly one redemption may succeed");
    assert_eq!(insufficient, 7);

    let stored = store.get_user(user_id).await.unwrap().record;
    assert_eq!(stored.loyalty_points, 0);

    let audit = store.list_transactions_for_user(user_id, 20).await.unwrap();
    assert_eq!(audit.len(), 1, "exactly one audit record");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redeems_single_stock() {
    let store = store();
    let rewards = Arc::new(RewardService::new(store.clone()));

    let alice = user_with_points(1000);
    let bob = user_with_points(1000);
    let (alice_id, bob_id) = (alice.id, bob.id);
    store.insert_user(alice).await.unwrap();
    store.insert_user(bob).await.unwrap();

    let item = reward(500, Some(1));
    let reward_id = item.id;
    store.insert_reward(item).await.unwrap();

    let tasks = vec![
        tokio::spawn({
            let rewards = rewards.clone();
            async move { rewards.redeem(alice_id, reward_id).await }
        }),
        tokio::spawn({
            let rewards = rewards.clone();
            async move { rewards.redeem(bob_id, reward_id).await }
        }),
    ];

    let mut successes = 0;
    let mut unavailable = 0;
    for result in join_all(tasks).await {
        match result.expect("task must not panic") {
            Ok(_) => successes += 1,
            Err(LoyaltyError::Unavailable) => unavailable += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1, "single stock unit allows one redemption");
    assert_eq!(unavailable, 1);

    let stored = store.get_reward(reward_id).await.unwrap().record;
    assert_eq!(stored.stock_quantity, Some(0));
    assert!(!stored.is_active);

    let mut redemptions = 0;
    for user_id in [alice_id, bob_id] {
        redemptions += store
            .list_transactions_for_user(user_id, 10)
            .await
            .unwrap()
            .iter()
            .filter(|t| t.kind == TransactionKind::RewardRedemption)
            .count();
    }
    assert_eq!(redemptions, 1, "one reward_redemption recorded in total");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_earns_lose_no_updates() {
    let store = store();
    let points = Arc::new(PointsService::new(store.clone()));

    let user = user_with_points(0);
    let user_id = user.id;
    store.insert_user(user).await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let points = points.clone();
            tokio::spawn(async move { points.earn_points(user_id, 10.0, None).await })
        })
        .collect();

    for result in join_all(tasks).await {
        result.expect("task must not panic").expect("earn must succeed");
    }

    let stored = store.get_user(user_id).await.unwrap().record;
    assert_eq!(stored.loyalty_points, 80, "all eight awards must land");
    assert_eq!(stored.total_spent, 80.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_entries_all_counted() {
    let store = store();
    let service = Arc::new(SweepstakesService::new(store.clone()));

    let user = user_with_points(0);
    let user_id = user.id;
    store.insert_user(user).await.unwrap();

    let mut sweepstakes = active_sweepstakes(0);
    sweepstakes.entry_method = EntryMethod::Free;
    let sweepstakes_id = sweepstakes.id;
    store.insert_sweepstakes(sweepstakes).await.unwrap();

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.enter(user_id, sweepstakes_id, 1).await })
        })
        .collect();

    for result in join_all(tasks).await {
        result.expect("task must not panic").expect("enter must succeed");
    }

    let stored = store.get_sweepstakes(sweepstakes_id).await.unwrap().record;
    assert_eq!(stored.entries_for(user_id), 6, "entry counts only increase");

    let stored_user = store.get_user(user_id).await.unwrap().record;
    assert_eq!(stored_user.sweepstakes_entries, 6);
}
