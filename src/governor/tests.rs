//! Scenario tests for the governor on a paused clock.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::*;
use crate::consts::endpoints;
use crate::Error;

fn governor(budget: u32, window_ms: u64) -> WeightBudgetGovernor {
    WeightBudgetGovernor::new(RateLimiterConfig::new(budget, window_ms, 10)).unwrap()
}

#[test]
fn test_new_rejects_invalid_config() {
    let err = WeightBudgetGovernor::new(RateLimiterConfig::new(0, 1000, 1)).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert!(WeightBudgetGovernor::new(RateLimiterConfig::new(100, 0, 1)).is_err());
}

#[test]
fn test_calculate_weight_delegates_to_config() {
    let governor = WeightBudgetGovernor::new(RateLimiterConfig::hyperliquid()).unwrap();
    assert_eq!(governor.calculate_weight(endpoints::CANDLE_SNAPSHOT, Some(180)), 23);
    assert_eq!(governor.calculate_weight(endpoints::L2_BOOK, None), 2);
    assert_eq!(governor.calculate_weight("unmapped", None), 20);
}

#[tokio::test(start_paused = true)]
async fn test_budget_conservation() {
    let governor = governor(100, 1000);

    governor.record_weight(10);
    tokio::time::advance(Duration::from_millis(400)).await;
    governor.record_weight(20);
    tokio::time::advance(Duration::from_millis(400)).await;
    governor.record_weight(30);

    assert_eq!(governor.current_weight(), 60);
    assert_eq!(governor.available_budget(), 40);

    // First entry leaves the window at t=1000.
    tokio::time::advance(Duration::from_millis(200)).await;
    assert_eq!(governor.current_weight(), 50);

    tokio::time::advance(Duration::from_millis(400)).await;
    assert_eq!(governor.current_weight(), 30);

    tokio::time::advance(Duration::from_millis(400)).await;
    assert_eq!(governor.current_weight(), 0);
    assert_eq!(governor.get_metrics().history_len, 0);
}

#[tokio::test(start_paused = true)]
async fn test_available_budget_can_go_negative() {
    let governor = governor(100, 1000);
    governor.record_weight(80);
    governor.record_weight(50);
    assert_eq!(governor.available_budget(), -30);
}

#[tokio::test(start_paused = true)]
async fn test_admits_without_suspending_when_budget_available() {
    let governor = governor(100, 1000);
    governor.record_weight(60);

    let start = Instant::now();
    governor.wait_for_budget(40).await;
    assert_eq!(start.elapsed(), Duration::ZERO);

    // Waiting alone does not spend anything.
    assert_eq!(governor.current_weight(), 60);
    assert_eq!(governor.get_metrics().admitted_immediately, 1);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_waits_for_entry_to_age_out() {
    let governor = governor(100, 1000);
    let start = Instant::now();
    governor.record_weight(60);
    assert_eq!(governor.available_budget(), 40);

    governor.wait_for_budget(50).await;

    assert!(start.elapsed() >= Duration::from_millis(1000));
    assert!(governor.available_budget() >= 50);
    assert_eq!(governor.get_metrics().admitted_after_backoff, 1);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_waits_only_for_covering_entry() {
    let governor = governor(100, 1000);
    let start = Instant::now();

    governor.record_weight(30);
    tokio::time::advance(Duration::from_millis(200)).await;
    governor.record_weight(30);
    tokio::time::advance(Duration::from_millis(200)).await;
    governor.record_weight(30);
    tokio::time::advance(Duration::from_millis(100)).await;

    // available = 10, deficit = 30: the first entry alone covers it.
    governor.wait_for_budget(40).await;

    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(1000), "woke too early: {waited:?}");
    assert!(waited < Duration::from_millis(1200), "over-waited: {waited:?}");
    assert!(governor.available_budget() >= 40);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_accumulates_multiple_entries() {
    let governor = governor(100, 1000);
    let start = Instant::now();

    governor.record_weight(30);
    tokio::time::advance(Duration::from_millis(200)).await;
    governor.record_weight(30);
    tokio::time::advance(Duration::from_millis(200)).await;
    governor.record_weight(30);

    // available = 10, deficit = 50: needs the first two entries.
    governor.wait_for_budget(60).await;

    assert!(start.elapsed() >= Duration::from_millis(1200));
    assert!(governor.available_budget() >= 60);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_request_with_empty_history_admitted() {
    let governor = governor(100, 1000);
    let start = Instant::now();
    governor.wait_for_budget(250).await;
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_request_waits_for_history_to_drain() {
    let governor = governor(100, 1000);
    let start = Instant::now();
    governor.record_weight(10);
    tokio::time::advance(Duration::from_millis(300)).await;
    governor.record_weight(10);

    governor.wait_for_budget(250).await;
    assert!(start.elapsed() >= Duration::from_millis(1300));
    assert_eq!(governor.current_weight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_priority_lock_blocks_ordinary_callers() {
    let governor = governor(1000, 1000);
    assert!(governor.acquire_priority_lock());
    assert!(governor.is_priority_locked());

    let admitted = Arc::new(AtomicBool::new(false));
    let waiter = {
        let governor = governor.clone();
        let admitted = Arc::clone(&admitted);
        tokio::spawn(async move {
            governor.wait_for_budget(1).await;
            admitted.store(true, Ordering::SeqCst);
        })
    };

    // Plenty of budget, but the lock is held.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!admitted.load(Ordering::SeqCst));

    governor.release_priority_lock();
    waiter.await.unwrap();
    assert!(admitted.load(Ordering::SeqCst));
    assert_eq!(governor.get_metrics().priority_waits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_release_wakes_every_waiter() {
    let governor = governor(1000, 1000);
    governor.acquire_priority_lock();

    let admitted = Arc::new(AtomicUsize::new(0));
    let waiters: Vec<_> = (0..5)
        .map(|_| {
            let governor = governor.clone();
            let admitted = Arc::clone(&admitted);
            tokio::spawn(async move {
                governor.wait_for_budget(10).await;
                admitted.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(admitted.load(Ordering::SeqCst), 0);

    governor.release_priority_lock();
    for waiter in waiters {
        waiter.await.unwrap();
    }
    assert_eq!(admitted.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn test_reacquired_lock_keeps_waiters_blocked() {
    let governor = governor(1000, 1000);
    governor.acquire_priority_lock();

    let waiter = {
        let governor = governor.clone();
        tokio::spawn(async move { governor.wait_for_budget(1).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    governor.release_priority_lock();
    governor.acquire_priority_lock();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!waiter.is_finished());

    governor.release_priority_lock();
    waiter.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_priority_session_bypasses_its_own_lock() {
    let governor = governor(100, 1000);
    let session = governor.priority_session();
    assert!(governor.is_priority_locked());

    let start = Instant::now();
    session.wait_for_budget(50).await;
    let out = session
        .execute("meta", None, || async { "meta-response" })
        .await;
    assert_eq!(out, "meta-response");
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(governor.current_weight(), 10);

    drop(session);
    assert!(!governor.is_priority_locked());
}

#[tokio::test(start_paused = true)]
async fn test_priority_session_still_respects_budget() {
    let governor = governor(100, 1000);
    governor.record_weight(100);
    let session = governor.priority_session();

    let start = Instant::now();
    session.wait_for_budget(10).await;
    assert!(start.elapsed() >= Duration::from_millis(1000));
    session.release();
    assert!(!governor.is_priority_locked());
}

#[tokio::test(start_paused = true)]
async fn test_lock_taken_during_backoff_is_honoured() {
    let governor = governor(100, 1000);
    governor.record_weight(100);

    let waiter = {
        let governor = governor.clone();
        tokio::spawn(async move {
            governor.wait_for_budget(10).await;
            governor.available_budget()
        })
    };
    tokio::time::sleep(Duration::from_millis(500)).await;
    governor.acquire_priority_lock();

    // Backoff ends around t=1100, but the lock is still held.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!waiter.is_finished());

    governor.release_priority_lock();
    assert!(waiter.await.unwrap() >= 10);
}

#[tokio::test(start_paused = true)]
async fn test_budget_rechecked_after_lock_release() {
    let governor = governor(100, 1000);
    let start = Instant::now();
    governor.record_weight(100);

    let waiter = {
        let governor = governor.clone();
        tokio::spawn(async move {
            governor.wait_for_budget(10).await;
            (Instant::now(), governor.available_budget())
        })
    };
    tokio::time::sleep(Duration::from_millis(500)).await;
    governor.acquire_priority_lock();

    // Backoff is over at t=1100; the waiter is now parked on the lock.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(!waiter.is_finished());
    assert_eq!(governor.get_metrics().admitted_after_backoff, 0);

    // The priority holder spends the whole window before releasing.
    governor.record_weight(100);
    governor.release_priority_lock();

    let (admitted_at, available) = waiter.await.unwrap();
    assert!(available >= 10, "admitted with {available} available");
    assert!(admitted_at - start >= Duration::from_millis(2200));

    let metrics = governor.get_metrics();
    assert_eq!(metrics.priority_waits, 1);
    assert_eq!(metrics.admitted_after_backoff, 1);
}

#[tokio::test(start_paused = true)]
async fn test_nested_session_does_not_release_outer_lock() {
    let governor = governor(100, 1000);
    let outer = governor.priority_session();
    assert!(outer.owns_lock());

    let inner = governor.priority_session();
    assert!(!inner.owns_lock());
    drop(inner);
    assert!(governor.is_priority_locked());

    let waiter = {
        let governor = governor.clone();
        tokio::spawn(async move { governor.wait_for_budget(1).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!waiter.is_finished());

    drop(outer);
    assert!(!governor.is_priority_locked());
    waiter.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_execute_records_weight_and_passes_output() {
    let governor = governor(100, 1000);
    let out = governor
        .execute("l2Book", None, || async { Ok::<_, String>(42) })
        .await;
    assert_eq!(out, Ok(42));
    assert_eq!(governor.current_weight(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_execute_records_weight_on_failure() {
    let governor = WeightBudgetGovernor::new(RateLimiterConfig::hyperliquid()).unwrap();
    let out: std::result::Result<(), String> = governor
        .execute(endpoints::CANDLE_SNAPSHOT, Some(120), || async {
            Err("502 Bad Gateway".to_string())
        })
        .await;
    assert_eq!(out, Err("502 Bad Gateway".to_string()));
    assert_eq!(governor.current_weight(), 22);
}

#[tokio::test(start_paused = true)]
async fn test_execute_records_weight_when_cancelled_mid_flight() {
    let governor = governor(100, 1000);
    let result = tokio::time::timeout(
        Duration::from_millis(50),
        governor.execute("l2Book", None, || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }),
    )
    .await;
    assert!(result.is_err());
    assert_eq!(governor.current_weight(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_execute_with_timeout_records_nothing_on_expiry() {
    let governor = governor(100, 1000);
    governor.acquire_priority_lock();

    let called = Arc::new(AtomicBool::new(false));
    let result = {
        let called = Arc::clone(&called);
        governor
            .execute_with_timeout(Duration::from_millis(200), "l2Book", None, || async move {
                called.store(true, Ordering::SeqCst);
            })
            .await
    };

    let err = result.unwrap_err();
    assert!(err.is_budget_timeout());
    assert!(!called.load(Ordering::SeqCst));
    assert_eq!(governor.current_weight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_execute_with_timeout_runs_when_admitted() {
    let governor = governor(100, 1000);
    let out = governor
        .execute_with_timeout(Duration::from_millis(200), "l2Book", None, || async { 7 })
        .await
        .unwrap();
    assert_eq!(out, 7);
    assert_eq!(governor.current_weight(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_snapshot() {
    let governor = governor(100, 1000);
    governor.record_weight(85);

    let metrics = governor.get_metrics();
    assert_eq!(metrics.current_weight, 85);
    assert_eq!(metrics.budget_per_window, 100);
    assert_eq!(metrics.available_budget, 15);
    assert!(metrics.near_limit);
    assert!(!metrics.priority_locked);
    assert_eq!(metrics.history_len, 1);
    assert!((metrics.utilization - 0.85).abs() < 1e-9);
}
