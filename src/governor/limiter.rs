//! Weight budget governor.
//!
//! Admits or delays callers so the rolling sum of spent weight stays within
//! the configured budget, and lets one priority session shut out every
//! ordinary caller while it runs.
//!
//! # Usage
//!
//! ```ignore
//! let governor = WeightBudgetGovernor::new(RateLimiterConfig::hyperliquid())?;
//!
//! // Ordinary traffic
//! let book = governor
//!     .execute("l2Book", None, || info_client.l2_snapshot(coin))
//!     .await?;
//!
//! // Decision cycle that must not be starved
//! let session = governor.priority_session();
//! let state = session
//!     .execute("clearinghouseState", None, || info_client.user_state(user))
//!     .await?;
//! drop(session); // wakes every ordinary caller
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::RateLimiterConfig;
use super::history::WeightHistory;
use super::priority::PriorityLock;
use crate::consts::BACKOFF_SAFETY_MARGIN;
use crate::logging::targets;
use crate::prelude::*;
use crate::Error;

/// Sliding-window weight governor.
///
/// Cheap to clone; clones share the same history and priority lock.
#[derive(Debug, Clone)]
pub struct WeightBudgetGovernor {
    inner: Arc<GovernorInner>,
}

#[derive(Debug)]
struct GovernorInner {
    config: RateLimiterConfig,
    window: Duration,
    history: Mutex<WeightHistory>,
    priority: PriorityLock,
    counters: GovernorCounters,
}

#[derive(Debug, Default)]
struct GovernorCounters {
    admitted_immediately: AtomicU64,
    admitted_after_backoff: AtomicU64,
    priority_waits: AtomicU64,
    backoff_ms_total: AtomicU64,
}

/// Metrics snapshot for logging/monitoring.
#[derive(Debug, Clone, PartialEq)]
pub struct GovernorMetrics {
    pub current_weight: u64,
    pub budget_per_window: u32,
    pub available_budget: i64,
    /// Fraction of the budget spent in the current window
    pub utilization: f64,
    pub near_limit: bool,
    pub priority_locked: bool,
    pub history_len: usize,
    pub admitted_immediately: u64,
    pub admitted_after_backoff: u64,
    pub priority_waits: u64,
    pub backoff_ms_total: u64,
}

impl WeightBudgetGovernor {
    /// Create a governor. Fails fast on an invalid config.
    pub fn new(config: RateLimiterConfig) -> Result<Self> {
        config.validate()?;
        let window = config.window();
        Ok(Self {
            inner: Arc::new(GovernorInner {
                window,
                history: Mutex::new(WeightHistory::new(window)),
                priority: PriorityLock::new(),
                counters: GovernorCounters::default(),
                config,
            }),
        })
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.inner.config
    }

    fn history(&self) -> MutexGuard<'_, WeightHistory> {
        // History stays consistent even if a holder panicked: every mutation is a single push or retain.
        self.inner
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Weight of one request to `endpoint_type`, with the `candleSnapshot`
    /// batch surcharge applied from `item_count`.
    pub fn calculate_weight(&self, endpoint_type: &str, item_count: Option<usize>) -> u32 {
        self.inner.config.weight_for(endpoint_type, item_count)
    }

    /// Weight spent in the current window. Purges expired history.
    pub fn current_weight(&self) -> u64 {
        self.history().current_weight(Instant::now())
    }

    /// Budget left in the current window. Negative after an overshoot.
    pub fn available_budget(&self) -> i64 {
        i64::from(self.inner.config.budget_per_window) - self.current_weight() as i64
    }

    /// Take the priority lock. Returns `false` if it was already held.
    ///
    /// The holder must call [`release_priority_lock`](Self::release_priority_lock);
    /// an unreleased lock blocks every ordinary caller forever. Prefer
    /// [`priority_session`](Self::priority_session).
    pub fn acquire_priority_lock(&self) -> bool {
        let acquired = self.inner.priority.acquire();
        if acquired {
            debug!(target: targets::GOVERNOR, "Priority lock acquired");
        }
        acquired
    }

    /// Release the priority lock and wake every waiting caller.
    pub fn release_priority_lock(&self) {
        if self.inner.priority.release() {
            debug!(target: targets::GOVERNOR, "Priority lock released");
        }
    }

    pub fn is_priority_locked(&self) -> bool {
        self.inner.priority.is_locked()
    }

    /// Acquire the priority lock for the lifetime of the returned session.
    ///
    /// If the lock is already held the session still bypasses it, but does
    /// not own it: dropping it leaves the lock with the existing holder.
    pub fn priority_session(&self) -> PrioritySession {
        let owns_lock = self.acquire_priority_lock();
        PrioritySession {
            governor: self.clone(),
            owns_lock,
        }
    }

    /// Suspend an ordinary caller until `weight` can be spent.
    ///
    /// Waits out any priority session first. Returns immediately when the
    /// budget already has room; otherwise sleeps until enough history ages
    /// out. Waiting on the priority lock restarts the budget check. Does not
    /// record anything.
    pub async fn wait_for_budget(&self, weight: u32) {
        self.admit(weight, false).await;
    }

    /// Same as [`wait_for_budget`](Self::wait_for_budget) for the priority
    /// lock holder: the lock itself is not waited on.
    pub async fn wait_for_priority_budget(&self, weight: u32) {
        self.admit(weight, true).await;
    }

    async fn admit(&self, weight: u32, is_priority: bool) {
        let mut backed_off = false;

        loop {
            if !is_priority && self.inner.priority.wait_until_released().await {
                self.inner
                    .counters
                    .priority_waits
                    .fetch_add(1, Ordering::Relaxed);
                // The holder may have spent the budget, or re-acquired the
                // lock before this task ran: start over from the lock check.
                backed_off = false;
                continue;
            }

            if backed_off {
                self.inner
                    .counters
                    .admitted_after_backoff
                    .fetch_add(1, Ordering::Relaxed);
                return;
            }

            let now = Instant::now();
            let decision = {
                let mut history = self.history();
                let current = history.current_weight(now);
                let available = i64::from(self.inner.config.budget_per_window) - current as i64;
                if i64::from(weight) <= available {
                    Admission::Now { available }
                } else {
                    let deficit = (i64::from(weight) - available) as u64;
                    match history.release_instant(deficit, now) {
                        Some(release_at) => Admission::After {
                            available,
                            release_at,
                        },
                        None => Admission::Oversized,
                    }
                }
            };

            let (available, release_at) = match decision {
                Admission::Now { available } => {
                    self.inner
                        .counters
                        .admitted_immediately
                        .fetch_add(1, Ordering::Relaxed);
                    debug!(
                        target: targets::GOVERNOR,
                        weight,
                        available,
                        is_priority,
                        "Budget available"
                    );
                    return;
                }
                Admission::Oversized => {
                    warn!(
                        target: targets::GOVERNOR,
                        weight,
                        budget = self.inner.config.budget_per_window,
                        "Request weight exceeds whole budget with empty history - admitting"
                    );
                    self.inner
                        .counters
                        .admitted_immediately
                        .fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Admission::After {
                    available,
                    release_at,
                } => (available, release_at),
            };

            let wake_at = release_at + BACKOFF_SAFETY_MARGIN;
            let wait = wake_at.saturating_duration_since(now);
            info!(
                target: targets::GOVERNOR,
                weight,
                available,
                is_priority,
                wait_ms = wait.as_millis() as u64,
                "Budget exhausted - backing off"
            );
            tokio::time::sleep_until(wake_at).await;

            self.inner
                .counters
                .backoff_ms_total
                .fetch_add(wait.as_millis() as u64, Ordering::Relaxed);
            backed_off = true;
        }
    }

    /// Record weight actually spent. Call exactly once per admitted request,
    /// including requests that failed after being sent.
    pub fn record_weight(&self, weight: u32) {
        let current = {
            let mut history = self.history();
            let now = Instant::now();
            history.record(now, weight);
            history.current_weight(now)
        };

        let budget = f64::from(self.inner.config.budget_per_window);
        let threshold = self.inner.config.warning_threshold;
        let utilization = current as f64 / budget;
        let before = current.saturating_sub(u64::from(weight)) as f64 / budget;
        // Only the request that crosses the threshold warns.
        if before < threshold && utilization >= threshold {
            warn!(
                target: targets::GOVERNOR,
                current_weight = current,
                budget = self.inner.config.budget_per_window,
                utilization = %format!("{:.2}", utilization),
                "Approaching request weight limit"
            );
        }
    }

    fn reserve(&self, weight: u32) -> WeightReservation {
        WeightReservation {
            governor: self.clone(),
            weight,
        }
    }

    /// Run `request` under the budget as an ordinary caller.
    ///
    /// The weight is recorded after `request` finishes, whatever it returns;
    /// also if it panics or the future is dropped mid-flight. The output is
    /// passed through unchanged.
    pub async fn execute<F, Fut, T>(
        &self,
        endpoint_type: &str,
        item_count: Option<usize>,
        request: F,
    ) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let weight = self.calculate_weight(endpoint_type, item_count);
        self.wait_for_budget(weight).await;
        let _reservation = self.reserve(weight);
        request().await
    }

    /// [`execute`](Self::execute) for the priority lock holder.
    pub async fn execute_priority<F, Fut, T>(
        &self,
        endpoint_type: &str,
        item_count: Option<usize>,
        request: F,
    ) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let weight = self.calculate_weight(endpoint_type, item_count);
        self.wait_for_priority_budget(weight).await;
        let _reservation = self.reserve(weight);
        request().await
    }

    /// [`execute`](Self::execute) with a bound on the time spent waiting for
    /// budget. On expiry the request is not sent, nothing is recorded, and
    /// [`Error::BudgetTimeout`] is returned.
    pub async fn execute_with_timeout<F, Fut, T>(
        &self,
        timeout: Duration,
        endpoint_type: &str,
        item_count: Option<usize>,
        request: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let weight = self.calculate_weight(endpoint_type, item_count);
        if tokio::time::timeout(timeout, self.wait_for_budget(weight))
            .await
            .is_err()
        {
            debug!(
                target: targets::GOVERNOR,
                endpoint = endpoint_type,
                weight,
                timeout_ms = timeout.as_millis() as u64,
                "Gave up waiting for budget"
            );
            return Err(Error::budget_timeout(endpoint_type, weight, timeout));
        }
        let _reservation = self.reserve(weight);
        Ok(request().await)
    }

    /// Get metrics for logging/monitoring.
    pub fn get_metrics(&self) -> GovernorMetrics {
        let (current_weight, history_len) = {
            let mut history = self.history();
            let current = history.current_weight(Instant::now());
            (current, history.len())
        };
        let budget = self.inner.config.budget_per_window;
        let utilization = current_weight as f64 / f64::from(budget);
        let counters = &self.inner.counters;

        GovernorMetrics {
            current_weight,
            budget_per_window: budget,
            available_budget: i64::from(budget) - current_weight as i64,
            utilization,
            near_limit: utilization >= self.inner.config.warning_threshold,
            priority_locked: self.is_priority_locked(),
            history_len,
            admitted_immediately: counters.admitted_immediately.load(Ordering::Relaxed),
            admitted_after_backoff: counters.admitted_after_backoff.load(Ordering::Relaxed),
            priority_waits: counters.priority_waits.load(Ordering::Relaxed),
            backoff_ms_total: counters.backoff_ms_total.load(Ordering::Relaxed),
        }
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }
}

/// Outcome of one budget check.
enum Admission {
    Now { available: i64 },
    /// Enough weight ages out of the window at `release_at`.
    After { available: i64, release_at: Instant },
    /// Nothing left in the window to free, but the request alone exceeds the budget.
    Oversized,
}

/// Records its weight when dropped.
struct WeightReservation {
    governor: WeightBudgetGovernor,
    weight: u32,
}

impl Drop for WeightReservation {
    fn drop(&mut self) {
        self.governor.record_weight(self.weight);
    }
}

/// Scoped priority lock. Releases the lock it acquired and wakes every
/// ordinary caller when dropped.
#[derive(Debug)]
pub struct PrioritySession {
    governor: WeightBudgetGovernor,
    owns_lock: bool,
}

impl PrioritySession {
    pub fn governor(&self) -> &WeightBudgetGovernor {
        &self.governor
    }

    /// Whether dropping this session releases the lock.
    pub fn owns_lock(&self) -> bool {
        self.owns_lock
    }

    pub async fn wait_for_budget(&self, weight: u32) {
        self.governor.wait_for_priority_budget(weight).await;
    }

    pub async fn execute<F, Fut, T>(
        &self,
        endpoint_type: &str,
        item_count: Option<usize>,
        request: F,
    ) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.governor
            .execute_priority(endpoint_type, item_count, request)
            .await
    }

    /// Release explicitly. Same as dropping the session.
    pub fn release(self) {}
}

impl Drop for PrioritySession {
    fn drop(&mut self) {
        if self.owns_lock {
            self.governor.release_priority_lock();
        }
    }
}
