//! Per-client daily quota.
//!
//! Every client identifier gets one [`UsageRecord`] for the current UTC day.
//! Rollover is detected lazily: a record whose date is not today is treated as
//! absent, so the periodic [`Sweeper`] only bounds memory and never affects
//! what [`RateLimiter::check_limit`] or [`RateLimiter::increment_limit`] return.

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::TRACKED_CLIENTS;

/// Source of the current calendar day.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

// Wall clock, UTC
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

// Usage entry - requests counted for one identifier on `date`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageRecord {
    pub date: NaiveDate,
    pub count: u32,
}

/// Result of a non-mutating quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitStatus {
    pub allowed: bool,
    pub count: u32,
    pub remaining: i64,
}

/// Usage after an increment. `remaining` goes negative when a caller charges
/// past the limit without checking first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub count: u32,
    pub remaining: i64,
}

/// Cheap to clone; all clones share the same usage map.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    daily_limit: u32,
    clock: Arc<dyn Clock>,
    records: DashMap<String, UsageRecord>, // identifier -> usage
}

impl RateLimiter {
    pub fn new(daily_limit: u32) -> Self {
        Self::with_clock(daily_limit, Arc::new(SystemClock))
    }

    pub fn with_clock(daily_limit: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                daily_limit,
                clock,
                records: DashMap::new(),
            }),
        }
    }

    pub fn daily_limit(&self) -> u32 {
        self.inner.daily_limit
    }

    pub fn today(&self) -> NaiveDate {
        self.inner.clock.today()
    }

    /// Number of records currently held, stale ones included until swept.
    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    /// Reports the quota of `identifier` without charging it.
    pub fn check_limit(&self, identifier: &str) -> LimitStatus {
        let limit = self.inner.daily_limit;
        let today = self.today();

        match self.inner.records.get(identifier) {
            Some(record) if record.date == today => {
                if record.count >= limit {
                    LimitStatus {
                        allowed: false,
                        count: record.count,
                        remaining: 0,
                    }
                } else {
                    LimitStatus {
                        allowed: true,
                        count: record.count,
                        remaining: i64::from(limit - record.count),
                    }
                }
            }
            // unseen, or last seen on another day
            _ => LimitStatus {
                allowed: true,
                count: 0,
                remaining: i64::from(limit),
            },
        }
    }

    /// Charges one request to `identifier`. Never refuses: callers are
    /// expected to consult [`check_limit`](Self::check_limit) first.
    pub fn increment_limit(&self, identifier: &str) -> Usage {
        let today = self.today();

        let mut record = self
            .inner
            .records
            .entry(identifier.to_string())
            .or_insert(UsageRecord {
                date: today,
                count: 0,
            });

        if record.date != today {
            *record = UsageRecord {
                date: today,
                count: 0,
            };
        }
        record.count = record.count.saturating_add(1);
        let count = record.count;
        drop(record);

        Usage {
            count,
            remaining: i64::from(self.inner.daily_limit) - i64::from(count),
        }
    }

    /// Drops every record not dated today. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let today = self.today();
        let mut removed = 0;
        self.inner.records.retain(|_, record| {
            let keep = record.date == today;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn spawn_sweeper(&self, every: Duration) -> Sweeper {
        Sweeper::spawn(self.clone(), every)
    }
}

/// Background task running [`RateLimiter::sweep`] on a fixed interval until
/// [`Sweeper::shutdown`] is called.
pub struct Sweeper {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    pub fn spawn(limiter: RateLimiter, every: Duration) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            // first sweep one full period after start
            let mut ticker = interval_at(Instant::now() + every, every);
            debug!("usage sweeper started (interval: {:?})", every);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = limiter.sweep();
                        TRACKED_CLIENTS.set(limiter.len() as f64);
                        if removed > 0 {
                            info!(removed, "evicted stale usage records");
                        }
                    }
                }
            }

            debug!("usage sweeper stopped");
        });

        Self { token, handle }
    }

    /// Cancels the task and waits for it to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "usage sweeper ended abnormally");
        }
    }
}
