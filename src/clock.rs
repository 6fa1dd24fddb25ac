//!
//! Time source used for revision suffixes and poll delays
//!
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Wall clock and sleeper
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
    /// Wait for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Real time, backed by tokio timers
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A clock that only moves when slept on. Every requested sleep is recorded and
/// returns immediately after advancing the time.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    /// Start at `now`
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Start at a unix timestamp in seconds
    #[must_use]
    pub fn at_unix(secs: i64) -> Self {
        Self::new(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }

    /// All sleeps requested so far, in order
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }

    async fn sleep(&self, duration: Duration) {
        lock(&self.sleeps).push(duration);
        {
            let mut now = lock(&self.now);
            *now += chrono::Duration::from_std(duration)
                .unwrap_or_else(|_| chrono::Duration::zero());
        }
        tokio::task::yield_now().await;
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Run `future` to completion unless `cancel` fires first, in which case it is dropped
/// and [`Error::Cancelled`] is returned. An already cancelled token always wins.
pub async fn or_cancel<F: Future>(cancel: &CancellationToken, future: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        output = future => Ok(output),
    }
}

/// Sleep on `clock`, returning [`Error::Cancelled`] as soon as `cancel` fires
pub async fn sleep_or_cancel(
    clock: &dyn Clock,
    cancel: &CancellationToken,
    duration: Duration,
) -> Result<()> {
    or_cancel(cancel, clock.sleep(duration)).await
}
