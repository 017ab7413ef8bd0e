/// Single-loop task scheduling
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::auth::lifecycle::TokenLifecycleManager;
use crate::collector::CollectorLoop;
use crate::error::Result;
use crate::store::retention::RetentionJob;
use crate::types::TickOutcome;

/// When a task is due, evaluated against wall-clock time each loop iteration.
///
/// Daily times are wall-clock in the exchange timezone, not the host's.
#[derive(Debug, Clone, Copy)]
pub enum Cadence {
    Every(Duration),
    DailyAt(NaiveTime),
}

impl Cadence {
    pub fn is_due(&self, last_run: Option<DateTime<Utc>>, now: DateTime<Utc>, tz: Tz) -> bool {
        match self {
            Cadence::Every(interval) => match last_run {
                None => true,
                Some(last) => now - last >= *interval,
            },
            Cadence::DailyAt(time) => {
                let local_day = now.with_timezone(&tz).date_naive();
                let scheduled = match tz.from_local_datetime(&local_day.and_time(*time)).single()
                {
                    Some(dt) => dt.with_timezone(&Utc),
                    // DST gap; skip this day rather than guess
                    None => return false,
                };
                if now < scheduled {
                    return false;
                }
                match last_run {
                    None => true,
                    Some(last) => last < scheduled,
                }
            }
        }
    }
}

#[async_trait]
pub trait ScheduledTask: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, now: DateTime<Utc>) -> Result<()>;
}

struct Entry {
    cadence: Cadence,
    task: Box<dyn ScheduledTask>,
    last_run: Option<DateTime<Utc>>,
    run_at_startup: bool,
}

/// Drives all recurring tasks from one control loop.
///
/// Due tasks execute sequentially in registration order; this serialization
/// is the sole mutual-exclusion mechanism protecting shared credential
/// state, so the task list must never be parallelized. A task failure is
/// logged and the loop proceeds to the next task - it never terminates the
/// process.
pub struct Scheduler {
    tz: Tz,
    entries: Vec<Entry>,
    poll_interval: std::time::Duration,
}

impl Scheduler {
    pub fn new(tz: Tz) -> Self {
        Scheduler {
            tz,
            entries: Vec::new(),
            poll_interval: std::time::Duration::from_secs(1),
        }
    }

    pub fn add(&mut self, cadence: Cadence, run_at_startup: bool, task: Box<dyn ScheduledTask>) {
        self.entries.push(Entry {
            cadence,
            task,
            last_run: None,
            run_at_startup,
        });
    }

    /// Treat daily tasks whose wall-clock time already passed today as
    /// already run. A daemon started mid-day must not fire same-day
    /// catch-ups; only startup-flagged tasks get an immediate pass.
    pub fn align_daily(&mut self, now: DateTime<Utc>) {
        for entry in &mut self.entries {
            if entry.run_at_startup {
                continue;
            }
            if matches!(entry.cadence, Cadence::DailyAt(_)) && entry.last_run.is_none() {
                entry.last_run = Some(now);
            }
        }
    }

    /// Run every due task once, in registration order
    pub async fn run_pending(&mut self, now: DateTime<Utc>) -> usize {
        let mut ran = 0;
        for entry in &mut self.entries {
            let due = (entry.run_at_startup && entry.last_run.is_none())
                || entry.cadence.is_due(entry.last_run, now, self.tz);
            if !due {
                continue;
            }

            debug!("Running scheduled task: {}", entry.task.name());
            if let Err(e) = entry.task.run(now).await {
                error!(
                    "Task {} failed: {} ({})",
                    entry.task.name(),
                    e,
                    e.error_code()
                );
            }
            // Failures wait for the next cadence too; there is no
            // intra-cycle retry
            entry.last_run = Some(now);
            ran += 1;
        }
        ran
    }

    /// Main control loop; blocks until Ctrl+C
    pub async fn run(&mut self) -> Result<()> {
        let shutdown = Arc::new(RwLock::new(false));
        {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl+C received - initiating graceful shutdown");
                    *shutdown.write().await = true;
                }
            });
        }

        self.align_daily(Utc::now());
        info!("Scheduler started with {} tasks", self.entries.len());

        loop {
            {
                let shutdown = shutdown.read().await;
                if *shutdown {
                    info!("Shutdown signal received");
                    break;
                }
            }

            let now = Utc::now();
            self.run_pending(now).await;

            tokio::time::sleep(self.poll_interval).await;
        }

        info!("Scheduler stopped");
        Ok(())
    }
}

/// Collector tick wrapper
pub struct CollectTask {
    collector: Arc<CollectorLoop>,
}

impl CollectTask {
    pub fn new(collector: Arc<CollectorLoop>) -> Self {
        CollectTask { collector }
    }
}

#[async_trait]
impl ScheduledTask for CollectTask {
    fn name(&self) -> &'static str {
        "collect-holdings"
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<()> {
        match self.collector.tick(now).await? {
            TickOutcome::SkippedOutsideSession => {
                debug!("Collection skipped - outside session window")
            }
            TickOutcome::NoHoldings => debug!("Collection found no holdings"),
            TickOutcome::Collected(n) => info!("Collected snapshot of {} holdings", n),
        }
        Ok(())
    }
}

/// Daily refresh-token staleness check
pub struct RefreshCheckTask {
    lifecycle: Arc<TokenLifecycleManager>,
}

impl RefreshCheckTask {
    pub fn new(lifecycle: Arc<TokenLifecycleManager>) -> Self {
        RefreshCheckTask { lifecycle }
    }
}

#[async_trait]
impl ScheduledTask for RefreshCheckTask {
    fn name(&self) -> &'static str {
        "refresh-token-check"
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<()> {
        self.lifecycle.reconcile(now).await?;
        Ok(())
    }
}

/// Daily access-token renewal; routes through the same reconcile so a stale
/// refresh token discovered here is handled identically
pub struct AccessRenewalTask {
    lifecycle: Arc<TokenLifecycleManager>,
}

impl AccessRenewalTask {
    pub fn new(lifecycle: Arc<TokenLifecycleManager>) -> Self {
        AccessRenewalTask { lifecycle }
    }
}

#[async_trait]
impl ScheduledTask for AccessRenewalTask {
    fn name(&self) -> &'static str {
        "access-token-renewal"
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<()> {
        self.lifecycle.reconcile(now).await?;
        Ok(())
    }
}

/// Daily retention compaction
pub struct RetentionTask {
    job: Arc<RetentionJob>,
}

impl RetentionTask {
    pub fn new(job: Arc<RetentionJob>) -> Self {
        RetentionTask { job }
    }
}

#[async_trait]
impl ScheduledTask for RetentionTask {
    fn name(&self) -> &'static str {
        "retention-compaction"
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<()> {
        self.job.run(now).await
    }
}
