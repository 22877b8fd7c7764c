//! The tick loop.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{DomainError, Order, OrderService, Trigger};
use futures_util::{StreamExt, stream};
use order_store::{OrderStore, Version};
use tokio::time::MissedTickBehavior;

use crate::error::Result;

/// Default number of orders advanced in parallel during one tick.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// A scheduled transition whose deadline has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueTransition {
    pub order_id: OrderId,
    /// The version the scan observed; used as the expected version.
    pub version: Version,
    pub trigger: Trigger,
}

impl DueTransition {
    /// Returns the due transition of `order` at `now`, if any.
    pub fn of(order: &Order, now: DateTime<Utc>) -> Option<Self> {
        order.due_trigger(now).map(|trigger| Self {
            order_id: order.id(),
            version: order.version(),
            trigger,
        })
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Orders found with an elapsed deadline.
    pub due: usize,
    /// Transitions written.
    pub applied: usize,
    /// Orders that changed or vanished between scan and write.
    pub conflicts: usize,
    /// Orders whose transition was rejected or could not be written.
    pub failed: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.due == 0
    }
}

enum Outcome {
    Applied,
    Conflict,
    Failed,
}

/// Drives orders through their scheduled transitions.
///
/// The scheduler owns no state of its own. Every write goes through
/// [`OrderService::transition`], the entrypoint a person would use, so the
/// version check is what keeps a due transition from being applied twice.
pub struct AutoTransitionScheduler<S: OrderStore> {
    service: Arc<OrderService<S>>,
    max_concurrent: usize,
}

impl<S: OrderStore> AutoTransitionScheduler<S> {
    pub fn new(service: Arc<OrderService<S>>) -> Self {
        Self {
            service,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Limits how many orders one tick advances at the same time.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Scans for orders whose deadline has passed.
    pub async fn collect_due(&self) -> Result<Vec<DueTransition>> {
        let now = self.service.guard().now();
        Ok(self
            .service
            .due_orders()
            .await?
            .iter()
            .filter_map(|order| DueTransition::of(order, now))
            .collect())
    }

    /// Fires the given transitions, at most `max_concurrent` at a time.
    pub async fn apply(&self, due: Vec<DueTransition>) -> TickReport {
        let mut report = TickReport {
            due: due.len(),
            ..Default::default()
        };

        let outcomes: Vec<Outcome> = stream::iter(due)
            .map(|transition| self.advance(transition))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Outcome::Applied => report.applied += 1,
                Outcome::Conflict => report.conflicts += 1,
                Outcome::Failed => report.failed += 1,
            }
        }
        report
    }

    /// Runs one scan and applies everything that is due.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self) -> Result<TickReport> {
        let started = Instant::now();
        let due = self.collect_due().await?;
        let report = self.apply(due).await;

        metrics::histogram!("orders_scheduler_tick_seconds")
            .record(started.elapsed().as_secs_f64());
        if !report.is_idle() {
            tracing::debug!(
                due = report.due,
                applied = report.applied,
                conflicts = report.conflicts,
                failed = report.failed,
                "scheduler tick complete"
            );
        }
        Ok(report)
    }

    /// Ticks every `period` until `shutdown` resolves.
    ///
    /// A failed tick is logged and the loop keeps going; the next tick
    /// rescans from the store.
    pub async fn run<F>(&self, period: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(period_ms = period.as_millis() as u64, "scheduler started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("scheduler stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "scheduler tick failed");
                    }
                }
            }
        }
    }

    async fn advance(&self, due: DueTransition) -> Outcome {
        let result = self
            .service
            .transition(due.order_id, due.version, due.trigger)
            .await;

        match result {
            Ok(_) => {
                metrics::counter!("orders_auto_transitions_total", "trigger" => due.trigger.as_str())
                    .increment(1);
                Outcome::Applied
            }
            Err(e) if is_lost_race(&e) => {
                metrics::counter!("orders_scheduler_conflicts_total").increment(1);
                tracing::debug!(
                    order_id = %due.order_id,
                    version = %due.version,
                    trigger = %due.trigger,
                    "order changed before its scheduled transition, skipping"
                );
                Outcome::Conflict
            }
            Err(e) => {
                tracing::warn!(
                    order_id = %due.order_id,
                    trigger = %due.trigger,
                    error = %e,
                    "scheduled transition failed"
                );
                Outcome::Failed
            }
        }
    }
}

fn is_lost_race(e: &DomainError) -> bool {
    e.is_version_conflict() || e.is_not_found()
}
