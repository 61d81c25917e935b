// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timers for delays, retry backoffs, and maintenance
//!
//! The engine never sleeps inside an operation; it asks the scheduler
//! for the soonest deadline, sleeps until then, and polls.

use crate::id::WorkflowId;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

/// One pending timer
#[derive(Debug, Clone)]
pub struct ScheduledItem {
    pub id: String,
    pub fire_at: Instant,
    pub kind: ScheduledKind,
    pub repeat: Option<Duration>,
}

/// What to do when a timer fires
#[derive(Debug, Clone)]
pub enum ScheduledKind {
    /// The pre-sync delay for a workflow elapsed
    DelayElapsed { workflow_id: WorkflowId },
    /// A retry backoff for a workflow elapsed
    SyncRetry { workflow_id: WorkflowId },
    /// Prune terminal workflows past retention
    Maintenance,
}

/// Heap slot ordered so the earliest deadline surfaces first.
#[derive(Debug)]
struct Slot(ScheduledItem);

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.0.fire_at == other.0.fire_at
    }
}

impl Eq for Slot {}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slot {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.0.fire_at.cmp(&self.0.fire_at)
    }
}

/// Pending timers, soonest deadline on top
#[derive(Default)]
pub struct Scheduler {
    heap: BinaryHeap<Slot>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot timer
    pub fn schedule(&mut self, id: impl Into<String>, fire_at: Instant, kind: ScheduledKind) {
        self.heap.push(Slot(ScheduledItem {
            id: id.into(),
            fire_at,
            kind,
            repeat: None,
        }));
    }

    /// Arm a timer that re-arms itself every `interval` after firing
    pub fn schedule_repeating(
        &mut self,
        id: impl Into<String>,
        fire_at: Instant,
        interval: Duration,
        kind: ScheduledKind,
    ) {
        self.heap.push(Slot(ScheduledItem {
            id: id.into(),
            fire_at,
            kind,
            repeat: Some(interval),
        }));
    }

    /// Pop every timer due at or before `now`, in deadline order
    pub fn poll(&mut self, now: Instant) -> Vec<ScheduledItem> {
        let mut due = Vec::new();

        while self.heap.peek().is_some_and(|slot| slot.0.fire_at <= now) {
            let Some(Slot(item)) = self.heap.pop() else {
                break;
            };

            // Repeating timers re-arm from their own deadline, so drift
            // from a late poll does not accumulate.
            if let Some(interval) = item.repeat {
                let mut next = item.clone();
                next.fire_at += interval;
                self.heap.push(Slot(next));
            }

            due.push(item);
        }

        due
    }

    /// True when nothing is armed
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Deadline of the soonest timer
    pub fn next_fire_time(&self) -> Option<Instant> {
        self.heap.peek().map(|slot| slot.0.fire_at)
    }
}
