// Copyright 2025 Pagevitals Contributors
// SPDX-License-Identifier: Apache-2.0

//! Thin, non-algorithmic collectors that sit next to the metric engine.
//!
//! Each collector is a pass-through over one entry kind: subscribe, lightly
//! filter, invoke its callback with well-formed records. None of them carry
//! visibility or bfcache state; a full page reload resets them like
//! everything else.

use std::sync::Arc;

use log::{error, warn};
use tokio::sync::mpsc;

use crate::{
    EntryKind, EntryStream, MetricContext, MetricName, MetricSample, PerfEntry,
    PerformanceSource, Result, SubscribeOptions, Unit,
};

/// A handle to a running collector task.
pub struct CollectorHandle {
    name: &'static str,
    stop_tx: mpsc::Sender<()>,
    join: Option<tokio::task::JoinHandle<()>>,
}

impl CollectorHandle {
    fn spawn<F>(name: &'static str, mut stream: EntryStream, mut on_batch: F) -> Self
    where
        F: FnMut(Vec<PerfEntry>) + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = mpsc::channel(1);
        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.recv() => break,
                    batch = stream.recv() => match batch {
                        Some(entries) => on_batch(entries),
                        None => break,
                    },
                }
            }
        });
        CollectorHandle {
            name,
            stop_tx,
            join: Some(join),
        }
    }

    /// Stops the collector and waits for its task to finish. Idempotent.
    pub async fn stop(&mut self) {
        if self.stop_tx.send(()).await.is_err() {
            warn!("{}: collector already stopped", self.name);
        }
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                if err.is_panic() {
                    error!("{}: collector task panicked: {}", self.name, err);
                }
            }
        }
    }
}

/// One main-thread blocking task.
#[derive(Debug, Clone, PartialEq)]
pub struct LongTaskRecord {
    pub start_time: f64,
    pub duration: f64,
    /// Container attribution when the host can provide it.
    pub attribution: Option<String>,
}

/// Long task collector settings.
#[derive(Debug, Clone)]
pub struct LongTaskConfig {
    /// Retained record limit; further tasks are dropped.
    pub max_entries: usize,
}

impl Default for LongTaskConfig {
    fn default() -> Self {
        LongTaskConfig { max_entries: 50 }
    }
}

/// Forwards main-thread blocking tasks to `on_update`, invoked with the full
/// retained list after every batch.
pub struct LongTaskCollector;

impl LongTaskCollector {
    pub fn spawn<F>(
        source: Arc<dyn PerformanceSource>,
        config: LongTaskConfig,
        mut on_update: F,
    ) -> Result<CollectorHandle>
    where
        F: FnMut(&[LongTaskRecord]) + Send + 'static,
    {
        let stream = source.subscribe(EntryKind::LongTask, SubscribeOptions::buffered())?;
        let mut records: Vec<LongTaskRecord> = Vec::new();
        Ok(CollectorHandle::spawn("longtasks", stream, move |batch| {
            for entry in batch {
                let PerfEntry::LongTask {
                    start_time,
                    duration,
                    attribution,
                } = entry
                else {
                    continue;
                };
                if records.len() >= config.max_entries {
                    continue;
                }
                records.push(LongTaskRecord {
                    start_time,
                    duration,
                    attribution,
                });
            }
            on_update(&records);
        }))
    }
}

/// One resource load.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub name: String,
    pub initiator_type: String,
    pub start_time: f64,
    pub duration: f64,
    pub transfer_size: u64,
    pub decoded_body_size: u64,
    pub response_end: f64,
}

/// Resource timing collector settings.
#[derive(Debug, Clone)]
pub struct ResourceTimingConfig {
    /// Retained record limit; further resources are dropped.
    pub max_entries: usize,
}

impl Default for ResourceTimingConfig {
    fn default() -> Self {
        ResourceTimingConfig { max_entries: 100 }
    }
}

/// Initiator types considered static assets worth recording.
const STATIC_INITIATOR_TYPES: [&str; 5] = ["script", "link", "img", "css", "font"];

/// Forwards static-asset load timings to `on_update`, deduplicated by URL
/// and start time, invoked with the full retained list after every batch.
pub struct ResourceTimingCollector;

impl ResourceTimingCollector {
    pub fn spawn<F>(
        source: Arc<dyn PerformanceSource>,
        config: ResourceTimingConfig,
        mut on_update: F,
    ) -> Result<CollectorHandle>
    where
        F: FnMut(&[ResourceRecord]) + Send + 'static,
    {
        let stream = source.subscribe(EntryKind::Resource, SubscribeOptions::buffered())?;
        let mut records: Vec<ResourceRecord> = Vec::new();
        Ok(CollectorHandle::spawn("resources", stream, move |batch| {
            for entry in batch {
                let PerfEntry::Resource {
                    name,
                    initiator_type,
                    start_time,
                    duration,
                    transfer_size,
                    decoded_body_size,
                    response_end,
                } = entry
                else {
                    continue;
                };
                if !STATIC_INITIATOR_TYPES.contains(&initiator_type.as_str()) {
                    continue;
                }
                let duplicate = records
                    .iter()
                    .any(|record| record.name == name && record.start_time == start_time);
                if duplicate || records.len() >= config.max_entries {
                    continue;
                }
                records.push(ResourceRecord {
                    name,
                    initiator_type,
                    start_time,
                    duration,
                    transfer_size,
                    decoded_body_size,
                    response_end,
                });
            }
            on_update(&records);
        }))
    }
}

/// The page-load timing samples derived from the navigation entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationTiming {
    /// Time to first byte, rated (good ≤ 100ms, needs-improvement ≤ 200ms).
    pub ttfb: MetricSample,
    /// DOMContentLoaded completion relative to navigation start.
    pub dom_content_loaded: MetricSample,
    /// Load event completion relative to navigation start.
    pub load: MetricSample,
}

/// Derives TTFB / DOMContentLoaded / Load from navigation entries. Re-emits
/// when the host reports a new navigation entry (soft navigations).
pub struct NavigationTimingCollector;

impl NavigationTimingCollector {
    pub fn spawn<F>(source: Arc<dyn PerformanceSource>, mut on_update: F) -> Result<CollectorHandle>
    where
        F: FnMut(&NavigationTiming) + Send + 'static,
    {
        let stream = source.subscribe(EntryKind::Navigation, SubscribeOptions::buffered())?;
        let clock = source.clone();
        Ok(CollectorHandle::spawn("navigation", stream, move |batch| {
            // Only the most recent navigation entry in a batch matters.
            let latest = batch.into_iter().rev().find_map(|entry| match entry {
                PerfEntry::Navigation {
                    start_time,
                    request_start,
                    response_start,
                    dom_content_loaded_event_end,
                    load_event_end,
                } => Some((
                    start_time,
                    request_start,
                    response_start,
                    dom_content_loaded_event_end,
                    load_event_end,
                )),
                _ => None,
            });
            let Some((start_time, request_start, response_start, dcl_end, load_end)) = latest
            else {
                return;
            };
            let now = clock.now();
            let timing = NavigationTiming {
                ttfb: MetricSample::new(
                    MetricName::Ttfb,
                    response_start - request_start,
                    Unit::Millis,
                    now,
                    MetricContext::None,
                ),
                dom_content_loaded: MetricSample::new(
                    MetricName::DomContentLoaded,
                    dcl_end - start_time,
                    Unit::Millis,
                    now,
                    MetricContext::None,
                ),
                load: MetricSample::new(
                    MetricName::Load,
                    load_end - start_time,
                    Unit::Millis,
                    now,
                    MetricContext::None,
                ),
            };
            on_update(&timing);
        }))
    }
}
