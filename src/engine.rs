// Copyright 2025 Pagevitals Contributors
// SPDX-License-Identifier: Apache-2.0

//! The metric engine: one observer task per enabled metric, one aggregation
//! task merging their samples into a snapshot for the caller.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::observer::{
    cls::ClsWorker, fcp::FcpWorker, fid::FidWorker, inp::InpWorker, lcp::LcpWorker,
    spawn_observer, ObserverHandle,
};
use crate::{MetricName, MetricSample, PerformanceSource, VitalsConfig};

/// The latest sample of every enabled metric, keyed by metric.
///
/// The engine writes each incoming sample into the snapshot *before*
/// invoking the caller's callback, so the callback always sees the sample
/// that triggered it.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct VitalsSnapshot {
    /// Latest first-contentful-paint sample.
    pub fcp: Option<MetricSample>,
    /// Latest largest-contentful-paint sample.
    pub lcp: Option<MetricSample>,
    /// The first-input-delay sample, at most one per navigation.
    pub fid: Option<MetricSample>,
    /// Latest cumulative-layout-shift sample.
    pub cls: Option<MetricSample>,
    /// Latest interaction-delay sample.
    pub inp: Option<MetricSample>,
}

impl VitalsSnapshot {
    fn apply(&mut self, sample: MetricSample) {
        match sample.name {
            MetricName::Fcp => self.fcp = Some(sample),
            MetricName::Lcp => self.lcp = Some(sample),
            MetricName::Fid => self.fid = Some(sample),
            MetricName::Cls => self.cls = Some(sample),
            MetricName::Inp => self.inp = Some(sample),
            // Navigation metrics come from the standalone collector, never
            // from this engine's observers.
            MetricName::Ttfb | MetricName::DomContentLoaded | MetricName::Load => {
                debug!("{}: sample not tracked in the vitals snapshot", sample.name);
            }
        }
    }
}

type UpdateCallback = Box<dyn FnMut(&VitalsSnapshot) + Send>;

struct Running {
    observers: Vec<ObserverHandle>,
    // Resolves to the caller's callback once every sample sender is gone,
    // so the engine can be restarted.
    aggregator: tokio::task::JoinHandle<UpdateCallback>,
}

/// Computes web vitals for a single page visit.
///
/// One engine drives one visit: construct it with a
/// [`PerformanceSource`], the set of enabled metrics, and a callback;
/// [`start`](MetricEngine::start) spawns an observer per enabled metric and
/// invokes the callback with the merged [`VitalsSnapshot`] every time any
/// metric reports.
///
/// ```rust,ignore
/// let mut engine = MetricEngine::new(source, VitalsConfig::all(), |snapshot| {
///     if let Some(cls) = &snapshot.cls {
///         println!("CLS {:.3} ({:?})", cls.value, cls.rating);
///     }
/// });
/// engine.start().await;
/// // ... page visit ...
/// engine.stop().await;
/// ```
pub struct MetricEngine {
    source: Arc<dyn PerformanceSource>,
    config: VitalsConfig,
    on_update: Option<UpdateCallback>,
    running: Option<Running>,
}

impl MetricEngine {
    /// Creates an engine. Nothing is observed until
    /// [`start`](MetricEngine::start).
    pub fn new<F>(source: Arc<dyn PerformanceSource>, config: VitalsConfig, on_update: F) -> Self
    where
        F: FnMut(&VitalsSnapshot) + Send + 'static,
    {
        MetricEngine {
            source,
            config,
            on_update: Some(Box::new(on_update)),
            running: None,
        }
    }

    /// Whether the engine is currently observing.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Spawns an observer for every enabled metric. Idempotent: starting a
    /// running engine logs and returns. A metric whose subscription the
    /// host rejects is logged by its observer and skipped; the others keep
    /// running.
    pub async fn start(&mut self) {
        if self.running.is_some() {
            warn!("engine already started");
            return;
        }
        let Some(mut on_update) = self.on_update.take() else {
            error!("engine cannot restart: the update callback was lost to a panic");
            return;
        };
        info!(
            "starting metric engine (fcp: {}, lcp: {}, fid: {}, cls: {}, inp: {})",
            self.config.fcp, self.config.lcp, self.config.fid, self.config.cls, self.config.inp
        );

        let (sample_tx, mut sample_rx) = mpsc::unbounded_channel::<MetricSample>();
        let mut observers = Vec::new();
        if self.config.fcp {
            observers.push(spawn_observer(
                self.source.clone(),
                FcpWorker::new(),
                sample_tx.clone(),
            ));
        }
        if self.config.lcp {
            observers.push(spawn_observer(
                self.source.clone(),
                LcpWorker::new(),
                sample_tx.clone(),
            ));
        }
        if self.config.fid {
            observers.push(spawn_observer(
                self.source.clone(),
                FidWorker::new(),
                sample_tx.clone(),
            ));
        }
        if self.config.cls {
            observers.push(spawn_observer(
                self.source.clone(),
                ClsWorker::new(),
                sample_tx.clone(),
            ));
        }
        if self.config.inp {
            observers.push(spawn_observer(
                self.source.clone(),
                InpWorker::new(),
                sample_tx.clone(),
            ));
        }
        // Only the observers hold senders now; the aggregator ends once the
        // last one stops.
        drop(sample_tx);

        let aggregator = tokio::spawn(async move {
            let mut snapshot = VitalsSnapshot::default();
            while let Some(sample) = sample_rx.recv().await {
                snapshot.apply(sample);
                on_update(&snapshot);
            }
            on_update
        });

        self.running = Some(Running {
            observers,
            aggregator,
        });
    }

    /// Stops every observer and waits for the aggregation task to drain, so
    /// no callback fires after this returns. Idempotent.
    pub async fn stop(&mut self) {
        let Some(mut running) = self.running.take() else {
            warn!("engine already stopped");
            return;
        };
        for observer in &mut running.observers {
            observer.stop().await;
        }
        match running.aggregator.await {
            Ok(on_update) => self.on_update = Some(on_update),
            Err(err) => error!("aggregation task failed: {err}"),
        }
        info!("metric engine stopped");
    }
}
