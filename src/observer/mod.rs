// Copyright 2025 Pagevitals Contributors
// SPDX-License-Identifier: Apache-2.0

//! The shared observer lifecycle.
//!
//! Every metric observer is the same machine: a task that owns one entry
//! subscription, one page event stream, the first-hidden timestamp, a
//! one-shot user-interaction flag, an optional report-debounce timer, and an
//! optional pending paint probe. [`ObserverDriver`] runs that machine and
//! dispatches into a [`MetricWorker`], which holds only the per-metric
//! algorithm. The driver guarantees:
//!
//! - the stop channel always wins over pending work (`biased` select);
//! - `first_hidden_time` is assigned at most once per lifecycle and reset
//!   only by a persisted pageshow;
//! - the interaction flag sets on the first click or keydown and resets only
//!   by a persisted pageshow;
//! - teardown cancels any pending debounce before the task ends, so no
//!   report can fire after [`ObserverHandle::stop`] returns.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::{
    EntryKind, EntryStream, InteractionKind, MetricContext, MetricName, MetricSample, PageEvent,
    PageEventStream, PerfEntry, PerformanceSource, SubscribeOptions, Unit,
};

pub(crate) mod cls;
pub(crate) mod fcp;
pub(crate) mod fid;
pub(crate) mod inp;
pub(crate) mod lcp;

/// The per-metric half of an observer: receives lifecycle callbacks from the
/// driver and turns entries into samples via [`ObserverCtx::emit`].
pub(crate) trait MetricWorker: Send + 'static {
    /// The metric this worker computes, for samples and log lines.
    fn metric(&self) -> MetricName;

    /// The entry kind this worker subscribes to.
    fn kind(&self) -> EntryKind;

    /// Subscription options; buffered with no duration filter by default.
    fn subscribe_options(&self) -> SubscribeOptions {
        SubscribeOptions::buffered()
    }

    /// One batch of entries arrived from the host.
    fn on_entries(&mut self, entries: Vec<PerfEntry>, ctx: &mut ObserverCtx);

    /// Page visibility changed. The driver has already updated
    /// `first_hidden_time` and the visible flag.
    fn on_visibility(&mut self, visible: bool, ctx: &mut ObserverCtx) {
        let _ = (visible, ctx);
    }

    /// The user interacted with the page (any occurrence, not just the
    /// first; the driver tracks the one-shot flag).
    fn on_interaction(&mut self, kind: InteractionKind, ctx: &mut ObserverCtx) {
        let _ = (kind, ctx);
    }

    /// The page was restored from the back-forward cache. The driver has
    /// already reset the interaction flag and `first_hidden_time`.
    fn on_bfcache_restore(&mut self, timestamp: f64, ctx: &mut ObserverCtx) {
        let _ = (timestamp, ctx);
    }

    /// A debounce scheduled via [`ObserverCtx::schedule_debounce`] expired.
    fn on_debounce(&mut self, ctx: &mut ObserverCtx) {
        let _ = ctx;
    }

    /// A paint probe requested via [`ObserverCtx::begin_paint_probe`]
    /// completed; `probe_time` is the host clock after two frames.
    fn on_paint_probe(&mut self, probe_time: f64, ctx: &mut ObserverCtx) {
        let _ = (probe_time, ctx);
    }
}

/// Lifecycle state shared between the driver loop and worker callbacks.
pub(crate) struct ObserverCtx {
    metric: MetricName,
    kind: EntryKind,
    options: SubscribeOptions,
    source: Arc<dyn PerformanceSource>,
    sample_tx: mpsc::UnboundedSender<MetricSample>,
    subscription: Option<EntryStream>,
    debounce_deadline: Option<Instant>,
    paint_probe: Option<BoxFuture<'static, f64>>,
    first_hidden_time: f64,
    page_visible: bool,
    user_has_interacted: bool,
    stop_requested: bool,
}

impl ObserverCtx {
    fn new(
        metric: MetricName,
        kind: EntryKind,
        options: SubscribeOptions,
        source: Arc<dyn PerformanceSource>,
        sample_tx: mpsc::UnboundedSender<MetricSample>,
    ) -> Self {
        let visible = source.visibility().is_visible();
        ObserverCtx {
            metric,
            kind,
            options,
            source,
            sample_tx,
            subscription: None,
            debounce_deadline: None,
            paint_probe: None,
            first_hidden_time: if visible { f64::INFINITY } else { 0.0 },
            page_visible: visible,
            user_has_interacted: false,
            stop_requested: false,
        }
    }

    /// The first time the page went hidden, 0 if it started hidden, or +∞
    /// while it has never been hidden.
    pub(crate) fn first_hidden_time(&self) -> f64 {
        self.first_hidden_time
    }

    pub(crate) fn is_page_visible(&self) -> bool {
        self.page_visible
    }

    pub(crate) fn now(&self) -> f64 {
        self.source.now()
    }

    pub(crate) fn activation_start(&self) -> f64 {
        self.source.activation_start()
    }

    pub(crate) fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    /// Builds the full sample (rating, URL, network conditions) and sends it
    /// to the aggregation side.
    pub(crate) fn emit(&mut self, value: f64, unit: Unit, context: MetricContext) {
        let mut sample = MetricSample::new(self.metric, value, unit, self.now(), context);
        sample.url = self.source.page_url();
        sample.network = self.source.network_information();
        debug!(
            "{}: reporting {:.2}{} (rating: {:?})",
            self.metric, sample.value, sample.unit, sample.rating
        );
        if self.sample_tx.send(sample).is_err() {
            warn!("{}: sample receiver dropped, report discarded", self.metric);
        }
    }

    /// (Re)arms the debounce timer to fire `delay` from now. Replaces any
    /// pending deadline.
    pub(crate) fn schedule_debounce(&mut self, delay: Duration) {
        self.debounce_deadline = Some(Instant::now() + delay);
    }

    pub(crate) fn cancel_debounce(&mut self) {
        self.debounce_deadline = None;
    }

    /// Synchronously drains batches the host delivered but the driver has
    /// not yet dispatched. Empty when the subscription is gone.
    pub(crate) fn take_records(&mut self) -> Vec<PerfEntry> {
        match self.subscription.as_mut() {
            Some(stream) => stream.take_records(),
            None => Vec::new(),
        }
    }

    /// Drops the entry subscription. Idempotent.
    pub(crate) fn disconnect(&mut self) {
        if let Some(mut stream) = self.subscription.take() {
            stream.close();
            debug!("{}: unsubscribed from '{}' entries", self.metric, self.kind);
        }
    }

    /// Replaces the subscription with a fresh live-only one. Re-arming
    /// happens after a bfcache restore, where buffered delivery would
    /// replay pre-restore entries into the reset lifecycle; only entries
    /// recorded from now on may count. On failure the metric stays
    /// unsubscribed for the rest of the visit.
    pub(crate) fn resubscribe(&mut self) {
        self.disconnect();
        let options = SubscribeOptions {
            buffered: false,
            ..self.options
        };
        match self.source.subscribe(self.kind, options) {
            Ok(stream) => self.subscription = Some(stream),
            Err(err) => {
                error!("{}: could not resubscribe: {}", self.metric, err);
            }
        }
    }

    /// Starts a paint probe: resolves after the host paints two frames, so
    /// the measurement lands after the first post-restore paint. Replaces
    /// any probe already in flight.
    pub(crate) fn begin_paint_probe(&mut self) {
        let source = self.source.clone();
        self.paint_probe = Some(Box::pin(async move {
            source.next_frame().await;
            source.next_frame().await
        }));
    }

    /// Asks the driver to tear the observer down once the current callback
    /// returns. Safe to call from any worker callback.
    pub(crate) fn request_stop(&mut self) {
        self.stop_requested = true;
    }
}

/// One dispatchable occurrence in the observer's event loop.
enum LoopEvent {
    Stop,
    Page(PageEvent),
    PageFeedClosed,
    Entries(Vec<PerfEntry>),
    EntriesClosed,
    Debounce,
    PaintProbe(f64),
}

async fn recv_page(stream: &mut Option<PageEventStream>) -> Option<PageEvent> {
    match stream {
        Some(stream) => stream.recv().await,
        None => future::pending().await,
    }
}

async fn recv_entries(subscription: &mut Option<EntryStream>) -> Option<Vec<PerfEntry>> {
    match subscription {
        Some(stream) => stream.recv().await,
        None => future::pending().await,
    }
}

async fn probe_done(probe: &mut Option<BoxFuture<'static, f64>>) -> f64 {
    match probe {
        Some(probe) => probe.as_mut().await,
        None => future::pending().await,
    }
}

async fn debounce_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

/// Runs one metric observer: subscribes, dispatches loop events into the
/// worker, and tears everything down exactly once.
pub(crate) struct ObserverDriver<W: MetricWorker> {
    worker: W,
    ctx: ObserverCtx,
    page_events: Option<PageEventStream>,
    stop_rx: mpsc::Receiver<()>,
}

impl<W: MetricWorker> ObserverDriver<W> {
    async fn run(mut self) {
        match self
            .ctx
            .source
            .subscribe(self.ctx.kind, self.ctx.options)
        {
            Ok(stream) => self.ctx.subscription = Some(stream),
            Err(err) => {
                // No retry: the metric is unavailable for this visit, and
                // siblings are unaffected.
                error!("{}: observation unavailable: {}", self.ctx.metric, err);
                return;
            }
        }
        debug!(
            "{}: observing '{}' entries",
            self.ctx.metric, self.ctx.kind
        );

        loop {
            if self.ctx.stop_requested {
                break;
            }
            let event = Self::next_event(
                &mut self.ctx,
                &mut self.page_events,
                &mut self.stop_rx,
            )
            .await;
            match event {
                LoopEvent::Stop => break,
                LoopEvent::Page(event) => self.dispatch_page_event(event),
                LoopEvent::PageFeedClosed => {
                    debug!("{}: page event feed closed", self.ctx.metric);
                    self.page_events = None;
                }
                LoopEvent::Entries(batch) => self.worker.on_entries(batch, &mut self.ctx),
                LoopEvent::EntriesClosed => {
                    debug!("{}: entry feed closed by host", self.ctx.metric);
                    self.ctx.subscription = None;
                }
                LoopEvent::Debounce => {
                    self.ctx.debounce_deadline = None;
                    self.worker.on_debounce(&mut self.ctx);
                }
                LoopEvent::PaintProbe(probe_time) => {
                    self.ctx.paint_probe = None;
                    self.worker.on_paint_probe(probe_time, &mut self.ctx);
                }
            }
        }

        // Pending reports must not outlive the observer.
        self.ctx.cancel_debounce();
        self.ctx.disconnect();
        debug!("{}: observer stopped", self.ctx.metric);
    }

    async fn next_event(
        ctx: &mut ObserverCtx,
        page_events: &mut Option<PageEventStream>,
        stop_rx: &mut mpsc::Receiver<()>,
    ) -> LoopEvent {
        let ObserverCtx {
            subscription,
            debounce_deadline,
            paint_probe,
            ..
        } = ctx;
        tokio::select! {
            biased;

            _ = stop_rx.recv() => LoopEvent::Stop,
            event = recv_page(page_events) => match event {
                Some(event) => LoopEvent::Page(event),
                None => LoopEvent::PageFeedClosed,
            },
            probe_time = probe_done(paint_probe) => LoopEvent::PaintProbe(probe_time),
            _ = debounce_elapsed(*debounce_deadline) => LoopEvent::Debounce,
            batch = recv_entries(subscription) => match batch {
                Some(batch) => LoopEvent::Entries(batch),
                None => LoopEvent::EntriesClosed,
            },
        }
    }

    fn dispatch_page_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::VisibilityChanged { visible, timestamp } => {
                self.ctx.page_visible = visible;
                if !visible && self.ctx.first_hidden_time.is_infinite() {
                    self.ctx.first_hidden_time = timestamp;
                    debug!(
                        "{}: page first hidden at {:.1}ms",
                        self.ctx.metric, timestamp
                    );
                }
                self.worker.on_visibility(visible, &mut self.ctx);
            }
            PageEvent::Interaction { kind, timestamp } => {
                if !self.ctx.user_has_interacted {
                    self.ctx.user_has_interacted = true;
                    debug!(
                        "{}: first user interaction at {:.1}ms",
                        self.ctx.metric, timestamp
                    );
                }
                self.worker.on_interaction(kind, &mut self.ctx);
            }
            PageEvent::PageShow { persisted, timestamp } => {
                if !persisted {
                    return;
                }
                info!(
                    "{}: page restored from back-forward cache at {:.1}ms",
                    self.ctx.metric, timestamp
                );
                self.ctx.user_has_interacted = false;
                self.ctx.page_visible = self.ctx.source.visibility().is_visible();
                self.ctx.first_hidden_time = if self.ctx.page_visible {
                    f64::INFINITY
                } else {
                    0.0
                };
                self.worker.on_bfcache_restore(timestamp, &mut self.ctx);
            }
        }
    }
}

/// A handle to a running observer task.
///
/// Dropping the handle without calling [`stop`](ObserverHandle::stop) also
/// stops the observer: the task treats its closed stop channel as a stop
/// signal.
pub(crate) struct ObserverHandle {
    metric: MetricName,
    stop_tx: mpsc::Sender<()>,
    join: Option<tokio::task::JoinHandle<()>>,
}

impl ObserverHandle {
    /// Stops the observer and waits for its task to finish, so no report
    /// can fire afterwards. Idempotent: stopping an already-stopped
    /// observer logs and returns.
    pub(crate) async fn stop(&mut self) {
        if self.stop_tx.send(()).await.is_err() {
            warn!("{}: observer already stopped", self.metric);
        }
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                if err.is_panic() {
                    error!("{}: observer task panicked: {}", self.metric, err);
                }
            }
        }
    }
}

/// Spawns the observer task for `worker` and returns its handle.
pub(crate) fn spawn_observer<W: MetricWorker>(
    source: Arc<dyn PerformanceSource>,
    worker: W,
    sample_tx: mpsc::UnboundedSender<MetricSample>,
) -> ObserverHandle {
    let metric = worker.metric();
    let ctx = ObserverCtx::new(
        metric,
        worker.kind(),
        worker.subscribe_options(),
        source.clone(),
        sample_tx,
    );
    let page_events = Some(source.page_events());
    let (stop_tx, stop_rx) = mpsc::channel(1);
    let driver = ObserverDriver {
        worker,
        ctx,
        page_events,
        stop_rx,
    };
    let join = tokio::spawn(async move {
        driver.run().await;
    });
    ObserverHandle {
        metric,
        stop_tx,
        join: Some(join),
    }
}
