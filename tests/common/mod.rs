// Copyright 2025 Pagevitals Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared test fixtures: a scripted performance source and capture helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use pagevitals::{
    EntryKind, EntryStream, Error, InteractionKind, PageEvent, PageEventStream,
    PerfEntry, PerformanceSource, Result, SubscribeOptions, Visibility, VitalsSnapshot,
};

/// A hand-driven [`PerformanceSource`].
///
/// Tests script the visit: buffer entries for delivery at subscribe time,
/// push live batches, and emit page events. Entries pushed before the
/// observers have subscribed are lost, so call [`settle`] after starting an
/// engine before pushing.
pub struct FakeSource {
    inner: Mutex<Inner>,
}

struct Inner {
    unsupported: Vec<EntryKind>,
    buffered: HashMap<EntryKind, Vec<Vec<PerfEntry>>>,
    subscribers: Vec<(EntryKind, mpsc::UnboundedSender<Vec<PerfEntry>>)>,
    page_subscribers: Vec<mpsc::UnboundedSender<PageEvent>>,
    now: f64,
    visibility: Visibility,
    activation_start: f64,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Self::with_visibility(Visibility::Visible)
    }

    /// A source whose page is already hidden at construction.
    pub fn hidden() -> Arc<Self> {
        Self::with_visibility(Visibility::Hidden)
    }

    fn with_visibility(visibility: Visibility) -> Arc<Self> {
        let _ = env_logger::builder().is_test(true).try_init();
        Arc::new(FakeSource {
            inner: Mutex::new(Inner {
                unsupported: Vec::new(),
                buffered: HashMap::new(),
                subscribers: Vec::new(),
                page_subscribers: Vec::new(),
                now: 0.0,
                visibility,
                activation_start: 0.0,
            }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("fake source poisoned")
    }

    /// Marks an entry kind as unsupported: subscribing to it fails.
    pub fn mark_unsupported(&self, kind: EntryKind) {
        self.lock().unsupported.push(kind);
    }

    pub fn set_now(&self, now: f64) {
        self.lock().now = now;
    }

    pub fn set_activation_start(&self, activation_start: f64) {
        self.lock().activation_start = activation_start;
    }

    /// Queues a batch for delivery when a buffered subscription is created.
    pub fn buffer(&self, kind: EntryKind, batch: Vec<PerfEntry>) {
        self.lock().buffered.entry(kind).or_default().push(batch);
    }

    /// Delivers a batch to every live subscriber of `kind`.
    pub fn push(&self, kind: EntryKind, batch: Vec<PerfEntry>) {
        let mut inner = self.lock();
        inner
            .subscribers
            .retain(|(k, sender)| *k != kind || sender.send(batch.clone()).is_ok());
    }

    /// Emits a page event to every observer.
    pub fn emit(&self, event: PageEvent) {
        let mut inner = self.lock();
        if let PageEvent::VisibilityChanged { visible, .. } = event {
            inner.visibility = if visible {
                Visibility::Visible
            } else {
                Visibility::Hidden
            };
        }
        inner
            .page_subscribers
            .retain(|sender| sender.send(event).is_ok());
    }

    /// Hides the page at `timestamp`.
    pub fn hide(&self, timestamp: f64) {
        self.set_now(timestamp);
        self.emit(PageEvent::VisibilityChanged {
            visible: false,
            timestamp,
        });
    }

    /// Makes the page visible again at `timestamp`.
    pub fn show(&self, timestamp: f64) {
        self.set_now(timestamp);
        self.emit(PageEvent::VisibilityChanged {
            visible: true,
            timestamp,
        });
    }

    /// A user click at `timestamp`.
    pub fn interact(&self, timestamp: f64) {
        self.set_now(timestamp);
        self.emit(PageEvent::Interaction {
            kind: InteractionKind::Click,
            timestamp,
        });
    }

    /// Restores the page from the back-forward cache at `timestamp`.
    pub fn restore(&self, timestamp: f64) {
        {
            let mut inner = self.lock();
            inner.now = timestamp;
            inner.visibility = Visibility::Visible;
        }
        self.emit(PageEvent::PageShow {
            persisted: true,
            timestamp,
        });
    }

    /// How many live subscriptions exist for `kind`.
    pub fn subscriber_count(&self, kind: EntryKind) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|(_, sender)| !sender.is_closed());
        inner
            .subscribers
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

impl PerformanceSource for FakeSource {
    fn subscribe(&self, kind: EntryKind, options: SubscribeOptions) -> Result<EntryStream> {
        let mut inner = self.lock();
        if inner.unsupported.contains(&kind) {
            return Err(Error::UnsupportedEntryKind { kind });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        if options.buffered {
            for batch in inner.buffered.get(&kind).cloned().unwrap_or_default() {
                tx.send(batch).expect("fresh receiver");
            }
        }
        inner.subscribers.push((kind, tx));
        Ok(EntryStream::new(rx))
    }

    fn page_events(&self) -> PageEventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().page_subscribers.push(tx);
        PageEventStream::new(rx)
    }

    fn visibility(&self) -> Visibility {
        self.lock().visibility
    }

    fn now(&self) -> f64 {
        self.lock().now
    }

    fn activation_start(&self) -> f64 {
        self.lock().activation_start
    }

    fn next_frame(&self) -> BoxFuture<'static, f64> {
        // Frames are instantaneous in tests: resolve at the current clock.
        let now = self.now();
        Box::pin(futures::future::ready(now))
    }

    fn page_url(&self) -> Option<String> {
        Some("https://example.test/page".to_string())
    }
}

/// Lets every spawned observer and the aggregation task run to idle on the
/// current-thread test runtime.
pub async fn settle() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}

/// A callback capturing every snapshot the engine publishes.
pub fn capture() -> (
    Arc<Mutex<Vec<VitalsSnapshot>>>,
    impl FnMut(&VitalsSnapshot) + Send + 'static,
) {
    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let sink = snapshots.clone();
    let callback = move |snapshot: &VitalsSnapshot| {
        sink.lock().expect("capture poisoned").push(snapshot.clone());
    };
    (snapshots, callback)
}

/// Shorthand for a layout shift entry.
pub fn shift(start_time: f64, value: f64) -> PerfEntry {
    PerfEntry::LayoutShift {
        value,
        start_time,
        had_recent_input: false,
    }
}

/// Shorthand for a largest-contentful-paint candidate.
pub fn lcp_candidate(start_time: f64, size: u64) -> PerfEntry {
    PerfEntry::LargestContentfulPaint {
        start_time,
        size,
        element: None,
    }
}

/// Shorthand for an interaction timing entry.
pub fn interaction_event(kind: InteractionKind, start_time: f64, duration: f64) -> PerfEntry {
    PerfEntry::Event {
        name: kind,
        start_time,
        duration,
    }
}
