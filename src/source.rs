// Copyright 2025 Pagevitals Contributors
// SPDX-License-Identifier: Apache-2.0

//! The host capability boundary.
//!
//! A [`PerformanceSource`] is everything the metric engine needs from its
//! host environment: entry subscriptions, page lifecycle events, and a
//! clock. In a browser-backed host each subscription wraps a native
//! performance observer; in tests a fake source pushes entries by hand. The
//! engine never talks to the platform directly, so every observer can be
//! exercised against a scripted feed.

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::{EntryKind, InteractionKind, NetworkInfo, PerfEntry, Result};

/// Current page visibility state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    pub fn is_visible(self) -> bool {
        matches!(self, Visibility::Visible)
    }
}

/// Options for an entry subscription.
#[derive(Debug, Clone, Copy)]
pub struct SubscribeOptions {
    /// Deliver entries recorded before the subscription was created, then
    /// keep delivering live ones.
    pub buffered: bool,
    /// Ask the host to drop entries shorter than this many milliseconds.
    /// A hint; hosts that cannot filter deliver everything.
    pub duration_threshold: Option<f64>,
}

impl SubscribeOptions {
    /// Buffered delivery with no duration filter.
    pub fn buffered() -> Self {
        SubscribeOptions {
            buffered: true,
            duration_threshold: None,
        }
    }
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        SubscribeOptions::buffered()
    }
}

/// A page lifecycle notification.
///
/// Timestamps are milliseconds on the same timeline as
/// [`PerformanceSource::now`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageEvent {
    /// The page's visibility changed.
    VisibilityChanged { visible: bool, timestamp: f64 },
    /// The user interacted with the page. Hosts emit this for click and
    /// keydown events, the types that end largest-paint observation.
    Interaction {
        kind: InteractionKind,
        timestamp: f64,
    },
    /// The page was shown. `persisted` is true when the page was restored
    /// from the back-forward cache rather than freshly loaded.
    PageShow { persisted: bool, timestamp: f64 },
}

/// A live subscription to one entry kind.
///
/// Entries arrive as batches, one batch per host notification. Dropping or
/// [closing](EntryStream::close) the stream unsubscribes.
#[derive(Debug)]
pub struct EntryStream {
    receiver: mpsc::UnboundedReceiver<Vec<PerfEntry>>,
}

impl EntryStream {
    /// Wraps the receiving half of a host-owned channel.
    pub fn new(receiver: mpsc::UnboundedReceiver<Vec<PerfEntry>>) -> Self {
        EntryStream { receiver }
    }

    /// Waits for the next batch. `None` once the host has dropped the feed.
    pub async fn recv(&mut self) -> Option<Vec<PerfEntry>> {
        self.receiver.recv().await
    }

    /// Synchronously drains every batch the host has already delivered but
    /// this stream has not yet received. Used by largest-paint finalization
    /// so the final report reflects the very last candidate.
    pub fn take_records(&mut self) -> Vec<PerfEntry> {
        let mut records = Vec::new();
        while let Ok(batch) = self.receiver.try_recv() {
            records.extend(batch);
        }
        records
    }

    /// Closes the stream, unsubscribing from the host.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

/// A stream of [`PageEvent`] notifications for one observer.
#[derive(Debug)]
pub struct PageEventStream {
    receiver: mpsc::UnboundedReceiver<PageEvent>,
}

impl PageEventStream {
    /// Wraps the receiving half of a host-owned channel.
    pub fn new(receiver: mpsc::UnboundedReceiver<PageEvent>) -> Self {
        PageEventStream { receiver }
    }

    /// Waits for the next page event. `None` once the host has dropped the
    /// feed.
    pub async fn recv(&mut self) -> Option<PageEvent> {
        self.receiver.recv().await
    }
}

/// The capability a host environment provides to the metric engine.
///
/// Implementations must deliver each subscription's entries in recording
/// order and must keep `now` monotonic with entry timestamps. Beyond that
/// the engine makes no assumptions about where entries come from.
pub trait PerformanceSource: Send + Sync + 'static {
    /// Subscribes to entries of `kind`, buffered-then-live, until the
    /// returned stream is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedEntryKind`](crate::Error::UnsupportedEntryKind)
    /// when the host cannot observe this kind. The caller treats the metric
    /// as permanently unavailable; there is no retry.
    fn subscribe(&self, kind: EntryKind, options: SubscribeOptions) -> Result<EntryStream>;

    /// Opens a fresh page event stream. Each observer holds its own.
    fn page_events(&self) -> PageEventStream;

    /// The page's visibility right now.
    fn visibility(&self) -> Visibility;

    /// Milliseconds since navigation start.
    fn now(&self) -> f64;

    /// The prerender activation offset, or 0 when the page was not
    /// prerendered. Paint values are measured from activation.
    fn activation_start(&self) -> f64 {
        0.0
    }

    /// Resolves shortly after the host next paints a frame, with the paint
    /// timestamp. Awaited twice in a row to measure post-restore paints.
    fn next_frame(&self) -> BoxFuture<'static, f64>;

    /// The current page URL, when the host knows one.
    fn page_url(&self) -> Option<String> {
        None
    }

    /// Current network conditions, when the host can describe them.
    fn network_information(&self) -> Option<NetworkInfo> {
        None
    }
}
