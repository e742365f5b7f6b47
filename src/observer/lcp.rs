// Copyright 2025 Pagevitals Contributors
// SPDX-License-Identifier: Apache-2.0

//! Largest contentful paint.
//!
//! Candidates only ever grow, so every candidate that lands before the page
//! first went hidden is reported immediately as the running value. The first
//! user interaction or hide finalizes the metric: any candidates the host
//! delivered but the observer has not yet dispatched are drained, the last
//! one still inside the visible window becomes the final report, and the
//! subscription is dropped. Finalization runs at most once per lifecycle.

use log::debug;

use crate::observer::{MetricWorker, ObserverCtx};
use crate::{
    ElementInfo, EntryKind, InteractionKind, MetricContext, MetricName, PerfEntry, Unit,
};

pub(crate) struct LcpWorker {
    finalized: bool,
    pending_restore: Option<f64>,
}

impl LcpWorker {
    pub(crate) fn new() -> Self {
        LcpWorker {
            finalized: false,
            pending_restore: None,
        }
    }

    fn report_candidate(
        &self,
        start_time: f64,
        size: u64,
        element: Option<ElementInfo>,
        final_report: bool,
        ctx: &mut ObserverCtx,
    ) {
        let value = (start_time - ctx.activation_start()).max(0.0);
        ctx.emit(
            value,
            Unit::Millis,
            MetricContext::LargestPaint {
                element,
                size,
                final_report,
            },
        );
    }

    /// The one-shot "stop listening" path shared by interaction and hide.
    fn finalize(&mut self, reason: &str, ctx: &mut ObserverCtx) {
        if self.finalized || !ctx.has_subscription() {
            return;
        }
        // The final report must reflect the very last candidate delivered
        // before the page went hidden, including ones still queued.
        let records = ctx.take_records();
        let last_visible = records.into_iter().rev().find_map(|entry| match entry {
            PerfEntry::LargestContentfulPaint {
                start_time,
                size,
                element,
            } if start_time < ctx.first_hidden_time() => Some((start_time, size, element)),
            _ => None,
        });
        if let Some((start_time, size, element)) = last_visible {
            self.report_candidate(start_time, size, element, true, ctx);
        }
        ctx.disconnect();
        self.finalized = true;
        debug!("LCP: finalized ({reason})");
    }
}

impl MetricWorker for LcpWorker {
    fn metric(&self) -> MetricName {
        MetricName::Lcp
    }

    fn kind(&self) -> EntryKind {
        EntryKind::LargestContentfulPaint
    }

    fn on_entries(&mut self, entries: Vec<PerfEntry>, ctx: &mut ObserverCtx) {
        for entry in entries {
            let PerfEntry::LargestContentfulPaint {
                start_time,
                size,
                element,
            } = entry
            else {
                continue;
            };
            if start_time < ctx.first_hidden_time() {
                self.report_candidate(start_time, size, element, false, ctx);
            } else {
                debug!("LCP: page hidden before candidate, entry discarded");
            }
        }
    }

    fn on_interaction(&mut self, _kind: InteractionKind, ctx: &mut ObserverCtx) {
        self.finalize("user interaction", ctx);
    }

    fn on_visibility(&mut self, visible: bool, ctx: &mut ObserverCtx) {
        if !visible {
            self.finalize("page hidden", ctx);
        }
    }

    fn on_bfcache_restore(&mut self, timestamp: f64, ctx: &mut ObserverCtx) {
        ctx.disconnect();
        self.finalized = false;
        self.pending_restore = Some(timestamp);
        ctx.begin_paint_probe();
        // Re-arm fully: a restored page can paint something larger later.
        ctx.resubscribe();
    }

    fn on_paint_probe(&mut self, probe_time: f64, ctx: &mut ObserverCtx) {
        let Some(restore_time) = self.pending_restore.take() else {
            return;
        };
        let value = (probe_time - restore_time).max(0.0);
        ctx.emit(
            value,
            Unit::Millis,
            MetricContext::BfcacheRestore { restore_time },
        );
        self.finalized = true;
    }
}
