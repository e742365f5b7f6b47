// Copyright 2025 Pagevitals Contributors
// SPDX-License-Identifier: Apache-2.0

//! First contentful paint.
//!
//! One-shot: the observer unsubscribes as soon as the first-contentful-paint
//! entry arrives, whether it was reported or discarded for happening after
//! the page first went hidden. A back-forward-cache restore re-arms the
//! whole lifecycle and synthesizes a fresh value from a paint probe.

use log::debug;

use crate::observer::{MetricWorker, ObserverCtx};
use crate::{EntryKind, MetricContext, MetricName, PaintName, PerfEntry, Unit};

pub(crate) struct FcpWorker {
    /// Restore timestamp of a paint probe in flight.
    pending_restore: Option<f64>,
}

impl FcpWorker {
    pub(crate) fn new() -> Self {
        FcpWorker {
            pending_restore: None,
        }
    }
}

impl MetricWorker for FcpWorker {
    fn metric(&self) -> MetricName {
        MetricName::Fcp
    }

    fn kind(&self) -> EntryKind {
        EntryKind::Paint
    }

    fn on_entries(&mut self, entries: Vec<PerfEntry>, ctx: &mut ObserverCtx) {
        for entry in entries {
            let PerfEntry::Paint { name, start_time } = entry else {
                continue;
            };
            if name != PaintName::FirstContentfulPaint {
                continue;
            }
            if start_time < ctx.first_hidden_time() {
                // Prerendered pages measure from activation, clamped so a
                // paint during prerender reports as 0.
                let value = (start_time - ctx.activation_start()).max(0.0);
                ctx.emit(value, Unit::Millis, MetricContext::None);
            } else {
                debug!("FCP: page hidden before first contentful paint, entry discarded");
            }
            ctx.disconnect();
            break;
        }
    }

    fn on_bfcache_restore(&mut self, timestamp: f64, ctx: &mut ObserverCtx) {
        self.pending_restore = Some(timestamp);
        ctx.begin_paint_probe();
        // Keep observing in case the restored page paints something later.
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
    }
}
