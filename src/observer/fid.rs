// Copyright 2025 Pagevitals Contributors
// SPDX-License-Identifier: Apache-2.0

//! First input delay: the gap between the first discrete input and the
//! browser starting to process its handlers. Reported once per navigation
//! and never recomputed, not even after a back-forward-cache restore.

use crate::observer::{MetricWorker, ObserverCtx};
use crate::{EntryKind, MetricContext, MetricName, PerfEntry, Unit};

pub(crate) struct FidWorker;

impl FidWorker {
    pub(crate) fn new() -> Self {
        FidWorker
    }
}

impl MetricWorker for FidWorker {
    fn metric(&self) -> MetricName {
        MetricName::Fid
    }

    fn kind(&self) -> EntryKind {
        EntryKind::FirstInput
    }

    fn on_entries(&mut self, entries: Vec<PerfEntry>, ctx: &mut ObserverCtx) {
        for entry in entries {
            let PerfEntry::FirstInput {
                start_time,
                processing_start,
                ..
            } = entry
            else {
                continue;
            };
            ctx.emit(
                processing_start - start_time,
                Unit::Millis,
                MetricContext::None,
            );
            ctx.disconnect();
            // Nothing left to do for the rest of the visit: first input
            // delay is never recomputed, not even on a bfcache restore.
            ctx.request_stop();
            break;
        }
    }
}
