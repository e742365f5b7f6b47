// Copyright 2025 Pagevitals Contributors
// SPDX-License-Identifier: Apache-2.0

//! Cumulative layout shift, aggregated with session windows.
//!
//! Shifts close together in time are treated as one contiguous disturbance:
//! a shift more than [`SESSION_GAP_MS`] after the previous one (or the first
//! shift after the page came back from hidden) opens a new window, otherwise
//! it accumulates into the open window. At most [`MAX_WINDOWS`] windows are
//! retained; when the limit is exceeded the window with the *smallest* total
//! is evicted, so the worst disturbances the user experienced always
//! survive. The reported value is the maximum window total.
//!
//! Reporting is debounced: a burst of shifts produces one report
//! [`REPORT_DEBOUNCE`] after the burst, and only when the value moved by at
//! least [`MIN_REPORT_DELTA`]. Opening a new window and hiding the page both
//! report immediately, bypassing the debounce.

use std::time::Duration;

use log::debug;

use crate::observer::{MetricWorker, ObserverCtx};
use crate::{EntryKind, MetricContext, MetricName, PerfEntry, Unit};

/// A shift this long after the previous one opens a new session window.
const SESSION_GAP_MS: f64 = 1000.0;
/// Retained session window limit.
const MAX_WINDOWS: usize = 5;
/// Shifts accumulated into one window before further ones stop counting.
const MAX_WINDOW_SHIFTS: u32 = 100;
/// Delay between the last qualifying shift and its debounced report.
const REPORT_DEBOUNCE: Duration = Duration::from_millis(500);
/// Noise floor: debounced reports below this delta are suppressed.
const MIN_REPORT_DELTA: f64 = 0.01;

/// The session window accumulator. Pure state machine, no clocks.
#[derive(Debug)]
pub(crate) struct SessionWindows {
    /// Window totals, seeded with one empty window.
    windows: Vec<f64>,
    /// Shifts accumulated into the open window.
    open_shift_count: u32,
    /// Timestamp of the most recent qualifying shift.
    last_shift_time: f64,
    /// Set on page hide; the next qualifying shift opens a new window
    /// instead of continuing the pre-hide session.
    reset_on_next_visible: bool,
}

impl SessionWindows {
    pub(crate) fn new() -> Self {
        SessionWindows {
            windows: vec![0.0],
            open_shift_count: 0,
            last_shift_time: 0.0,
            reset_on_next_visible: false,
        }
    }

    /// Folds one qualifying shift into the windows. Returns true when the
    /// shift opened a new window.
    pub(crate) fn record(&mut self, start_time: f64, value: f64) -> bool {
        let new_window =
            self.reset_on_next_visible || start_time - self.last_shift_time > SESSION_GAP_MS;
        if new_window {
            self.reset_on_next_visible = false;
            self.open_shift_count = 1;
            self.windows.push(value);
            if self.windows.len() > MAX_WINDOWS {
                self.evict_smallest();
            }
        } else if self.open_shift_count < MAX_WINDOW_SHIFTS {
            self.open_shift_count += 1;
            if let Some(open) = self.windows.last_mut() {
                *open += value;
            }
        }
        // Capped shifts still extend the session.
        self.last_shift_time = start_time;
        new_window
    }

    fn evict_smallest(&mut self) {
        let mut smallest = 0;
        for (index, total) in self.windows.iter().enumerate() {
            if *total < self.windows[smallest] {
                smallest = index;
            }
        }
        self.windows.remove(smallest);
    }

    /// The layout shift score: the largest retained window total.
    pub(crate) fn value(&self) -> f64 {
        self.windows.iter().copied().fold(0.0, f64::max)
    }

    pub(crate) fn window_values(&self) -> &[f64] {
        &self.windows
    }

    pub(crate) fn open_shift_count(&self) -> u32 {
        self.open_shift_count
    }

    pub(crate) fn mark_reset_on_next_visible(&mut self) {
        self.reset_on_next_visible = true;
    }

    pub(crate) fn clear(&mut self) {
        *self = SessionWindows::new();
    }
}

pub(crate) struct ClsWorker {
    windows: SessionWindows,
    last_reported: f64,
}

impl ClsWorker {
    pub(crate) fn new() -> Self {
        ClsWorker {
            windows: SessionWindows::new(),
            last_reported: 0.0,
        }
    }

    fn report(&mut self, ctx: &mut ObserverCtx) {
        let value = self.windows.value();
        ctx.emit(
            value,
            Unit::Unitless,
            MetricContext::LayoutShift {
                shift_count: self.windows.open_shift_count(),
                window_values: self.windows.window_values().to_vec(),
            },
        );
        self.last_reported = value;
    }
}

impl MetricWorker for ClsWorker {
    fn metric(&self) -> MetricName {
        MetricName::Cls
    }

    fn kind(&self) -> EntryKind {
        EntryKind::LayoutShift
    }

    fn on_entries(&mut self, entries: Vec<PerfEntry>, ctx: &mut ObserverCtx) {
        if !ctx.is_page_visible() {
            debug!("CLS: page hidden, ignoring layout shifts");
            return;
        }
        let mut opened_new_window = false;
        for entry in entries {
            let PerfEntry::LayoutShift {
                value,
                start_time,
                had_recent_input,
            } = entry
            else {
                continue;
            };
            if had_recent_input || start_time >= ctx.first_hidden_time() {
                continue;
            }
            if self.windows.record(start_time, value) {
                opened_new_window = true;
            }
            ctx.schedule_debounce(REPORT_DEBOUNCE);
        }
        if opened_new_window {
            self.report(ctx);
        }
    }

    fn on_debounce(&mut self, ctx: &mut ObserverCtx) {
        let value = self.windows.value();
        if (value - self.last_reported).abs() >= MIN_REPORT_DELTA {
            self.report(ctx);
        }
    }

    fn on_visibility(&mut self, visible: bool, ctx: &mut ObserverCtx) {
        if visible {
            return;
        }
        // Hide flushes the current value regardless of how small the change
        // is, and splits the session so post-visible shifts start fresh.
        self.report(ctx);
        self.windows.mark_reset_on_next_visible();
    }

    fn on_bfcache_restore(&mut self, _timestamp: f64, ctx: &mut ObserverCtx) {
        self.windows.clear();
        self.last_reported = 0.0;
        ctx.cancel_debounce();
        ctx.resubscribe();
        debug!("CLS: session state cleared after bfcache restore");
    }
}
