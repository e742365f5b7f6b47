// Copyright 2025 Pagevitals Contributors
// SPDX-License-Identifier: Apache-2.0

//! Interaction to next paint.
//!
//! Every qualifying interaction (click, keydown, pointerdown, at least
//! [`MIN_DURATION_MS`] long where the host can filter) is appended to a
//! buffer; the reported value is the 75th percentile of the buffered
//! durations. This is a raw percentile over everything recorded since
//! navigation start, deliberately kept as the simple approximation rather
//! than the outlier-trimmed official definition.

use log::debug;

use crate::observer::{MetricWorker, ObserverCtx};
use crate::{
    EntryKind, InteractionKind, MetricContext, MetricName, PerfEntry, SubscribeOptions, Unit,
};

/// Duration filter hint passed to the host.
const MIN_DURATION_MS: f64 = 16.0;
/// Reports are suppressed until the value moves by at least this much.
const MIN_REPORT_DELTA_MS: f64 = 10.0;

/// One recorded interaction.
#[derive(Debug, Clone)]
pub(crate) struct Interaction {
    pub duration: f64,
    #[allow(dead_code)]
    pub kind: InteractionKind,
    #[allow(dead_code)]
    pub start_time: f64,
}

/// Append-only interaction record, cleared on bfcache restore.
#[derive(Debug, Default)]
pub(crate) struct InteractionBuffer {
    interactions: Vec<Interaction>,
}

impl InteractionBuffer {
    pub(crate) fn push(&mut self, interaction: Interaction) {
        self.interactions.push(interaction);
    }

    pub(crate) fn len(&self) -> usize {
        self.interactions.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    pub(crate) fn max_duration(&self) -> f64 {
        self.interactions
            .iter()
            .map(|interaction| interaction.duration)
            .fold(0.0, f64::max)
    }

    /// The 75th-percentile duration: sort ascending and index at
    /// `floor(n * 0.75)`. A single interaction is its own percentile.
    pub(crate) fn percentile_75(&self) -> f64 {
        if self.interactions.is_empty() {
            return 0.0;
        }
        let mut durations: Vec<f64> = self
            .interactions
            .iter()
            .map(|interaction| interaction.duration)
            .collect();
        durations.sort_by(f64::total_cmp);
        if durations.len() == 1 {
            return durations[0];
        }
        let index = (durations.len() as f64 * 0.75).floor() as usize;
        durations[index]
    }

    pub(crate) fn clear(&mut self) {
        self.interactions.clear();
    }
}

pub(crate) struct InpWorker {
    buffer: InteractionBuffer,
    last_reported: f64,
}

impl InpWorker {
    pub(crate) fn new() -> Self {
        InpWorker {
            buffer: InteractionBuffer::default(),
            last_reported: 0.0,
        }
    }

    fn maybe_report(&mut self, ctx: &mut ObserverCtx) {
        let value = self.buffer.percentile_75();
        if (value - self.last_reported).abs() < MIN_REPORT_DELTA_MS {
            return;
        }
        ctx.emit(
            value,
            Unit::Millis,
            MetricContext::Interaction {
                interaction_count: self.buffer.len(),
                max_duration: self.buffer.max_duration(),
            },
        );
        self.last_reported = value;
    }
}

impl MetricWorker for InpWorker {
    fn metric(&self) -> MetricName {
        MetricName::Inp
    }

    fn kind(&self) -> EntryKind {
        EntryKind::Event
    }

    fn subscribe_options(&self) -> SubscribeOptions {
        SubscribeOptions {
            buffered: true,
            duration_threshold: Some(MIN_DURATION_MS),
        }
    }

    fn on_entries(&mut self, entries: Vec<PerfEntry>, ctx: &mut ObserverCtx) {
        if !ctx.is_page_visible() {
            return;
        }
        for entry in entries {
            let PerfEntry::Event {
                name,
                start_time,
                duration,
            } = entry
            else {
                continue;
            };
            if !name.is_tracked() || start_time >= ctx.first_hidden_time() {
                continue;
            }
            self.buffer.push(Interaction {
                duration,
                kind: name,
                start_time,
            });
            self.maybe_report(ctx);
        }
    }

    fn on_visibility(&mut self, visible: bool, ctx: &mut ObserverCtx) {
        if !visible && !self.buffer.is_empty() {
            self.maybe_report(ctx);
        }
    }

    fn on_bfcache_restore(&mut self, _timestamp: f64, ctx: &mut ObserverCtx) {
        self.buffer.clear();
        self.last_reported = 0.0;
        ctx.resubscribe();
        debug!("INP: interaction buffer cleared after bfcache restore");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_of(durations: &[f64]) -> InteractionBuffer {
        let mut buffer = InteractionBuffer::default();
        for (index, duration) in durations.iter().enumerate() {
            buffer.push(Interaction {
                duration: *duration,
                kind: InteractionKind::Click,
                start_time: index as f64 * 100.0,
            });
        }
        buffer
    }

    #[test]
    fn test_percentile_of_empty_buffer_is_zero() {
        assert_eq!(InteractionBuffer::default().percentile_75(), 0.0);
    }

    #[test]
    fn test_single_interaction_is_its_own_percentile() {
        assert_eq!(buffer_of(&[420.0]).percentile_75(), 420.0);
    }

    #[test]
    fn test_percentile_uses_floor_index() {
        // Sorted: [50, 80, 90, 120, 300]; floor(5 * 0.75) = 3 → 120.
        let buffer = buffer_of(&[50.0, 80.0, 120.0, 300.0, 90.0]);
        assert_eq!(buffer.percentile_75(), 120.0);
    }

    #[test]
    fn test_percentile_of_two() {
        // floor(2 * 0.75) = 1 → the larger duration.
        assert_eq!(buffer_of(&[40.0, 200.0]).percentile_75(), 200.0);
    }

    #[test]
    fn test_percentile_tracks_growing_buffer() {
        let mut buffer = buffer_of(&[10.0; 9]);
        buffer.push(Interaction {
            duration: 1000.0,
            kind: InteractionKind::KeyDown,
            start_time: 900.0,
        });
        // floor(10 * 0.75) = 7, still inside the run of 10ms entries.
        assert_eq!(buffer.percentile_75(), 10.0);
    }

    #[test]
    fn test_max_duration() {
        let buffer = buffer_of(&[50.0, 300.0, 90.0]);
        assert_eq!(buffer.max_duration(), 300.0);
    }
}
