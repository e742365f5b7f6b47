// Copyright 2025 Pagevitals Contributors
// SPDX-License-Identifier: Apache-2.0

//! The entry model shared by every observer.
//!
//! Host notifications are delivered as batches of [`PerfEntry`] values. The
//! enum is exhaustive over the entry shapes this crate understands, so
//! observers match on concrete variants instead of probing optional
//! properties on a loosely-typed record.

/// A named category of host-instrumentation notification.
///
/// Passed to [`PerformanceSource::subscribe`](crate::PerformanceSource::subscribe)
/// to select which entries a stream delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Paint timing entries (first paint, first contentful paint).
    Paint,
    /// Largest contentful paint candidates.
    LargestContentfulPaint,
    /// The first discrete input event of the page visit.
    FirstInput,
    /// Layout shift records.
    LayoutShift,
    /// Per-event interaction timing records.
    Event,
    /// Tasks that blocked the main thread for 50ms or more.
    LongTask,
    /// Resource load timing records.
    Resource,
    /// The navigation timing record for the page load itself.
    Navigation,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntryKind::Paint => "paint",
            EntryKind::LargestContentfulPaint => "largest-contentful-paint",
            EntryKind::FirstInput => "first-input",
            EntryKind::LayoutShift => "layout-shift",
            EntryKind::Event => "event",
            EntryKind::LongTask => "longtask",
            EntryKind::Resource => "resource",
            EntryKind::Navigation => "navigation",
        };
        f.write_str(name)
    }
}

/// The name of a paint timing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintName {
    /// The first paint of any kind.
    FirstPaint,
    /// The first paint of actual page content.
    FirstContentfulPaint,
}

/// The discrete input type behind an event timing entry or a page-level
/// interaction notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Click,
    KeyDown,
    PointerDown,
    /// Any other event type the host chose to deliver. Ignored by the
    /// interaction delay metric.
    Other,
}

impl InteractionKind {
    /// Whether this input type counts toward interaction responsiveness.
    pub fn is_tracked(self) -> bool {
        !matches!(self, InteractionKind::Other)
    }
}

/// Attribution for the element behind a largest-paint candidate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementInfo {
    /// The element's DOM id, if any.
    pub id: Option<String>,
    /// The element's tag name.
    pub tag_name: Option<String>,
    /// The element's `type` attribute, if any.
    pub element_type: Option<String>,
}

/// One host-instrumentation notification record.
///
/// All timestamps are milliseconds on the same monotonic timeline as
/// [`PerformanceSource::now`](crate::PerformanceSource::now), starting at
/// navigation start.
#[derive(Debug, Clone, PartialEq)]
pub enum PerfEntry {
    /// A paint timing entry.
    Paint { name: PaintName, start_time: f64 },
    /// A largest-contentful-paint candidate. Candidates only ever grow; the
    /// host reports the best-so-far.
    LargestContentfulPaint {
        start_time: f64,
        /// Painted area of the candidate element, in pixels.
        size: u64,
        element: Option<ElementInfo>,
    },
    /// The first discrete input of the visit.
    FirstInput {
        start_time: f64,
        /// When the browser began processing the input's handlers.
        processing_start: f64,
        duration: f64,
    },
    /// A layout shift record.
    LayoutShift {
        /// The unitless shift score contributed by this record.
        value: f64,
        start_time: f64,
        /// True when the shift happened within 500ms of a discrete input
        /// and therefore does not count toward layout instability.
        had_recent_input: bool,
    },
    /// An event timing record for one interaction.
    Event {
        name: InteractionKind,
        start_time: f64,
        duration: f64,
    },
    /// A main-thread blocking task.
    LongTask {
        start_time: f64,
        duration: f64,
        /// Container attribution when the host can provide it.
        attribution: Option<String>,
    },
    /// A resource load timing record.
    Resource {
        /// The resource URL.
        name: String,
        /// What initiated the load (`script`, `link`, `img`, ...).
        initiator_type: String,
        start_time: f64,
        duration: f64,
        transfer_size: u64,
        decoded_body_size: u64,
        response_end: f64,
    },
    /// The navigation timing record for the page load.
    Navigation {
        start_time: f64,
        request_start: f64,
        response_start: f64,
        dom_content_loaded_event_end: f64,
        load_event_end: f64,
    },
}

impl PerfEntry {
    /// The timestamp at which this entry's activity began.
    pub fn start_time(&self) -> f64 {
        match self {
            PerfEntry::Paint { start_time, .. }
            | PerfEntry::LargestContentfulPaint { start_time, .. }
            | PerfEntry::FirstInput { start_time, .. }
            | PerfEntry::LayoutShift { start_time, .. }
            | PerfEntry::Event { start_time, .. }
            | PerfEntry::LongTask { start_time, .. }
            | PerfEntry::Resource { start_time, .. }
            | PerfEntry::Navigation { start_time, .. } => *start_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind_names() {
        assert_eq!(EntryKind::LargestContentfulPaint.to_string(), "largest-contentful-paint");
        assert_eq!(EntryKind::LayoutShift.to_string(), "layout-shift");
        assert_eq!(EntryKind::LongTask.to_string(), "longtask");
    }

    #[test]
    fn test_tracked_interaction_kinds() {
        assert!(InteractionKind::Click.is_tracked());
        assert!(InteractionKind::KeyDown.is_tracked());
        assert!(InteractionKind::PointerDown.is_tracked());
        assert!(!InteractionKind::Other.is_tracked());
    }

    #[test]
    fn test_start_time_accessor() {
        let entry = PerfEntry::LayoutShift {
            value: 0.05,
            start_time: 321.5,
            had_recent_input: false,
        };
        assert_eq!(entry.start_time(), 321.5);
    }
}
