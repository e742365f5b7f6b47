// Copyright 2025 Pagevitals Contributors
// SPDX-License-Identifier: Apache-2.0

//! Metric sample types.
//!
//! Every report an observer makes is one immutable [`MetricSample`]. Several
//! samples may exist for the continuously-updated metrics (largest paint,
//! layout shift, interaction delay) over a single visit; first paint and
//! first input delay emit exactly one per lifecycle.

use crate::ElementInfo;

/// The metric a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    /// First Contentful Paint.
    Fcp,
    /// Largest Contentful Paint.
    Lcp,
    /// First Input Delay.
    Fid,
    /// Cumulative Layout Shift.
    Cls,
    /// Interaction to Next Paint.
    Inp,
    /// Time To First Byte, from the navigation timing collector.
    Ttfb,
    /// DOMContentLoaded completion, from the navigation timing collector.
    DomContentLoaded,
    /// Load event completion, from the navigation timing collector.
    Load,
}

impl MetricName {
    /// The good / needs-improvement boundaries for this metric, when it has
    /// standardized thresholds. Values are milliseconds except for the
    /// unitless layout shift score.
    pub fn thresholds(self) -> Option<(f64, f64)> {
        match self {
            MetricName::Fcp => Some((1800.0, 3000.0)),
            MetricName::Lcp => Some((2500.0, 4000.0)),
            MetricName::Fid => Some((100.0, 300.0)),
            MetricName::Cls => Some((0.10, 0.25)),
            MetricName::Inp => Some((200.0, 500.0)),
            MetricName::Ttfb => Some((100.0, 200.0)),
            MetricName::DomContentLoaded | MetricName::Load => None,
        }
    }

    /// Rates a value against this metric's thresholds. `None` for metrics
    /// without standardized thresholds.
    pub fn rate(self, value: f64) -> Option<Rating> {
        let (good, needs_improvement) = self.thresholds()?;
        Some(if value <= good {
            Rating::Good
        } else if value <= needs_improvement {
            Rating::NeedsImprovement
        } else {
            Rating::Poor
        })
    }
}

impl std::fmt::Display for MetricName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MetricName::Fcp => "FCP",
            MetricName::Lcp => "LCP",
            MetricName::Fid => "FID",
            MetricName::Cls => "CLS",
            MetricName::Inp => "INP",
            MetricName::Ttfb => "TTFB",
            MetricName::DomContentLoaded => "DOMContentLoaded",
            MetricName::Load => "Load",
        };
        f.write_str(name)
    }
}

/// How a metric value compares to its standardized thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Rating::Good => "good",
            Rating::NeedsImprovement => "needs-improvement",
            Rating::Poor => "poor",
        };
        f.write_str(name)
    }
}

/// The unit of a sample's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    /// Milliseconds.
    #[default]
    Millis,
    /// A dimensionless score (layout shift).
    Unitless,
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unit::Millis => f.write_str("ms"),
            Unit::Unitless => Ok(()),
        }
    }
}

/// Network conditions at the time a sample was taken, when the host can
/// describe them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetworkInfo {
    /// Estimated downlink bandwidth in megabits per second.
    pub downlink: Option<f64>,
    /// The host's coarse connection classification ("4g", "3g", ...).
    pub effective_type: Option<String>,
    /// Estimated round-trip time in milliseconds.
    pub rtt: Option<f64>,
    /// Whether the user has requested reduced data usage.
    pub save_data: Option<bool>,
}

/// Per-metric attribution attached to a sample.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MetricContext {
    /// No attribution for this sample.
    #[default]
    None,
    /// A largest-paint report.
    LargestPaint {
        /// The element behind the reported candidate.
        element: Option<ElementInfo>,
        /// Painted area of the candidate, in pixels.
        size: u64,
        /// True on the one finalization report of the visit.
        final_report: bool,
    },
    /// A layout shift report.
    LayoutShift {
        /// Shifts accumulated into the currently open window.
        shift_count: u32,
        /// Totals of every retained session window.
        window_values: Vec<f64>,
    },
    /// An interaction delay report.
    Interaction {
        /// Interactions recorded since navigation (or the last restore).
        interaction_count: usize,
        /// The slowest recorded interaction, in milliseconds.
        max_duration: f64,
    },
    /// A value synthesized after a back-forward-cache restore.
    BfcacheRestore {
        /// Timestamp of the restore event.
        restore_time: f64,
    },
}

/// One immutable metric report.
///
/// Samples are value types: once emitted they are never mutated, and each
/// report event produces a fresh sample object.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Which metric this sample reports.
    pub name: MetricName,
    /// The metric value, in `unit`.
    pub value: f64,
    /// The unit of `value`.
    pub unit: Unit,
    /// When the report was made, in milliseconds on the host timeline.
    pub timestamp: f64,
    /// The page URL at report time, when the host provides one.
    pub url: Option<String>,
    /// The value rated against the metric's thresholds.
    pub rating: Option<Rating>,
    /// Network conditions at report time, when the host provides them.
    pub network: Option<NetworkInfo>,
    /// Per-metric attribution.
    pub context: MetricContext,
}

impl MetricSample {
    /// Creates a sample with its rating derived from the metric's
    /// thresholds. `url` and `network` start empty; the observer plumbing
    /// fills them from the host.
    pub fn new(
        name: MetricName,
        value: f64,
        unit: Unit,
        timestamp: f64,
        context: MetricContext,
    ) -> Self {
        MetricSample {
            name,
            value,
            unit,
            timestamp,
            url: None,
            rating: name.rate(value),
            network: None,
            context,
        }
    }
}
