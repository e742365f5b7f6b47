// Copyright 2025 Pagevitals Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::EntryKind;

#[derive(Debug)]
/// Represents errors that can occur when wiring a metric observer to the
/// host's instrumentation feed.
///
/// These errors surface at subscription time only. Once a subscription is
/// live, the feed never fails; it simply stops delivering when the page
/// visit ends or the stream is dropped.
pub enum Error {
    /// The host does not support the requested entry kind.
    ///
    /// The corresponding metric is permanently unavailable for the rest of
    /// the page visit. This is logged and never propagated to the caller of
    /// [`MetricEngine::start`](crate::MetricEngine::start).
    UnsupportedEntryKind {
        /// The entry kind the host rejected
        kind: EntryKind,
    },
    /// The host failed to create a subscription for a supported entry kind.
    SubscriptionFailed {
        /// The entry kind being subscribed to
        kind: EntryKind,
        /// Additional context about the failure
        details: String,
    },
}

/// Implementation of the Display trait for Error enum.
///
/// Provides human-readable error messages for each error variant.
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnsupportedEntryKind { kind } => {
                write!(f, "Entry kind '{kind}' is not supported by this host")
            }
            Error::SubscriptionFailed { kind, details } => {
                write!(f, "Failed to subscribe to '{kind}' entries: {details}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A Result type specialized for subscription operations.
///
/// Returned by [`PerformanceSource::subscribe`](crate::PerformanceSource::subscribe)
/// implementations and by collector spawn functions.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_unsupported_kind() {
        let err = Error::UnsupportedEntryKind {
            kind: EntryKind::LayoutShift,
        };
        assert_eq!(
            err.to_string(),
            "Entry kind 'layout-shift' is not supported by this host"
        );
    }

    #[test]
    fn test_display_subscription_failed() {
        let err = Error::SubscriptionFailed {
            kind: EntryKind::Paint,
            details: "feed shutting down".to_string(),
        };
        assert!(err.to_string().contains("paint"));
        assert!(err.to_string().contains("feed shutting down"));
    }
}
