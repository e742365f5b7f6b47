// Copyright 2025 Pagevitals Contributors
// SPDX-License-Identifier: Apache-2.0

//! # pagevitals: a Web Vitals metric engine
//!
//! `pagevitals` computes user-experience timing metrics for a single page
//! visit by subscribing to a host environment's performance-instrumentation
//! feed and deriving metric values through per-metric aggregation
//! algorithms. It is built on `tokio`: every observer is a task draining
//! channels, and the host is anything that implements [`PerformanceSource`].
//!
//! ## Features
//!
//! - **Five metrics**: first contentful paint, largest contentful paint,
//!   first input delay, cumulative layout shift (session-windowed with
//!   debounced reporting), and interaction to next paint (75th-percentile
//!   aggregation).
//! - **Page lifecycle aware**: every observer tracks visibility, gates
//!   reports on the first-hidden timestamp, and reinitializes on
//!   back-forward-cache restores without leaking subscriptions or
//!   double-reporting.
//! - **Host-agnostic**: the instrumentation feed is a trait, so the engine
//!   runs against a real browser bridge or a scripted fake identically.
//! - **Isolated failures**: a metric the host cannot observe is logged and
//!   skipped; the remaining metrics keep reporting.
//!
//! ## Core Concepts
//!
//! - [`PerformanceSource`]: the capability a host provides (entry
//!   subscriptions, page events, a clock, paint frames).
//! - [`PerfEntry`] / [`EntryKind`]: the tagged entry model delivered by
//!   subscriptions.
//! - [`MetricSample`]: one immutable metric report, with rating and
//!   attribution.
//! - [`MetricEngine`]: spawns an observer per enabled metric and merges
//!   their reports into a [`VitalsSnapshot`] handed to the caller's
//!   callback (update-then-notify).
//! - [`collectors`]: thin pass-through collectors for long tasks, resource
//!   timings, and navigation timings.
//!
//! ## Getting Started
//!
//! ```rust,ignore
//! use pagevitals::{MetricEngine, VitalsConfig};
//!
//! # async fn run(source: std::sync::Arc<dyn pagevitals::PerformanceSource>) {
//! let mut engine = MetricEngine::new(source, VitalsConfig::all(), |snapshot| {
//!     if let Some(lcp) = &snapshot.lcp {
//!         println!("LCP {:.0}ms ({:?})", lcp.value, lcp.rating);
//!     }
//! });
//! engine.start().await;
//! // ... the visit runs; the callback fires on every metric update ...
//! engine.stop().await;
//! # }
//! ```
//!
//! Everything is scoped to one page visit: no state survives a full reload,
//! and nothing is persisted or transported anywhere. Consumers decide what
//! to do with each [`VitalsSnapshot`].

pub mod collectors;
mod config;
mod engine;
mod entry;
mod error;
mod observer;
mod sample;
mod source;

pub use config::VitalsConfig;
pub use engine::{MetricEngine, VitalsSnapshot};
pub use entry::{ElementInfo, EntryKind, InteractionKind, PaintName, PerfEntry};
pub use error::{Error, Result};
pub use sample::{MetricContext, MetricName, MetricSample, NetworkInfo, Rating, Unit};
pub use source::{
    EntryStream, PageEvent, PageEventStream, PerformanceSource, SubscribeOptions, Visibility,
};
