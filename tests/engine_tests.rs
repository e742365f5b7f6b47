// Copyright 2025 Pagevitals Contributors
// SPDX-License-Identifier: Apache-2.0

//! Engine orchestration: per-metric enablement, failure isolation,
//! update-then-notify ordering, and idempotent start/stop.

mod common;

use std::time::Duration;

use common::{capture, settle, shift, FakeSource};
use pagevitals::{EntryKind, MetricEngine, PageEvent, VitalsConfig};

#[tokio::test]
async fn disabled_metrics_subscribe_to_nothing() {
    let source = FakeSource::new();
    let (snapshots, callback) = capture();
    let mut engine = MetricEngine::new(source.clone(), VitalsConfig::default(), callback);
    engine.start().await;
    settle().await;

    for kind in [
        EntryKind::Paint,
        EntryKind::LargestContentfulPaint,
        EntryKind::FirstInput,
        EntryKind::LayoutShift,
        EntryKind::Event,
    ] {
        assert_eq!(source.subscriber_count(kind), 0, "{kind} should be idle");
    }

    engine.stop().await;
    assert!(snapshots.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unsupported_kind_does_not_block_siblings() {
    let source = FakeSource::new();
    source.mark_unsupported(EntryKind::Paint);
    let config = VitalsConfig {
        fcp: true,
        cls: true,
        ..VitalsConfig::default()
    };
    let (snapshots, callback) = capture();
    let mut engine = MetricEngine::new(source.clone(), config, callback);
    engine.start().await;
    settle().await;

    assert_eq!(source.subscriber_count(EntryKind::Paint), 0);
    assert_eq!(source.subscriber_count(EntryKind::LayoutShift), 1);

    // The layout shift observer still reports normally.
    source.push(EntryKind::LayoutShift, vec![shift(1500.0, 0.30)]);
    settle().await;

    let guard = snapshots.lock().unwrap();
    assert_eq!(guard.len(), 1);
    assert!(guard[0].cls.is_some());
    assert!(guard[0].fcp.is_none());
    drop(guard);

    engine.stop().await;
}

#[tokio::test]
async fn snapshot_is_updated_before_the_callback_runs() {
    let source = FakeSource::new();
    let config = VitalsConfig {
        cls: true,
        ..VitalsConfig::default()
    };
    let (snapshots, callback) = capture();
    let mut engine = MetricEngine::new(source.clone(), config, callback);
    engine.start().await;
    settle().await;

    source.push(EntryKind::LayoutShift, vec![shift(1500.0, 0.30)]);
    settle().await;

    // Every captured snapshot already contains the sample that caused the
    // notification.
    let guard = snapshots.lock().unwrap();
    assert_eq!(guard.len(), 1);
    let cls = guard[0].cls.as_ref().expect("cls in snapshot");
    assert!((cls.value - 0.30).abs() < 1e-9);
    drop(guard);

    engine.stop().await;
}

#[tokio::test]
async fn start_and_stop_are_idempotent_and_restartable() {
    let source = FakeSource::new();
    let config = VitalsConfig {
        cls: true,
        ..VitalsConfig::default()
    };
    let (snapshots, callback) = capture();
    let mut engine = MetricEngine::new(source.clone(), config, callback);

    engine.start().await;
    engine.start().await;
    settle().await;
    assert!(engine.is_running());
    assert_eq!(source.subscriber_count(EntryKind::LayoutShift), 1);

    engine.stop().await;
    engine.stop().await;
    assert!(!engine.is_running());
    assert_eq!(source.subscriber_count(EntryKind::LayoutShift), 0);

    // The callback survives the stop, so the engine can run again with
    // fresh per-visit state.
    engine.start().await;
    settle().await;
    source.push(EntryKind::LayoutShift, vec![shift(1500.0, 0.10)]);
    settle().await;

    let guard = snapshots.lock().unwrap();
    let last = guard.last().and_then(|s| s.cls.clone()).expect("cls sample");
    assert!((last.value - 0.10).abs() < 1e-9);
    drop(guard);

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_pending_debounce_reports() {
    let source = FakeSource::new();
    let config = VitalsConfig {
        cls: true,
        ..VitalsConfig::default()
    };
    let (snapshots, callback) = capture();
    let mut engine = MetricEngine::new(source.clone(), config, callback);
    engine.start().await;
    settle().await;

    // This shift merges into the seed window, so it only schedules a
    // debounced report. Stopping must cancel it.
    source.push(EntryKind::LayoutShift, vec![shift(0.0, 0.25)]);
    settle().await;
    engine.stop().await;

    tokio::time::advance(Duration::from_secs(2)).await;
    settle().await;
    assert!(
        snapshots.lock().unwrap().is_empty(),
        "no report may fire after teardown"
    );
}

#[tokio::test]
async fn non_persisted_pageshow_resets_nothing() {
    let source = FakeSource::new();
    let config = VitalsConfig {
        lcp: true,
        ..VitalsConfig::default()
    };
    let (snapshots, callback) = capture();
    let mut engine = MetricEngine::new(source.clone(), config, callback);
    engine.start().await;
    settle().await;

    source.push(
        EntryKind::LargestContentfulPaint,
        vec![common::lcp_candidate(800.0, 10_000)],
    );
    settle().await;
    assert_eq!(snapshots.lock().unwrap().len(), 1);

    // A fresh-load pageshow is not a bfcache restore: no synthetic value,
    // no re-arm, no reset.
    source.emit(PageEvent::PageShow {
        persisted: false,
        timestamp: 900.0,
    });
    settle().await;
    assert_eq!(snapshots.lock().unwrap().len(), 1);
    assert_eq!(source.subscriber_count(EntryKind::LargestContentfulPaint), 1);

    engine.stop().await;
}
