//! Reconciliation scenarios against fake provider and address source.
//!
//! Covers: patch on drift, no-op on match, per-record-type isolation,
//! dry-run and cancellation.

mod common;

use common::*;
use dyndns_core::detector::Family;
use dyndns_core::error::Stage;
use dyndns_core::reconcile::Reconciler;
use dyndns_core::status::RecordStatus;
use dyndns_provider::RecordType;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DOMAIN: &str = "example.com";

fn reconciler(provider: &Arc<FakeProvider>, source: &Arc<FakeSource>, ttl: u32) -> Reconciler {
    Reconciler::new(provider.clone(), source.clone(), DOMAIN, ttl)
}

#[tokio::test]
async fn drifted_a_record_is_patched_once() {
    let provider = Arc::new(
        FakeProvider::new()
            .with_record("record123", RecordType::A, DOMAIN, "192.0.2.1")
            .with_record("record456", RecordType::AAAA, DOMAIN, "2001:db8::1"),
    );
    let source = Arc::new(
        FakeSource::new()
            .with(Family::V4, "192.0.2.2")
            .with(Family::V6, "2001:db8::1"),
    );

    let report = reconciler(&provider, &source, 60)
        .run(&CancellationToken::new())
        .await;

    assert_eq!(
        provider.updates(),
        vec![UpdateCall {
            id: "record123".into(),
            typ: RecordType::A,
            name: DOMAIN.into(),
            content: "192.0.2.2".into(),
            ttl: 60,
        }]
    );
    assert_eq!(
        report.status(RecordType::A),
        Some(&RecordStatus::Updated {
            from: "192.0.2.1".into(),
            to: "192.0.2.2".into(),
        })
    );
    assert!(matches!(
        report.status(RecordType::AAAA),
        Some(RecordStatus::Unchanged { .. })
    ));
    assert_eq!(report.updated_count(), 1);
    assert!(!report.has_failures());
}

#[tokio::test]
async fn matching_records_issue_no_update_on_repeated_runs() {
    let provider = Arc::new(
        FakeProvider::new()
            .with_record("record123", RecordType::A, DOMAIN, "192.0.2.1")
            .with_record("record456", RecordType::AAAA, DOMAIN, "2001:db8::1"),
    );
    let source = Arc::new(
        FakeSource::new()
            .with(Family::V4, "192.0.2.1")
            .with(Family::V6, "2001:db8::1"),
    );
    let rec = reconciler(&provider, &source, 60);
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        let report = rec.run(&cancel).await;
        assert_eq!(report.updated_count(), 0);
        assert!(!report.has_failures());
    }
    assert!(provider.updates().is_empty());
}

#[tokio::test]
async fn failed_a_fetch_does_not_block_aaaa() {
    let provider = Arc::new(
        FakeProvider::new()
            .with(RecordType::A, Fetch::ApiError("Error: Invalid access token".into()))
            .with_record("record456", RecordType::AAAA, DOMAIN, "2001:db8::1"),
    );
    let source = Arc::new(
        FakeSource::new()
            .with(Family::V4, "192.0.2.2")
            .with(Family::V6, "2001:db8::beef"),
    );

    let report = reconciler(&provider, &source, 300)
        .run(&CancellationToken::new())
        .await;

    match report.status(RecordType::A) {
        Some(RecordStatus::Failed { stage, reason }) => {
            assert_eq!(*stage, Stage::Fetch);
            assert!(reason.contains("Invalid access token"), "{reason}");
            assert!(reason.starts_with("A record"), "{reason}");
        }
        other => panic!("expected A failure, got {other:?}"),
    }
    assert_eq!(
        provider.updates(),
        vec![UpdateCall {
            id: "record456".into(),
            typ: RecordType::AAAA,
            name: DOMAIN.into(),
            content: "2001:db8::beef".into(),
            ttl: 300,
        }]
    );
    // the A address is never looked up once its fetch failed
    assert_eq!(source.call_count(), 1);
    assert!(report.has_failures());
}

#[tokio::test]
async fn missing_record_is_a_failure_not_a_no_op() {
    let provider = Arc::new(
        FakeProvider::new()
            .with(RecordType::A, Fetch::Missing)
            .with(RecordType::AAAA, Fetch::Missing),
    );
    let source = Arc::new(FakeSource::new().with(Family::V4, "192.0.2.2"));

    let report = reconciler(&provider, &source, 60)
        .run(&CancellationToken::new())
        .await;

    for typ in RecordType::ALL {
        assert!(
            matches!(
                report.status(typ),
                Some(RecordStatus::Failed {
                    stage: Stage::Fetch,
                    ..
                })
            ),
            "{typ}: {:?}",
            report.status(typ)
        );
    }
    assert!(provider.updates().is_empty());
}

#[tokio::test]
async fn resolve_failure_is_isolated_per_type() {
    let provider = Arc::new(
        FakeProvider::new()
            .with_record("record123", RecordType::A, DOMAIN, "192.0.2.1")
            .with_record("record456", RecordType::AAAA, DOMAIN, "2001:db8::1"),
    );
    // no IPv6 connectivity
    let source = Arc::new(FakeSource::new().with(Family::V4, "192.0.2.9"));

    let report = reconciler(&provider, &source, 60)
        .run(&CancellationToken::new())
        .await;

    assert!(matches!(
        report.status(RecordType::A),
        Some(RecordStatus::Updated { .. })
    ));
    assert!(matches!(
        report.status(RecordType::AAAA),
        Some(RecordStatus::Failed {
            stage: Stage::Resolve,
            ..
        })
    ));
    assert_eq!(provider.updates().len(), 1);
}

#[tokio::test]
async fn expanded_ipv6_content_counts_as_equal() {
    let provider = Arc::new(
        FakeProvider::new()
            .with_record("record123", RecordType::A, DOMAIN, "192.0.2.1")
            .with_record(
                "record456",
                RecordType::AAAA,
                DOMAIN,
                "2001:0db8:0000:0000:0000:0000:0000:0001",
            ),
    );
    let source = Arc::new(
        FakeSource::new()
            .with(Family::V4, "192.0.2.1")
            .with(Family::V6, "2001:db8::1"),
    );

    let report = reconciler(&provider, &source, 60)
        .run(&CancellationToken::new())
        .await;

    assert!(provider.updates().is_empty());
    assert!(matches!(
        report.status(RecordType::AAAA),
        Some(RecordStatus::Unchanged { .. })
    ));
}

#[tokio::test]
async fn dry_run_reports_without_writing() {
    let provider = Arc::new(
        FakeProvider::new()
            .with_record("record123", RecordType::A, DOMAIN, "192.0.2.1")
            .with_record("record456", RecordType::AAAA, DOMAIN, "2001:db8::1"),
    );
    let source = Arc::new(
        FakeSource::new()
            .with(Family::V4, "192.0.2.2")
            .with(Family::V6, "2001:db8::1"),
    );

    let report = reconciler(&provider, &source, 60)
        .dry_run(true)
        .run(&CancellationToken::new())
        .await;

    assert!(provider.updates().is_empty());
    assert_eq!(
        report.status(RecordType::A),
        Some(&RecordStatus::WouldUpdate {
            from: "192.0.2.1".into(),
            to: "192.0.2.2".into(),
        })
    );
}

#[tokio::test]
async fn rejected_update_is_reported_at_update_stage() {
    let provider = Arc::new(
        FakeProvider::new()
            .with_record("record123", RecordType::A, DOMAIN, "192.0.2.1")
            .with(RecordType::AAAA, Fetch::Missing)
            .failing_updates(),
    );
    let source = Arc::new(FakeSource::new().with(Family::V4, "192.0.2.2"));

    let report = reconciler(&provider, &source, 60)
        .run(&CancellationToken::new())
        .await;

    match report.status(RecordType::A) {
        Some(RecordStatus::Failed { stage, reason }) => {
            assert_eq!(*stage, Stage::Update);
            assert!(reason.contains("record is locked"), "{reason}");
        }
        other => panic!("expected update failure, got {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_aborts_a_hung_fetch() {
    let provider = Arc::new(
        FakeProvider::new()
            .with(RecordType::A, Fetch::Hang)
            .with_record("record456", RecordType::AAAA, DOMAIN, "2001:db8::1"),
    );
    let source = Arc::new(FakeSource::new().with(Family::V6, "2001:db8::2"));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        reconciler(&provider, &source, 60).run(&cancel),
    )
    .await
    .expect("cancellation must end the pass");

    for typ in RecordType::ALL {
        assert!(
            matches!(
                report.status(typ),
                Some(RecordStatus::Failed {
                    stage: Stage::Fetch,
                    ..
                })
            ),
            "{typ}: {:?}",
            report.status(typ)
        );
    }
    assert!(provider.updates().is_empty());
}
