//! End-to-end pipeline runs with fake collaborators.

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use reelpost_models::{Destination, DestinationKind, JobStatus};
use reelpost_worker::PublisherSet;

use common::*;

const WAIT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_past_due_job_fires_on_next_tick() {
    let harness = Harness::happy();
    harness.start();

    let submitted_at = Utc::now();
    let ack = harness
        .service
        .submit(request(
            vec![Destination::social_page("p1")],
            submitted_at - ChronoDuration::seconds(1),
        ))
        .await
        .unwrap();

    let record = tokio::time::timeout(
        WAIT,
        harness.service.scheduler().registry().wait_for_terminal(&ack.job_id),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(record.status(), JobStatus::Completed);
    let started = record.started_at.unwrap();
    // One tick plus generous slack for a loaded test machine.
    assert!(started - submitted_at < ChronoDuration::seconds(2));
    assert!(started >= record.job.scheduled_at);
}

#[tokio::test]
async fn test_failing_fetch_fails_job_and_removes_logo() {
    let harness = Harness::new(
        Arc::new(FailingFetcher),
        Arc::new(FakeCompositor::default()),
        PublisherSet::dry_run(Duration::from_secs(5)),
    );
    harness.start();

    let ack = harness
        .service
        .submit(request(vec![Destination::social_page("p1")], Utc::now()))
        .await
        .unwrap();
    let logo = harness
        .service
        .job_status(&ack.job_id)
        .await
        .unwrap()
        .job
        .overlay
        .logo_path;

    let record = tokio::time::timeout(
        WAIT,
        harness.service.scheduler().registry().wait_for_terminal(&ack.job_id),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(record.status(), JobStatus::Failed);
    assert!(record.failure.unwrap().contains("locator unreachable"));
    assert!(record.publish_results.is_empty());
    assert!(!logo.exists());
    assert!(harness.leftovers().is_empty());
}

#[tokio::test]
async fn test_one_failing_destination_is_a_partial_failure() {
    let social = Arc::new(SelectivePublisher::refusing(&["p2"]));
    let publishers = PublisherSet::new(Duration::from_secs(5))
        .with_shared(DestinationKind::SocialPage, social.clone())
        .with_shared(
            DestinationKind::VideoHost,
            Arc::new(SelectivePublisher::refusing(&[])),
        );
    let harness = Harness::new(
        Arc::new(FakeFetcher::default()),
        Arc::new(FakeCompositor::default()),
        publishers,
    );
    harness.start();

    let ack = harness
        .service
        .submit(request(
            vec![
                Destination::social_page("p1"),
                Destination::social_page("p2"),
                Destination::video_host("yt1"),
            ],
            Utc::now(),
        ))
        .await
        .unwrap();

    let record = tokio::time::timeout(
        WAIT,
        harness.service.scheduler().registry().wait_for_terminal(&ack.job_id),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(record.status(), JobStatus::Completed);
    assert_eq!(record.publish_results.len(), 3);
    assert_eq!(record.failed_destinations().count(), 1);
    assert!(record.is_partial_failure());
    assert_eq!(
        record.failed_destinations().next().unwrap().destination,
        Destination::social_page("p2")
    );
    let mut seen = social.seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["p1", "p2"]);
    assert!(harness.leftovers().is_empty());
}

#[tokio::test]
async fn test_compose_failure_releases_download() {
    let compositor = Arc::new(FailingCompositor::default());
    let harness = Harness::new(
        Arc::new(FakeFetcher::default()),
        compositor.clone(),
        PublisherSet::dry_run(Duration::from_secs(5)),
    );
    harness.start();

    let ack = harness
        .service
        .submit(request(vec![Destination::video_host("yt1")], Utc::now()))
        .await
        .unwrap();

    let record = tokio::time::timeout(
        WAIT,
        harness.service.scheduler().registry().wait_for_terminal(&ack.job_id),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(record.status(), JobStatus::Failed);
    assert!(record.failure.unwrap().starts_with("Composition failed"));
    assert!(record.publish_results.is_empty());

    let source = compositor.saw_source.lock().unwrap().clone().unwrap();
    assert!(!source.exists());
    assert!(harness.leftovers().is_empty());
}

#[tokio::test]
async fn test_panicking_run_is_recorded_as_failed() {
    let harness = Harness::new(
        Arc::new(FakeFetcher::default()),
        Arc::new(PanickingCompositor),
        PublisherSet::dry_run(Duration::from_secs(5)),
    );
    harness.start();

    let ack = harness
        .service
        .submit(request(vec![Destination::social_page("p1")], Utc::now()))
        .await
        .unwrap();

    let record = tokio::time::timeout(
        WAIT,
        harness.service.scheduler().registry().wait_for_terminal(&ack.job_id),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(record.status(), JobStatus::Failed);
    assert_eq!(record.failure.as_deref(), Some("run panicked"));
    assert!(harness.leftovers().is_empty());
}

#[tokio::test]
async fn test_same_instant_jobs_use_separate_paths() {
    let fetcher = Arc::new(FakeFetcher::default());
    let compositor = Arc::new(FakeCompositor::default());
    let harness = Harness::new(
        fetcher.clone(),
        compositor.clone(),
        PublisherSet::dry_run(Duration::from_secs(5)),
    );

    let at = Utc::now() - ChronoDuration::seconds(1);
    let first = harness
        .service
        .submit(request(vec![Destination::social_page("p1")], at))
        .await
        .unwrap();
    let second = harness
        .service
        .submit(request(vec![Destination::social_page("p1")], at))
        .await
        .unwrap();
    assert_ne!(first.job_id, second.job_id);

    harness.start();
    let registry = harness.service.scheduler().registry().clone();
    for id in [&first.job_id, &second.job_id] {
        let record = tokio::time::timeout(WAIT, registry.wait_for_terminal(id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status(), JobStatus::Completed);
    }

    let stems = fetcher.stems.lock().unwrap().clone();
    assert_eq!(stems.len(), 2);
    assert_ne!(stems[0], stems[1]);

    let calls = compositor.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    assert_ne!(calls[0].0, calls[1].0);
    assert_ne!(calls[0].1, calls[1].1);
    assert!(harness.leftovers().is_empty());
}

#[tokio::test]
async fn test_example_scenario() {
    let compositor = Arc::new(FakeCompositor::default());
    let harness = Harness::new(
        Arc::new(FakeFetcher::default()),
        compositor.clone(),
        PublisherSet::dry_run(Duration::from_secs(5)),
    );
    harness.start();

    let ack = harness
        .service
        .submit(request(
            vec![Destination::social_page("p1"), Destination::video_host("yt1")],
            Utc::now() - ChronoDuration::seconds(1),
        ))
        .await
        .unwrap();
    assert_eq!(ack.message, "Video post scheduled successfully!");

    let record = tokio::time::timeout(
        WAIT,
        harness.service.scheduler().registry().wait_for_terminal(&ack.job_id),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(record.status(), JobStatus::Completed);
    assert_eq!(record.publish_results.len(), 2);
    assert!(record.publish_results.iter().all(|o| o.success));
    assert_eq!(record.publish_results[0].destination, Destination::social_page("p1"));
    assert_eq!(record.publish_results[1].destination, Destination::video_host("yt1"));
    assert!(record.started_at.is_some());
    assert!(record.finished_at.unwrap() >= record.started_at.unwrap());

    let calls = compositor.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].2, "Big Sale");
    assert!(harness.leftovers().is_empty());
}

#[tokio::test]
async fn test_sequential_publish_mode() {
    let publisher = Arc::new(SelectivePublisher::refusing(&[]));
    let publishers = PublisherSet::new(Duration::from_secs(5))
        .with_shared(DestinationKind::SocialPage, publisher.clone());
    let tmp = tempfile::TempDir::new().unwrap();
    let mut config = reelpost_worker::WorkerConfig::default().with_scratch_dir(tmp.path());
    config.parallel_publish = false;

    let registry = Arc::new(reelpost_worker::JobRegistry::new());
    let pipeline = reelpost_worker::Pipeline::new(
        config,
        registry,
        Arc::new(FakeFetcher::default()),
        Arc::new(FakeCompositor::default()),
        publishers,
    );

    let logo = pipeline
        .scratch()
        .stage_logo(
            &reelpost_models::JobId::from_string("direct"),
            &reelpost_models::LogoUpload::new("l.png", PNG_BYTES.to_vec()),
        )
        .await
        .unwrap();
    let job = reelpost_models::Job::new(
        reelpost_models::JobId::from_string("direct"),
        "https://example/video123",
        reelpost_models::Overlay {
            logo_path: logo,
            caption_text: "text".to_string(),
        },
        vec![
            Destination::social_page("a"),
            Destination::social_page("b"),
            Destination::social_page("c"),
        ],
        "caption",
        Utc::now(),
    );

    let record = pipeline.execute(job).await.unwrap();
    assert_eq!(record.status(), JobStatus::Completed);
    assert_eq!(*publisher.seen.lock().unwrap(), vec!["a", "b", "c"]);
    assert!(std::fs::read_dir(tmp.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_finished_records_expire_after_retention() {
    let harness = Harness::happy();
    harness.start();

    let ack = harness
        .service
        .submit(request(vec![Destination::social_page("p1")], Utc::now()))
        .await
        .unwrap();
    let scheduler = harness.service.scheduler();
    tokio::time::timeout(WAIT, scheduler.registry().wait_for_terminal(&ack.job_id))
        .await
        .unwrap()
        .unwrap();

    // Default retention is a day.
    assert_eq!(scheduler.prune_records(Utc::now()).await, 0);
    assert!(harness.service.job_status(&ack.job_id).await.is_ok());

    let later = Utc::now() + ChronoDuration::hours(25);
    assert_eq!(scheduler.prune_records(later).await, 1);
    assert!(matches!(
        harness.service.job_status(&ack.job_id).await,
        Err(reelpost_worker::WorkerError::JobNotFound(_))
    ));
}
