//! Behavior every repository backend must share, exercised on the
//! in-memory backend.

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::Instrument;
use waypoint_core::{NewPlayer, PageRequest, Player, PlayerFilter, PlayerPatch};
use waypoint_store::{ConnectionGate, MemoryRepository, Repository, StoreError, TracedRepository};
use waypoint_telemetry::testing::SpanCapture;
use waypoint_telemetry::OperationSpan;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn player(name: &str) -> Player {
    NewPlayer {
        name: name.to_string(),
        level: 1,
    }
    .into_player(Utc::now())
}

fn memory() -> MemoryRepository<Player> {
    MemoryRepository::new(ConnectionGate::new(4, ms(100)))
}

#[tokio::test]
async fn create_then_find_round_trips() {
    let repo = memory();
    let created = repo.create(player("ada")).await.unwrap();
    let found = repo.find_by_id(&created.id).await.unwrap();
    assert_eq!(found, created);
}

#[tokio::test]
async fn delete_then_find_is_not_found() {
    let repo = memory();
    let created = repo.create(player("ada")).await.unwrap();
    repo.delete(&created.id).await.unwrap();

    let err = repo.find_by_id(&created.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "player", .. }));
    assert!(matches!(
        repo.delete(&created.id).await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn update_missing_record_is_not_found() {
    let repo = memory();
    let err = repo
        .update(
            &player("ghost").id,
            PlayerPatch {
                name: None,
                level: Some(3),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn paging_visits_every_record_once() {
    let repo = memory();
    for i in 0..7 {
        repo.create(player(&format!("p{i}"))).await.unwrap();
    }

    let mut seen = Vec::new();
    let mut request = PageRequest::new(0, 3).unwrap();
    loop {
        let page = repo.list(&PlayerFilter::default(), request).await.unwrap();
        seen.extend(page.items.iter().map(|p| p.id));
        match page.next_offset {
            Some(next) => request = PageRequest::new(next, 3).unwrap(),
            None => break,
        }
    }
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 7);
}

async fn timed_find(
    repo: MemoryRepository<Player>,
    player: Player,
    started: Instant,
) -> (Result<Player, StoreError>, Duration) {
    let result = repo.find_by_id(&player.id).await;
    (result, started.elapsed())
}

#[tokio::test(start_paused = true)]
async fn saturated_pool_fails_one_caller_after_wait_timeout() {
    let repo = MemoryRepository::<Player>::new(ConnectionGate::new(2, ms(50))).with_latency(ms(100));
    let stored = repo.create(player("ada")).await.unwrap();

    let started = Instant::now();
    let (a, b, c) = tokio::join!(
        timed_find(repo.clone(), stored.clone(), started),
        timed_find(repo.clone(), stored.clone(), started),
        timed_find(repo.clone(), stored.clone(), started),
    );

    let outcomes = [a, b, c];
    let exhausted: Vec<_> = outcomes
        .iter()
        .filter(|(r, _)| matches!(r, Err(StoreError::ResourceExhausted { .. })))
        .collect();
    assert_eq!(exhausted.len(), 1);
    assert!(exhausted[0].1 >= ms(50), "failed before the wait timeout");

    let succeeded: Vec<_> = outcomes.iter().filter(|(r, _)| r.is_ok()).collect();
    assert_eq!(succeeded.len(), 2);
    assert!(succeeded.iter().all(|(_, elapsed)| *elapsed < ms(150)));
}

#[tokio::test(start_paused = true)]
async fn queued_caller_succeeds_when_slot_frees_in_time() {
    let repo = MemoryRepository::<Player>::new(ConnectionGate::new(1, ms(150))).with_latency(ms(100));
    let stored = repo.create(player("ada")).await.unwrap();

    let started = Instant::now();
    let (a, b) = tokio::join!(
        timed_find(repo.clone(), stored.clone(), started),
        timed_find(repo.clone(), stored.clone(), started),
    );
    assert!(a.0.is_ok());
    assert!(b.0.is_ok());
    assert!(b.1 >= ms(200));
}

#[tokio::test]
async fn traced_repository_spans_nest_under_caller() {
    let capture = SpanCapture::new();
    let _guard = capture.install();

    let repo = TracedRepository::new(memory());
    let stored = repo.create(player("ada")).await.unwrap();

    let outer = OperationSpan::start("get-player");
    let found = repo
        .find_by_id(&stored.id)
        .instrument(outer.span().clone())
        .await;
    outer.finish_with(&found);

    let inner = capture.named("player.find_by_id");
    assert_eq!(inner.len(), 1);
    assert_eq!(inner[0].parent.as_deref(), Some("get-player"));
    assert_eq!(inner[0].status.as_deref(), Some("ok"));
    assert_eq!(inner[0].closes, 1);
}

#[tokio::test]
async fn traced_repository_marks_failures() {
    let capture = SpanCapture::new();
    let _guard = capture.install();

    let repo = TracedRepository::new(memory());
    let missing = player("ghost");
    let _ = repo.find_by_id(&missing.id).await;

    let span = &capture.named("player.find_by_id")[0];
    assert_eq!(span.status.as_deref(), Some("error"));
    assert!(span
        .status_message
        .as_deref()
        .is_some_and(|m| m.contains("not found")));
}
