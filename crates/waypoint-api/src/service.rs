//! # Player Service
//!
//! Business operations over the player [`Repository`]. Every operation runs
//! inside an [`OperationSpan`] named after it (`get-player`,
//! `list-players`, ...) opened under the request span. The span is closed
//! on every exit path: with the outcome's status when the call returns,
//! `cancelled` when the deadline fires or the request future is dropped,
//! and `error` if the call unwinds.
//!
//! This is also where storage errors become API-facing [`ServiceError`]s.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use waypoint_core::{
    NewPlayer, Page, PageRequest, Player, PlayerFilter, PlayerId, PlayerPatch, ValidationError,
};
use waypoint_store::{Repository, StoreError};
use waypoint_telemetry::{OperationSpan, SpanStatus};

/// Errors surfaced by service operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("resource exhausted; retry after {retry_after:?}")]
    ResourceExhausted { retry_after: Duration },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("internal: {0}")]
    Internal(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Validation(msg) => Self::Validation(msg),
            StoreError::ResourceExhausted { retry_after } => Self::ResourceExhausted { retry_after },
            StoreError::Unavailable(msg) => Self::StorageUnavailable(msg),
            StoreError::Configuration(msg) | StoreError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Span-wrapped player operations. Cheap to clone.
#[derive(Clone)]
pub struct PlayerService {
    repo: Arc<dyn Repository<Player>>,
    deadline: Option<Duration>,
}

impl std::fmt::Debug for PlayerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerService")
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl PlayerService {
    pub fn new(repo: Arc<dyn Repository<Player>>) -> Self {
        Self {
            repo,
            deadline: None,
        }
    }

    /// Cancel any operation still running after `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Run `call` inside a span named `operation`.
    pub async fn traced<T, F>(&self, operation: &'static str, call: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        let mut span = OperationSpan::start(operation);

        let result = match self.deadline {
            Some(deadline) => {
                let outcome = tokio::time::timeout(deadline, span.watch(call)).await;
                match outcome {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(
                            operation,
                            deadline_ms = deadline.as_millis() as u64,
                            "operation cut off by deadline"
                        );
                        span.finish(SpanStatus::Cancelled);
                        return Err(ServiceError::DeadlineExceeded);
                    }
                }
            }
            None => span.watch(call).await,
        };

        span.finish_with(&result);
        result
    }

    pub async fn get(&self, id: PlayerId) -> Result<Player, ServiceError> {
        self.traced("get-player", async {
            Ok(self.repo.find_by_id(&id).await?)
        })
        .await
    }

    pub async fn list(
        &self,
        filter: PlayerFilter,
        page: PageRequest,
    ) -> Result<Page<Player>, ServiceError> {
        self.traced("list-players", async {
            Ok(self.repo.list(&filter, page).await?)
        })
        .await
    }

    pub async fn create(&self, new: NewPlayer) -> Result<Player, ServiceError> {
        self.traced("create-player", async {
            new.validate()?;
            let player = new.into_player(chrono::Utc::now());
            tracing::debug!(player_id = %player.id, "creating player");
            Ok(self.repo.create(player).await?)
        })
        .await
    }

    pub async fn update(&self, id: PlayerId, patch: PlayerPatch) -> Result<Player, ServiceError> {
        self.traced("update-player", async {
            patch.validate()?;
            Ok(self.repo.update(&id, patch.normalized()).await?)
        })
        .await
    }

    pub async fn delete(&self, id: PlayerId) -> Result<(), ServiceError> {
        self.traced("delete-player", async {
            Ok(self.repo.delete(&id).await?)
        })
        .await
    }

    /// Whether the backing store answers. Not traced.
    pub async fn ready(&self) -> Result<(), ServiceError> {
        Ok(self.repo.ping().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use waypoint_store::{ConnectionGate, MemoryRepository, TracedRepository};
    use waypoint_telemetry::testing::SpanCapture;

    fn memory() -> MemoryRepository<Player> {
        MemoryRepository::new(ConnectionGate::new(4, Duration::from_millis(100)))
    }

    fn new_player(name: &str) -> NewPlayer {
        NewPlayer {
            name: name.to_string(),
            level: 1,
        }
    }

    /// Repository whose every call fails or panics, counting calls.
    struct Faulty {
        calls: AtomicUsize,
        fault: fn() -> Result<Player, StoreError>,
    }

    #[async_trait]
    impl Repository<Player> for Faulty {
        async fn find_by_id(&self, _key: &PlayerId) -> Result<Player, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.fault)()
        }
        async fn list(&self, _f: &PlayerFilter, _p: PageRequest) -> Result<Page<Player>, StoreError> {
            Ok(Page::empty())
        }
        async fn create(&self, p: Player) -> Result<Player, StoreError> {
            Ok(p)
        }
        async fn update(&self, _k: &PlayerId, _p: PlayerPatch) -> Result<Player, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.fault)()
        }
        async fn delete(&self, _k: &PlayerId) -> Result<(), StoreError> {
            Ok(())
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn faulty(fault: fn() -> Result<Player, StoreError>) -> Arc<Faulty> {
        Arc::new(Faulty {
            calls: AtomicUsize::new(0),
            fault,
        })
    }

    #[tokio::test]
    async fn success_closes_span_ok() {
        let capture = SpanCapture::new();
        let _guard = capture.install();

        let service = PlayerService::new(Arc::new(memory()));
        let created = service.create(new_player("ada")).await.unwrap();
        service.get(created.id).await.unwrap();

        let spans = capture.named("get-player");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status.as_deref(), Some("ok"));
        assert_eq!(spans[0].status_records, 1);
        assert_eq!(spans[0].closes, 1);
    }

    #[tokio::test]
    async fn business_error_closes_span_once_with_error() {
        let capture = SpanCapture::new();
        let _guard = capture.install();

        let service = PlayerService::new(Arc::new(memory()));
        let err = service.get(PlayerId::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let span = &capture.named("get-player")[0];
        assert_eq!(span.status.as_deref(), Some("error"));
        assert_eq!(span.status_records, 1);
        assert_eq!(span.closes, 1);
    }

    #[tokio::test]
    async fn infrastructure_errors_stay_distinguishable() {
        let exhausted = faulty(|| {
            Err(StoreError::ResourceExhausted {
                retry_after: Duration::from_millis(50),
            })
        });
        let service = PlayerService::new(exhausted.clone());
        assert_eq!(
            service.get(PlayerId::new()).await.unwrap_err(),
            ServiceError::ResourceExhausted {
                retry_after: Duration::from_millis(50)
            }
        );
        assert_eq!(exhausted.calls.load(Ordering::SeqCst), 1);

        let down = faulty(|| Err(StoreError::Unavailable("refused".into())));
        let service = PlayerService::new(down);
        assert!(matches!(
            service.get(PlayerId::new()).await,
            Err(ServiceError::StorageUnavailable(_))
        ));

        let misconfigured = faulty(|| Err(StoreError::Configuration("empty host".into())));
        let service = PlayerService::new(misconfigured);
        assert!(matches!(
            service.get(PlayerId::new()).await,
            Err(ServiceError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn panic_inside_operation_still_closes_span() {
        let capture = SpanCapture::new();
        let _guard = capture.install();

        let service = PlayerService::new(faulty(|| panic!("driver bug")));
        let outcome = tokio::spawn(async move { service.get(PlayerId::new()).await }).await;
        assert!(outcome.unwrap_err().is_panic());

        let span = &capture.named("get-player")[0];
        assert_eq!(span.status.as_deref(), Some("error"));
        assert_eq!(span.status_message.as_deref(), Some("panicked"));
        assert_eq!(span.closes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_span() {
        let capture = SpanCapture::new();
        let _guard = capture.install();

        let slow = memory().with_latency(Duration::from_millis(500));
        let service = PlayerService::new(Arc::new(slow)).with_deadline(Duration::from_millis(100));

        let err = service.get(PlayerId::new()).await.unwrap_err();
        assert_eq!(err, ServiceError::DeadlineExceeded);

        let span = &capture.named("get-player")[0];
        assert_eq!(span.status.as_deref(), Some("cancelled"));
        assert_eq!(span.status_records, 1);
        assert_eq!(span.closes, 1);
    }

    #[tokio::test]
    async fn dropped_request_future_cancels_span() {
        let capture = SpanCapture::new();
        let _guard = capture.install();

        let slow = memory().with_latency(Duration::from_secs(60));
        let service = PlayerService::new(Arc::new(slow));
        let call = service.get(PlayerId::new());
        let _ = tokio::time::timeout(Duration::from_millis(10), call).await;

        let span = &capture.named("get-player")[0];
        assert_eq!(span.status.as_deref(), Some("cancelled"));
        assert_eq!(span.closes, 1);
    }

    #[tokio::test]
    async fn repository_spans_nest_under_service_span() {
        let capture = SpanCapture::new();
        let _guard = capture.install();

        let repo = TracedRepository::new(memory());
        let service = PlayerService::new(Arc::new(repo));
        let created = service.create(new_player("ada")).await.unwrap();
        service.get(created.id).await.unwrap();

        let inner = capture.named("player.find_by_id");
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].parent.as_deref(), Some("get-player"));
        let create = capture.named("player.create");
        assert_eq!(create[0].parent.as_deref(), Some("create-player"));
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_repository() {
        let repo = faulty(|| Err(StoreError::Internal("unreachable".into())));
        let service = PlayerService::new(repo.clone());

        let err = service
            .update(PlayerId::new(), PlayerPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(repo.calls.load(Ordering::SeqCst), 0);

        let err = service.create(new_player("")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
