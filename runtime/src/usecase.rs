//! Stateful per-feature usecase.
//!
//! A [`Usecase`] pairs a [`Repo`] with a [`Mapper`] and keeps what the
//! feature has seen so far:
//!
//! - `input`: caller-staged input for the next request
//! - `output`: entities merged from successful responses ([`OutputCache`])
//! - `last_id`: caller-managed identifier of the last item consumed
//! - `cursor`: pagination cursor read from the last response's header
//!
//! # State machine
//!
//! ```text
//!             handle_outcome(Ok)                handle_outcome(Err)
//!   ┌──────┐ ─────────────────► merge output ┌─► handle_error ─► AppError
//!   │ idle │                                  │
//!   └──────┘ ◄───────────── session invalidated (any usecase, 401/403)
//!                 input, output, last_id, cursor reset
//! ```
//!
//! State lives behind a `tokio::sync::Mutex`; the lock is never held across
//! network I/O, so concurrent requests overlap while their merges stay
//! atomic. Session invalidations are applied when the lock is next taken,
//! before anything reads or writes the state.

use crate::analytics::Analytics;
use crate::config::DEFAULT_CURSOR_HEADER;
use crate::registry::TypeSignature;
use crate::repository::Repo;
use crate::session::{SessionSignal, SessionSubscription};
use fetchkit_core::environment::Severity;
use fetchkit_core::error::{ApiError, AppError};
use fetchkit_core::mapper::{Entity, MappedOutput, Mapper, OutputCache};
use fetchkit_core::outcome::TransportOutcome;
use fetchkit_core::request::Request;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard};

/// Response type produced by repository `R`.
pub type ResponseOf<R> = <<R as Repo>::Request as Request>::Response;

/// Parameters type accepted by repository `R`.
pub type ParametersOf<R> = <<R as Repo>::Request as Request>::Parameters;

/// Path component type accepted by repository `R`.
pub type PathOf<R> = <<R as Repo>::Request as Request>::PathComponent;

/// Copy of a usecase's state at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsecaseSnapshot<I, E> {
    /// Staged input
    pub input: I,
    /// Cached entities, least recent first
    pub output: Vec<E>,
    /// Last consumed identifier
    pub last_id: Option<String>,
    /// Pagination cursor
    pub cursor: Option<String>,
}

struct UsecaseState<I, E> {
    input: I,
    output: OutputCache<E>,
    last_id: Option<String>,
    cursor: Option<String>,
    invalidations: SessionSubscription,
}

impl<I: Default, E: Entity> UsecaseState<I, E> {
    fn reset(&mut self) {
        self.input = I::default();
        self.output.clear();
        self.last_id = None;
        self.cursor = None;
    }
}

/// Stateful usecase for repository `R`, mapper `M`, input `I` and entity `E`.
pub struct Usecase<R, M, I, E> {
    repository: R,
    mapper: M,
    state: Mutex<UsecaseState<I, E>>,
    session: SessionSignal,
    use_test_data: AtomicBool,
    cursor_header: String,
    analytics: Analytics,
    signature: TypeSignature,
}

impl<R, M, I, E> fmt::Debug for Usecase<R, M, I, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Usecase")
            .field("signature", &self.signature)
            .field("use_test_data", &self.use_test_data.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<R, M, I, E> Usecase<R, M, I, E>
where
    R: Repo,
    M: Mapper<Response = ResponseOf<R>>,
    M::Output: MappedOutput<E>,
    I: Default + Clone + Send + 'static,
    E: Entity,
{
    /// Create a usecase subscribed to `session`.
    #[must_use]
    pub fn new(repository: R, mapper: M, session: &SessionSignal) -> Self {
        let state = UsecaseState {
            input: I::default(),
            output: OutputCache::new(),
            last_id: None,
            cursor: None,
            invalidations: session.subscribe(),
        };

        Self {
            repository,
            mapper,
            state: Mutex::new(state),
            session: session.clone(),
            use_test_data: AtomicBool::new(false),
            cursor_header: DEFAULT_CURSOR_HEADER.to_string(),
            analytics: Analytics::new(),
            signature: TypeSignature::of::<R, M, I, E>(),
        }
    }

    /// Read the pagination cursor from `header` instead of `X-Cursor`.
    #[must_use]
    pub fn with_cursor_header(mut self, header: impl Into<String>) -> Self {
        self.cursor_header = header.into();
        self
    }

    /// Replace the analytics collaborator.
    #[must_use]
    pub fn with_analytics(mut self, analytics: Analytics) -> Self {
        self.analytics = analytics;
        self
    }

    /// Type signature identifying this usecase.
    #[must_use]
    pub const fn signature(&self) -> &TypeSignature {
        &self.signature
    }

    /// The repository requests go through.
    #[must_use]
    pub const fn repository(&self) -> &R {
        &self.repository
    }

    /// Whether requests are served from test data.
    #[must_use]
    pub fn use_test_data(&self) -> bool {
        self.use_test_data.load(Ordering::Acquire)
    }

    /// Serve subsequent requests from test data (or stop doing so).
    pub fn set_use_test_data(&self, enabled: bool) {
        self.use_test_data.store(enabled, Ordering::Release);
    }

    /// Run one request through the repository and fold its outcome into the
    /// state.
    ///
    /// # Errors
    ///
    /// Returns the [`AppError`] produced by [`Usecase::handle_error`] when the
    /// call fails.
    pub async fn request(
        &self,
        parameters: ParametersOf<R>,
        path_component: PathOf<R>,
    ) -> Result<M::Output, AppError> {
        self.analytics
            .log(format!("{}: request started", self.signature), Severity::Debug);

        let outcome = self
            .repository
            .request(self.use_test_data(), parameters, path_component)
            .await;
        let result = self.handle_outcome(outcome).await;

        match &result {
            Ok(_) => self
                .analytics
                .log(format!("{}: request succeeded", self.signature), Severity::Info),
            Err(error) => self.analytics.log(
                format!("{}: request failed: {error:?}", self.signature),
                Severity::Warning,
            ),
        }
        result
    }

    /// Fold a transport outcome into the state.
    ///
    /// The cursor is taken from the outcome's metadata whether or not the
    /// call succeeded. A successful response is mapped and merged into the
    /// output cache according to the mapper's output shape.
    ///
    /// # Errors
    ///
    /// Returns the [`AppError`] produced by [`Usecase::handle_error`] when the
    /// outcome is a failure.
    pub async fn handle_outcome(
        &self,
        outcome: TransportOutcome<ResponseOf<R>>,
    ) -> Result<M::Output, AppError> {
        let mut state = self.lock().await;
        state.cursor = outcome.header(&self.cursor_header).map(str::to_string);

        match outcome.result {
            Ok(response) => {
                let output = self.mapper.convert(response);
                output.merge_into(&mut state.output);
                Ok(output)
            }
            Err(error) => {
                drop(state);
                Err(self.handle_error(&error))
            }
        }
    }

    /// Turn a transport error into an application error.
    ///
    /// A 401 or 403 broadcasts a session invalidation, which resets every
    /// usecase subscribed to the same signal, this one included.
    pub fn handle_error(&self, error: &ApiError) -> AppError {
        match error {
            ApiError::Unknown
            | ApiError::MissingTestData
            | ApiError::InvalidRequest
            | ApiError::DecodeError(_) => AppError::None,
            ApiError::Offline | ApiError::Timeout => AppError::normal(error.user_message()),
            ApiError::ResponseError { .. } if error.is_auth_failure() => {
                tracing::info!(usecase = %self.signature, error = %error, "Session rejected");
                self.session.invalidate();
                AppError::auth(error.user_message())
            }
            ApiError::ResponseError { .. } => AppError::normal(error.user_message()),
        }
    }

    /// Cached entities, least recent first.
    pub async fn output(&self) -> Vec<E> {
        self.lock().await.output.to_vec()
    }

    /// Pagination cursor of the last handled outcome.
    pub async fn cursor(&self) -> Option<String> {
        self.lock().await.cursor.clone()
    }

    /// Last consumed identifier.
    pub async fn last_id(&self) -> Option<String> {
        self.lock().await.last_id.clone()
    }

    /// Record the last consumed identifier.
    pub async fn set_last_id(&self, last_id: Option<String>) {
        self.lock().await.last_id = last_id;
    }

    /// Staged input.
    pub async fn input(&self) -> I {
        self.lock().await.input.clone()
    }

    /// Modify the staged input in place.
    pub async fn update_input<F>(&self, update: F)
    where
        F: FnOnce(&mut I) + Send,
    {
        update(&mut self.lock().await.input);
    }

    /// Consistent copy of the whole state.
    pub async fn snapshot(&self) -> UsecaseSnapshot<I, E> {
        let state = self.lock().await;
        UsecaseSnapshot {
            input: state.input.clone(),
            output: state.output.to_vec(),
            last_id: state.last_id.clone(),
            cursor: state.cursor.clone(),
        }
    }

    /// Reset this usecase's state without notifying others.
    pub async fn reset(&self) {
        self.lock().await.reset();
    }

    async fn lock(&self) -> MutexGuard<'_, UsecaseState<I, E>> {
        let mut state = self.state.lock().await;
        if state.invalidations.take_pending() {
            tracing::debug!(usecase = %self.signature, "Applying session invalidation");
            state.reset();
        }
        state
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use fetchkit_core::outcome::ResponseMetadata;
    use fetchkit_core::request::{EmptyParameters, EmptyPathComponent, HttpMethod};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
    struct Note {
        id: String,
        text: String,
    }

    impl Entity for Note {
        type Id = String;

        fn id(&self) -> &String {
            &self.id
        }
    }

    struct NotesRequest(EmptyParameters);

    impl Request for NotesRequest {
        type Response = Vec<Note>;
        type Parameters = EmptyParameters;
        type PathComponent = EmptyPathComponent;

        fn new(parameters: EmptyParameters, _path: EmptyPathComponent) -> Self {
            Self(parameters)
        }

        fn parameters(&self) -> &EmptyParameters {
            &self.0
        }

        fn base_url(&self) -> String {
            "https://api.example.com".to_string()
        }

        fn path(&self) -> String {
            "/notes".to_string()
        }

        fn method(&self) -> HttpMethod {
            HttpMethod::Get
        }
    }

    /// Answers every request with nothing; tests drive `handle_outcome`.
    #[derive(Default)]
    struct SilentRepo;

    impl Repo for SilentRepo {
        type Request = NotesRequest;

        async fn request(
            &self,
            _use_test_data: bool,
            _parameters: EmptyParameters,
            _path_component: EmptyPathComponent,
        ) -> TransportOutcome<Vec<Note>> {
            TransportOutcome::success(Vec::new())
        }

        async fn local(
            &self,
            _parameters: EmptyParameters,
            _path_component: EmptyPathComponent,
        ) -> Option<Vec<Note>> {
            None
        }
    }

    #[derive(Default)]
    struct NotesMapper;

    impl Mapper for NotesMapper {
        type Response = Vec<Note>;
        type Output = Vec<Note>;

        fn convert(&self, response: Vec<Note>) -> Vec<Note> {
            response
        }
    }

    type NotesUsecase = Usecase<SilentRepo, NotesMapper, String, Note>;

    fn note(id: &str, text: &str) -> Note {
        Note {
            id: id.to_string(),
            text: text.to_string(),
        }
    }

    fn usecase(session: &SessionSignal) -> NotesUsecase {
        Usecase::new(SilentRepo, NotesMapper, session)
    }

    #[tokio::test]
    async fn test_sequence_output_merges_by_identity() {
        let usecase = usecase(&SessionSignal::default());

        usecase
            .handle_outcome(TransportOutcome::success(vec![note("1", "a"), note("2", "b")]))
            .await
            .unwrap();
        usecase
            .handle_outcome(TransportOutcome::success(vec![note("1", "c")]))
            .await
            .unwrap();

        assert_eq!(usecase.output().await, vec![note("2", "b"), note("1", "c")]);
    }

    #[tokio::test]
    async fn test_cursor_read_even_on_failure() {
        let usecase = usecase(&SessionSignal::default()).with_cursor_header("X-Next");

        let failed = TransportOutcome::<Vec<Note>>::failure(ApiError::ResponseError {
            status_code: 500,
            message: None,
        })
        .with_metadata(ResponseMetadata::new(500, [("x-next", "page-2")]));
        let error = usecase.handle_outcome(failed).await.unwrap_err();

        assert_eq!(error, AppError::normal("Response error (status 500)"));
        assert_eq!(usecase.cursor().await.as_deref(), Some("page-2"));

        usecase
            .handle_outcome(TransportOutcome::success(Vec::new()))
            .await
            .unwrap();
        assert_eq!(usecase.cursor().await, None);
    }

    #[tokio::test]
    async fn test_error_classification() {
        let session = SessionSignal::default();
        let usecase = usecase(&session);

        for silent in [
            ApiError::Unknown,
            ApiError::MissingTestData,
            ApiError::InvalidRequest,
            ApiError::DecodeError("eof".to_string()),
        ] {
            assert_eq!(usecase.handle_error(&silent), AppError::None);
        }
        assert_eq!(
            usecase.handle_error(&ApiError::Offline),
            AppError::normal(ApiError::Offline.to_string())
        );
        assert_eq!(
            usecase.handle_error(&ApiError::ResponseError {
                status_code: 404,
                message: Some("Gone".to_string()),
            }),
            AppError::normal("Gone")
        );

        let mut observer = session.subscribe();
        let auth = usecase.handle_error(&ApiError::ResponseError {
            status_code: 403,
            message: None,
        });
        assert!(auth.is_auth());
        assert!(observer.take_pending());
    }

    #[tokio::test]
    async fn test_auth_failure_resets_own_state() {
        let usecase = usecase(&SessionSignal::default());
        usecase
            .handle_outcome(TransportOutcome::success(vec![note("1", "a")]))
            .await
            .unwrap();
        usecase.set_last_id(Some("1".to_string())).await;
        usecase.update_input(|input| input.push_str("query")).await;

        let error = usecase
            .handle_outcome(TransportOutcome::failure(ApiError::ResponseError {
                status_code: 401,
                message: None,
            }))
            .await
            .unwrap_err();

        assert!(error.is_auth());
        assert_eq!(
            usecase.snapshot().await,
            UsecaseSnapshot {
                input: String::new(),
                output: Vec::new(),
                last_id: None,
                cursor: None,
            }
        );
    }

    #[tokio::test]
    async fn test_request_runs_repository() {
        let usecase = usecase(&SessionSignal::default());
        usecase.set_use_test_data(true);
        assert!(usecase.use_test_data());

        let output = usecase
            .request(EmptyParameters::new(), EmptyPathComponent)
            .await
            .unwrap();
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_reset_is_local() {
        let session = SessionSignal::default();
        let first = usecase(&session);
        let second = usecase(&session);
        for usecase in [&first, &second] {
            usecase.set_last_id(Some("9".to_string())).await;
        }

        first.reset().await;

        assert_eq!(first.last_id().await, None);
        assert_eq!(second.last_id().await.as_deref(), Some("9"));
    }
}
