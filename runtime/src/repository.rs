//! Repository facade over a transport.
//!
//! A repository owns the lifecycle of one descriptor type: it constructs the
//! descriptor, prefers the descriptor's local substitute over the network,
//! and runs the descriptor's success and failure hooks.

use crate::analytics::Analytics;
use crate::transport::HttpClient;
use fetchkit_core::client::Client;
use fetchkit_core::environment::Severity;
use fetchkit_core::outcome::TransportOutcome;
use fetchkit_core::request::Request;
use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use tokio::task::JoinHandle;

/// Source of outcomes for one descriptor type.
///
/// [`Usecase`](crate::usecase::Usecase) talks to this seam so tests can swap
/// in scripted repositories.
pub trait Repo: Send + Sync + 'static {
    /// Descriptor type served by this repository
    type Request: Request;

    /// Construct the descriptor and produce its outcome.
    fn request(
        &self,
        use_test_data: bool,
        parameters: <Self::Request as Request>::Parameters,
        path_component: <Self::Request as Request>::PathComponent,
    ) -> impl Future<Output = TransportOutcome<<Self::Request as Request>::Response>> + Send;

    /// The descriptor's local substitute alone, without touching the
    /// transport.
    fn local(
        &self,
        parameters: <Self::Request as Request>::Parameters,
        path_component: <Self::Request as Request>::PathComponent,
    ) -> impl Future<Output = Option<<Self::Request as Request>::Response>> + Send;
}

/// Repository for descriptor `T` executed by client `C`.
pub struct Repository<T, C = HttpClient> {
    client: C,
    analytics: Analytics,
    _request: PhantomData<fn() -> T>,
}

impl<T, C> Repository<T, C> {
    /// Create a repository executing through `client`.
    #[must_use]
    pub fn new(client: C) -> Self {
        Self {
            client,
            analytics: Analytics::new(),
            _request: PhantomData,
        }
    }

    /// Replace the analytics collaborator used for failure logs.
    #[must_use]
    pub fn with_analytics(mut self, analytics: Analytics) -> Self {
        self.analytics = analytics;
        self
    }

    /// The underlying client.
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }
}

impl<T, C: Clone> Clone for Repository<T, C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            analytics: self.analytics.clone(),
            _request: PhantomData,
        }
    }
}

impl<T, C: Default> Default for Repository<T, C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<T, C: fmt::Debug> fmt::Debug for Repository<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("request", &type_name::<T>())
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl<T: Request, C: Client> Repo for Repository<T, C> {
    type Request = T;

    async fn request(
        &self,
        use_test_data: bool,
        parameters: T::Parameters,
        path_component: T::PathComponent,
    ) -> TransportOutcome<T::Response> {
        let request = T::new(parameters, path_component);

        let outcome = match request.local_data().await {
            Some(local) => TransportOutcome::success(local),
            None => self.client.execute(&request, use_test_data).await,
        };

        match &outcome.result {
            Ok(response) => request.on_success(response),
            Err(error) => {
                self.analytics
                    .log(format!("{}: {error}", type_name::<T>()), Severity::Error);
                request.on_failure(error);
            }
        }

        outcome
    }

    async fn local(
        &self,
        parameters: T::Parameters,
        path_component: T::PathComponent,
    ) -> Option<T::Response> {
        T::new(parameters, path_component).local_data().await
    }
}

impl<T: Request, C: Client> Repository<T, C> {
    /// Request with default parameters.
    pub async fn request_with_path(
        &self,
        use_test_data: bool,
        path_component: T::PathComponent,
    ) -> TransportOutcome<T::Response>
    where
        T::Parameters: Default,
    {
        self.request(use_test_data, T::Parameters::default(), path_component)
            .await
    }

    /// Request with the default path component.
    pub async fn request_with_parameters(
        &self,
        use_test_data: bool,
        parameters: T::Parameters,
    ) -> TransportOutcome<T::Response>
    where
        T::PathComponent: Default,
    {
        self.request(use_test_data, parameters, T::PathComponent::default())
            .await
    }

    /// Request with default parameters and path component.
    pub async fn request_default(&self, use_test_data: bool) -> TransportOutcome<T::Response>
    where
        T::Parameters: Default,
        T::PathComponent: Default,
    {
        self.request(
            use_test_data,
            T::Parameters::default(),
            T::PathComponent::default(),
        )
        .await
    }

    /// Run [`Repo::request`] on the tokio runtime and hand the outcome to
    /// `callback`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request_with_callback<F>(
        &self,
        use_test_data: bool,
        parameters: T::Parameters,
        path_component: T::PathComponent,
        callback: F,
    ) -> JoinHandle<()>
    where
        C: Clone,
        F: FnOnce(TransportOutcome<T::Response>) + Send + 'static,
    {
        let repository = self.clone();
        tokio::spawn(async move {
            let outcome = repository
                .request(use_test_data, parameters, path_component)
                .await;
            callback(outcome);
        })
    }
}
