//! Registry of usecase instances.
//!
//! The registry hands out at most one [`Usecase`] per [`TypeSignature`]: two
//! lookups with the same repository, mapper, input and entity types share the
//! same instance and therefore the same cached state. The registry also owns
//! the [`SessionSignal`] every instance it creates subscribes to.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = UsecaseRegistry::new(ClientConfig::default());
//! let notes = registry.usecase::<NotesRepository, NotesMapper, NotesInput, Note>();
//! let again = registry.usecase::<NotesRepository, NotesMapper, NotesInput, Note>();
//! assert!(Arc::ptr_eq(&notes, &again));
//! ```

use crate::analytics::Analytics;
use crate::config::ClientConfig;
use crate::repository::Repo;
use crate::session::SessionSignal;
use crate::transport::HttpClient;
use crate::usecase::{ResponseOf, Usecase};
use fetchkit_core::environment::Severity;
use fetchkit_core::mapper::{Entity, MappedOutput, Mapper};
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};

/// Composite key of repository, mapper, input and entity types.
#[derive(Clone, Copy)]
pub struct TypeSignature {
    ids: [TypeId; 4],
    names: [&'static str; 4],
}

impl TypeSignature {
    /// Signature of `Usecase<R, M, I, E>`.
    #[must_use]
    pub fn of<R: 'static, M: 'static, I: 'static, E: 'static>() -> Self {
        Self {
            ids: [
                TypeId::of::<R>(),
                TypeId::of::<M>(),
                TypeId::of::<I>(),
                TypeId::of::<E>(),
            ],
            names: [
                type_name::<R>(),
                type_name::<M>(),
                type_name::<I>(),
                type_name::<E>(),
            ],
        }
    }
}

impl PartialEq for TypeSignature {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
    }
}

impl Eq for TypeSignature {}

impl Hash for TypeSignature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ids.hash(state);
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [repository, mapper, input, entity] = self.names;
        write!(f, "{repository}+{mapper}+{input}+{entity}")
    }
}

impl fmt::Debug for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeSignature({self})")
    }
}

type Instances = HashMap<TypeSignature, Arc<dyn Any + Send + Sync>>;

/// Lookup-or-create store of usecases, one per type signature.
pub struct UsecaseRegistry {
    instances: Mutex<Instances>,
    session: SessionSignal,
    config: ClientConfig,
    analytics: Analytics,
}

impl fmt::Debug for UsecaseRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsecaseRegistry")
            .field("instances", &self.len())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl UsecaseRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            session: SessionSignal::new(config.session_channel_capacity),
            config,
            analytics: Analytics::new(),
        }
    }

    /// Replace the analytics collaborator handed to new usecases.
    #[must_use]
    pub fn with_analytics(mut self, analytics: Analytics) -> Self {
        self.analytics = analytics;
        self
    }

    /// The session signal shared by every usecase of this registry.
    #[must_use]
    pub const fn session(&self) -> &SessionSignal {
        &self.session
    }

    /// Configuration applied to new usecases.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The usecase for this signature, created from default components on
    /// first use.
    ///
    /// # Panics
    ///
    /// Panics if the slot for this signature holds a different concrete type,
    /// which cannot happen through this API.
    pub fn usecase<R, M, I, E>(&self) -> Arc<Usecase<R, M, I, E>>
    where
        R: Repo + Default,
        M: Mapper<Response = ResponseOf<R>> + Default,
        M::Output: MappedOutput<E>,
        I: Default + Clone + Send + 'static,
        E: Entity,
    {
        self.usecase_with(R::default)
    }

    /// The usecase for this signature, created with the repository returned
    /// by `make_repository` on first use.
    ///
    /// `make_repository` is not called when the usecase already exists. It
    /// runs without the registry lock held, so it may look up other usecases
    /// on this registry. When two threads race to create the same usecase both
    /// factories may run, but only the first instance stored is ever handed
    /// out.
    ///
    /// # Panics
    ///
    /// Panics if the slot for this signature holds a different concrete type,
    /// which cannot happen through this API.
    pub fn usecase_with<R, M, I, E, F>(&self, make_repository: F) -> Arc<Usecase<R, M, I, E>>
    where
        R: Repo,
        M: Mapper<Response = ResponseOf<R>> + Default,
        M::Output: MappedOutput<E>,
        I: Default + Clone + Send + 'static,
        E: Entity,
        F: FnOnce() -> R,
    {
        let signature = TypeSignature::of::<R, M, I, E>();
        if let Some(existing) = self.lookup::<R, M, I, E>(&signature) {
            return existing;
        }

        let repository = make_repository();

        let mut instances = self
            .instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = instances.get(&signature) {
            return downcast(signature, Arc::clone(existing));
        }

        let usecase = Arc::new(
            Usecase::new(repository, M::default(), &self.session)
                .with_cursor_header(self.config.cursor_header.clone())
                .with_analytics(self.analytics.clone()),
        );
        instances.insert(signature, usecase.clone());
        drop(instances);
        self.analytics
            .log(format!("{signature}: usecase created"), Severity::Debug);
        usecase
    }

    /// A transport built from this registry's configuration whose response
    /// cache is cleared when the session is invalidated.
    #[must_use]
    pub fn http_client(&self) -> HttpClient {
        HttpClient::new(&self.config).with_session(&self.session)
    }

    fn lookup<R, M, I, E>(&self, signature: &TypeSignature) -> Option<Arc<Usecase<R, M, I, E>>>
    where
        R: Repo,
        M: Mapper<Response = ResponseOf<R>> + Default,
        M::Output: MappedOutput<E>,
        I: Default + Clone + Send + 'static,
        E: Entity,
    {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(signature)
            .map(|existing| downcast(*signature, Arc::clone(existing)))
    }

    /// Whether a usecase exists for this signature.
    #[must_use]
    pub fn contains<R: 'static, M: 'static, I: 'static, E: 'static>(&self) -> bool {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeSignature::of::<R, M, I, E>())
    }

    /// Reset every usecase created by this registry. Returns the number of
    /// subscribers reached.
    pub fn invalidate_all(&self) -> usize {
        self.session.invalidate()
    }

    /// Number of usecases created.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no usecase has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[allow(clippy::panic)]
fn downcast<T: Any + Send + Sync>(
    signature: TypeSignature,
    slot: Arc<dyn Any + Send + Sync>,
) -> Arc<T> {
    slot.downcast::<T>()
        .unwrap_or_else(|_| panic!("registry slot {signature} holds a different type"))
}

impl Default for UsecaseRegistry {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    struct Beta;

    #[test]
    fn test_signature_identity() {
        let first = TypeSignature::of::<Alpha, Alpha, Alpha, Alpha>();
        let same = TypeSignature::of::<Alpha, Alpha, Alpha, Alpha>();
        let other = TypeSignature::of::<Alpha, Alpha, Alpha, Beta>();

        assert_eq!(first, same);
        assert_ne!(first, other);
        assert!(first.to_string().ends_with("Alpha"));
        assert!(other.to_string().ends_with("Beta"));
    }

    #[test]
    fn test_empty_registry() {
        let registry = UsecaseRegistry::default();
        assert!(registry.is_empty());
        assert!(!registry.contains::<Alpha, Alpha, Alpha, Alpha>());
        assert_eq!(registry.invalidate_all(), 0);
    }
}
