//! Mapping responses into entities and caching them per feature.
//!
//! A [`Mapper`] turns a decoded response into one of three shapes, and each
//! shape merges into an [`OutputCache`] differently:
//!
//! | Mapper output | Merge behavior |
//! |---------------|----------------|
//! | `E`           | cache replaced wholesale by the single entity |
//! | `Vec<E>`      | each entity merged by identity, most recent last |
//! | `()`          | cache untouched |

use std::marker::PhantomData;

/// A domain value with an identity.
///
/// Two entities with equal [`Entity::id`] are the same entity, even if other
/// fields differ.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Identity type
    type Id: PartialEq;

    /// Identity of this entity.
    fn id(&self) -> &Self::Id;
}

/// Converts a response into entities.
pub trait Mapper: Send + Sync + 'static {
    /// Response type accepted by this mapper
    type Response;

    /// Mapped value: an entity, a `Vec` of entities, or `()`
    type Output: Send;

    /// Convert a response.
    fn convert(&self, response: Self::Response) -> Self::Output;
}

/// How a mapped value merges into an [`OutputCache`].
pub trait MappedOutput<E: Entity> {
    /// Merge this value into `cache`.
    fn merge_into(&self, cache: &mut OutputCache<E>);
}

impl<E: Entity> MappedOutput<E> for E {
    fn merge_into(&self, cache: &mut OutputCache<E>) {
        cache.replace_all(self.clone());
    }
}

impl<E: Entity> MappedOutput<E> for Vec<E> {
    fn merge_into(&self, cache: &mut OutputCache<E>) {
        for entity in self {
            cache.insert(entity.clone());
        }
    }
}

impl<E: Entity> MappedOutput<E> for () {
    fn merge_into(&self, _cache: &mut OutputCache<E>) {}
}

/// Mapper for calls whose response carries nothing to cache.
pub struct EmptyMapper<T> {
    _response: PhantomData<fn(T)>,
}

impl<T> EmptyMapper<T> {
    /// Create the mapper.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _response: PhantomData,
        }
    }
}

impl<T> Default for EmptyMapper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for EmptyMapper<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EmptyMapper")
    }
}

impl<T: 'static> Mapper for EmptyMapper<T> {
    type Response = T;
    type Output = ();

    fn convert(&self, _response: T) {}
}

/// Ordered entities, unique by identity.
///
/// Inserting an entity whose identity is already present removes the old
/// element and appends the new one, so the most recently seen entity is
/// always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCache<E> {
    entities: Vec<E>,
}

impl<E> Default for OutputCache<E> {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
        }
    }
}

impl<E: Entity> OutputCache<E> {
    /// Create an empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entities: Vec::new(),
        }
    }

    /// Insert an entity at the most recent position, dropping any entity
    /// with the same identity.
    pub fn insert(&mut self, entity: E) {
        if let Some(index) = self
            .entities
            .iter()
            .position(|existing| existing.id() == entity.id())
        {
            self.entities.remove(index);
        }
        self.entities.push(entity);
    }

    /// Replace the whole cache with a single entity.
    pub fn replace_all(&mut self, entity: E) {
        self.entities.clear();
        self.entities.push(entity);
    }

    /// Entity with the given identity.
    #[must_use]
    pub fn get(&self, id: &E::Id) -> Option<&E> {
        self.entities.iter().find(|entity| entity.id() == id)
    }

    /// Entities from least to most recent.
    #[must_use]
    pub fn as_slice(&self) -> &[E] {
        &self.entities
    }

    /// Most recently inserted entity.
    #[must_use]
    pub fn last(&self) -> Option<&E> {
        self.entities.last()
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Remove all entities.
    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Copy of the entities in order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<E> {
        self.entities.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        name: String,
    }

    impl Item {
        fn new(id: &str, name: &str) -> Self {
            Self {
                id: id.to_string(),
                name: name.to_string(),
            }
        }
    }

    impl Entity for Item {
        type Id = String;

        fn id(&self) -> &String {
            &self.id
        }
    }

    #[test]
    fn test_reinsert_replaces_and_moves_to_end() {
        let mut cache = OutputCache::new();
        cache.insert(Item::new("1", "a"));
        cache.insert(Item::new("2", "b"));
        cache.insert(Item::new("1", "c"));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.as_slice()[0], Item::new("2", "b"));
        assert_eq!(cache.last(), Some(&Item::new("1", "c")));
    }

    #[test]
    fn test_same_identity_updates_value() {
        let mut cache = OutputCache::new();
        cache.insert(Item::new("1", "a"));
        cache.insert(Item::new("1", "b"));

        assert_eq!(cache.to_vec(), vec![Item::new("1", "b")]);
        assert_eq!(cache.get(&"1".to_string()).map(|item| item.name.as_str()), Some("b"));
    }

    #[test]
    fn test_insert_twice_is_idempotent_in_length() {
        let mut cache = OutputCache::new();
        cache.insert(Item::new("1", "a"));
        cache.insert(Item::new("2", "b"));
        let before = cache.len();

        cache.insert(Item::new("1", "a"));
        cache.insert(Item::new("1", "a"));

        assert_eq!(cache.len(), before);
        assert_eq!(cache.last(), Some(&Item::new("1", "a")));
    }

    #[test]
    fn test_merge_shapes() {
        let mut cache = OutputCache::new();

        vec![Item::new("1", "a"), Item::new("2", "b")].merge_into(&mut cache);
        assert_eq!(cache.len(), 2);

        ().merge_into(&mut cache);
        assert_eq!(cache.len(), 2);

        Item::new("3", "c").merge_into(&mut cache);
        assert_eq!(cache.to_vec(), vec![Item::new("3", "c")]);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_empty_mapper_discards_response() {
        let mapper: EmptyMapper<String> = EmptyMapper::default();
        mapper.convert("ignored".to_string());
    }
}
