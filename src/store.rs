use tracing::debug;

use crate::config::StoreConfig;
use crate::entity::{cmp_by_id, Entity};
use crate::error::{Error, Result};

/// File-backed store for one named collection of entities.
///
/// The store keeps the whole collection in memory, sorted ascending by id,
/// and persists it as a single JSON document through the configured
/// [`Backend`](crate::backend::Backend). The cache is populated from disk
/// once (at `open`, or lazily on first access after that) and reused until
/// an explicit [`reload`](Store::reload).
///
/// Invariants:
/// - The cached collection is always sorted ascending by id
/// - Every entity allocated through [`create`](Store::create) has
///   `id < next_free_id`
/// - Ids are unique; a backing file with duplicate ids is rejected on load
///
/// Single-threaded by design: no locks, and file handles are scoped to each
/// read or write, never held across calls. Concurrent processes over the
/// same folder are out of contract (last writer wins on save).
pub struct Store<T: Entity> {
    config: StoreConfig,
    name: String,
    cache: Option<Vec<T>>,
    next_free_id: i64,
}

impl<T: Entity> Store<T> {
    /// Open a store for the named collection inside the configured folder
    ///
    /// The folder must already exist; a missing folder is a configuration
    /// error, not something the store papers over by creating it. Opening
    /// performs the initial load and computes the next free id.
    pub fn open(config: StoreConfig, name: &str) -> Result<Self> {
        if !config.data_dir.is_dir() {
            return Err(Error::Config(format!(
                "Folder {} does not exist",
                config.data_dir.display()
            )));
        }

        let mut store = Store {
            config,
            name: name.to_string(),
            cache: None,
            next_free_id: 1,
        };
        store.reload()?;
        Ok(store)
    }

    /// Reload the collection from disk, discarding unsaved changes
    ///
    /// An absent backing file yields an empty collection with the allocator
    /// back at 1. A present file is deserialized in full, re-sorted by id
    /// (the on-disk order is not trusted), and checked for duplicate ids;
    /// the allocator becomes one past the maximum id found. A backing file
    /// that exists but cannot be read or parsed is an error — the store
    /// must never silently present an empty collection in that case.
    pub fn reload(&mut self) -> Result<()> {
        self.next_free_id = 1;

        let path = self.config.get_collection_path(&self.name);
        let entities = match self.config.backend.read_document(&path)? {
            None => Vec::new(),
            Some(document) => {
                let mut entities: Vec<T> = serde_json::from_str(&document)?;
                entities.sort_by(cmp_by_id);

                for pair in entities.windows(2) {
                    if pair[0].id() == pair[1].id() {
                        return Err(Error::DuplicateId(pair[0].id()));
                    }
                }

                // An empty persisted array leaves the allocator at 1
                if let Some(last) = entities.last() {
                    self.next_free_id = last.id() + 1;
                }
                entities
            }
        };

        debug!(
            collection = %self.name,
            count = entities.len(),
            next_free_id = self.next_free_id,
            "loaded collection"
        );
        self.cache = Some(entities);
        Ok(())
    }

    /// Get the whole collection in ascending-id order
    ///
    /// Loads from disk only if the cache has never been populated; after
    /// that the cached collection is returned as-is. Callers that need
    /// disk-fresh data must call [`reload`](Store::reload) explicitly.
    pub fn all(&mut self) -> Result<&[T]> {
        if self.cache.is_none() {
            self.reload()?;
        }
        Ok(self.cache.as_deref().unwrap_or(&[]))
    }

    /// Look up an entity by id
    ///
    /// Binary search over the sorted cache, O(log n). Returns `None` when no
    /// entity carries the id, including on an empty collection.
    pub fn find(&self, id: i64) -> Option<&T> {
        let cache = self.cache.as_deref().unwrap_or(&[]);
        let index = cache.binary_search_by_key(&id, |entity| entity.id()).ok()?;
        Some(&cache[index])
    }

    /// Look up an entity by id, mutably
    pub fn find_mut(&mut self, id: i64) -> Option<&mut T> {
        let cache = self.cache.as_deref_mut()?;
        let index = cache.binary_search_by_key(&id, |entity| entity.id()).ok()?;
        Some(&mut cache[index])
    }

    /// Create a new entity with a freshly allocated id
    ///
    /// The entity starts as `T::default()` with the next free id and is
    /// appended to the collection; since allocated ids strictly increase,
    /// the append preserves sort order. The returned reference lets the
    /// caller populate the remaining fields in place.
    ///
    /// This is the only creation path that preserves id uniqueness;
    /// entities inserted by other means are out of contract.
    pub fn create(&mut self) -> &mut T {
        let id = self.next_free_id;
        self.next_free_id += 1;

        let mut entity = T::default();
        entity.set_id(id);
        debug!(collection = %self.name, id, "created entity");

        let cache = self.cache.get_or_insert_with(Vec::new);
        cache.push(entity);
        let last = cache.len() - 1;
        &mut cache[last]
    }

    /// Delete the entity with the given id
    ///
    /// Linear scan for the first matching id. Returns the removed entity,
    /// or `None` (without error) when no entity carries the id.
    pub fn delete(&mut self, id: i64) -> Option<T> {
        let cache = self.cache.as_mut()?;
        let index = cache.iter().position(|entity| entity.id() == id)?;
        debug!(collection = %self.name, id, "deleted entity");
        Some(cache.remove(index))
    }

    /// Remove the first member equal to the given entity
    ///
    /// A no-op returning `None` when no member compares equal.
    pub fn remove(&mut self, entity: &T) -> Option<T>
    where
        T: PartialEq,
    {
        let cache = self.cache.as_mut()?;
        let index = cache.iter().position(|member| member == entity)?;
        Some(cache.remove(index))
    }

    /// Persist the whole collection, overwriting the backing file
    ///
    /// The collection is serialized as an indented JSON array and written
    /// atomically (temp file + rename) through the configured backend.
    /// Every save is a full rewrite; there is no partial flush.
    pub fn save(&self) -> Result<()> {
        let cache = self.cache.as_deref().unwrap_or(&[]);
        let document = serde_json::to_string_pretty(cache)?;

        let path = self.config.get_collection_path(&self.name);
        let entry_name = format!("{}.json", self.name);
        self.config
            .backend
            .write_document(&path, &entry_name, &document)?;

        debug!(collection = %self.name, count = cache.len(), "saved collection");
        Ok(())
    }

    /// Name of the collection this store is bound to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of entities currently in the collection
    pub fn len(&self) -> usize {
        self.cache.as_deref().map_or(0, |cache| cache.len())
    }

    /// Whether the collection is currently empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the collection in ascending-id order
    ///
    /// Never touches disk; iteration sees exactly the cached collection.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.cache.as_deref().unwrap_or(&[]).iter()
    }
}

impl<'a, T: Entity> IntoIterator for &'a Store<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use serde::{Deserialize, Serialize};
    use std::fs;
    use tempfile::TempDir;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct TestItem {
        id: i64,
        an_int: i32,
        a_string: String,
    }

    impl Entity for TestItem {
        fn id(&self) -> i64 {
            self.id
        }

        fn set_id(&mut self, id: i64) {
            self.id = id;
        }
    }

    fn open_test_store(backend: Backend) -> (Store<TestItem>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = StoreConfig::with_data_dir(temp_dir.path().to_path_buf());
        config.set_backend(backend);
        let store = Store::open(config, "items").unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_open_missing_folder_fails() {
        let config = StoreConfig::with_data_dir("/no/such/folder".into());
        let result: Result<Store<TestItem>> = Store::open(config, "items");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_create_allocates_monotonic_ids() {
        let (mut store, _temp_dir) = open_test_store(Backend::Json);

        assert_eq!(store.create().id, 1);
        assert_eq!(store.create().id, 2);
        assert_eq!(store.create().id, 3);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_find_on_empty_collection() {
        let (store, _temp_dir) = open_test_store(Backend::Json);
        assert!(store.find(1).is_none());
    }

    #[test]
    fn test_find_present_and_absent() {
        let (mut store, _temp_dir) = open_test_store(Backend::Json);
        store.create().an_int = 10;
        store.create().an_int = 20;
        store.create().an_int = 30;

        assert_eq!(store.find(2).unwrap().an_int, 20);
        assert!(store.find(4).is_none());
        assert!(store.find(0).is_none());
    }

    #[test]
    fn test_find_mut_updates_in_place() {
        let (mut store, _temp_dir) = open_test_store(Backend::Json);
        store.create();

        store.find_mut(1).unwrap().a_string = "updated".to_string();
        assert_eq!(store.find(1).unwrap().a_string, "updated");
    }

    #[test]
    fn test_delete_absent_id_is_noop() {
        let (mut store, _temp_dir) = open_test_store(Backend::Json);
        store.create();

        assert!(store.delete(99).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_removes_exactly_one() {
        let (mut store, _temp_dir) = open_test_store(Backend::Json);
        store.create();
        store.create();
        store.create();

        let removed = store.delete(2).unwrap();
        assert_eq!(removed.id, 2);
        assert_eq!(store.len(), 2);
        assert!(store.find(1).is_some());
        assert!(store.find(2).is_none());
        assert!(store.find(3).is_some());
    }

    #[test]
    fn test_remove_by_value() {
        let (mut store, _temp_dir) = open_test_store(Backend::Json);
        store.create().a_string = "keep".to_string();
        store.create().a_string = "drop".to_string();

        let target = store.find(2).unwrap().clone();
        assert!(store.remove(&target).is_some());
        assert_eq!(store.len(), 1);

        // A value that is not a member is a no-op
        let stranger = TestItem {
            id: 7,
            an_int: 0,
            a_string: String::new(),
        };
        assert!(store.remove(&stranger).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reload_discards_unsaved_changes() {
        let (mut store, _temp_dir) = open_test_store(Backend::Json);
        store.create().an_int = 42;
        store.save().unwrap();
        store.create().an_int = 99;

        store.reload().unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.find(1).unwrap().an_int, 42);
        // Allocator recomputed from disk contents
        assert_eq!(store.create().id, 2);
    }

    #[test]
    fn test_allocator_resumes_after_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::with_data_dir(temp_dir.path().to_path_buf());

        let mut store: Store<TestItem> = Store::open(config.clone(), "items").unwrap();
        store.create();
        store.create();
        store.create();
        store.save().unwrap();

        let mut reopened: Store<TestItem> = Store::open(config, "items").unwrap();
        assert_eq!(reopened.create().id, 4);
    }

    #[test]
    fn test_load_empty_array_keeps_allocator_at_one() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("items.json"), "[]").unwrap();

        let config = StoreConfig::with_data_dir(temp_dir.path().to_path_buf());
        let mut store: Store<TestItem> = Store::open(config, "items").unwrap();
        assert!(store.is_empty());
        assert_eq!(store.create().id, 1);
    }

    #[test]
    fn test_load_resorts_unordered_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("items.json"),
            r#"[{"id": 3, "an_int": 0, "a_string": ""},
                {"id": 1, "an_int": 0, "a_string": ""},
                {"id": 2, "an_int": 0, "a_string": ""}]"#,
        )
        .unwrap();

        let config = StoreConfig::with_data_dir(temp_dir.path().to_path_buf());
        let mut store: Store<TestItem> = Store::open(config, "items").unwrap();

        let ids: Vec<i64> = store.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(store.create().id, 4);
    }

    #[test]
    fn test_load_rejects_duplicate_ids() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("items.json"),
            r#"[{"id": 1, "an_int": 0, "a_string": ""},
                {"id": 1, "an_int": 0, "a_string": ""}]"#,
        )
        .unwrap();

        let config = StoreConfig::with_data_dir(temp_dir.path().to_path_buf());
        let result: Result<Store<TestItem>> = Store::open(config, "items");
        assert!(matches!(result, Err(Error::DuplicateId(1))));
    }

    #[test]
    fn test_load_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("items.json"), "not json at all").unwrap();

        let config = StoreConfig::with_data_dir(temp_dir.path().to_path_buf());
        let result: Result<Store<TestItem>> = Store::open(config, "items");
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_iteration_in_ascending_id_order() {
        let (mut store, _temp_dir) = open_test_store(Backend::Json);
        store.create();
        store.create();
        store.create();

        let ids: Vec<i64> = (&store).into_iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_save_writes_indented_json() {
        let (mut store, temp_dir) = open_test_store(Backend::Json);
        store.create().a_string = "hello".to_string();
        store.save().unwrap();

        let raw = fs::read_to_string(temp_dir.path().join("items.json")).unwrap();
        assert!(raw.contains('\n'));
        assert!(raw.contains("\"a_string\": \"hello\""));
    }

    #[test]
    fn test_zip_store_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = StoreConfig::with_data_dir(temp_dir.path().to_path_buf());
        config.set_backend(Backend::Zip);

        let mut store: Store<TestItem> = Store::open(config.clone(), "items").unwrap();
        store.create().an_int = 7;
        store.save().unwrap();
        assert!(temp_dir.path().join("items.json.zip").exists());

        let reopened: Store<TestItem> = Store::open(config, "items").unwrap();
        assert_eq!(reopened.find(1).unwrap().an_int, 7);
    }
}
