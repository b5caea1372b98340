//! Document storage.
//!
//! `DocumentStore` is the seam the API talks to; `InMemoryDocumentStore` is the
//! shipped implementation. Writes and unique-index checks happen under one
//! write lock, so a read-modify-write `update` cannot interleave with another
//! writer.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tourbook_core::{Document, DomainError, DomainResult};

/// Collection of documents of one kind.
pub trait DocumentStore<D: Document>: Send + Sync {
    fn get(&self, id: D::Id) -> DomainResult<Option<D>>;

    /// Insert a new document. Fails with `Conflict` on a unique-index clash.
    fn insert(&self, doc: D) -> DomainResult<D>;

    /// Overwrite an existing document. `NotFound` when the id is unknown.
    fn replace(&self, doc: D) -> DomainResult<D>;

    /// Atomic read-modify-write. `Ok(None)` when the id is unknown.
    ///
    /// The closure sees a copy; nothing is written if it (or validation) fails.
    fn update(
        &self,
        id: D::Id,
        apply: &mut dyn FnMut(&mut D) -> DomainResult<()>,
    ) -> DomainResult<Option<D>>;

    /// Remove and return the document, if present.
    fn delete(&self, id: D::Id) -> DomainResult<Option<D>>;

    fn list(&self) -> DomainResult<Vec<D>>;

    fn find(&self, predicate: &dyn Fn(&D) -> bool) -> DomainResult<Vec<D>>;

    fn find_one(&self, predicate: &dyn Fn(&D) -> bool) -> DomainResult<Option<D>> {
        Ok(self.find(predicate)?.into_iter().next())
    }

    /// Look a document up through one of its unique indexes.
    fn find_unique(&self, index: &str, key: &str) -> DomainResult<Option<D>> {
        self.find_one(&|doc: &D| {
            doc.unique_keys()
                .iter()
                .any(|(i, k)| *i == index && k == key)
        })
    }
}

impl<D, S> DocumentStore<D> for Arc<S>
where
    D: Document,
    S: DocumentStore<D> + ?Sized,
{
    fn get(&self, id: D::Id) -> DomainResult<Option<D>> {
        (**self).get(id)
    }

    fn insert(&self, doc: D) -> DomainResult<D> {
        (**self).insert(doc)
    }

    fn replace(&self, doc: D) -> DomainResult<D> {
        (**self).replace(doc)
    }

    fn update(
        &self,
        id: D::Id,
        apply: &mut dyn FnMut(&mut D) -> DomainResult<()>,
    ) -> DomainResult<Option<D>> {
        (**self).update(id, apply)
    }

    fn delete(&self, id: D::Id) -> DomainResult<Option<D>> {
        (**self).delete(id)
    }

    fn list(&self) -> DomainResult<Vec<D>> {
        (**self).list()
    }

    fn find(&self, predicate: &dyn Fn(&D) -> bool) -> DomainResult<Vec<D>> {
        (**self).find(predicate)
    }
}

/// In-memory store with unique-index enforcement, for dev and tests.
#[derive(Debug)]
pub struct InMemoryDocumentStore<D: Document> {
    inner: RwLock<BTreeMap<D::Id, D>>,
}

impl<D: Document> InMemoryDocumentStore<D> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<D: Document> Default for InMemoryDocumentStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> DomainError {
    DomainError::invariant("document store lock poisoned")
}

/// Reject `doc` if another document already holds one of its unique keys.
fn check_unique<D: Document>(map: &BTreeMap<D::Id, D>, doc: &D) -> DomainResult<()> {
    let keys = doc.unique_keys();
    if keys.is_empty() {
        return Ok(());
    }
    let own_id = doc.id();
    for other in map.values().filter(|o| o.id() != own_id) {
        for (index, key) in other.unique_keys() {
            if keys.iter().any(|(i, k)| *i == index && *k == key) {
                return Err(DomainError::conflict(format!("{index} \"{key}\"")));
            }
        }
    }
    Ok(())
}

impl<D: Document> DocumentStore<D> for InMemoryDocumentStore<D> {
    fn get(&self, id: D::Id) -> DomainResult<Option<D>> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&id).cloned())
    }

    fn insert(&self, doc: D) -> DomainResult<D> {
        doc.validate()?;
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        if map.contains_key(&doc.id()) {
            return Err(DomainError::conflict(format!("id \"{}\"", doc.id())));
        }
        check_unique(&map, &doc)?;
        map.insert(doc.id(), doc.clone());
        Ok(doc)
    }

    fn replace(&self, doc: D) -> DomainResult<D> {
        doc.validate()?;
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        if !map.contains_key(&doc.id()) {
            return Err(DomainError::not_found(D::RESOURCE));
        }
        check_unique(&map, &doc)?;
        map.insert(doc.id(), doc.clone());
        Ok(doc)
    }

    fn update(
        &self,
        id: D::Id,
        apply: &mut dyn FnMut(&mut D) -> DomainResult<()>,
    ) -> DomainResult<Option<D>> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let Some(current) = map.get(&id) else {
            return Ok(None);
        };
        let mut next = current.clone();
        apply(&mut next)?;
        if next.id() != id {
            return Err(DomainError::invariant("update may not change the document id"));
        }
        next.validate()?;
        check_unique(&map, &next)?;
        map.insert(id, next.clone());
        Ok(Some(next))
    }

    fn delete(&self, id: D::Id) -> DomainResult<Option<D>> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        Ok(map.remove(&id))
    }

    fn list(&self) -> DomainResult<Vec<D>> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.values().cloned().collect())
    }

    fn find(&self, predicate: &dyn Fn(&D) -> bool) -> DomainResult<Vec<D>> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.values().filter(|d| predicate(d)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use tourbook_core::TourId;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Item {
        id: TourId,
        name: String,
        created_at: DateTime<Utc>,
    }

    impl Document for Item {
        type Id = TourId;
        const RESOURCE: &'static str = "item";
        const FIELDS: &'static [&'static str] = &["id", "name", "created_at"];
        const PATCHABLE: &'static [&'static str] = &["name"];

        fn id(&self) -> TourId {
            self.id
        }

        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }

        fn unique_keys(&self) -> Vec<(&'static str, String)> {
            vec![("name", self.name.clone())]
        }

        fn validate(&self) -> DomainResult<()> {
            if self.name.is_empty() {
                return Err(DomainError::validation("name required"));
            }
            Ok(())
        }
    }

    fn item(name: &str) -> Item {
        Item {
            id: TourId::new(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_then_get() {
        let store = InMemoryDocumentStore::new();
        let a = store.insert(item("a")).unwrap();
        assert_eq!(store.get(a.id).unwrap().unwrap().name, "a");
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_unique_key_is_conflict() {
        let store = InMemoryDocumentStore::new();
        store.insert(item("same")).unwrap();
        let err = store.insert(item("same")).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn update_is_rejected_on_conflict_and_leaves_original() {
        let store = InMemoryDocumentStore::new();
        store.insert(item("a")).unwrap();
        let b = store.insert(item("b")).unwrap();

        let err = store
            .update(b.id, &mut |doc: &mut Item| {
                doc.name = "a".into();
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(store.get(b.id).unwrap().unwrap().name, "b");
    }

    #[test]
    fn update_validates_before_commit() {
        let store = InMemoryDocumentStore::new();
        let a = store.insert(item("a")).unwrap();
        let err = store
            .update(a.id, &mut |doc: &mut Item| {
                doc.name.clear();
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(store.get(a.id).unwrap().unwrap().name, "a");
    }

    #[test]
    fn update_unknown_id_is_none() {
        let store: InMemoryDocumentStore<Item> = InMemoryDocumentStore::new();
        let out = store.update(TourId::new(), &mut |_doc: &mut Item| Ok(())).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn replace_unknown_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let err = store.replace(item("ghost")).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn delete_returns_removed_document() {
        let store = InMemoryDocumentStore::new();
        let a = store.insert(item("a")).unwrap();
        assert!(store.delete(a.id).unwrap().is_some());
        assert!(store.delete(a.id).unwrap().is_none());
        assert!(store.get(a.id).unwrap().is_none());
    }

    #[test]
    fn find_unique_uses_index_keys() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.insert(item("a")).unwrap();
        store.insert(item("b")).unwrap();
        let found = store.find_unique("name", "b").unwrap().unwrap();
        assert_eq!(found.name, "b");
        assert!(store.find_unique("name", "zzz").unwrap().is_none());
    }
}
