//! Named binary blobs (tour images, user photos).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tourbook_core::{DomainError, DomainResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub trait BlobStore: Send + Sync {
    fn put(&self, name: &str, blob: Blob) -> DomainResult<()>;
    fn get(&self, name: &str) -> DomainResult<Option<Blob>>;
    fn delete(&self, name: &str) -> DomainResult<bool>;
}

impl<S> BlobStore for Arc<S>
where
    S: BlobStore + ?Sized,
{
    fn put(&self, name: &str, blob: Blob) -> DomainResult<()> {
        (**self).put(name, blob)
    }

    fn get(&self, name: &str) -> DomainResult<Option<Blob>> {
        (**self).get(name)
    }

    fn delete(&self, name: &str) -> DomainResult<bool> {
        (**self).delete(name)
    }
}

/// Blob names are flat file names: no separators, no parent references.
fn check_name(name: &str) -> DomainResult<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(DomainError::validation(format!("Invalid file name: {name}")));
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    inner: RwLock<HashMap<String, Blob>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, name: &str, blob: Blob) -> DomainResult<()> {
        check_name(name)?;
        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::invariant("blob store lock poisoned"))?;
        map.insert(name.to_string(), blob);
        Ok(())
    }

    fn get(&self, name: &str) -> DomainResult<Option<Blob>> {
        check_name(name)?;
        let map = self
            .inner
            .read()
            .map_err(|_| DomainError::invariant("blob store lock poisoned"))?;
        Ok(map.get(name).cloned())
    }

    fn delete(&self, name: &str) -> DomainResult<bool> {
        check_name(name)?;
        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::invariant("blob store lock poisoned"))?;
        Ok(map.remove(name).is_some())
    }
}
