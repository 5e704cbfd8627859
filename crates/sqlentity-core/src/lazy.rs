//! Deferred, at-most-once relationship loaders.
//!
//! [`LazyReference`] wraps a single related entity and [`LazyCollection`] an
//! ordered sequence of them. Both start unresolved, holding a resolver
//! closure, and move one way to resolved on first access:
//!
//! - the resolver runs under a per-instance mutex, after re-checking that no
//!   other thread resolved the value while this one waited, so concurrent
//!   first accesses run it exactly once;
//! - a successful result (including an absent one) is stored in a
//!   [`OnceLock`] and the resolver is dropped;
//! - a failed result is returned to the caller and leaves the loader
//!   unresolved, so a later access tries again.
//!
//! A resolver must not access the loader that owns it; doing so deadlocks.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::error::Result;

type ReferenceResolver<T> = Arc<dyn Fn() -> Result<Option<T>> + Send + Sync>;
type CollectionResolver<T> = Arc<dyn Fn() -> Result<Vec<T>> + Send + Sync>;

/// A single related value loaded on first access.
///
/// The value is boxed, so an entity may hold a reference to its own type.
pub struct LazyReference<T> {
    value: OnceLock<Option<Box<T>>>,
    resolver: Mutex<Option<ReferenceResolver<T>>>,
}

impl<T> LazyReference<T> {
    /// Create an unresolved reference.
    pub fn new<F>(resolver: F) -> Self
    where
        F: Fn() -> Result<Option<T>> + Send + Sync + 'static,
    {
        Self {
            value: OnceLock::new(),
            resolver: Mutex::new(Some(Arc::new(resolver))),
        }
    }

    /// Create an already-resolved reference.
    pub fn loaded(value: Option<T>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(value.map(Box::new));
        Self {
            value: cell,
            resolver: Mutex::new(None),
        }
    }

    /// Create a resolved reference holding nothing (NULL foreign key).
    pub fn empty() -> Self {
        Self::loaded(None)
    }

    /// Resolve if needed and return the value.
    pub fn get(&self) -> Result<Option<&T>> {
        if let Some(value) = self.value.get() {
            return Ok(value.as_deref());
        }

        let mut guard = self.resolver.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = self.value.get() {
            return Ok(value.as_deref());
        }

        let resolved = match guard.as_ref() {
            Some(resolver) => resolver()?,
            None => None,
        };
        let _ = self.value.set(resolved.map(Box::new));
        *guard = None;
        drop(guard);

        Ok(self.value.get().and_then(Option::as_deref))
    }

    /// Same as [`get`](Self::get); reads better at call sites that only
    /// want the side effect.
    pub fn force_load(&self) -> Result<()> {
        self.get().map(|_| ())
    }

    /// Look at the value without resolving.
    ///
    /// Returns `None` while unresolved and `Some(value)` afterwards, where
    /// `value` itself may be `None` for an absent target.
    pub fn peek(&self) -> Option<Option<&T>> {
        self.value.get().map(Option::as_deref)
    }

    /// Whether the resolver has already run successfully.
    pub fn is_loaded(&self) -> bool {
        self.value.get().is_some()
    }
}

impl<T> Default for LazyReference<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Clone> Clone for LazyReference<T> {
    fn clone(&self) -> Self {
        let guard = self.resolver.lock().unwrap_or_else(PoisonError::into_inner);
        match self.value.get() {
            Some(value) => Self::loaded(value.as_deref().cloned()),
            None => Self {
                value: OnceLock::new(),
                resolver: Mutex::new(guard.clone()),
            },
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for LazyReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value.get() {
            Some(value) => f.debug_tuple("LazyReference").field(value).finish(),
            None => f.write_str("LazyReference(<unresolved>)"),
        }
    }
}

/// An ordered sequence of related values loaded on first access.
///
/// Every sequence operation resolves the whole collection; there is no
/// partial or paged loading.
pub struct LazyCollection<T> {
    items: OnceLock<Vec<T>>,
    resolver: Mutex<Option<CollectionResolver<T>>>,
}

impl<T> LazyCollection<T> {
    /// Create an unresolved collection.
    pub fn new<F>(resolver: F) -> Self
    where
        F: Fn() -> Result<Vec<T>> + Send + Sync + 'static,
    {
        Self {
            items: OnceLock::new(),
            resolver: Mutex::new(Some(Arc::new(resolver))),
        }
    }

    /// Create an already-resolved collection.
    pub fn loaded(items: Vec<T>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(items);
        Self {
            items: cell,
            resolver: Mutex::new(None),
        }
    }

    /// Resolve if needed and return all items.
    pub fn as_slice(&self) -> Result<&[T]> {
        if let Some(items) = self.items.get() {
            return Ok(items);
        }

        let mut guard = self.resolver.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(items) = self.items.get() {
            return Ok(items);
        }

        let resolved = match guard.as_ref() {
            Some(resolver) => resolver()?,
            None => Vec::new(),
        };
        let _ = self.items.set(resolved);
        *guard = None;
        drop(guard);

        match self.items.get() {
            Some(items) => Ok(items),
            None => Ok(&[]),
        }
    }

    /// Number of items.
    pub fn len(&self) -> Result<usize> {
        self.as_slice().map(<[T]>::len)
    }

    /// Whether the collection has no items.
    pub fn is_empty(&self) -> Result<bool> {
        self.as_slice().map(<[T]>::is_empty)
    }

    /// Item at `index`.
    pub fn get(&self, index: usize) -> Result<Option<&T>> {
        self.as_slice().map(|items| items.get(index))
    }

    /// Iterate over the items.
    pub fn iter(&self) -> Result<std::slice::Iter<'_, T>> {
        self.as_slice().map(<[T]>::iter)
    }

    /// Look at the items without resolving.
    pub fn peek(&self) -> Option<&[T]> {
        self.items.get().map(Vec::as_slice)
    }

    /// Whether the resolver has already run successfully.
    pub fn is_loaded(&self) -> bool {
        self.items.get().is_some()
    }
}

impl<T: Clone> LazyCollection<T> {
    /// Resolve if needed and copy the items out.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.as_slice().map(<[T]>::to_vec)
    }
}

impl<T> Default for LazyCollection<T> {
    fn default() -> Self {
        Self::loaded(Vec::new())
    }
}

impl<T: Clone> Clone for LazyCollection<T> {
    fn clone(&self) -> Self {
        let guard = self.resolver.lock().unwrap_or_else(PoisonError::into_inner);
        match self.items.get() {
            Some(items) => Self::loaded(items.clone()),
            None => Self {
                items: OnceLock::new(),
                resolver: Mutex::new(guard.clone()),
            },
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for LazyCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.items.get() {
            Some(items) => f.debug_tuple("LazyCollection").field(items).finish(),
            None => f.write_str("LazyCollection(<unresolved>)"),
        }
    }
}

/// Wrap a resolver in an unresolved [`LazyReference`].
pub fn lazy_reference<T, F>(resolver: F) -> LazyReference<T>
where
    F: Fn() -> Result<Option<T>> + Send + Sync + 'static,
{
    LazyReference::new(resolver)
}

/// Wrap a resolver in an unresolved [`LazyCollection`].
pub fn lazy_collection<T, F>(resolver: F) -> LazyCollection<T>
where
    F: Fn() -> Result<Vec<T>> + Send + Sync + 'static,
{
    LazyCollection::new(resolver)
}
