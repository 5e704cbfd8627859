//! Reentrant, thread-bound transactions.
//!
//! A [`TransactionManager`] binds at most one open connection to each
//! thread. `begin` calls nest: only the outermost `begin` opens a connection
//! and only the matching outermost `commit` or `rollback` ends it. Inner
//! pairs just move the depth counter.
//!
//! ```ignore
//! let tx = TransactionManager::new(factory);
//! tx.begin()?;
//! tx.begin()?;            // depth 2, same connection
//! tx.commit()?;           // depth 1, nothing sent
//! tx.with_connection(|conn| conn.execute("DELETE FROM heroes", &[]))?;
//! tx.commit()?;           // depth 0, COMMIT and close
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sqlentity_core::error::TransactionErrorKind;
use sqlentity_core::{Connection, ConnectionFactory, Error, Result};

use crate::cache::{CacheConfig, EntityCache};

/// Per-thread state of one manager's open transaction.
struct TransactionContext {
    conn: Box<dyn Connection>,
    depth: u32,
    cache: EntityCache,
}

thread_local! {
    static CONTEXTS: RefCell<HashMap<u64, TransactionContext>> = RefCell::new(HashMap::new());
}

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Commit,
    Rollback,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Commit => "commit",
            Outcome::Rollback => "rollback",
        }
    }
}

struct Inner {
    id: u64,
    factory: Arc<dyn ConnectionFactory>,
    cache_config: CacheConfig,
}

/// Hands out thread-bound transactional connections.
///
/// Cloning is cheap; clones share the same per-thread transactions.
#[derive(Clone)]
pub struct TransactionManager {
    inner: Arc<Inner>,
}

fn no_active(action: &str) -> Error {
    Error::transaction(
        TransactionErrorKind::NoActiveTransaction,
        format!("no active transaction to {}", action),
    )
}

fn busy() -> Error {
    Error::transaction(
        TransactionErrorKind::IllegalState,
        "transaction context is already borrowed on this thread",
    )
}

impl TransactionManager {
    pub fn new(factory: impl ConnectionFactory + 'static) -> Self {
        Self::with_cache_config(factory, CacheConfig::default())
    }

    pub fn with_cache_config(
        factory: impl ConnectionFactory + 'static,
        cache_config: CacheConfig,
    ) -> Self {
        Self::from_shared(Arc::new(factory), cache_config)
    }

    /// Build from an already shared factory.
    pub fn from_shared(factory: Arc<dyn ConnectionFactory>, cache_config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
                factory,
                cache_config,
            }),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        self.inner.cache_config
    }

    fn with_contexts<R>(
        &self,
        f: impl FnOnce(&mut HashMap<u64, TransactionContext>) -> Result<R>,
    ) -> Result<R> {
        CONTEXTS.with(|contexts| {
            let mut contexts = contexts.try_borrow_mut().map_err(|_| busy())?;
            f(&mut contexts)
        })
    }

    /// Start a transaction, or enter a nested one.
    pub fn begin(&self) -> Result<()> {
        let id = self.inner.id;
        self.with_contexts(|contexts| {
            if let Some(context) = contexts.get_mut(&id) {
                context.depth += 1;
                tracing::debug!(depth = context.depth, "Nested transaction begin");
                return Ok(());
            }

            let mut conn = self.inner.factory.connect()?;
            if let Err(e) = conn.set_auto_commit(false) {
                if let Err(close) = conn.close() {
                    tracing::warn!(error = %close, "Failed to close connection after begin error");
                }
                return Err(e);
            }
            contexts.insert(
                id,
                TransactionContext {
                    conn,
                    depth: 1,
                    cache: EntityCache::new(self.inner.cache_config),
                },
            );
            tracing::debug!(depth = 1, "Transaction begin");
            Ok(())
        })
    }

    /// Leave one level; at the outermost level, commit and release.
    pub fn commit(&self) -> Result<()> {
        self.finish(Outcome::Commit)
    }

    /// Leave one level; at the outermost level, roll back and release.
    pub fn rollback(&self) -> Result<()> {
        self.finish(Outcome::Rollback)
    }

    fn finish(&self, outcome: Outcome) -> Result<()> {
        let id = self.inner.id;
        let released = self.with_contexts(|contexts| {
            let context = contexts
                .get_mut(&id)
                .filter(|c| c.depth > 0)
                .ok_or_else(|| no_active(outcome.as_str()))?;
            context.depth -= 1;
            if context.depth > 0 {
                tracing::debug!(depth = context.depth, outcome = outcome.as_str(), "Nested transaction end");
                return Ok(None);
            }
            Ok(contexts.remove(&id))
        })?;

        let Some(mut context) = released else {
            return Ok(());
        };
        let result = match outcome {
            Outcome::Commit => context.conn.commit(),
            Outcome::Rollback => context.conn.rollback(),
        };
        let closed = context.conn.close();
        tracing::debug!(
            depth = 0,
            outcome = outcome.as_str(),
            cached = context.cache.len(),
            "Transaction end"
        );
        result?;
        closed
    }

    /// Current nesting depth on this thread; 0 outside a transaction.
    pub fn depth(&self) -> u32 {
        CONTEXTS.with(|contexts| {
            contexts
                .try_borrow()
                .ok()
                .and_then(|c| c.get(&self.inner.id).map(|ctx| ctx.depth))
                .unwrap_or(0)
        })
    }

    pub fn is_active(&self) -> bool {
        self.depth() > 0
    }

    /// Run `f` with this thread's transactional connection.
    ///
    /// Fails with `NoActiveTransaction` outside `begin`. `f` must not call
    /// back into the manager.
    pub fn with_connection<R>(&self, f: impl FnOnce(&mut dyn Connection) -> Result<R>) -> Result<R> {
        let id = self.inner.id;
        self.with_contexts(|contexts| {
            let context = contexts
                .get_mut(&id)
                .ok_or_else(|| no_active("provide a connection"))?;
            f(context.conn.as_mut())
        })
    }

    /// Run `f` with this thread's transaction cache.
    pub fn with_cache<R>(&self, f: impl FnOnce(&mut EntityCache) -> R) -> Result<R> {
        let id = self.inner.id;
        self.with_contexts(|contexts| {
            let context = contexts
                .get_mut(&id)
                .ok_or_else(|| no_active("provide a cache"))?;
            Ok(f(&mut context.cache))
        })
    }

    /// Run `f` with the transactional connection if one is active, else with
    /// a fresh connection that is closed afterwards.
    pub fn with_read_connection<R>(
        &self,
        f: impl FnOnce(&mut dyn Connection) -> Result<R>,
    ) -> Result<R> {
        if self.is_active() {
            return self.with_connection(f);
        }

        let mut conn = self.inner.factory.connect()?;
        let result = f(conn.as_mut());
        let closed = conn.close();
        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(close) = closed {
                    tracing::warn!(error = %close, "Failed to close ad hoc connection");
                }
                Err(e)
            }
        }
    }

    /// Run `f` inside `begin`/`commit`, rolling back if it fails.
    pub fn in_transaction<R>(&self, f: impl FnOnce() -> Result<R>) -> Result<R> {
        self.begin()?;
        match f() {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.rollback() {
                    tracing::warn!(error = %rollback, "Rollback after failed transaction body failed");
                }
                Err(e)
            }
        }
    }
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("id", &self.inner.id)
            .field("cache_config", &self.inner.cache_config)
            .field("depth", &self.depth())
            .finish()
    }
}
