//! Compute-once fixture cache.
//!
//! Each key is initialized at most once per cache; concurrent callers for
//! the same key wait for the single initialization. A fixture may register a
//! cleanup that runs when the cache is torn down, newest first.

use std::any::{Any, type_name};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::OnceCell;
use tracing::debug;

/// Boxed error returned by fixture initializers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Cleanup = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Errors raised by [`FixtureCache`].
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// The initializer failed; nothing was cached.
    #[error("Fixture '{key}' failed to initialize: {source}")]
    Init {
        /// Fixture key.
        key: String,
        /// Initializer error.
        #[source]
        source: BoxError,
    },

    /// The key holds a value of another type.
    #[error("Fixture '{key}' holds a {actual}, requested {expected}")]
    TypeMismatch {
        /// Fixture key.
        key: String,
        /// Requested type.
        expected: &'static str,
        /// Stored type.
        actual: &'static str,
    },
}

/// A fixture value with an optional cleanup.
pub struct Fixture<T> {
    value: T,
    cleanup: Option<Cleanup>,
}

impl<T> Fixture<T> {
    /// A value that needs no cleanup.
    pub fn new(value: T) -> Self {
        Self {
            value,
            cleanup: None,
        }
    }

    /// A value whose `cleanup` runs when its scope ends.
    pub fn with_cleanup<F, Fut>(value: T, cleanup: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            value,
            cleanup: Some(Box::new(move || cleanup().boxed())),
        }
    }
}

struct Entry {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

/// Memoizing cache of fixture values keyed by name.
#[derive(Default)]
pub struct FixtureCache {
    entries: DashMap<String, Arc<OnceCell<Entry>>>,
    cleanups: Mutex<Vec<(String, Cleanup)>>,
}

impl FixtureCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value cached under `key`, running `init` if there is none.
    ///
    /// A failed initialization is not cached; the next caller retries.
    pub async fn get_or_try_init<T, F, Fut, E>(&self, key: &str, init: F) -> Result<T, FixtureError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Fixture<T>, E>>,
        E: Into<BoxError>,
    {
        let cell = Arc::clone(&self.entries.entry(key.to_owned()).or_default());

        let entry = cell
            .get_or_try_init(|| async {
                let Fixture { value, cleanup } = init().await.map_err(|err| FixtureError::Init {
                    key: key.to_owned(),
                    source: err.into(),
                })?;

                if let Some(cleanup) = cleanup {
                    self.lock_cleanups().push((key.to_owned(), cleanup));
                }
                debug!(fixture = key, "Fixture initialized");

                Ok::<_, FixtureError>(Entry {
                    type_name: type_name::<T>(),
                    value: Arc::new(value),
                })
            })
            .await?;

        entry
            .value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| FixtureError::TypeMismatch {
                key: key.to_owned(),
                expected: type_name::<T>(),
                actual: entry.type_name,
            })
    }

    /// Returns true if `key` holds an initialized value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|cell| cell.initialized())
    }

    /// Runs all registered cleanups, newest first, and empties the cache.
    pub async fn teardown(&self) {
        let cleanups = std::mem::take(&mut *self.lock_cleanups());
        self.entries.clear();

        for (key, cleanup) in cleanups.into_iter().rev() {
            debug!(fixture = %key, "Running fixture cleanup");
            cleanup().await;
        }
    }

    fn lock_cleanups(&self) -> MutexGuard<'_, Vec<(String, Cleanup)>> {
        self.cleanups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
