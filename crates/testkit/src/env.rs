//! Fixture scopes.
//!
//! A [`TestEnv`] is one test's view of the fixtures: a private cache torn
//! down when the test finishes, plus a lease on a [`Suite`] whose cache is
//! shared by every live test. The suite cache is torn down when its last
//! lease is released, so expensive fixtures (a database container) live as
//! long as some test still uses them.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, warn};

use crate::cache::{BoxError, Fixture, FixtureCache, FixtureError};

/// Lifetime of a cached fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Lives until the owning test finishes.
    Test,
    /// Shared by all tests of the suite, torn down after the last one.
    Suite,
}

static SHARED_SUITE: Lazy<Suite> = Lazy::new(Suite::new);

static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    Builder::new_multi_thread()
        .enable_all()
        .thread_name("ledger-test")
        .build()
        .expect("Failed to build test runtime")
});

/// Runs `future` on the runtime shared by all tests of the process.
///
/// Connection pools and containers are bound to the runtime that created
/// them, so suite fixtures must be created and used on a single runtime.
pub fn block_on<F: Future>(future: F) -> F::Output {
    RUNTIME.block_on(future)
}

/// Runs `test` with a fresh [`TestEnv`] in the shared suite.
///
/// The environment is finished after `test` returns; if `test` panics its
/// cleanups are scheduled on the shared runtime instead.
pub fn run_test<F>(name: &str, test: F)
where
    F: AsyncFnOnce(&TestEnv),
{
    block_on(async {
        let env = TestEnv::new(name);
        test(&env).await;
        env.finish().await;
    });
}

struct SuiteState {
    leases: usize,
    cache: Arc<FixtureCache>,
}

/// Fixture scope shared by concurrently running tests.
#[derive(Clone)]
pub struct Suite {
    state: Arc<Mutex<SuiteState>>,
}

impl Suite {
    /// Creates an empty suite.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SuiteState {
                leases: 0,
                cache: Arc::new(FixtureCache::new()),
            })),
        }
    }

    /// The suite shared by every [`TestEnv::new`] in this process.
    #[must_use]
    pub fn shared() -> Self {
        SHARED_SUITE.clone()
    }

    /// Number of environments currently holding the suite.
    #[must_use]
    pub fn leases(&self) -> usize {
        self.lock().leases
    }

    fn acquire(&self) -> Arc<FixtureCache> {
        let mut state = self.lock();
        state.leases += 1;
        Arc::clone(&state.cache)
    }

    /// Drops one lease. Returns the cache to tear down if it was the last.
    fn release(&self) -> Option<Arc<FixtureCache>> {
        let mut state = self.lock();
        state.leases = state.leases.saturating_sub(1);
        if state.leases > 0 {
            return None;
        }
        Some(std::mem::replace(
            &mut state.cache,
            Arc::new(FixtureCache::new()),
        ))
    }

    fn lock(&self) -> MutexGuard<'_, SuiteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Suite {
    fn default() -> Self {
        Self::new()
    }
}

/// One test's fixture environment.
pub struct TestEnv {
    name: String,
    local: FixtureCache,
    suite: Suite,
    suite_cache: Arc<FixtureCache>,
    finished: bool,
}

impl TestEnv {
    /// Creates an environment in the process-wide suite.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self::in_suite(name, &Suite::shared())
    }

    /// Creates an environment leasing `suite`.
    #[must_use]
    pub fn in_suite(name: &str, suite: &Suite) -> Self {
        debug!(test = name, "Test environment started");
        Self {
            name: name.to_owned(),
            local: FixtureCache::new(),
            suite: suite.clone(),
            suite_cache: suite.acquire(),
            finished: false,
        }
    }

    /// Test name, for log messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fixture cached under `key` in `scope`, initializing it once.
    pub async fn cache<T, F, Fut, E>(&self, scope: Scope, key: &str, init: F) -> Result<T, FixtureError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Fixture<T>, E>>,
        E: Into<BoxError>,
    {
        match scope {
            Scope::Test => self.local.get_or_try_init(key, init).await,
            Scope::Suite => self.suite_cache.get_or_try_init(key, init).await,
        }
    }

    /// Runs test-scoped cleanups, then releases the suite lease.
    pub async fn finish(mut self) {
        self.finished = true;
        self.local.teardown().await;
        if let Some(cache) = self.suite.release() {
            debug!(test = %self.name, "Last test finished, tearing down suite fixtures");
            cache.teardown().await;
        }
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        warn!(test = %self.name, "Test environment dropped without finish");
        let local = std::mem::take(&mut self.local);
        let suite_cache = self.suite.release();

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    local.teardown().await;
                    if let Some(cache) = suite_cache {
                        cache.teardown().await;
                    }
                });
            }
            Err(_) => warn!(test = %self.name, "No runtime available, fixture cleanups skipped"),
        }
    }
}
