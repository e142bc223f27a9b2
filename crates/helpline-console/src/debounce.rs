//! Debounced search with a latest-request-wins policy.
//!
//! Each call to [`Debouncer::schedule`] bumps a generation counter and
//! cancels the pending search. A search publishes its outcome only if its
//! generation is still the latest when it completes, so a slow response to
//! an old query can never overwrite a newer one.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::FlowError;

/// Result of one completed search.
#[derive(Debug)]
pub struct SearchOutcome<T> {
    /// Generation that produced this outcome.
    pub generation: u64,
    /// The query text.
    pub query: String,
    /// Fetched items or the failure.
    pub result: Result<T, FlowError>,
}

/// Latest published outcome, if any search has completed.
pub type Latest<T> = Option<Arc<SearchOutcome<T>>>;

struct Shared<T> {
    /// Newest generation issued. Held across the check-and-send in
    /// [`Shared::publish`] so a superseding search cannot slip in between.
    generation: Mutex<u64>,
    results: watch::Sender<Latest<T>>,
}

impl<T> Shared<T> {
    fn publish(&self, outcome: SearchOutcome<T>) -> Option<Arc<SearchOutcome<T>>> {
        let current = self.generation.lock();
        if *current != outcome.generation {
            tracing::debug!(
                generation = outcome.generation,
                query = %outcome.query,
                "Discarding superseded search result"
            );
            return None;
        }
        let outcome = Arc::new(outcome);
        self.results.send_replace(Some(Arc::clone(&outcome)));
        drop(current);
        Some(outcome)
    }
}

/// Runs searches after a quiet period, keeping only the newest result.
pub struct Debouncer<T> {
    quiet: Duration,
    shared: Arc<Shared<T>>,
    pending: Mutex<Option<CancellationToken>>,
}

impl<T> std::fmt::Debug for Debouncer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("quiet", &self.quiet)
            .field("generation", &*self.shared.generation.lock())
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> Debouncer<T> {
    /// Create a debouncer with the given quiet period.
    #[must_use]
    pub fn new(quiet: Duration) -> Self {
        let (results, _) = watch::channel(None);
        Self {
            quiet,
            shared: Arc::new(Shared {
                generation: Mutex::new(0),
                results,
            }),
            pending: Mutex::new(None),
        }
    }

    /// The quiet period.
    #[must_use]
    pub const fn quiet(&self) -> Duration {
        self.quiet
    }

    /// The newest generation issued so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        *self.shared.generation.lock()
    }

    /// Subscribe to published outcomes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Latest<T>> {
        self.shared.results.subscribe()
    }

    /// The latest published outcome.
    #[must_use]
    pub fn latest(&self) -> Latest<T> {
        self.shared.results.borrow().clone()
    }

    /// Schedule `fetch(query)` after the quiet period, superseding any
    /// pending search. Returns the new generation.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&self, query: impl Into<String>, fetch: F) -> u64
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FlowError>> + Send + 'static,
    {
        let query = query.into();
        let (generation, token) = self.supersede();
        let shared = Arc::clone(&self.shared);
        let quiet = self.quiet;

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(quiet) => {}
            }
            let result = tokio::select! {
                () = token.cancelled() => return,
                result = fetch(query.clone()) => result,
            };
            shared.publish(SearchOutcome {
                generation,
                query,
                result,
            });
        });

        generation
    }

    /// Run `fetch(query)` immediately, superseding any pending search.
    ///
    /// Returns the outcome, which is also published unless a newer search
    /// was issued while this one was in flight (`None`).
    pub async fn run_now<F, Fut>(&self, query: impl Into<String>, fetch: F) -> Latest<T>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, FlowError>>,
    {
        let query = query.into();
        let (generation, _token) = self.supersede();
        let result = fetch(query.clone()).await;
        self.shared.publish(SearchOutcome {
            generation,
            query,
            result,
        })
    }

    /// Cancel the pending search, if any, and invalidate in-flight ones.
    pub fn cancel(&self) {
        self.supersede();
    }

    fn supersede(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let previous = self.pending.lock().replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        let mut generation = self.shared.generation.lock();
        *generation += 1;
        (*generation, token)
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(token) = self.pending.get_mut().take() {
            token.cancel();
        }
    }
}
