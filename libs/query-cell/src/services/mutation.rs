use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{error, info};

use shared_models::error::AppError;

use crate::models::QueryKey;
use crate::services::cache::QueryClient;

pub const MUTATION_IN_FLIGHT_MESSAGE: &str = "This action is already in progress";

/// A write operation whose success invalidates cached reads.
///
/// Clones share the pending counter, so every copy handed to a view reports
/// the same in-flight state.
#[derive(Clone)]
pub struct Mutation {
    name: &'static str,
    client: QueryClient,
    invalidates: Vec<QueryKey>,
    pending: Arc<AtomicUsize>,
}

struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Mutation {
    pub fn new(name: &'static str, client: QueryClient) -> Self {
        Self {
            name,
            client,
            invalidates: Vec::new(),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add a key prefix to mark stale after every successful run.
    pub fn invalidates(mut self, prefix: QueryKey) -> Self {
        self.invalidates.push(prefix);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True while any run of this mutation has not settled.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    pub async fn mutate<T, Fut>(&self, operation: Fut) -> Result<T, AppError>
    where
        Fut: Future<Output = Result<T, AppError>>,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let guard = PendingGuard(self.pending.clone());
        self.run(operation, guard).await
    }

    /// Refuse to start while another run is pending, the way a disabled
    /// submit button refuses a second click.
    pub async fn try_mutate<T, Fut>(&self, operation: Fut) -> Result<T, AppError>
    where
        Fut: Future<Output = Result<T, AppError>>,
    {
        if self
            .pending
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("Ignoring duplicate {} while one is in flight", self.name);
            return Err(AppError::Validation(MUTATION_IN_FLIGHT_MESSAGE.to_string()));
        }

        let guard = PendingGuard(self.pending.clone());
        self.run(operation, guard).await
    }

    async fn run<T, Fut>(&self, operation: Fut, _guard: PendingGuard) -> Result<T, AppError>
    where
        Fut: Future<Output = Result<T, AppError>>,
    {
        match operation.await {
            Ok(value) => {
                for prefix in &self.invalidates {
                    self.client.invalidate_queries(prefix);
                }
                info!("{} succeeded", self.name);
                Ok(value)
            }
            Err(err) => {
                error!("Error during {}: {}", self.name, err);
                Err(err)
            }
        }
    }
}
