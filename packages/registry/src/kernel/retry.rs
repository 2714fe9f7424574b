//! Transaction runner with serialization retry.
//!
//! Serializable units of work are retried on serialization conflicts with
//! doubling backoff, up to a bounded number of attempts. Deadlocks are not
//! retried; under SERIALIZABLE a deadlock points at a lock-ordering bug, not
//! transient contention, and is surfaced immediately. Queued change events
//! are published only after a successful commit.

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::common::RegistryError;
use crate::kernel::events::ChangeBroadcaster;
use crate::kernel::store::{IsolationLevel, Store, StoreError, Tx};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(30),
        }
    }
}

/// Runs units of work in store transactions, retrying and publishing
/// change events per policy.
#[derive(Clone)]
pub struct TxRunner {
    store: Arc<dyn Store>,
    broadcaster: ChangeBroadcaster,
    policy: RetryPolicy,
}

fn is_retryable(err: &RegistryError) -> bool {
    matches!(err, RegistryError::SerializationConflict { .. })
}

impl TxRunner {
    pub fn new(store: Arc<dyn Store>, broadcaster: ChangeBroadcaster, policy: RetryPolicy) -> Self {
        Self {
            store,
            broadcaster,
            policy,
        }
    }

    /// Run `work` in a SERIALIZABLE transaction, retrying serialization
    /// conflicts. Each attempt sees a fresh transaction and rebuilds its
    /// queued events from scratch.
    pub async fn serializable<'env, T, F>(&self, work: F) -> Result<T, RegistryError>
    where
        F: for<'a> Fn(&'a mut Tx<'env>) -> BoxFuture<'a, Result<T, RegistryError>>,
    {
        let mut backoff = self.policy.initial_backoff;
        let mut attempt = 1;
        loop {
            match self.run_once(IsolationLevel::Serializable, &work).await {
                Ok(value) => return Ok(value),
                Err(err) if is_retryable(&err) => {
                    if attempt >= self.policy.max_attempts {
                        warn!(attempt, "serialization conflict, attempts exhausted");
                        return Err(RegistryError::SerializationConflict { attempts: attempt });
                    }
                    debug!(attempt, backoff_ms = backoff.as_millis() as u64,
                        "serialization conflict, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Run `work` once in a READ COMMITTED transaction and commit. Used for
    /// bookkeeping writes that must not join a surrounding retried unit.
    pub async fn read_committed<'env, T, F>(&self, work: F) -> Result<T, RegistryError>
    where
        F: for<'a> Fn(&'a mut Tx<'env>) -> BoxFuture<'a, Result<T, RegistryError>>,
    {
        self.run_once(IsolationLevel::ReadCommitted, &work).await
    }

    /// Run `work` in a READ COMMITTED transaction and roll back afterwards.
    /// Queued events are discarded with the rollback.
    pub async fn read_only<'env, T, F>(&self, work: F) -> Result<T, RegistryError>
    where
        F: for<'a> Fn(&'a mut Tx<'env>) -> BoxFuture<'a, Result<T, RegistryError>>,
    {
        let store_tx = self.store.begin(IsolationLevel::ReadCommitted).await?;
        let mut tx = Tx::new(store_tx);
        let outcome = work(&mut tx).await;
        if let Err(e) = tx.rollback().await {
            warn!(error = %e, "rollback failed after read-only work");
        }
        outcome
    }

    async fn run_once<'env, T, F>(
        &self,
        isolation: IsolationLevel,
        work: &F,
    ) -> Result<T, RegistryError>
    where
        F: for<'a> Fn(&'a mut Tx<'env>) -> BoxFuture<'a, Result<T, RegistryError>>,
    {
        let store_tx = self.store.begin(isolation).await?;
        let mut tx = Tx::new(store_tx);
        match work(&mut tx).await {
            Ok(value) => match tx.commit().await {
                Ok(events) => {
                    self.broadcaster.publish_all(&events).await;
                    Ok(value)
                }
                Err(StoreError::Serialization) => {
                    Err(RegistryError::SerializationConflict { attempts: 1 })
                }
                Err(e) => Err(e.into()),
            },
            Err(err) => {
                if let Err(e) = tx.rollback().await {
                    warn!(error = %e, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
