//! Bulk import of settlements with an operation ledger.
//!
//! The ledger entry is opened before validation and closed in its own
//! transaction, never inside the import's retried unit, so it records the
//! outcome even when the import itself rolls back. The import applies the
//! whole batch through the settlement mutation path under one serializable
//! transaction: any failure mid-batch rolls everything back.

use futures::FutureExt;
use tracing::warn;

use crate::common::errors::ItemError;
use crate::common::{ImportOperationId, PageDto, PageRequest, RegistryError, SettlementId};
use crate::domains::imports::models::{ImportOperation, ImportStatus};
use crate::domains::settlements::models::SettlementInput;
use crate::domains::settlements::service::SettlementService;
use crate::kernel::RegistryDeps;

/// Ledger failure messages are capped at this many characters.
pub const MAX_ERROR_MESSAGE_LEN: usize = 1000;

/// Writes import-operation rows in transactions independent of the import
/// itself. A terminal status is written at most once; a second attempt is
/// logged and ignored.
#[derive(Clone)]
pub struct ImportLedger {
    deps: RegistryDeps,
}

impl ImportLedger {
    pub fn new(deps: RegistryDeps) -> Self {
        Self { deps }
    }

    /// Open an in-progress ledger entry.
    pub async fn start(&self) -> Result<ImportOperation, RegistryError> {
        self.deps
            .runner
            .read_committed(|tx| async move { Ok(tx.insert_import().await?) }.boxed())
            .await
    }

    pub async fn mark_success(
        &self,
        id: ImportOperationId,
        added_count: i32,
    ) -> Result<(), RegistryError> {
        self.finish(id, ImportStatus::Success, Some(added_count), None)
            .await
    }

    pub async fn mark_failed(
        &self,
        id: ImportOperationId,
        message: &str,
    ) -> Result<(), RegistryError> {
        let message = truncate_message(message);
        self.finish(id, ImportStatus::Failed, None, Some(message))
            .await
    }

    async fn finish(
        &self,
        id: ImportOperationId,
        status: ImportStatus,
        added_count: Option<i32>,
        error_message: Option<String>,
    ) -> Result<(), RegistryError> {
        let error_message = &error_message;
        self.deps
            .runner
            .read_committed(move |tx| {
                async move {
                    let mut op = tx
                        .find_import(id)
                        .await?
                        .ok_or_else(|| RegistryError::not_found("ImportOperation", id))?;
                    if op.status.is_terminal() {
                        warn!(%id, status = ?op.status, "import operation already terminal, ignoring");
                        return Ok(());
                    }
                    op.status = status;
                    op.finished_at = Some(chrono::Utc::now());
                    op.added_count = added_count;
                    op.error_message = error_message.clone();
                    tx.update_import(&op).await?;
                    Ok(())
                }
                .boxed()
            })
            .await
    }

    pub async fn get(&self, id: ImportOperationId) -> Result<ImportOperation, RegistryError> {
        self.deps
            .runner
            .read_only(move |tx| {
                async move {
                    tx.find_import(id)
                        .await?
                        .ok_or_else(|| RegistryError::not_found("ImportOperation", id))
                }
                .boxed()
            })
            .await
    }

    /// Ledger history, most recently started first.
    pub async fn page(&self, page: PageRequest) -> Result<PageDto<ImportOperation>, RegistryError> {
        let window = page.validate();
        let mut ops = self
            .deps
            .runner
            .read_only(|tx| async move { Ok(tx.all_imports().await?) }.boxed())
            .await?;
        ops.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        Ok(PageDto::from_sorted(ops, window))
    }
}

/// Outcome of a successful import.
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub operation_id: ImportOperationId,
    pub created_count: usize,
    pub created_ids: Vec<SettlementId>,
}

#[derive(Clone)]
pub struct ImportService {
    deps: RegistryDeps,
    ledger: ImportLedger,
}

impl ImportService {
    pub fn new(deps: RegistryDeps) -> Self {
        let ledger = ImportLedger::new(deps.clone());
        Self { deps, ledger }
    }

    pub fn ledger(&self) -> &ImportLedger {
        &self.ledger
    }

    /// Validate and apply a batch of settlement creations atomically.
    ///
    /// Validation covers the whole batch before anything is written; a
    /// single violation anywhere rejects the entire import with zero
    /// settlements created. The ledger entry reflects the outcome either
    /// way.
    pub async fn import(&self, batch: Vec<SettlementInput>) -> Result<ImportResult, RegistryError> {
        if batch.is_empty() {
            return Err(RegistryError::InvalidArgument(
                "import batch cannot be empty".to_string(),
            ));
        }

        let op = self.ledger.start().await?;

        let items: Vec<ItemError> = batch
            .iter()
            .enumerate()
            .flat_map(|(index, input)| input.item_errors(index))
            .collect();
        if !items.is_empty() {
            if let Err(e) = self.ledger.mark_failed(op.id, "Import validation failed").await {
                warn!(error = %e, operation_id = %op.id, "failed to record import failure");
            }
            return Err(RegistryError::ImportValidationFailed { items });
        }

        let batch = &batch;
        let result = self
            .deps
            .runner
            .serializable(move |tx| {
                async move {
                    let mut created_ids = Vec::with_capacity(batch.len());
                    for input in batch {
                        let data = SettlementService::create_in_tx(tx, input).await?;
                        created_ids.push(data.id);
                    }
                    Ok(created_ids)
                }
                .boxed()
            })
            .await;

        match result {
            Ok(created_ids) => {
                // The import has committed; a ledger write failure must not
                // turn it into an error for the caller.
                if let Err(e) = self
                    .ledger
                    .mark_success(op.id, created_ids.len() as i32)
                    .await
                {
                    warn!(error = %e, operation_id = %op.id, "failed to record import success");
                }
                Ok(ImportResult {
                    operation_id: op.id,
                    created_count: created_ids.len(),
                    created_ids,
                })
            }
            Err(err) => {
                if let Err(e) = self.ledger.mark_failed(op.id, &err.to_string()).await {
                    warn!(error = %e, operation_id = %op.id, "failed to record import failure");
                }
                Err(err)
            }
        }
    }
}

fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        message.to_string()
    } else {
        message.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
    }
}
