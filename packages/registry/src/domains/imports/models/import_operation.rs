use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::ImportOperationId;

/// Ledger status of an import attempt. Terminal once set to
/// `Success` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum ImportStatus {
    #[serde(rename = "IN_PROGRESS")]
    #[sqlx(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "SUCCESS")]
    #[sqlx(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    #[sqlx(rename = "FAILED")]
    Failed,
}

impl ImportStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ImportStatus::InProgress)
    }
}

/// One ledger entry per import attempt. Written in transactions isolated
/// from the import itself, so the entry survives an import rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImportOperation {
    pub id: ImportOperationId,
    pub status: ImportStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub added_count: Option<i32>,
    pub error_message: Option<String>,
}
