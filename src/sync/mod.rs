pub mod mapping;
pub mod sheets;

use serde::Serialize;

pub use mapping::{ColumnKind, ColumnMapping, TableMapping};
pub use sheets::ValueRange;

/// Report returned after an import completes.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub target: String,
    pub status: SyncStatus,
    pub items_synced: u64,
    pub items_failed: u64,
    pub items_removed: u64,
    pub error: Option<String>,
}

impl SyncReport {
    /// Create a SyncReport with the appropriate status derived from counts.
    pub fn from_counts(
        target: String,
        items_synced: u64,
        items_failed: u64,
        items_removed: u64,
    ) -> Self {
        let status = if items_failed == 0 {
            SyncStatus::Success
        } else if items_synced > 0 {
            SyncStatus::PartialFailure
        } else {
            SyncStatus::Failed
        };
        let error = if items_failed > 0 {
            Some(format!("{items_failed} rows failed"))
        } else {
            None
        };
        Self {
            target,
            status,
            items_synced,
            items_failed,
            items_removed,
            error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncStatus {
    Success,
    PartialFailure,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "completed",
            SyncStatus::PartialFailure => "partial",
            SyncStatus::Failed => "failed",
        }
    }
}
