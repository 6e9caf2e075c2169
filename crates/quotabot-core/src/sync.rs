//! Spreadsheet export trait definition.
//!
//! The concrete exporter is an external collaborator. Export failures are
//! non-fatal by design: the primary record is already durable when `append`
//! runs, so the flow only warns the user about real failures and stays
//! silent when the export was never configured.

use quotabot_types::error::SyncError;
use quotabot_types::transaction::Transaction;

/// Push-side of the spreadsheet export.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait SheetSync: Send + Sync {
    /// Append one transaction row to the sheet.
    fn append(
        &self,
        transaction: &Transaction,
    ) -> impl std::future::Future<Output = Result<(), SyncError>> + Send;
}

/// Sheet sync for deployments without a configured spreadsheet.
///
/// Always reports `SyncError::NotConfigured`, which flows treat as a
/// silent no-op.
pub struct DisabledSheetSync;

impl SheetSync for DisabledSheetSync {
    async fn append(&self, _transaction: &Transaction) -> Result<(), SyncError> {
        Err(SyncError::NotConfigured)
    }
}
