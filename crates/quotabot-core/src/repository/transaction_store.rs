//! Transaction store trait definition.

use quotabot_types::error::StoreError;
use quotabot_types::transaction::Transaction;

/// Durable store for registered fee transactions.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait TransactionStore: Send + Sync {
    /// Persist a completed transaction.
    fn insert(
        &self,
        transaction: &Transaction,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Most recent transactions, newest first. Consumed by the external
    /// reporting surface.
    fn list_recent(
        &self,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Transaction>, StoreError>> + Send;
}
