//! Best-effort notification after an expense is created.
//!
//! Delivery is never part of the ledger commit: the ledger spawns the
//! notification after the store has committed and only logs failures.

use std::future::Future;

use tally_shared::{EmailError, EmailService};

use super::types::ExpenseNotice;

/// Delivers "new expense" notices.
pub trait ExpenseNotifier: Send + Sync + 'static {
    /// Sends one notice.
    fn expense_created(
        &self,
        notice: ExpenseNotice,
    ) -> impl Future<Output = Result<(), EmailError>> + Send;
}

/// Notifier for deployments without outbound email.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ExpenseNotifier for NoopNotifier {
    async fn expense_created(&self, _notice: ExpenseNotice) -> Result<(), EmailError> {
        Ok(())
    }
}

impl ExpenseNotifier for EmailService {
    async fn expense_created(&self, notice: ExpenseNotice) -> Result<(), EmailError> {
        let description = notice.description.as_deref().unwrap_or("Untitled expense");
        self.send_expense_notification(
            &notice.recipient_emails,
            notice.expense_id,
            description,
            notice.amount,
        )
        .await
    }
}
