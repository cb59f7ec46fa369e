//! Settlement of one participant's debt on one expense.
//!
//! Only the payer's split changes: `amount_owed` drops by the settled
//! amount. The payee's split is required to exist but is left untouched.
//! The read-check-write cycle is guarded by the split version, so two
//! concurrent settlements against the same split can never both be
//! applied to the same starting balance.

use std::sync::Arc;

use chrono::Utc;
use tally_shared::LedgerConfig;
use tally_shared::types::{ExpenseId, PaymentId};
use tracing::{info, warn};

use super::error::LedgerError;
use super::retry::{RetryPolicy, store_failure};
use super::store::{LedgerStore, SettlementWrite, StoreError};
use super::types::{Payment, PaymentStatus, SettleUpInput, SettlementResult};
use crate::split::{AllocationValidator, SplitError};

/// Applies settlements against stored splits.
pub struct SettlementEngine<S> {
    store: Arc<S>,
    policy: RetryPolicy,
    record_payments: bool,
}

impl<S: LedgerStore> SettlementEngine<S> {
    /// Creates an engine that records a payment row per settlement.
    #[must_use]
    pub fn new(store: Arc<S>, policy: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            record_payments: true,
        }
    }

    /// Creates an engine configured from [`LedgerConfig`].
    #[must_use]
    pub fn from_config(store: Arc<S>, config: &LedgerConfig) -> Self {
        Self::new(store, RetryPolicy::from(config)).with_payment_records(config.record_payments)
    }

    /// Enables or disables writing a payment row alongside each settlement.
    #[must_use]
    pub fn with_payment_records(mut self, enabled: bool) -> Self {
        self.record_payments = enabled;
        self
    }

    /// Settles `input.amount` of the payer's debt on one expense.
    ///
    /// # Errors
    ///
    /// - `NonPositiveAmount`, `SubCentAmount`, `AmountOutOfRange` or
    ///   `SelfSettlement` for malformed input
    /// - `ExpenseNotFound` if the expense is missing or deleted, including a
    ///   delete that lands while the settlement is in flight
    /// - `BalancesNotFound` if either party has no split on the expense
    /// - `InsufficientBalance` if the amount exceeds what the payer owes
    /// - `ConcurrentSettlementConflict` if the split keeps changing underneath
    pub async fn settle_up(&self, input: &SettleUpInput) -> Result<SettlementResult, LedgerError> {
        self.policy
            .with_timeout("settle_up", async {
                match self.try_settle(input).await {
                    Err(LedgerError::ConcurrentSettlementConflict { .. }) => {
                        warn!(
                            expense_id = %input.expense_id,
                            payer_id = %input.payer_id,
                            "Split changed during settlement, retrying once"
                        );
                        self.try_settle(input).await
                    }
                    other => other,
                }
            })
            .await
    }

    async fn try_settle(&self, input: &SettleUpInput) -> Result<SettlementResult, LedgerError> {
        const OP: &str = "settle_up";

        AllocationValidator::validate_total(input.amount)?;
        if input.payer_id == input.payee_id {
            return Err(SplitError::SelfSettlement.into());
        }

        let expense_live = self
            .policy
            .retry(OP, || self.store.find_expense(input.expense_id))
            .await
            .map_err(|e| store_failure(OP, &e))?
            .is_some_and(|e| !e.is_deleted());
        if !expense_live {
            return Err(LedgerError::ExpenseNotFound(input.expense_id));
        }

        let payer_split = self
            .policy
            .retry(OP, || self.store.find_split(input.expense_id, input.payer_id))
            .await
            .map_err(|e| store_failure(OP, &e))?;
        let payee_split = self
            .policy
            .retry(OP, || self.store.find_split(input.expense_id, input.payee_id))
            .await
            .map_err(|e| store_failure(OP, &e))?;

        let (Some(payer_split), Some(_)) = (payer_split, payee_split) else {
            return Err(LedgerError::BalancesNotFound {
                payer_id: input.payer_id,
                payee_id: input.payee_id,
                expense_id: input.expense_id,
            });
        };

        let new_amount_owed = payer_split.amount_owed - input.amount;
        if new_amount_owed.is_negative() {
            return Err(LedgerError::InsufficientBalance {
                available: payer_split.amount_owed,
                requested: input.amount,
            });
        }

        let payment = self.record_payments.then(|| Payment {
            id: PaymentId::new(),
            expense_id: Some(input.expense_id),
            payer_id: input.payer_id,
            payee_id: input.payee_id,
            amount: input.amount,
            status: PaymentStatus::Completed,
            created_at: Utc::now(),
        });
        let payment_id = payment.as_ref().map(|p| p.id);

        let write = SettlementWrite {
            expense_id: input.expense_id,
            split_id: payer_split.id,
            expected_version: payer_split.version,
            new_amount_owed,
            payment,
        };

        // Single attempt: a write with an unknown outcome must not be replayed.
        let updated = match self.store.apply_settlement(&write).await {
            Ok(split) => split,
            Err(StoreError::VersionConflict) => {
                return Err(LedgerError::ConcurrentSettlementConflict {
                    expense_id: input.expense_id,
                    user_id: input.payer_id,
                });
            }
            Err(e) => return Err(store_failure(OP, &e)),
        };

        info!(
            expense_id = %input.expense_id,
            payer_id = %input.payer_id,
            payee_id = %input.payee_id,
            amount = %input.amount,
            new_balance = %updated.amount_owed,
            "Settlement applied"
        );

        Ok(SettlementResult {
            payer_id: input.payer_id,
            payee_id: input.payee_id,
            new_payer_balance: updated.amount_owed,
            payment_id,
        })
    }

    /// Lists payments recorded against an expense, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `Store` / `Timeout` on infrastructure failure.
    pub async fn payments(&self, expense_id: ExpenseId) -> Result<Vec<Payment>, LedgerError> {
        const OP: &str = "list_payments";

        self.policy
            .with_timeout(OP, async {
                self.policy
                    .retry(OP, || self.store.list_payments(expense_id))
                    .await
                    .map_err(|e| store_failure(OP, &e))
            })
            .await
    }
}
