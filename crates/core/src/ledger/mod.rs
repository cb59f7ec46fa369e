//! Expense ledger and settlement.
//!
//! This module persists expenses and their split sets and keeps debts
//! consistent under concurrency:
//! - Expense records, settlements and payments
//! - Store and group-directory boundaries
//! - Expense create/update/delete
//! - Version-guarded settlement
//! - Balance aggregation
//! - Retry, timeout and notification plumbing

pub mod balance;
pub mod error;
pub mod memory;
pub mod notify;
pub mod retry;
pub mod service;
pub mod settlement;
pub mod store;
pub mod types;

pub use balance::{BalanceAggregator, UserBalance, net_balance};
pub use error::LedgerError;
pub use memory::{MemoryGroupDirectory, MemoryLedgerStore};
pub use notify::{ExpenseNotifier, NoopNotifier};
pub use retry::RetryPolicy;
pub use service::ExpenseLedger;
pub use settlement::SettlementEngine;
pub use store::{GroupDirectory, LedgerStore, SettlementWrite, StoreError};
pub use types::{
    CreateExpenseInput, CreateExpenseRequest, Expense, ExpenseNotice, ExpenseSplit,
    ExpenseWithSplits, Payment, PaymentStatus, SettleUpInput, SettlementResult,
    UpdateExpenseInput, UpdateExpenseRequest,
};
