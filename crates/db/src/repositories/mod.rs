//! Repository implementations of the ledger's store boundaries.

pub mod expense;
pub mod group;
mod mapping;

pub use expense::ExpenseRepository;
pub use group::GroupRepository;

use sea_orm::{DbErr, SqlErr};
use tally_core::ledger::StoreError;

/// Maps a database error onto the store boundary.
///
/// Constraint violations and connection problems both stay transient so the
/// ledger's retry policy decides how often to repeat them.
pub(crate) fn store_error(err: &DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg) | SqlErr::ForeignKeyConstraintViolation(msg)) => {
            StoreError::Constraint(msg)
        }
        _ => StoreError::Unavailable(err.to_string()),
    }
}
