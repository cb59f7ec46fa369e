//! Core business logic for Tally.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Persistence and group membership are reached through the traits in
//! [`ledger::store`].
//!
//! # Modules
//!
//! - `split` - Split strategies, cent allocation and allocation invariants
//! - `ledger` - Expense lifecycle, settlement and balance aggregation

pub mod ledger;
pub mod split;
