//! Expense split allocation.
//!
//! Turns an expense total plus a split strategy into per-participant
//! paid/owed records, and checks those records before they are committed:
//! - Strategy and participant input types
//! - Largest-remainder distribution of cents
//! - The four strategy formulas (EQUALLY, UNEQUAL, PERCENTAGE, SHARES)
//! - Allocation invariants (participants, signs, sum)

pub mod allocation;
pub mod calculator;
pub mod error;
pub mod types;
pub mod validation;

#[cfg(test)]
mod allocation_props;

pub use allocation::{allocate_equal, allocate_proportional};
pub use calculator::SplitCalculator;
pub use error::SplitError;
pub use types::{
    Allocation, ParticipantInput, PercentageShare, ShareCount, SplitInput, SplitStrategy,
    UnequalShare,
};
pub use validation::AllocationValidator;
