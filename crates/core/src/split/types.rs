//! Split strategy and participant input types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{Money, UserId};

use super::error::SplitError;

/// The rule used to allocate an expense across participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitStrategy {
    /// Payer covers the total; everyone else owes an equal share.
    Equally,
    /// Each participant states what they paid and what they owe.
    Unequal,
    /// Each participant carries a percentage of the total.
    Percentage,
    /// Each participant carries a number of shares of the total.
    Shares,
}

impl SplitStrategy {
    /// Returns the stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equally => "EQUALLY",
            Self::Unequal => "UNEQUAL",
            Self::Percentage => "PERCENTAGE",
            Self::Shares => "SHARES",
        }
    }
}

impl std::fmt::Display for SplitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SplitStrategy {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "EQUALLY" => Ok(Self::Equally),
            "UNEQUAL" => Ok(Self::Unequal),
            "PERCENTAGE" => Ok(Self::Percentage),
            "SHARES" => Ok(Self::Shares),
            _ => Err(SplitError::InvalidSplitType(s.to_string())),
        }
    }
}

/// Explicit paid/owed amounts for one UNEQUAL participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnequalShare {
    /// Participant.
    pub user_id: UserId,
    /// What this participant put in.
    pub amount_paid: Money,
    /// What this participant owes.
    pub amount_owed: Money,
}

/// Percentage for one PERCENTAGE participant, on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentageShare {
    /// Participant.
    pub user_id: UserId,
    /// Percentage of the total.
    pub percentage: Decimal,
}

/// Share count for one SHARES participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareCount {
    /// Participant.
    pub user_id: UserId,
    /// Number of shares held.
    pub shares: u32,
}

/// Strategy together with the participant input that strategy needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "users", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitInput {
    /// Participants come from group membership plus the payer.
    Equally,
    /// Explicit amounts per participant.
    Unequal(Vec<UnequalShare>),
    /// Percentages per participant.
    Percentage(Vec<PercentageShare>),
    /// Share counts per participant.
    Shares(Vec<ShareCount>),
}

impl SplitInput {
    /// Returns the strategy this input is for.
    #[must_use]
    pub const fn strategy(&self) -> SplitStrategy {
        match self {
            Self::Equally => SplitStrategy::Equally,
            Self::Unequal(_) => SplitStrategy::Unequal,
            Self::Percentage(_) => SplitStrategy::Percentage,
            Self::Shares(_) => SplitStrategy::Shares,
        }
    }

    /// Builds typed input from the loosely-shaped wire form.
    ///
    /// # Errors
    ///
    /// Returns `MissingParticipantField` when an entry lacks a field the
    /// strategy needs.
    pub fn from_participants(
        strategy: SplitStrategy,
        users: &[ParticipantInput],
    ) -> Result<Self, SplitError> {
        match strategy {
            SplitStrategy::Equally => Ok(Self::Equally),
            SplitStrategy::Unequal => users
                .iter()
                .map(|u| {
                    Ok(UnequalShare {
                        user_id: u.user_id,
                        amount_paid: u.require(u.amount_paid, "amountPaid")?,
                        amount_owed: u.require(u.amount_owed, "amountOwed")?,
                    })
                })
                .collect::<Result<_, _>>()
                .map(Self::Unequal),
            SplitStrategy::Percentage => users
                .iter()
                .map(|u| {
                    Ok(PercentageShare {
                        user_id: u.user_id,
                        percentage: u.require(u.percentage, "percentage")?,
                    })
                })
                .collect::<Result<_, _>>()
                .map(Self::Percentage),
            SplitStrategy::Shares => users
                .iter()
                .map(|u| {
                    Ok(ShareCount {
                        user_id: u.user_id,
                        shares: u.require(u.shares, "shares")?,
                    })
                })
                .collect::<Result<_, _>>()
                .map(Self::Shares),
        }
    }
}

/// One entry of the `users` array as it arrives from a client.
///
/// Which fields must be present depends on the strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInput {
    /// Participant.
    pub user_id: UserId,
    /// UNEQUAL only.
    #[serde(default)]
    pub amount_paid: Option<Money>,
    /// UNEQUAL only.
    #[serde(default)]
    pub amount_owed: Option<Money>,
    /// PERCENTAGE only.
    #[serde(default)]
    pub percentage: Option<Decimal>,
    /// SHARES only.
    #[serde(default)]
    pub shares: Option<u32>,
}

impl ParticipantInput {
    fn require<T>(&self, value: Option<T>, field: &'static str) -> Result<T, SplitError> {
        value.ok_or(SplitError::MissingParticipantField {
            user_id: self.user_id,
            field,
        })
    }
}

/// One participant's computed position on an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    /// Participant.
    pub user_id: UserId,
    /// What this participant put in.
    pub amount_paid: Money,
    /// What this participant owes.
    pub amount_owed: Money,
    /// Per-unit share used to derive the amounts (informational).
    pub split_ratio: Decimal,
}
