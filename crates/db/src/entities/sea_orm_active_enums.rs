//! `SeaORM` active enums backed by PostgreSQL enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "split_strategy")]
pub enum SplitStrategy {
    #[sea_orm(string_value = "equally")]
    Equally,
    #[sea_orm(string_value = "unequal")]
    Unequal,
    #[sea_orm(string_value = "percentage")]
    Percentage,
    #[sea_orm(string_value = "shares")]
    Shares,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "payment_status")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}
