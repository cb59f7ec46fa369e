//! Group repository: PostgreSQL implementation of [`GroupDirectory`].

use std::collections::HashMap;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use tally_core::ledger::{GroupDirectory, StoreError};
use tally_shared::types::{GroupId, UserId};
use uuid::Uuid;

use super::store_error;
use crate::entities::{group_members, groups, users};

/// Read access to groups, members and contact addresses.
#[derive(Debug, Clone)]
pub struct GroupRepository {
    db: DatabaseConnection,
}

impl GroupRepository {
    /// Creates a new group repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl GroupDirectory for GroupRepository {
    async fn group_exists(&self, group_id: GroupId) -> Result<bool, StoreError> {
        groups::Entity::find_by_id(group_id.into_inner())
            .one(&self.db)
            .await
            .map(|g| g.is_some())
            .map_err(|e| store_error(&e))
    }

    async fn list_members(&self, group_id: GroupId) -> Result<Vec<UserId>, StoreError> {
        group_members::Entity::find()
            .filter(group_members::Column::GroupId.eq(group_id.into_inner()))
            .order_by_asc(group_members::Column::JoinedAt)
            .order_by_asc(group_members::Column::UserId)
            .all(&self.db)
            .await
            .map(|members| {
                members
                    .into_iter()
                    .map(|m| UserId::from_uuid(m.user_id))
                    .collect()
            })
            .map_err(|e| store_error(&e))
    }

    async fn contact_emails(&self, user_ids: &[UserId]) -> Result<Vec<String>, StoreError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut emails: HashMap<Uuid, String> = users::Entity::find()
            .filter(users::Column::Id.is_in(user_ids.iter().map(|id| id.into_inner())))
            .all(&self.db)
            .await
            .map_err(|e| store_error(&e))?
            .into_iter()
            .map(|u| (u.id, u.email))
            .collect();

        Ok(user_ids
            .iter()
            .filter_map(|id| emails.remove(&id.into_inner()))
            .collect())
    }
}
