use async_trait::async_trait;
use chrono::NaiveDateTime;
use mockall::automock;
use serde::{Deserialize, Serialize};

use vlm_slo::Result;

use crate::{Permission, User, UserType};

#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Clone)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub desc: String,
    /// Groups form a forest. A cycle in stored parent links is an anomaly
    /// the readers must survive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Quota override. `None` inherits from the parent chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<Permission>,
    /// Set on the one default group of each user type. Default groups
    /// cannot be deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_for: Option<UserType>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[automock]
#[async_trait]
pub trait GroupStore {
    async fn get_group(&self, id: &str) -> Result<Group>;
    /// Direct children only.
    async fn list_children(&self, parent_id: &str) -> Result<Vec<Group>>;
    /// Users attached to the group itself, descendants excluded.
    async fn list_direct_members(&self, group_id: &str) -> Result<Vec<User>>;
    async fn list_groups_of_user(&self, user_id: &str) -> Result<Vec<Group>>;
    /// Writes the override. `None` resets the group to inherited quota.
    async fn put_group_permission(
        &self,
        id: &str,
        permission: Option<Permission>,
    ) -> Result<()>;
}
