use async_trait::async_trait;
use chrono::NaiveDateTime;
use mockall::automock;
use serde::{Deserialize, Serialize};

use vlm_slo::Result;

#[derive(
    Debug, Default, Deserialize, Serialize, PartialEq, Eq, Clone, Copy,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserType {
    #[default]
    Student,
    Referent,
    Admin,
}

#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Clone)]
pub struct User {
    pub id: String,
    pub login: String,
    #[serde(rename = "type")]
    pub user_type: UserType,
    /// Remote handle of the user's private network, when one is provisioned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_network: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[automock]
#[async_trait]
pub trait UserStore {
    async fn get_user(&self, id: &str) -> Result<User>;
}
