use async_trait::async_trait;
use chrono::NaiveDateTime;
use mockall::automock;
use serde::{Deserialize, Serialize};

use vlm_slo::Result;

#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Clone)]
pub struct Vm {
    pub id: String,
    /// Remote vCenter handle, e.g. "vm-4231". Live power and compute state
    /// is authoritative behind it; this record is authoritative for
    /// ownership and attribution.
    pub id_vm_vcenter: String,
    pub user_id: String,
    pub name: String,
    pub desc: String,
    pub is_template: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[automock]
#[async_trait]
pub trait VmStore {
    /// Every VM attributed to the user.
    async fn list_owned(&self, user_id: &str) -> Result<Vec<Vm>>;
}
