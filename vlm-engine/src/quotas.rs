use std::sync::Arc;

use tracing::error;
use validator::Validate;

use vlm_slo::{errors::Code, Result};
use vlm_storage::{GroupStore, Permission, UserStore, VmStore};
use vlm_vcenter::Hypervisor;

use crate::{permissions, reconcile::Reconciler};

/// Administrative quota surface. A write returns as soon as the
/// override is persisted; the fleet-wide enforcement it triggers runs
/// on its own task and reports through logs only.
pub struct Quotas<G, U, V, H> {
    groups: G,
    users: U,
    reconciler: Arc<Reconciler<G, V, H>>,
}

impl<G, U, V, H> Quotas<G, U, V, H>
where
    G: GroupStore + Send + Sync + 'static,
    U: UserStore + Send + Sync,
    V: VmStore + Send + Sync + 'static,
    H: Hypervisor + Send + Sync + 'static,
{
    pub fn new(
        groups: G,
        users: U,
        reconciler: Arc<Reconciler<G, V, H>>,
    ) -> Self {
        Self {
            groups,
            users,
            reconciler,
        }
    }

    /// Creates or replaces the group's override. The input is checked
    /// before anything is loaded or written.
    pub async fn set_group_permission(
        &self,
        group_id: &str,
        input: &Permission,
    ) -> Result<()> {
        input.validate().map_err(Code::Validates)?;
        let group = self.groups.get_group(group_id).await?;
        self.groups
            .put_group_permission(&group.id, Some(*input))
            .await?;
        self.spawn_pass(group.id);
        Ok(())
    }

    /// Drops the override so the group inherits again.
    pub async fn reset_group_permission(
        &self,
        group_id: &str,
    ) -> Result<()> {
        let group = self.groups.get_group(group_id).await?;
        self.groups.put_group_permission(&group.id, None).await?;
        self.spawn_pass(group.id);
        Ok(())
    }

    pub async fn effective_group_permission(
        &self,
        group_id: &str,
    ) -> Result<Permission> {
        let group = self.groups.get_group(group_id).await?;
        permissions::resolve_group_permission(
            &self.groups,
            &group,
            self.reconciler.floor(),
        )
        .await
    }

    pub async fn effective_user_permission(
        &self,
        user_id: &str,
    ) -> Result<Permission> {
        let user = self.users.get_user(user_id).await?;
        permissions::resolve_user_permission(
            &self.groups,
            &user,
            self.reconciler.floor(),
        )
        .await
    }

    fn spawn_pass(&self, group_id: String) {
        let reconciler = self.reconciler.clone();
        tokio::spawn(async move {
            if let Err(err) = reconciler.on_quota_changed(&group_id).await {
                error!(
                    "reconciliation after quota change on {} failed: {}",
                    group_id, err
                );
            }
        });
    }
}
