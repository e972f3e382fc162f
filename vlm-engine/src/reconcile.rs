use tracing::{info, warn};

use vlm_slo::Result;
use vlm_storage::{GroupStore, Permission, User, Vm, VmStore};
use vlm_vcenter::{Hypervisor, PowerAction, PowerState};

use crate::{
    groups, permissions,
    power::{self, PowerOutcome},
};

/// Tally of one reconciliation pass. The pass always runs to the end;
/// failures are counted and logged, never raised, since enforcement is
/// convergent and the next trigger picks up whatever was left dirty.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub users_total: usize,
    pub users_failed: usize,
    pub vms_total: usize,
    pub vms_failed: usize,
}

impl ReconcileReport {
    fn absorb(&mut self, other: &ReconcileReport) {
        self.users_total += other.users_total;
        self.users_failed += other.users_failed;
        self.vms_total += other.vms_total;
        self.vms_failed += other.vms_failed;
    }
}

/// Brings live hypervisor state back under freshly resolved quotas.
/// Holds the immutable global floor; store and gateway handles come in
/// through the constructor so callers decide pooling and mocking.
pub struct Reconciler<G, V, H> {
    groups: G,
    vms: V,
    hypervisor: H,
    floor: Permission,
}

impl<G, V, H> Reconciler<G, V, H>
where
    G: GroupStore + Send + Sync,
    V: VmStore + Send + Sync,
    H: Hypervisor + Send + Sync,
{
    pub fn new(groups: G, vms: V, hypervisor: H, floor: Permission) -> Self {
        Self {
            groups,
            vms,
            hypervisor,
            floor,
        }
    }

    pub fn floor(&self) -> &Permission {
        &self.floor
    }

    /// Re-resolves and enforces quotas for every member of the group,
    /// descendants included. Members are processed independently; one
    /// member's failure never stops the rest.
    pub async fn on_quota_changed(
        &self,
        group_id: &str,
    ) -> Result<ReconcileReport> {
        let group = self.groups.get_group(group_id).await?;
        let members =
            groups::collect_members(&self.groups, &group, true).await?;

        let mut report = ReconcileReport::default();
        for user in &members {
            match self.reconcile_user(user).await {
                Ok(user_report) => report.absorb(&user_report),
                Err(err) => {
                    report.users_total += 1;
                    report.users_failed += 1;
                    warn!("user {} left unreconciled: {}", user.id, err);
                }
            }
        }
        info!(
            "reconciled group {}: {} users ({} failed), {} vms ({} left dirty)",
            group_id,
            report.users_total,
            report.users_failed,
            report.vms_total,
            report.vms_failed
        );
        Ok(report)
    }

    /// Applies the user's freshly resolved quota to the private network
    /// and every owned VM. Also the follow-up pass after a user changes
    /// type and lands in another default group.
    pub async fn reconcile_user(
        &self,
        user: &User,
    ) -> Result<ReconcileReport> {
        let effective = permissions::resolve_user_permission(
            &self.groups,
            user,
            &self.floor,
        )
        .await?;
        let owned = self.vms.list_owned(&user.id).await?;

        if let Some(network) = &user.private_network {
            // Capacity never shrinks below what is already attached.
            let ports = effective.vm_count.max(owned.len() as i64);
            if let Err(err) =
                self.hypervisor.set_network_ports(network, ports).await
            {
                warn!(
                    "network {} of user {} not resized: {}",
                    network, user.id, err
                );
            }
        }

        let mut report = ReconcileReport {
            users_total: 1,
            ..Default::default()
        };
        for vm in &owned {
            report.vms_total += 1;
            if !self.enforce_vm_compliance(vm, &effective).await {
                report.vms_failed += 1;
            }
        }
        Ok(report)
    }

    /// Shrinks the VM's compute allocation down to the quota, powering
    /// it off first when it is running. Disk is deliberately left alone,
    /// the disk quota only gates creation of new disks. Best effort:
    /// returns false when the VM could not be brought into line, and the
    /// caller only counts.
    pub async fn enforce_vm_compliance(
        &self,
        vm: &Vm,
        effective: &Permission,
    ) -> bool {
        let usage = match self
            .hypervisor
            .resource_usage(&vm.id_vm_vcenter)
            .await
        {
            Ok(usage) => usage,
            Err(err) => {
                warn!("vm {} snapshot unreadable, skipping: {}", vm.id, err);
                return false;
            }
        };

        let violates_cpu = usage.cpu_count > effective.cpu_count;
        let violates_mem = usage.memory_mib > effective.memory_size;
        if !violates_cpu && !violates_mem {
            return true;
        }

        let state = match self
            .hypervisor
            .power_state(&vm.id_vm_vcenter)
            .await
        {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    "vm {} power state unreadable, skipping: {}",
                    vm.id, err
                );
                return false;
            }
        };
        if state == PowerState::PoweredOn {
            // The resize below is still attempted when the shutdown
            // fails; the manager is the one to refuse a hot shrink.
            match power::apply(&self.hypervisor, vm, PowerAction::Stop)
                .await
            {
                Ok(PowerOutcome::Rejected) => {
                    warn!("vm {} refused to stop before resize", vm.id);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(
                        "vm {} shutdown before resize failed: {}",
                        vm.id, err
                    );
                }
            }
        }

        let mut clean = true;
        if violates_cpu {
            if let Err(err) = self
                .hypervisor
                .set_cpu(&vm.id_vm_vcenter, effective.cpu_count)
                .await
            {
                warn!("vm {} cpu not reduced: {}", vm.id, err);
                clean = false;
            }
        }
        if violates_mem {
            if let Err(err) = self
                .hypervisor
                .set_memory(&vm.id_vm_vcenter, effective.memory_size)
                .await
            {
                warn!("vm {} memory not reduced: {}", vm.id, err);
                clean = false;
            }
        }
        clean
    }
}
