use tracing::warn;

use vlm_slo::{errors, Result};
use vlm_storage::Vm;
use vlm_vcenter::{Hypervisor, PowerAction, PowerCall};

/// What one power request amounted to. A gateway fault is the `Err`
/// branch, not an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOutcome {
    /// The manager carried the action out.
    Applied,
    /// The manager refused, but the VM already sits in the state the
    /// action aims for. Counts as success.
    AlreadyInState,
    /// The manager refused and the transition really is impossible from
    /// the VM's current state, e.g. suspending a VM that is off.
    Rejected,
}

/// Sends the action and disambiguates the manager's overloaded
/// rejection by re-reading the actual power state: a rejection can mean
/// "nothing to do", "genuinely impossible from here", or an upstream
/// fault, and only the live state tells them apart.
pub async fn apply(
    hypervisor: &impl Hypervisor,
    vm: &Vm,
    action: PowerAction,
) -> Result<PowerOutcome> {
    let complaint = match hypervisor
        .power_action(&vm.id_vm_vcenter, action)
        .await?
    {
        PowerCall::Completed => return Ok(PowerOutcome::Applied),
        PowerCall::ValidationRejected(complaint) => complaint,
    };

    let state = hypervisor.power_state(&vm.id_vm_vcenter).await?;
    if action.satisfied_by(state) {
        return Ok(PowerOutcome::AlreadyInState);
    }
    if !action.allowed_from(state) {
        return Ok(PowerOutcome::Rejected);
    }
    Err(errors::gateway(&format!(
        "vm {} refused {} while {:?}: {}",
        vm.id_vm_vcenter, action, state, complaint
    )))
}

/// Fleet-wide variant. Every VM is attempted, refusals and faults are
/// logged and skipped; returns how many VMs ended up in the requested
/// state.
pub async fn apply_all(
    hypervisor: &impl Hypervisor,
    vms: &[Vm],
    action: PowerAction,
) -> usize {
    let mut succeeded = 0;
    for vm in vms {
        match apply(hypervisor, vm, action).await {
            Ok(PowerOutcome::Applied | PowerOutcome::AlreadyInState) => {
                succeeded += 1;
            }
            Ok(PowerOutcome::Rejected) => {
                warn!(
                    "vm {} cannot {} from its current state",
                    vm.id, action
                );
            }
            Err(err) => {
                warn!("power {} failed on vm {}: {}", action, vm.id, err);
            }
        }
    }
    succeeded
}
