pub mod client;
mod types;

pub use client::{VcenterClient, VcenterConfig};
pub use types::{DiskEntry, PowerAction, PowerCall, PowerState, VmResources};

use async_trait::async_trait;
use mockall::automock;

use vlm_slo::Result;

/// Everything the engine asks of the hypervisor manager. `vm_ref` and
/// `network_ref` are the manager's own handles ("vm-4231"), not local
/// record ids.
#[automock]
#[async_trait]
pub trait Hypervisor {
    async fn power_state(&self, vm_ref: &str) -> Result<PowerState>;
    /// Live compute snapshot. Disk capacities are reported in MiB.
    async fn resource_usage(&self, vm_ref: &str) -> Result<VmResources>;
    /// Sends one power action. `Ok(ValidationRejected)` carries the
    /// manager's complaint verbatim; transport failures and server
    /// faults are `Err`.
    async fn power_action(
        &self,
        vm_ref: &str,
        action: PowerAction,
    ) -> Result<PowerCall>;
    async fn set_cpu(&self, vm_ref: &str, count: i64) -> Result<()>;
    async fn set_memory(&self, vm_ref: &str, size_mib: i64) -> Result<()>;
    async fn set_network_ports(
        &self,
        network_ref: &str,
        count: i64,
    ) -> Result<()>;
}
