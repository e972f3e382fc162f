use serde::{Deserialize, Serialize};
use validator::Validate;

/// Resource ceiling granted to a group or user. Stored per group as an
/// optional override; the global floor loaded from configuration has the
/// same shape. All fields must be >= 0, zero disables further allocation
/// of that resource.
#[derive(
    Debug,
    Default,
    Deserialize,
    Serialize,
    Validate,
    PartialEq,
    Eq,
    Clone,
    Copy,
)]
pub struct Permission {
    #[validate(range(min = 0))]
    pub vm_count: i64,
    #[validate(range(min = 0))]
    pub cpu_count: i64,
    /// MiB.
    #[validate(range(min = 0))]
    pub memory_size: i64,
    /// MiB. Gates creation of new disks only, never shrinks existing ones.
    #[validate(range(min = 0))]
    pub disk_storage: i64,
}

impl Permission {
    pub fn new(
        vm_count: i64,
        cpu_count: i64,
        memory_size: i64,
        disk_storage: i64,
    ) -> Self {
        Self {
            vm_count,
            cpu_count,
            memory_size,
            disk_storage,
        }
    }

    /// Componentwise maximum. Merging an extra grant never narrows the
    /// other one.
    pub fn max(&self, other: &Self) -> Self {
        Self {
            vm_count: self.vm_count.max(other.vm_count),
            cpu_count: self.cpu_count.max(other.cpu_count),
            memory_size: self.memory_size.max(other.memory_size),
            disk_storage: self.disk_storage.max(other.disk_storage),
        }
    }
}
