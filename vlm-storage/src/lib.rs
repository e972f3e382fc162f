pub mod group;
pub mod permission;
pub mod user;
pub mod vm;

pub use group::{Group, GroupStore};
pub use permission::Permission;
pub use user::{User, UserStore, UserType};
pub use vm::{Vm, VmStore};
