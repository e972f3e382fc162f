pub mod config;
pub mod groups;
pub mod permissions;
pub mod power;
pub mod quotas;
pub mod reconcile;

pub use config::EngineConfig;
pub use power::PowerOutcome;
pub use quotas::Quotas;
pub use reconcile::{ReconcileReport, Reconciler};
