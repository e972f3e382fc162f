pub mod engine {
    pub use vlm_engine::*;
}

pub mod storage {
    pub use vlm_storage::*;
}

pub mod vcenter {
    pub use vlm_vcenter::*;
}

pub use vlm_slo::*;
