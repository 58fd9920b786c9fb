//! ROCm Execution Provider
//!
//! AMD ROCm for GPU acceleration on AMD GPUs (Linux only).

use crate::{BackendType, impl_provider_base, ExecutionProvider, ProviderConfig};
use crate::constants::*;

#[derive(Debug, Clone)]
pub struct ROCmExecutionProvider {
    config: ProviderConfig,
}

impl_provider_base!(ROCmExecutionProvider, BackendType::ROCm);

impl ROCmExecutionProvider {
    /// Set the ROCm device ID (default: 0)
    pub fn with_device_id(mut self, device_id: i32) -> Self {
        self.config.set(DEVICE_ID, device_id);
        self
    }

    /// Set GPU memory limit in bytes
    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.config.set(GPU_MEM_LIMIT, limit);
        self
    }

    /// Enable exhaustive MIOpen convolution search
    pub fn with_miopen_conv_exhaustive_search(mut self, enable: bool) -> Self {
        self.config.set(MIOPEN_CONV_EXHAUSTIVE_SEARCH, u8::from(enable));
        self
    }

    /// Enable using max workspace size for MIOpen convolutions
    pub fn with_miopen_conv_use_max_workspace(mut self, enable: bool) -> Self {
        self.config.set(MIOPEN_CONV_USE_MAX_WORKSPACE, u8::from(enable));
        self
    }

    /// Enable tunable operations
    ///
    /// onnxruntime-rocm reads these as integers, hence `1`/`0` instead of
    /// `true`/`false`.
    pub fn with_tunable_op_enable(mut self, enable: bool) -> Self {
        self.config.set(TUNABLE_OP_ENABLE, u8::from(enable));
        self
    }

    /// Enable tunable operation tuning
    pub fn with_tunable_op_tuning_enable(mut self, enable: bool) -> Self {
        self.config.set(TUNABLE_OP_TUNING_ENABLE, u8::from(enable));
        self
    }

    /// Set tunable operation max tuning duration in milliseconds
    pub fn with_tunable_op_max_tuning_duration_ms(mut self, duration_ms: i32) -> Self {
        self.config.set(TUNABLE_OP_MAX_TUNING_DURATION_MS, duration_ms);
        self
    }
}

impl ExecutionProvider for ROCmExecutionProvider {
    fn name(&self) -> &'static str {
        self.get_name()
    }

    fn backend_type(&self) -> BackendType {
        self.get_backend_type()
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn supported_by_platform(&self) -> bool {
        cfg!(target_os = "linux")
    }
}
